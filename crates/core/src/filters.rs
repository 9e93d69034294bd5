//! Search helpers backing the list screens and the agenda client picker.

use crate::types::{CertificateAuthority, Client};

/// Strips every non-digit character, e.g. `"12.345.678/0001-90"` → `"12345678000190"`.
pub fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Client list filter: name (case-insensitive) or raw document substring.
pub fn filter_clients<'a>(clients: &'a [Client], term: &str) -> Vec<&'a Client> {
    if term.is_empty() {
        return clients.iter().collect();
    }
    let needle = term.to_lowercase();
    clients
        .iter()
        .filter(|client| client.name.to_lowercase().contains(&needle) || client.document.contains(term))
        .collect()
}

pub fn filter_authorities<'a>(
    authorities: &'a [CertificateAuthority],
    term: &str,
) -> Vec<&'a CertificateAuthority> {
    let needle = term.to_lowercase();
    authorities
        .iter()
        .filter(|authority| authority.name.to_lowercase().contains(&needle))
        .collect()
}

/// Authorities that can be picked for new orders.
pub fn active_authorities(authorities: &[CertificateAuthority]) -> Vec<&CertificateAuthority> {
    authorities.iter().filter(|authority| authority.is_active()).collect()
}

/// Finds the first client whose document digits match the term, or whose name contains it.
pub fn find_client<'a>(clients: &'a [Client], term: &str) -> Option<&'a Client> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    let digits = digits_only(term);
    let needle = term.to_lowercase();
    clients.iter().find(|client| {
        (!digits.is_empty() && digits_only(&client.document) == digits)
            || client.name.to_lowercase().contains(&needle)
    })
}
