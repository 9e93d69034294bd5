use std::cmp::Ordering;
use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Appointment, AppointmentStatus, CertificateAuthority, Client, Product};

pub const UNKNOWN_CLIENT: &str = "Unknown Client";
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";
pub const UNKNOWN_AUTHORITY: &str = "N/A";

/// Appointment joined with the names and price it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDisplay {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub client_name: String,
    pub product_name: String,
    pub product_price: Decimal,
    pub ac_name: String,
    pub status_label: String,
    /// Whether the complete and cancel actions apply.
    pub can_close: bool,
}

impl OrderDisplay {
    pub fn status(&self) -> AppointmentStatus {
        self.appointment.status
    }
}

/// Borrowed view of the collections an order refers to.
#[derive(Debug, Clone, Copy)]
pub struct OrderSources<'a> {
    pub clients: &'a [Client],
    pub products: &'a [Product],
    pub authorities: &'a [CertificateAuthority],
}

/// Pure projector helpers that turn stored appointments into display rows.
pub struct Projector;

impl Projector {
    /// Projects a single appointment; dangling references fall back to placeholders.
    pub fn order(appointment: &Appointment, sources: OrderSources<'_>) -> OrderDisplay {
        let client = sources
            .clients
            .iter()
            .find(|client| client.id == appointment.client_id);
        let product = sources
            .products
            .iter()
            .find(|product| product.id == appointment.product_id);
        let authority = sources
            .authorities
            .iter()
            .find(|authority| authority.id == appointment.ac_id);
        build(appointment, client, product, authority)
    }

    /// Projects every appointment, preserving the input order.
    pub fn orders(appointments: &[Appointment], sources: OrderSources<'_>) -> Vec<OrderDisplay> {
        let clients: HashMap<&str, &Client> = sources
            .clients
            .iter()
            .map(|client| (client.id.as_str(), client))
            .collect();
        let products: HashMap<&str, &Product> = sources
            .products
            .iter()
            .map(|product| (product.id.as_str(), product))
            .collect();
        let authorities: HashMap<&str, &CertificateAuthority> = sources
            .authorities
            .iter()
            .map(|authority| (authority.id.as_str(), authority))
            .collect();

        appointments
            .iter()
            .map(|appointment| {
                build(
                    appointment,
                    clients.get(appointment.client_id.as_str()).copied(),
                    products.get(appointment.product_id.as_str()).copied(),
                    authorities.get(appointment.ac_id.as_str()).copied(),
                )
            })
            .collect()
    }
}

fn build(
    appointment: &Appointment,
    client: Option<&Client>,
    product: Option<&Product>,
    authority: Option<&CertificateAuthority>,
) -> OrderDisplay {
    OrderDisplay {
        appointment: appointment.clone(),
        client_name: client
            .map(|client| client.name.clone())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string()),
        product_name: product
            .map(|product| product.name.clone())
            .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string()),
        product_price: product.map(|product| product.price).unwrap_or(Decimal::ZERO),
        ac_name: authority
            .map(|authority| authority.name.clone())
            .unwrap_or_else(|| UNKNOWN_AUTHORITY.to_string()),
        status_label: appointment.status.label().to_string(),
        can_close: appointment.status.is_active(),
    }
}

/// Agenda ordering: pending orders first, then newest date first.
///
/// Orders without a date sort as the oldest within their group.
pub fn sort_for_agenda(orders: &mut [OrderDisplay]) {
    orders.sort_by(agenda_cmp);
}

fn agenda_cmp(a: &OrderDisplay, b: &OrderDisplay) -> Ordering {
    let a_pending = a.status() == AppointmentStatus::Pending;
    let b_pending = b.status() == AppointmentStatus::Pending;
    b_pending
        .cmp(&a_pending)
        .then_with(|| b.appointment.date.cmp(&a.appointment.date))
}
