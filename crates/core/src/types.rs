use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::workflow::status_for_schedule;

/// Legal nature of a client: individual (CPF) or organization (CNPJ).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientType {
    #[serde(rename = "PF")]
    Individual,
    #[serde(rename = "PJ")]
    Organization,
}

impl ClientType {
    /// Returns the canonical wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Individual => "PF",
            Self::Organization => "PJ",
        }
    }

    /// Human readable label used in charts and prompts.
    pub fn label(self) -> &'static str {
        match self {
            Self::Individual => "Pessoa Física (CPF)",
            Self::Organization => "Pessoa Jurídica (CNPJ)",
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer that certificates are issued for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    /// CPF or CNPJ as typed, punctuation included.
    pub document: String,
    pub email: String,
    pub phone: String,
    #[serde(rename = "type")]
    pub kind: ClientType,
}

/// Fields required to create a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub document: String,
    pub email: String,
    pub phone: String,
    #[serde(rename = "type")]
    pub kind: ClientType,
}

/// Partial update for a client; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ClientType>,
}

impl Client {
    pub fn from_new(id: String, new: NewClient) -> Self {
        Self {
            id,
            name: new.name,
            document: new.document,
            email: new.email,
            phone: new.phone,
            kind: new.kind,
        }
    }

    pub fn apply(&mut self, patch: ClientPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(document) = patch.document {
            self.document = document;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
    }
}

/// Certificate media offered in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductCategory {
    A1,
    A3,
    Cloud,
}

impl ProductCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A1 => "A1",
            Self::A3 => "A3",
            Self::Cloud => "CLOUD",
        }
    }

    /// Label used by the dashboard breakdown.
    pub fn label(self) -> &'static str {
        match self {
            Self::A1 => "Certificado A1",
            Self::A3 => "Certificado A3",
            Self::Cloud => "Nuvem",
        }
    }
}

/// Catalog entry for an issuable certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub validity_months: u32,
    #[serde(rename = "type")]
    pub category: ProductCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default = "default_validity_months")]
    pub validity_months: u32,
    #[serde(rename = "type")]
    pub category: ProductCategory,
}

fn default_validity_months() -> u32 {
    12
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_months: Option<u32>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub category: Option<ProductCategory>,
}

impl Product {
    pub fn from_new(id: String, new: NewProduct) -> Self {
        Self {
            id,
            name: new.name,
            description: new.description,
            price: new.price,
            validity_months: new.validity_months,
            category: new.category,
        }
    }

    pub fn apply(&mut self, patch: ProductPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(validity_months) = patch.validity_months {
            self.validity_months = validity_months;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
    }

    /// Renders the validity period, preferring whole years.
    pub fn validity_label(&self) -> String {
        let months = self.validity_months;
        if months > 0 && months % 12 == 0 {
            let years = months / 12;
            let unit = if years == 1 { "Ano" } else { "Anos" };
            format!("{years} {unit}")
        } else {
            format!("{months} Meses")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorityStatus {
    Active,
    Inactive,
}

impl AuthorityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

/// Certificate authority (AC) that issues the purchased certificates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateAuthority {
    pub id: String,
    pub name: String,
    /// Integration endpoint; stored for a future issuance integration.
    pub api_url: String,
    pub status: AuthorityStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuthority {
    pub name: String,
    pub api_url: String,
    #[serde(default = "default_authority_status")]
    pub status: AuthorityStatus,
}

fn default_authority_status() -> AuthorityStatus {
    AuthorityStatus::Active
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorityPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AuthorityStatus>,
}

impl CertificateAuthority {
    pub fn from_new(id: String, new: NewAuthority) -> Self {
        Self {
            id,
            name: new.name,
            api_url: new.api_url,
            status: new.status,
        }
    }

    pub fn apply(&mut self, patch: AuthorityPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(api_url) = patch.api_url {
            self.api_url = api_url;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AuthorityStatus::Active
    }
}

/// Lifecycle of an order/appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    /// Ordered but not yet scheduled.
    Pending,
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Returns the canonical wire representation for the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Scheduled => "SCHEDULED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Badge text shown to operators.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "PENDENTE",
            Self::Scheduled => "AGENDADO",
            Self::Completed => "CONCLUÍDO",
            Self::Cancelled => "CANCELADO",
        }
    }

    /// Returns `true` while the order still awaits completion or cancellation.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Scheduled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order linking a client, a product and the issuing authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub client_id: String,
    pub product_id: String,
    pub ac_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    pub status: AppointmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Appointment as written by the scheduling form.
///
/// There is no status field: it is derived from `date` on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub client_id: String,
    pub product_id: String,
    pub ac_id: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewAppointment {
    pub fn status(&self) -> AppointmentStatus {
        status_for_schedule(self.date.as_ref())
    }
}

/// Partial update for an appointment.
///
/// `date` and `notes` are doubly optional so a patch can clear them. A patch
/// carrying `date` recomputes the status, whatever the previous status was.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentPatch {
    pub client_id: Option<String>,
    pub product_id: Option<String>,
    pub ac_id: Option<String>,
    pub date: Option<Option<DateTime<Utc>>>,
    pub notes: Option<Option<String>>,
}

impl Appointment {
    pub fn from_new(id: String, new: NewAppointment) -> Self {
        Self {
            id,
            status: new.status(),
            client_id: new.client_id,
            product_id: new.product_id,
            ac_id: new.ac_id,
            date: new.date,
            notes: new.notes,
        }
    }

    pub fn apply(&mut self, patch: AppointmentPatch) {
        if let Some(client_id) = patch.client_id {
            self.client_id = client_id;
        }
        if let Some(product_id) = patch.product_id {
            self.product_id = product_id;
        }
        if let Some(ac_id) = patch.ac_id {
            self.ac_id = ac_id;
        }
        if let Some(date) = patch.date {
            self.status = status_for_schedule(date.as_ref());
            self.date = date;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
    }
}

impl From<NewAppointment> for AppointmentPatch {
    /// A full edit: every field of the submitted form replaces the stored one.
    fn from(value: NewAppointment) -> Self {
        Self {
            client_id: Some(value.client_id),
            product_id: Some(value.product_id),
            ac_id: Some(value.ac_id),
            date: Some(value.date),
            notes: Some(value.notes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Agent,
}

/// Operator account as exposed outside the store. Never carries the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub password: String,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for UserPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPatch")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
