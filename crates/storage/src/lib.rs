mod seed;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use certflow_core::projector::{OrderDisplay, OrderSources, Projector};
use certflow_core::types::{
    Appointment, AppointmentPatch, AuthorityPatch, CertificateAuthority, Client, ClientPatch,
    NewAppointment, NewAuthority, NewClient, NewProduct, NewUser, Product, ProductPatch, User,
    UserPatch,
};
use certflow_core::validation::{ValidationError, Validator};
use certflow_core::workflow::Transition;

/// Top-level handle that owns every in-memory collection.
///
/// Clones share the same tables; the handle is created once by the
/// application entry point and passed to whoever needs it.
#[derive(Clone, Default)]
pub struct Database {
    tables: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    clients: Vec<Client>,
    products: Vec<Product>,
    authorities: Vec<CertificateAuthority>,
    appointments: Vec<Appointment>,
    users: Vec<UserRecord>,
}

impl Database {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with the demo catalog, clients and agenda.
    ///
    /// Seeded appointments are placed on the local day of `now` in `tz`.
    pub fn seeded(now: DateTime<Utc>, tz: Tz) -> Self {
        let db = Self::new();
        {
            let mut tables = db.write();
            seed::populate(&mut tables, now, tz);
            info!(
                stage = "store",
                clients = tables.clients.len(),
                products = tables.products.len(),
                authorities = tables.authorities.len(),
                appointments = tables.appointments.len(),
                users = tables.users.len(),
                "demo data seeded"
            );
        }
        db
    }

    /// Returns a handle to interact with clients.
    pub fn clients(&self) -> ClientRepository {
        ClientRepository { db: self.clone() }
    }

    /// Returns a handle to interact with the product catalog.
    pub fn products(&self) -> ProductRepository {
        ProductRepository { db: self.clone() }
    }

    /// Returns a handle to interact with certificate authorities.
    pub fn authorities(&self) -> AuthorityRepository {
        AuthorityRepository { db: self.clone() }
    }

    /// Returns a handle to interact with appointments/orders.
    pub fn appointments(&self) -> AppointmentRepository {
        AppointmentRepository { db: self.clone() }
    }

    /// Returns a handle to interact with operator accounts.
    pub fn users(&self) -> UserRepository {
        UserRepository { db: self.clone() }
    }

    /// Projects every appointment against a consistent view of the tables.
    pub fn orders(&self) -> Vec<OrderDisplay> {
        let tables = self.read();
        Projector::orders(
            &tables.appointments,
            OrderSources {
                clients: &tables.clients,
                products: &tables.products,
                authorities: &tables.authorities,
            },
        )
    }

    /// Projects a single appointment, or `None` when the id is unknown.
    pub fn order(&self, id: &str) -> Option<OrderDisplay> {
        let tables = self.read();
        let appointment = tables.appointments.iter().find(|row| row.id == id)?;
        Some(Projector::order(
            appointment,
            OrderSources {
                clients: &tables.clients,
                products: &tables.products,
                authorities: &tables.authorities,
            },
        ))
    }

    // A panic while holding the lock cannot leave a table half-written:
    // every mutation is a single push, assignment or retain.
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Errors surfaced by repository operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl StoreError {
    fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn position<T>(rows: &[T], id: &str, key: impl Fn(&T) -> &str) -> Option<usize> {
    rows.iter().position(|row| key(row) == id)
}

/// Removes the row with `id`, returning whether anything was deleted.
fn remove<T>(rows: &mut Vec<T>, id: &str, key: impl Fn(&T) -> &str) -> bool {
    let before = rows.len();
    rows.retain(|row| key(row) != id);
    rows.len() != before
}

/// Repository for clients.
#[derive(Clone)]
pub struct ClientRepository {
    db: Database,
}

impl ClientRepository {
    pub fn list(&self) -> Vec<Client> {
        self.db.read().clients.clone()
    }

    pub fn get(&self, id: &str) -> Option<Client> {
        self.db.read().clients.iter().find(|c| c.id == id).cloned()
    }

    pub fn add(&self, new: NewClient) -> Result<Client, StoreError> {
        new.validate()?;
        let client = Client::from_new(generate_id(), new);
        self.db.write().clients.push(client.clone());
        debug!(stage = "store", entity = "client", id = %client.id, "client created");
        Ok(client)
    }

    pub fn update(&self, id: &str, patch: ClientPatch) -> Result<Client, StoreError> {
        patch.validate()?;
        let mut tables = self.db.write();
        let index = position(&tables.clients, id, |c| c.id.as_str())
            .ok_or_else(|| StoreError::not_found("client", id))?;
        let client = &mut tables.clients[index];
        client.apply(patch);
        debug!(stage = "store", entity = "client", %id, "client updated");
        Ok(client.clone())
    }

    /// Deletes the client. Appointments that reference it are kept and
    /// project with a placeholder name.
    pub fn delete(&self, id: &str) -> bool {
        let removed = remove(&mut self.db.write().clients, id, |c| c.id.as_str());
        debug!(stage = "store", entity = "client", %id, removed, "client deleted");
        removed
    }
}

/// Repository for the product catalog.
#[derive(Clone)]
pub struct ProductRepository {
    db: Database,
}

impl ProductRepository {
    pub fn list(&self) -> Vec<Product> {
        self.db.read().products.clone()
    }

    pub fn get(&self, id: &str) -> Option<Product> {
        self.db.read().products.iter().find(|p| p.id == id).cloned()
    }

    pub fn add(&self, new: NewProduct) -> Result<Product, StoreError> {
        new.validate()?;
        let product = Product::from_new(generate_id(), new);
        self.db.write().products.push(product.clone());
        debug!(stage = "store", entity = "product", id = %product.id, "product created");
        Ok(product)
    }

    pub fn update(&self, id: &str, patch: ProductPatch) -> Result<Product, StoreError> {
        patch.validate()?;
        let mut tables = self.db.write();
        let index = position(&tables.products, id, |p| p.id.as_str())
            .ok_or_else(|| StoreError::not_found("product", id))?;
        let product = &mut tables.products[index];
        product.apply(patch);
        debug!(stage = "store", entity = "product", %id, "product updated");
        Ok(product.clone())
    }

    pub fn delete(&self, id: &str) -> bool {
        let removed = remove(&mut self.db.write().products, id, |p| p.id.as_str());
        debug!(stage = "store", entity = "product", %id, removed, "product deleted");
        removed
    }
}

/// Repository for certificate authorities.
#[derive(Clone)]
pub struct AuthorityRepository {
    db: Database,
}

impl AuthorityRepository {
    pub fn list(&self) -> Vec<CertificateAuthority> {
        self.db.read().authorities.clone()
    }

    pub fn get(&self, id: &str) -> Option<CertificateAuthority> {
        self.db
            .read()
            .authorities
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub fn add(&self, new: NewAuthority) -> Result<CertificateAuthority, StoreError> {
        new.validate()?;
        let authority = CertificateAuthority::from_new(generate_id(), new);
        self.db.write().authorities.push(authority.clone());
        debug!(stage = "store", entity = "authority", id = %authority.id, "authority created");
        Ok(authority)
    }

    pub fn update(
        &self,
        id: &str,
        patch: AuthorityPatch,
    ) -> Result<CertificateAuthority, StoreError> {
        patch.validate()?;
        let mut tables = self.db.write();
        let index = position(&tables.authorities, id, |a| a.id.as_str())
            .ok_or_else(|| StoreError::not_found("authority", id))?;
        let authority = &mut tables.authorities[index];
        authority.apply(patch);
        debug!(stage = "store", entity = "authority", %id, "authority updated");
        Ok(authority.clone())
    }

    pub fn delete(&self, id: &str) -> bool {
        let removed = remove(&mut self.db.write().authorities, id, |a| a.id.as_str());
        debug!(stage = "store", entity = "authority", %id, removed, "authority deleted");
        removed
    }
}

/// Repository for appointments/orders.
#[derive(Clone)]
pub struct AppointmentRepository {
    db: Database,
}

impl AppointmentRepository {
    pub fn list(&self) -> Vec<Appointment> {
        self.db.read().appointments.clone()
    }

    pub fn get(&self, id: &str) -> Option<Appointment> {
        self.db
            .read()
            .appointments
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    /// Stores a new appointment; its status is derived from the presence of a date.
    pub fn add(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        validate_references(&new)?;
        let appointment = Appointment::from_new(generate_id(), new);
        self.db.write().appointments.push(appointment.clone());
        debug!(
            stage = "store",
            entity = "appointment",
            id = %appointment.id,
            status = %appointment.status,
            "appointment created"
        );
        Ok(appointment)
    }

    pub fn update(&self, id: &str, patch: AppointmentPatch) -> Result<Appointment, StoreError> {
        Validator::new()
            .require_if_present("client_id", patch.client_id.as_deref())
            .require_if_present("product_id", patch.product_id.as_deref())
            .require_if_present("ac_id", patch.ac_id.as_deref())
            .finish()?;
        let mut tables = self.db.write();
        let index = position(&tables.appointments, id, |a| a.id.as_str())
            .ok_or_else(|| StoreError::not_found("appointment", id))?;
        let appointment = &mut tables.appointments[index];
        let previous = appointment.status;
        appointment.apply(patch);
        debug!(
            stage = "store",
            entity = "appointment",
            %id,
            from = %previous,
            to = %appointment.status,
            "appointment updated"
        );
        Ok(appointment.clone())
    }

    /// Full edit from the scheduling form; the status is recomputed from the date,
    /// including for orders that were already completed or cancelled.
    pub fn edit(&self, id: &str, new: NewAppointment) -> Result<Appointment, StoreError> {
        validate_references(&new)?;
        self.update(id, AppointmentPatch::from(new))
    }

    /// Applies a manual transition. Terminal orders are not guarded.
    pub fn set_status(&self, id: &str, transition: Transition) -> Result<Appointment, StoreError> {
        let mut tables = self.db.write();
        let index = position(&tables.appointments, id, |a| a.id.as_str())
            .ok_or_else(|| StoreError::not_found("appointment", id))?;
        let appointment = &mut tables.appointments[index];
        let previous = appointment.status;
        appointment.status = transition.target();
        info!(
            stage = "workflow",
            %id,
            from = %previous,
            to = %appointment.status,
            "appointment status changed"
        );
        Ok(appointment.clone())
    }

    pub fn delete(&self, id: &str) -> bool {
        let removed = remove(&mut self.db.write().appointments, id, |a| a.id.as_str());
        debug!(stage = "store", entity = "appointment", %id, removed, "appointment deleted");
        removed
    }
}

fn validate_references(new: &NewAppointment) -> Result<(), ValidationError> {
    Validator::new()
        .require("client_id", &new.client_id)
        .require("product_id", &new.product_id)
        .require("ac_id", &new.ac_id)
        .finish()
}

/// Stored account: public fields plus the credential digest.
#[derive(Clone)]
struct UserRecord {
    user: User,
    password_digest: [u8; 32],
}

impl UserRecord {
    fn new(user: User, password: &str) -> Self {
        Self {
            user,
            password_digest: digest(password),
        }
    }

    fn matches(&self, password: &str) -> bool {
        self.password_digest[..].ct_eq(&digest(password)[..]).into()
    }
}

// Demo-grade: unsalted SHA-256. Real deployments need a password hashing
// function and credentials that are not seeded from source.
fn digest(password: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(password.as_bytes()));
    out
}

/// Repository for operator accounts.
#[derive(Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn list(&self) -> Vec<User> {
        self.db
            .read()
            .users
            .iter()
            .map(|record| record.user.clone())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<User> {
        self.db
            .read()
            .users
            .iter()
            .find(|record| record.user.id == id)
            .map(|record| record.user.clone())
    }

    pub fn add(&self, new: NewUser) -> Result<User, StoreError> {
        Validator::new()
            .require("name", &new.name)
            .require("email", &new.email)
            .require("password", &new.password)
            .finish()?;
        let user = User {
            id: generate_id(),
            name: new.name,
            email: new.email,
            role: new.role,
        };
        self.db
            .write()
            .users
            .push(UserRecord::new(user.clone(), &new.password));
        debug!(stage = "store", entity = "user", id = %user.id, "user created");
        Ok(user)
    }

    pub fn update(&self, id: &str, patch: UserPatch) -> Result<User, StoreError> {
        Validator::new()
            .require_if_present("name", patch.name.as_deref())
            .require_if_present("email", patch.email.as_deref())
            .require_if_present("password", patch.password.as_deref())
            .finish()?;
        let mut tables = self.db.write();
        let index = position(&tables.users, id, |r| r.user.id.as_str())
            .ok_or_else(|| StoreError::not_found("user", id))?;
        let record = &mut tables.users[index];
        if let Some(name) = patch.name {
            record.user.name = name;
        }
        if let Some(email) = patch.email {
            record.user.email = email;
        }
        if let Some(role) = patch.role {
            record.user.role = role;
        }
        if let Some(password) = patch.password {
            record.password_digest = digest(&password);
        }
        debug!(stage = "store", entity = "user", %id, "user updated");
        Ok(record.user.clone())
    }

    pub fn delete(&self, id: &str) -> bool {
        let removed = remove(&mut self.db.write().users, id, |r| r.user.id.as_str());
        debug!(stage = "store", entity = "user", %id, removed, "user deleted");
        removed
    }

    /// Checks the credential and returns the account without it.
    pub fn authenticate(&self, email: &str, password: &str) -> Option<User> {
        let tables = self.db.read();
        let user = tables
            .users
            .iter()
            .find(|record| record.user.email == email && record.matches(password))
            .map(|record| record.user.clone());
        info!(stage = "auth", %email, success = user.is_some(), "login attempt");
        user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use certflow_core::projector::UNKNOWN_CLIENT;
    use certflow_core::types::{AppointmentStatus, ClientType, ProductCategory, UserRole};
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn new_client(name: &str) -> NewClient {
        NewClient {
            name: name.to_string(),
            document: "111.111.111-11".to_string(),
            email: "ana@example.com".to_string(),
            phone: "(11) 90000-0000".to_string(),
            kind: ClientType::Individual,
        }
    }

    fn new_product() -> NewProduct {
        NewProduct {
            name: "e-CPF A1".to_string(),
            description: "Certificado Digital Pessoa Física (Arquivo)".to_string(),
            price: Decimal::new(18000, 2),
            validity_months: 12,
            category: ProductCategory::A1,
        }
    }

    fn new_authority() -> NewAuthority {
        NewAuthority {
            name: "Soluti".to_string(),
            api_url: "https://api.soluti.com.br/v2".to_string(),
            status: certflow_core::types::AuthorityStatus::Active,
        }
    }

    fn new_appointment(
        client: &Client,
        product: &Product,
        authority: &CertificateAuthority,
        date: Option<DateTime<Utc>>,
    ) -> NewAppointment {
        NewAppointment {
            client_id: client.id.clone(),
            product_id: product.id.clone(),
            ac_id: authority.id.clone(),
            date,
            notes: None,
        }
    }

    fn fixed_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 13, 0, 0).unwrap()
    }

    #[test]
    fn generated_ids_are_unique_and_non_empty() {
        let db = Database::new();
        let repo = db.clients();
        let mut seen = HashSet::new();
        for index in 0..50 {
            let client = repo
                .add(new_client(&format!("client {index}")))
                .expect("add client");
            assert!(!client.id.is_empty());
            assert!(seen.insert(client.id), "duplicate id issued");
        }
        assert_eq!(repo.list().len(), 50);
    }

    #[test]
    fn list_preserves_insertion_order() {
        let db = Database::new();
        let repo = db.clients();
        repo.add(new_client("first")).unwrap();
        repo.add(new_client("second")).unwrap();
        let names: Vec<String> = repo.list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn update_missing_id_leaves_collection_unchanged() {
        let db = Database::new();
        let repo = db.clients();
        let created = repo.add(new_client("Ana")).unwrap();
        let before = repo.list();

        let err = repo
            .update(
                "missing",
                ClientPatch {
                    name: Some("Bia".to_string()),
                    ..ClientPatch::default()
                },
            )
            .expect_err("missing id");
        assert!(err.is_not_found());
        assert_eq!(repo.list(), before);
        assert_eq!(repo.get(&created.id).unwrap().name, "Ana");
    }

    #[test]
    fn invalid_submission_is_not_written() {
        let db = Database::new();
        let repo = db.clients();
        let mut invalid = new_client("Ana");
        invalid.email.clear();
        let err = repo.add(invalid).expect_err("invalid");
        assert!(matches!(err, StoreError::Invalid(ref e) if e.has_field("email")));
        assert!(repo.list().is_empty());
    }

    #[test]
    fn delete_reports_whether_a_row_was_removed() {
        let db = Database::new();
        let repo = db.products();
        let product = repo.add(new_product()).unwrap();
        assert!(repo.delete(&product.id));
        assert!(!repo.delete(&product.id));
        assert!(repo.list().is_empty());
    }

    #[test]
    fn appointment_status_follows_date() {
        let db = Database::new();
        let client = db.clients().add(new_client("Ana")).unwrap();
        let product = db.products().add(new_product()).unwrap();
        let authority = db.authorities().add(new_authority()).unwrap();
        let repo = db.appointments();

        let scheduled = repo
            .add(new_appointment(&client, &product, &authority, Some(fixed_date())))
            .unwrap();
        assert_eq!(scheduled.status, AppointmentStatus::Scheduled);

        let pending = repo
            .add(new_appointment(&client, &product, &authority, None))
            .unwrap();
        assert_eq!(pending.status, AppointmentStatus::Pending);
    }

    #[test]
    fn completed_order_is_resurrected_by_edit_with_date() {
        let db = Database::new();
        let client = db.clients().add(new_client("Ana")).unwrap();
        let product = db.products().add(new_product()).unwrap();
        let authority = db.authorities().add(new_authority()).unwrap();
        let repo = db.appointments();

        let pending = repo
            .add(new_appointment(&client, &product, &authority, None))
            .unwrap();
        let completed = repo
            .set_status(&pending.id, Transition::Complete)
            .unwrap();
        assert_eq!(completed.status, AppointmentStatus::Completed);

        let edited = repo
            .edit(
                &pending.id,
                new_appointment(&client, &product, &authority, Some(fixed_date())),
            )
            .unwrap();
        assert_eq!(edited.status, AppointmentStatus::Scheduled);
        assert_eq!(edited.date, Some(fixed_date()));
    }

    #[test]
    fn terminal_orders_can_be_transitioned_again() {
        let db = Database::new();
        let client = db.clients().add(new_client("Ana")).unwrap();
        let product = db.products().add(new_product()).unwrap();
        let authority = db.authorities().add(new_authority()).unwrap();
        let repo = db.appointments();
        let order = repo
            .add(new_appointment(&client, &product, &authority, Some(fixed_date())))
            .unwrap();

        repo.set_status(&order.id, Transition::Cancel).unwrap();
        let reopened = repo.set_status(&order.id, Transition::Complete).unwrap();
        assert_eq!(reopened.status, AppointmentStatus::Completed);
    }

    #[test]
    fn set_status_on_missing_order_is_not_found() {
        let db = Database::new();
        let err = db
            .appointments()
            .set_status("missing", Transition::Complete)
            .expect_err("missing");
        assert!(err.is_not_found());
    }

    #[test]
    fn projected_order_matches_created_records() {
        let db = Database::new();
        let client = db
            .clients()
            .add(NewClient {
                name: "Ana".to_string(),
                document: "111.111.111-11".to_string(),
                email: "ana@example.com".to_string(),
                phone: "(11) 90000-0000".to_string(),
                kind: ClientType::Individual,
            })
            .unwrap();
        let product = db.products().add(new_product()).unwrap();
        let authority = db.authorities().add(new_authority()).unwrap();
        db.appointments()
            .add(new_appointment(&client, &product, &authority, None))
            .unwrap();

        let orders = db.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status(), AppointmentStatus::Pending);
        assert_eq!(orders[0].product_price, Decimal::new(18000, 2));
        assert_eq!(orders[0].client_name, "Ana");
        assert_eq!(orders[0].ac_name, "Soluti");

        let single = db.order(&orders[0].appointment.id).expect("projected");
        assert_eq!(single, orders[0]);
        assert!(db.order("missing").is_none());
    }

    #[test]
    fn deleted_client_projects_placeholder() {
        let db = Database::new();
        let client = db.clients().add(new_client("Ana")).unwrap();
        let product = db.products().add(new_product()).unwrap();
        let authority = db.authorities().add(new_authority()).unwrap();
        db.appointments()
            .add(new_appointment(&client, &product, &authority, None))
            .unwrap();

        assert!(db.clients().delete(&client.id));
        let orders = db.orders();
        assert_eq!(orders[0].client_name, UNKNOWN_CLIENT);
    }

    #[test]
    fn authenticate_checks_credential_and_hides_it() {
        let db = Database::new();
        let users = db.users();
        let created = users
            .add(NewUser {
                name: "Administrador".to_string(),
                email: "admin@certflow.com".to_string(),
                role: UserRole::Admin,
                password: "admin".to_string(),
            })
            .unwrap();

        let user = users
            .authenticate("admin@certflow.com", "admin")
            .expect("valid credentials");
        assert_eq!(user, created);
        assert!(users.authenticate("admin@certflow.com", "wrong").is_none());
        assert!(users.authenticate("other@certflow.com", "admin").is_none());
    }

    #[test]
    fn password_change_takes_effect() {
        let db = Database::new();
        let users = db.users();
        let created = users
            .add(NewUser {
                name: "Agente".to_string(),
                email: "agente@certflow.com".to_string(),
                role: UserRole::Agent,
                password: "123".to_string(),
            })
            .unwrap();
        users
            .update(
                &created.id,
                UserPatch {
                    password: Some("456".to_string()),
                    ..UserPatch::default()
                },
            )
            .unwrap();
        assert!(users.authenticate("agente@certflow.com", "123").is_none());
        assert!(users.authenticate("agente@certflow.com", "456").is_some());
    }

    #[test]
    fn clones_share_the_same_tables() {
        let db = Database::new();
        let other = db.clone();
        db.clients().add(new_client("Ana")).unwrap();
        assert_eq!(other.clients().list().len(), 1);
    }
}
