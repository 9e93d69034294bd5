use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;

use certflow_core::types::{
    Appointment, AppointmentStatus, AuthorityStatus, CertificateAuthority, Client, ClientType,
    Product, ProductCategory, User, UserRole,
};

use crate::{Tables, UserRecord};

pub(crate) fn populate(tables: &mut Tables, now: DateTime<Utc>, tz: Tz) {
    tables.users = vec![
        UserRecord::new(
            user("1", "Administrador", "admin@certflow.com", UserRole::Admin),
            "admin",
        ),
        UserRecord::new(
            user("2", "Agente de Validação", "agente@certflow.com", UserRole::Agent),
            "123",
        ),
    ];

    tables.authorities = vec![
        authority("1", "Soluti", "https://api.soluti.com.br/v2", AuthorityStatus::Active),
        authority("2", "Valid", "https://api.valid.com/issue", AuthorityStatus::Active),
        authority(
            "3",
            "Serasa",
            "https://services.serasa.com.br",
            AuthorityStatus::Inactive,
        ),
    ];

    tables.clients = vec![
        client(
            "1",
            "Empresa Tech Solutions Ltda",
            "12.345.678/0001-90",
            "contato@techsol.com",
            "(11) 99999-9999",
            ClientType::Organization,
        ),
        client(
            "2",
            "João da Silva",
            "123.456.789-00",
            "joao.silva@email.com",
            "(11) 98888-8888",
            ClientType::Individual,
        ),
        client(
            "3",
            "Maria Oliveira Advogados",
            "98.765.432/0001-10",
            "maria@adv.com",
            "(21) 97777-7777",
            ClientType::Organization,
        ),
    ];

    tables.products = vec![
        product(
            "1",
            "e-CNPJ A1",
            "Certificado Digital para Empresas (Arquivo)",
            25000,
            12,
            ProductCategory::A1,
        ),
        product(
            "2",
            "e-CPF A3",
            "Certificado Digital Pessoa Física + Token",
            35000,
            36,
            ProductCategory::A3,
        ),
        product(
            "3",
            "e-CNPJ Nuvem",
            "Certificado em Nuvem (BirdID)",
            15000,
            12,
            ProductCategory::Cloud,
        ),
        product(
            "4",
            "e-CPF A1",
            "Certificado Digital Pessoa Física (Arquivo)",
            18000,
            12,
            ProductCategory::A1,
        ),
    ];

    tables.appointments = vec![
        Appointment {
            id: "1".to_string(),
            client_id: "1".to_string(),
            product_id: "1".to_string(),
            ac_id: "1".to_string(),
            date: today_at(now, tz, 10, 0),
            status: AppointmentStatus::Scheduled,
            notes: Some("Validar contrato social".to_string()),
        },
        Appointment {
            id: "2".to_string(),
            client_id: "2".to_string(),
            product_id: "4".to_string(),
            ac_id: "2".to_string(),
            date: today_at(now, tz, 14, 30),
            status: AppointmentStatus::Completed,
            notes: Some("Tudo certo".to_string()),
        },
        Appointment {
            id: "3".to_string(),
            client_id: "3".to_string(),
            product_id: "1".to_string(),
            ac_id: "1".to_string(),
            date: None,
            status: AppointmentStatus::Pending,
            notes: Some("Aguardando cliente confirmar horário".to_string()),
        },
    ];
}

/// `hour:minute` on the local calendar day of `now`.
fn today_at(now: DateTime<Utc>, tz: Tz, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let local = now.with_timezone(&tz).date_naive().and_time(time);
    tz.from_local_datetime(&local)
        .earliest()
        .map(|value| value.with_timezone(&Utc))
}

fn user(id: &str, name: &str, email: &str, role: UserRole) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role,
    }
}

fn authority(id: &str, name: &str, api_url: &str, status: AuthorityStatus) -> CertificateAuthority {
    CertificateAuthority {
        id: id.to_string(),
        name: name.to_string(),
        api_url: api_url.to_string(),
        status,
    }
}

fn client(
    id: &str,
    name: &str,
    document: &str,
    email: &str,
    phone: &str,
    kind: ClientType,
) -> Client {
    Client {
        id: id.to_string(),
        name: name.to_string(),
        document: document.to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        kind,
    }
}

fn product(
    id: &str,
    name: &str,
    description: &str,
    cents: i64,
    validity_months: u32,
    category: ProductCategory,
) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        price: Decimal::new(cents, 2),
        validity_months,
        category,
    }
}
