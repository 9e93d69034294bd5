//! Registry screens: clients, products, certificate authorities and operator accounts.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::info;

use certflow_core::filters::{active_authorities, filter_authorities, filter_clients};
use certflow_core::types::{
    AuthorityPatch, CertificateAuthority, Client, ClientPatch, NewAuthority, NewClient, NewProduct,
    NewUser, Product, ProductPatch, User, UserPatch,
};

use crate::problem::ProblemResponse;
use crate::router::AppState;

type ApiResult<T> = Result<T, ProblemResponse>;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    active: Option<bool>,
}

pub(crate) fn record_mutation(entity: &'static str, op: &'static str) {
    counter!("store_mutations_total", "entity" => entity, "op" => op).increment(1);
}

fn deleted(entity: &'static str, id: &str, removed: bool) -> ApiResult<StatusCode> {
    if removed {
        record_mutation(entity, "delete");
        info!(stage = "api", entity, %id, "record deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ProblemResponse::not_found(entity, id))
    }
}

pub async fn list_clients(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Client>>> {
    let Query(query) = query?;
    let clients = state.database().clients().list();
    let term = query.q.unwrap_or_default();
    Ok(Json(
        filter_clients(&clients, term.trim())
            .into_iter()
            .cloned()
            .collect(),
    ))
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Client>> {
    state
        .database()
        .clients()
        .get(&id)
        .map(Json)
        .ok_or_else(|| ProblemResponse::not_found("client", &id))
}

pub async fn create_client(
    State(state): State<AppState>,
    payload: Result<Json<NewClient>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Client>)> {
    let Json(new) = payload?;
    let client = state.database().clients().add(new)?;
    record_mutation("client", "create");
    info!(stage = "api", entity = "client", id = %client.id, kind = %client.kind, "client registered");
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ClientPatch>, JsonRejection>,
) -> ApiResult<Json<Client>> {
    let Json(patch) = payload?;
    let client = state.database().clients().update(&id, patch)?;
    record_mutation("client", "update");
    Ok(Json(client))
}

pub async fn delete_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let removed = state.database().clients().delete(&id);
    deleted("client", &id, removed)
}

/// Catalog entry as rendered on the products screen.
#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    product: Product,
    validity_label: String,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        let validity_label = product.validity_label();
        Self {
            product,
            validity_label,
        }
    }
}

pub async fn list_products(State(state): State<AppState>) -> Json<Vec<ProductView>> {
    Json(
        state
            .database()
            .products()
            .list()
            .into_iter()
            .map(ProductView::from)
            .collect(),
    )
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProductView>> {
    state
        .database()
        .products()
        .get(&id)
        .map(|product| Json(product.into()))
        .ok_or_else(|| ProblemResponse::not_found("product", &id))
}

pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ProductView>)> {
    let Json(new) = payload?;
    let product = state.database().products().add(new)?;
    record_mutation("product", "create");
    info!(stage = "api", entity = "product", id = %product.id, price = %product.price, "product added to catalog");
    Ok((StatusCode::CREATED, Json(product.into())))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ProductPatch>, JsonRejection>,
) -> ApiResult<Json<ProductView>> {
    let Json(patch) = payload?;
    let product = state.database().products().update(&id, patch)?;
    record_mutation("product", "update");
    Ok(Json(product.into()))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let removed = state.database().products().delete(&id);
    deleted("product", &id, removed)
}

/// `?q=` filters by name; `?active=true` keeps only authorities offered for new orders.
pub async fn list_authorities(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<CertificateAuthority>>> {
    let Query(query) = query?;
    let stored = state.database().authorities().list();
    let authorities: Vec<CertificateAuthority> = if query.active.unwrap_or(false) {
        active_authorities(&stored).into_iter().cloned().collect()
    } else {
        stored
    };
    let term = query.q.unwrap_or_default();
    Ok(Json(
        filter_authorities(&authorities, term.trim())
            .into_iter()
            .cloned()
            .collect(),
    ))
}

pub async fn get_authority(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CertificateAuthority>> {
    state
        .database()
        .authorities()
        .get(&id)
        .map(Json)
        .ok_or_else(|| ProblemResponse::not_found("authority", &id))
}

pub async fn create_authority(
    State(state): State<AppState>,
    payload: Result<Json<NewAuthority>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CertificateAuthority>)> {
    let Json(new) = payload?;
    let authority = state.database().authorities().add(new)?;
    record_mutation("authority", "create");
    Ok((StatusCode::CREATED, Json(authority)))
}

pub async fn update_authority(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AuthorityPatch>, JsonRejection>,
) -> ApiResult<Json<CertificateAuthority>> {
    let Json(patch) = payload?;
    let authority = state.database().authorities().update(&id, patch)?;
    record_mutation("authority", "update");
    Ok(Json(authority))
}

pub async fn delete_authority(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let removed = state.database().authorities().delete(&id);
    deleted("authority", &id, removed)
}

pub async fn list_users(State(state): State<AppState>) -> Json<Vec<User>> {
    Json(state.database().users().list())
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    state
        .database()
        .users()
        .get(&id)
        .map(Json)
        .ok_or_else(|| ProblemResponse::not_found("user", &id))
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let Json(new) = payload?;
    let user = state.database().users().add(new)?;
    record_mutation("user", "create");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Json(patch) = payload?;
    let user = state.database().users().update(&id, patch)?;
    record_mutation("user", "update");
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let removed = state.database().users().delete(&id);
    deleted("user", &id, removed)
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Json(request) = payload?;
    state
        .database()
        .users()
        .authenticate(request.email.trim(), &request.password)
        .map(Json)
        .ok_or_else(|| {
            ProblemResponse::new(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "email or password is incorrect",
            )
        })
}
