use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use certflow_core::dashboard::{DashboardStats, ReportMonth};
use certflow_core::filters::find_client;
use certflow_core::projector::{sort_for_agenda, OrderDisplay};
use certflow_core::types::{Appointment, AppointmentStatus, Client};
use certflow_core::validation::ValidationError;
use certflow_core::workflow::{AppointmentDraft, Transition};

use crate::catalog::record_mutation;
use crate::problem::ProblemResponse;
use crate::router::AppState;

type ApiResult<T> = Result<T, ProblemResponse>;

pub async fn list_appointments(State(state): State<AppState>) -> Json<Vec<Appointment>> {
    Json(state.database().appointments().list())
}

pub async fn get_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Appointment>> {
    state
        .database()
        .appointments()
        .get(&id)
        .map(Json)
        .ok_or_else(|| ProblemResponse::not_found("appointment", &id))
}

/// Books an order from the scheduling form. The status follows the chosen date.
pub async fn create_appointment(
    State(state): State<AppState>,
    payload: Result<Json<AppointmentDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Appointment>)> {
    let Json(draft) = payload?;
    let new = draft.into_new(state.timezone())?;
    let appointment = state.database().appointments().add(new)?;
    record_mutation("appointment", "create");
    info!(
        stage = "api",
        entity = "appointment",
        id = %appointment.id,
        status = %appointment.status,
        "appointment booked"
    );
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// Full edit. Re-saving a closed order with a date brings it back to `SCHEDULED`.
pub async fn edit_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AppointmentDraft>, JsonRejection>,
) -> ApiResult<Json<Appointment>> {
    let Json(draft) = payload?;
    let new = draft.into_new(state.timezone())?;
    let appointment = state.database().appointments().edit(&id, new)?;
    record_mutation("appointment", "update");
    Ok(Json(appointment))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.database().appointments().delete(&id) {
        record_mutation("appointment", "delete");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ProblemResponse::not_found("appointment", &id))
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    status: AppointmentStatus,
}

pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<Appointment>> {
    let Json(request) = payload?;
    let transition = Transition::from_status(request.status).ok_or_else(|| {
        ValidationError::single("status", "only COMPLETED or CANCELLED can be set manually")
    })?;
    let appointment = state
        .database()
        .appointments()
        .set_status(&id, transition)?;
    record_mutation("appointment", "status");
    Ok(Json(appointment))
}

/// Orders as shown on the agenda: pending first, then most recent date.
pub async fn list_orders(State(state): State<AppState>) -> Json<Vec<OrderDisplay>> {
    let mut orders = state.database().orders();
    sort_for_agenda(&mut orders);
    Json(orders)
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderDisplay>> {
    state
        .database()
        .order(&id)
        .map(Json)
        .ok_or_else(|| ProblemResponse::not_found("appointment", &id))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    term: String,
}

pub async fn search_client(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Json<Client>> {
    let Query(query) = query?;
    let clients = state.database().clients().list();
    find_client(&clients, &query.term)
        .cloned()
        .map(Json)
        .ok_or_else(|| {
            ProblemResponse::new(
                StatusCode::NOT_FOUND,
                "not_found",
                "no client matches the search term",
            )
        })
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    month: Option<ReportMonth>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    query: Result<Query<DashboardQuery>, QueryRejection>,
) -> ApiResult<Json<DashboardStats>> {
    let Query(query) = query?;
    let tz = state.timezone();
    let month = query
        .month
        .unwrap_or_else(|| ReportMonth::containing(state.now(), tz));

    let database = state.database();
    let stats = DashboardStats::compute(
        &database.clients().list(),
        &database.products().list(),
        &database.orders(),
        month,
        tz,
    );
    Ok(Json(stats))
}
