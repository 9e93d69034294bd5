use std::sync::Arc;

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::warn;

use certflow_integrations::{ChecklistGenerator, CnpjClient};
use certflow_storage::Database;

use crate::problem::ProblemResponse;
use crate::{agenda, assist, catalog, telemetry};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    database: Database,
    cnpj: CnpjClient,
    checklist: ChecklistGenerator,
    timezone: Tz,
    clock: Clock,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        database: Database,
        cnpj: CnpjClient,
        checklist: ChecklistGenerator,
        timezone: Tz,
    ) -> Self {
        Self {
            metrics,
            database,
            cnpj,
            checklist,
            timezone,
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn cnpj(&self) -> &CnpjClient {
        &self.cnpj
    }

    pub fn checklist(&self) -> &ChecklistGenerator {
        &self.checklist
    }

    /// Business timezone for form dates and report months.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn app_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/login", post(catalog::login))
        .route(
            "/clients",
            get(catalog::list_clients).post(catalog::create_client),
        )
        .route("/clients/search", get(agenda::search_client))
        .route(
            "/clients/:id",
            get(catalog::get_client)
                .patch(catalog::update_client)
                .delete(catalog::delete_client),
        )
        .route(
            "/products",
            get(catalog::list_products).post(catalog::create_product),
        )
        .route(
            "/products/:id",
            get(catalog::get_product)
                .patch(catalog::update_product)
                .delete(catalog::delete_product),
        )
        .route(
            "/authorities",
            get(catalog::list_authorities).post(catalog::create_authority),
        )
        .route(
            "/authorities/:id",
            get(catalog::get_authority)
                .patch(catalog::update_authority)
                .delete(catalog::delete_authority),
        )
        .route("/users", get(catalog::list_users).post(catalog::create_user))
        .route(
            "/users/:id",
            get(catalog::get_user)
                .patch(catalog::update_user)
                .delete(catalog::delete_user),
        )
        .route(
            "/appointments",
            get(agenda::list_appointments).post(agenda::create_appointment),
        )
        .route(
            "/appointments/:id",
            get(agenda::get_appointment)
                .put(agenda::edit_appointment)
                .delete(agenda::delete_appointment),
        )
        .route("/appointments/:id/status", post(agenda::change_status))
        .route("/orders", get(agenda::list_orders))
        .route("/orders/:id", get(agenda::get_order))
        .route("/dashboard", get(agenda::dashboard))
        .route("/cnpj", get(assist::lookup_cnpj_query))
        .route("/cnpj/:cnpj", get(assist::lookup_cnpj))
        .route("/checklist", post(assist::document_checklist))
        .route("/notes/summary", post(assist::summarize_notes))
        .fallback(api_not_found)
        .route_layer(middleware::from_fn(track_requests));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .nest("/api", api)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> Response {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
        .into_response()
}

async fn api_not_found() -> ProblemResponse {
    ProblemResponse::new(StatusCode::NOT_FOUND, "not_found", "no such endpoint")
}

/// Counts every API request by matched route and outcome class.
async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().clone();

    let response = next.run(request).await;
    let status = response.status();
    let result = if status.is_success() {
        "ok"
    } else if status.is_client_error() {
        "client_error"
    } else {
        "server_error"
    };
    if status.is_server_error() {
        warn!(stage = "api", %method, %route, %status, "request failed");
    }
    counter!("api_requests_total", "route" => route, "result" => result).increment(1);
    response
}
