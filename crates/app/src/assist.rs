//! Endpoints backed by outside services: registry lookup and the agenda assistant.

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

use certflow_integrations::{ClientPrefill, CnpjError, CompanyRecord};

use crate::problem::ProblemResponse;
use crate::router::AppState;

#[derive(Debug, Serialize)]
pub struct CnpjLookupResponse {
    company: CompanyRecord,
    prefill: ClientPrefill,
}

/// Path form. A `/` inside the CNPJ must be sent as `%2F`.
pub async fn lookup_cnpj(
    State(state): State<AppState>,
    Path(cnpj): Path<String>,
) -> Result<Json<CnpjLookupResponse>, ProblemResponse> {
    lookup(&state, &cnpj).await
}

#[derive(Debug, Deserialize)]
pub struct CnpjQuery {
    #[serde(default)]
    cnpj: String,
}

/// Query form, accepts the CNPJ exactly as typed in the client form.
pub async fn lookup_cnpj_query(
    State(state): State<AppState>,
    query: Result<Query<CnpjQuery>, QueryRejection>,
) -> Result<Json<CnpjLookupResponse>, ProblemResponse> {
    let Query(query) = query?;
    lookup(&state, &query.cnpj).await
}

async fn lookup(
    state: &AppState,
    cnpj: &str,
) -> Result<Json<CnpjLookupResponse>, ProblemResponse> {
    match state.cnpj().lookup(cnpj).await {
        Ok(company) => {
            counter!("cnpj_lookup_total", "result" => "found").increment(1);
            info!(stage = "cnpj", cnpj = %company.cnpj, "company found");
            let prefill = company.prefill();
            Ok(Json(CnpjLookupResponse { company, prefill }))
        }
        Err(err) => {
            counter!("cnpj_lookup_total", "result" => err.kind()).increment(1);
            Err(cnpj_problem(&err))
        }
    }
}

fn cnpj_problem(err: &CnpjError) -> ProblemResponse {
    let (status, problem_type) = match err {
        CnpjError::InvalidLength(_) => (StatusCode::BAD_REQUEST, "invalid_cnpj"),
        CnpjError::NotFound => (StatusCode::NOT_FOUND, "cnpj_not_found"),
        CnpjError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        CnpjError::Unexpected { .. } | CnpjError::Url(_) | CnpjError::Http(_) => {
            (StatusCode::BAD_GATEWAY, "registry_unavailable")
        }
    };
    ProblemResponse::new(status, problem_type, err.user_message())
}

#[derive(Debug, Deserialize)]
pub struct ChecklistRequest {
    client_id: String,
    product_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChecklistResponse {
    html: String,
    outcome: &'static str,
}

/// Document checklist for the client and product of an order. Generation
/// problems come back as a fixed HTML fragment, never as an error status.
pub async fn document_checklist(
    State(state): State<AppState>,
    payload: Result<Json<ChecklistRequest>, JsonRejection>,
) -> Result<Json<ChecklistResponse>, ProblemResponse> {
    let Json(request) = payload?;
    let database = state.database();
    let client = database
        .clients()
        .get(&request.client_id)
        .ok_or_else(|| ProblemResponse::not_found("client", &request.client_id))?;
    let product = database
        .products()
        .get(&request.product_id)
        .ok_or_else(|| ProblemResponse::not_found("product", &request.product_id))?;

    let generated = state
        .checklist()
        .document_checklist(&product.name, client.kind)
        .await;
    let outcome = generated.outcome.as_str();
    counter!("checklist_requests_total", "result" => outcome).increment(1);
    info!(stage = "checklist", product = %product.name, kind = %client.kind, outcome, "checklist served");

    Ok(Json(ChecklistResponse {
        html: generated.text,
        outcome,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    #[serde(default)]
    notes: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    summary: String,
    outcome: &'static str,
}

pub async fn summarize_notes(
    State(state): State<AppState>,
    payload: Result<Json<SummaryRequest>, JsonRejection>,
) -> Result<Json<SummaryResponse>, ProblemResponse> {
    let Json(request) = payload?;
    let generated = state.checklist().summarize_notes(&request.notes).await;
    let outcome = generated.outcome.as_str();
    counter!("checklist_requests_total", "result" => outcome).increment(1);
    Ok(Json(SummaryResponse {
        summary: generated.text,
        outcome,
    }))
}

#[cfg(test)]
mod tests {
    use crate::router::test_support::{fixed_now, seeded_state, send, state_with};
    use axum::http::StatusCode;
    use certflow_integrations::checklist::{FAILED_CHECKLIST, MISSING_KEY_MESSAGE};
    use certflow_storage::Database;
    use httpmock::prelude::*;
    use serde_json::json;

    fn seeded() -> Database {
        Database::seeded(fixed_now(), chrono_tz::America::Sao_Paulo)
    }

    #[tokio::test]
    async fn cnpj_lookup_returns_prefill() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/cnpj/v1/98765432000110");
                then.status(200).json_body(json!({
                    "cnpj": "98765432000110",
                    "razao_social": "MARIA OLIVEIRA ADVOGADOS ASSOCIADOS",
                    "nome_fantasia": "",
                    "ddd_telefone_1": "2197777777",
                    "email": null
                }));
            })
            .await;
        let state = state_with(seeded(), &server.url("/api/"), &server.url("/"), None);

        let (status, _, body) = send(state, "GET", "/api/cnpj/98.765.432%2F0001-10", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prefill"]["name"], "MARIA OLIVEIRA ADVOGADOS ASSOCIADOS");
        assert_eq!(body["prefill"]["phone"], "(21) 97777777");
        assert_eq!(body["company"]["cnpj"], "98765432000110");
    }

    #[tokio::test]
    async fn cnpj_query_accepts_unencoded_slash() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/cnpj/v1/12345678000190");
                then.status(200).json_body(json!({
                    "cnpj": "12345678000190",
                    "razao_social": null,
                    "nome_fantasia": "Tech Solutions"
                }));
            })
            .await;
        let state = state_with(seeded(), &server.url("/api/"), &server.url("/"), None);

        let (status, _, body) = send(
            state.clone(),
            "GET",
            "/api/cnpj?cnpj=12.345.678/0001-90",
            None,
        )
        .await;
        mock.assert_async().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prefill"]["name"], "Tech Solutions");
        assert!(body["company"]["razao_social"].is_null());

        let (status, _, body) = send(state, "GET", "/api/cnpj?cnpj=12.345", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "invalid_cnpj");
    }

    #[tokio::test]
    async fn cnpj_errors_map_to_statuses() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/cnpj/v1/11111111111111");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/cnpj/v1/22222222222222");
                then.status(429);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/cnpj/v1/33333333333333");
                then.status(500);
            })
            .await;
        let state = state_with(seeded(), &server.url("/api/"), &server.url("/"), None);

        let (status, _, body) = send(state.clone(), "GET", "/api/cnpj/123", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "CNPJ deve conter 14 dígitos.");

        let (status, _, body) = send(state.clone(), "GET", "/api/cnpj/11111111111111", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "CNPJ não encontrado na Receita Federal.");

        let (status, _, _) = send(state.clone(), "GET", "/api/cnpj/22222222222222", None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let (status, _, body) = send(state, "GET", "/api/cnpj/33333333333333", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["detail"], "Erro ao consultar Receita Federal.");
    }

    #[tokio::test]
    async fn checklist_without_key_returns_placeholder() {
        let (status, _, body) = send(
            seeded_state(),
            "POST",
            "/api/checklist",
            Some(json!({ "client_id": "1", "product_id": "1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["html"], MISSING_KEY_MESSAGE);
        assert_eq!(body["outcome"], "disabled");
    }

    #[tokio::test]
    async fn checklist_generator_failure_still_succeeds() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-2.5-flash:generateContent")
                    .body_contains("e-CNPJ A1");
                then.status(502);
            })
            .await;
        let state = state_with(
            seeded(),
            &server.url("/api/"),
            &server.url("/"),
            Some("test-key"),
        );

        let (status, _, body) = send(
            state,
            "POST",
            "/api/checklist",
            Some(json!({ "client_id": "1", "product_id": "1" })),
        )
        .await;
        mock.assert_async().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["html"], FAILED_CHECKLIST);
    }

    #[tokio::test]
    async fn checklist_for_unknown_product_is_not_found() {
        let (status, _, _) = send(
            seeded_state(),
            "POST",
            "/api/checklist",
            Some(json!({ "client_id": "1", "product_id": "missing" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn notes_summary_without_key_echoes_notes() {
        let (status, _, body) = send(
            seeded_state(),
            "POST",
            "/api/notes/summary",
            Some(json!({ "notes": "Validar contrato social" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "Validar contrato social");
    }
}
