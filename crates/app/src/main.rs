mod agenda;
mod assist;
mod catalog;
mod problem;
mod router;
mod telemetry;

use std::net::SocketAddr;

use chrono::Utc;
use tracing::{info, warn};

use certflow_integrations::{ChecklistGenerator, CnpjClient};
use certflow_storage::Database;
use certflow_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;
    let cnpj = CnpjClient::new(config.cnpj_base_url.clone(), http.clone());
    let checklist = ChecklistGenerator::new(
        config.gemini_base_url.clone(),
        config.gemini_model.clone(),
        config.gemini_api_key.clone(),
        http,
    );
    if !checklist.is_enabled() {
        warn!(stage = "app", "GEMINI_API_KEY not set; checklist assistant disabled");
    }

    let database = if config.seed_demo_data {
        Database::seeded(Utc::now(), config.timezone)
    } else {
        Database::new()
    };

    let state = router::AppState::new(metrics, database, cnpj, checklist, config.timezone);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
