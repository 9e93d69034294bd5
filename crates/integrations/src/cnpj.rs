use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use url::Url;

use certflow_core::filters::digits_only;

pub const DEFAULT_BASE_URL: &str = "https://brasilapi.com.br/api/";
const CNPJ_DIGITS: usize = 14;

/// Client for the public company registry (BrasilAPI `cnpj/v1`).
#[derive(Clone)]
pub struct CnpjClient {
    http: Client,
    base_url: Url,
}

impl CnpjClient {
    pub fn new(base_url: Url, http: Client) -> Self {
        Self { http, base_url }
    }

    /// Looks up a company by CNPJ. Punctuation is ignored; anything other than
    /// 14 digits is rejected before a request is made.
    pub async fn lookup(&self, cnpj: &str) -> Result<CompanyRecord, CnpjError> {
        let digits = normalize_cnpj(cnpj)?;
        let url = self.base_url.join(&format!("cnpj/v1/{digits}"))?;

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(stage = "cnpj", %status, cnpj = %digits, "registry lookup failed");
            return Err(match status {
                StatusCode::NOT_FOUND => CnpjError::NotFound,
                StatusCode::TOO_MANY_REQUESTS => CnpjError::RateLimited,
                other => CnpjError::Unexpected { status: other },
            });
        }

        Ok(response.json().await?)
    }
}

/// Validates and strips a CNPJ down to its 14 digits.
pub fn normalize_cnpj(value: &str) -> Result<String, CnpjError> {
    let digits = digits_only(value);
    if digits.len() != CNPJ_DIGITS {
        return Err(CnpjError::InvalidLength(digits.len()));
    }
    Ok(digits)
}

/// Subset of the registry payload used to prefill client forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyRecord {
    pub cnpj: String,
    pub razao_social: Option<String>,
    pub nome_fantasia: Option<String>,
    pub ddd_telefone_1: Option<String>,
    pub email: Option<String>,
    pub logradouro: Option<String>,
    pub numero: Option<String>,
    pub bairro: Option<String>,
    pub municipio: Option<String>,
    pub uf: Option<String>,
}

/// Client form fields derived from a registry record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPrefill {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl CompanyRecord {
    /// Trade name wins over the legal name; the phone gets its area code in parentheses.
    pub fn prefill(&self) -> ClientPrefill {
        let name = non_blank(self.nome_fantasia.as_deref())
            .or_else(|| non_blank(self.razao_social.as_deref()))
            .unwrap_or_default()
            .to_string();
        ClientPrefill {
            name,
            email: non_blank(self.email.as_deref()).map(str::to_string),
            phone: non_blank(self.ddd_telefone_1.as_deref()).map(format_phone),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn format_phone(raw: &str) -> String {
    let digits = digits_only(raw);
    if digits.len() <= 2 {
        return raw.to_string();
    }
    let (area, number) = digits.split_at(2);
    format!("({area}) {number}")
}

/// Errors produced by the registry lookup.
#[derive(Debug, Error)]
pub enum CnpjError {
    #[error("CNPJ must have 14 digits (got {0})")]
    InvalidLength(usize),
    #[error("CNPJ not found in the registry")]
    NotFound,
    #[error("registry rate limit reached")]
    RateLimited,
    #[error("unexpected registry status {status}")]
    Unexpected { status: StatusCode },
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CnpjError {
    /// Short message shown next to the CNPJ field.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidLength(_) => "CNPJ deve conter 14 dígitos.",
            Self::NotFound => "CNPJ não encontrado na Receita Federal.",
            Self::RateLimited => "Muitas requisições. Tente novamente em instantes.",
            Self::Unexpected { .. } | Self::Url(_) | Self::Http(_) => {
                "Erro ao consultar Receita Federal."
            }
        }
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidLength(_) => "invalid",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Unexpected { .. } | Self::Url(_) | Self::Http(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> CnpjClient {
        CnpjClient::new(
            Url::parse(&server.url("/api/")).expect("url"),
            Client::builder().build().expect("client"),
        )
    }

    #[tokio::test]
    async fn lookup_parses_company() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/cnpj/v1/12345678000190");
                then.status(200).json_body(json!({
                    "cnpj": "12345678000190",
                    "razao_social": "TECH SOLUTIONS LTDA",
                    "nome_fantasia": "Tech Solutions",
                    "ddd_telefone_1": "1199999999",
                    "email": "contato@techsol.com",
                    "municipio": "SAO PAULO",
                    "uf": "SP",
                    "capital_social": 1000
                }));
            })
            .await;

        let record = client(&server)
            .lookup("12.345.678/0001-90")
            .await
            .expect("lookup");
        mock.assert_async().await;

        assert_eq!(record.razao_social.as_deref(), Some("TECH SOLUTIONS LTDA"));
        let prefill = record.prefill();
        assert_eq!(prefill.name, "Tech Solutions");
        assert_eq!(prefill.email.as_deref(), Some("contato@techsol.com"));
        assert_eq!(prefill.phone.as_deref(), Some("(11) 99999999"));
    }

    #[tokio::test]
    async fn null_legal_name_still_decodes() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/cnpj/v1/98765432000110");
                then.status(200).json_body(json!({
                    "cnpj": "98765432000110",
                    "razao_social": null,
                    "nome_fantasia": null,
                    "email": "contato@oliveira.adv.br"
                }));
            })
            .await;

        let record = client(&server)
            .lookup("98765432000110")
            .await
            .expect("lookup");
        assert!(record.razao_social.is_none());
        let prefill = record.prefill();
        assert_eq!(prefill.name, "");
        assert_eq!(prefill.email.as_deref(), Some("contato@oliveira.adv.br"));
    }

    #[tokio::test]
    async fn short_cnpj_fails_before_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;

        let err = client(&server)
            .lookup("1234567800019")
            .await
            .expect_err("13 digits");
        assert!(matches!(err, CnpjError::InvalidLength(13)));
        assert_eq!(err.user_message(), "CNPJ deve conter 14 dígitos.");
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn not_found_and_rate_limit_are_distinct() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/cnpj/v1/11111111111111");
                then.status(404).json_body(json!({ "message": "not found" }));
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
        let client = client(&server);

        let err = client.lookup("11111111111111").await.expect_err("404");
        assert!(matches!(err, CnpjError::NotFound));
        assert_eq!(err.kind(), "not_found");

        let err = client.lookup("22222222222222").await.expect_err("429");
        assert!(matches!(err, CnpjError::RateLimited));

        let err = client.lookup("33333333333333").await.expect_err("500");
        match err {
            CnpjError::Unexpected { status } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn prefill_falls_back_to_legal_name() {
        let record = CompanyRecord {
            razao_social: Some("MARIA OLIVEIRA ADVOGADOS".to_string()),
            nome_fantasia: Some(" ".to_string()),
            ..CompanyRecord::default()
        };
        let prefill = record.prefill();
        assert_eq!(prefill.name, "MARIA OLIVEIRA ADVOGADOS");
        assert!(prefill.email.is_none());
        assert!(prefill.phone.is_none());
    }

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(
            normalize_cnpj("98.765.432/0001-10").expect("valid"),
            "98765432000110"
        );
        assert!(normalize_cnpj("").is_err());
    }
}
