use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use certflow_core::types::ClientType;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub const MISSING_KEY_MESSAGE: &str =
    "API key not configured. Set GEMINI_API_KEY to use AI features.";
pub const EMPTY_CHECKLIST: &str = "<p>Não foi possível gerar a lista no momento.</p>";
pub const FAILED_CHECKLIST: &str = "<p>Erro ao consultar o assistente de IA.</p>";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Client for the text-generation service behind the agenda assistant.
///
/// Without an API key every call short-circuits to its fallback and nothing
/// leaves the process.
#[derive(Clone)]
pub struct ChecklistGenerator {
    http: Client,
    base_url: Url,
    model: String,
    api_key: Option<String>,
}

/// How a generation call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Generated,
    Empty,
    Failed,
    Disabled,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Empty => "empty",
            Self::Failed => "failed",
            Self::Disabled => "disabled",
        }
    }
}

/// Text handed back to the caller, already degraded to its fallback if needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    pub outcome: Outcome,
}

impl Generated {
    fn new(text: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            text: text.into(),
            outcome,
        }
    }
}

impl ChecklistGenerator {
    pub fn new(
        base_url: Url,
        model: impl Into<String>,
        api_key: Option<String>,
        http: Client,
    ) -> Self {
        Self {
            http,
            base_url,
            model: model.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Builds an HTML `<ul>` of the documents a client must bring for `product_name`.
    pub async fn document_checklist(&self, product_name: &str, kind: ClientType) -> Generated {
        if !self.is_enabled() {
            return Generated::new(MISSING_KEY_MESSAGE, Outcome::Disabled);
        }

        match self.generate(&checklist_prompt(product_name, kind)).await {
            Ok(text) if text.trim().is_empty() => Generated::new(EMPTY_CHECKLIST, Outcome::Empty),
            Ok(text) => Generated::new(text, Outcome::Generated),
            Err(err) => {
                warn!(stage = "checklist", error = %err, "checklist generation failed");
                Generated::new(FAILED_CHECKLIST, Outcome::Failed)
            }
        }
    }

    /// Condenses free-form meeting notes into one sentence; falls back to the notes.
    pub async fn summarize_notes(&self, notes: &str) -> Generated {
        if !self.is_enabled() {
            return Generated::new(notes, Outcome::Disabled);
        }

        match self.generate(&summary_prompt(notes)).await {
            Ok(text) if text.trim().is_empty() => Generated::new(notes, Outcome::Empty),
            Ok(text) => Generated::new(text.trim(), Outcome::Generated),
            Err(err) => {
                warn!(stage = "checklist", error = %err, "notes summary failed");
                Generated::new(notes, Outcome::Failed)
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, ChecklistError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ChecklistError::MissingKey);
        };
        let url = self
            .base_url
            .join(&format!("v1beta/models/{}:generateContent", self.model))?;

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;

        let parsed: GenerateResponse = parse_json(response).await?;
        let text = parsed.text();
        debug!(stage = "checklist", model = %self.model, chars = text.len(), "generation completed");
        Ok(text)
    }
}

fn checklist_prompt(product_name: &str, kind: ClientType) -> String {
    format!(
        "Você é especialista em Certificados Digitais ICP-Brasil. \
         Liste de forma concisa os documentos necessários para um cliente do tipo \"{code}\" ({label}) \
         emitir o produto \"{product_name}\". \
         Responda apenas com uma lista HTML simples (<ul><li>...</li></ul>), sem blocos de código markdown nem texto extra. \
         Priorize os documentos mais importantes (RG, CNH, Contrato Social etc.). \
         Idioma: português do Brasil.",
        code = kind.as_str(),
        label = kind.label(),
    )
}

fn summary_prompt(notes: &str) -> String {
    format!(
        "Resuma estas anotações de atendimento em uma única frase profissional e concisa, \
         em português do Brasil: {notes}"
    )
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ChecklistError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ChecklistError::Unexpected { status, body });
    }
    Ok(response.json().await?)
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Errors raised while talking to the generation service.
#[derive(Debug, Error)]
pub enum ChecklistError {
    #[error("generation API key is not configured")]
    MissingKey,
    #[error("unexpected generation status {status}: {body}")]
    Unexpected { status: StatusCode, body: String },
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
