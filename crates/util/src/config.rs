use std::{env, fmt, net::SocketAddr, time::Duration};

use chrono_tz::Tz;
use url::Url;

use super::server_bind_address;

pub const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";
pub const DEFAULT_CNPJ_API_BASE_URL: &str = "https://brasilapi.com.br/api/";
pub const DEFAULT_GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Development and test runs log in the human-readable format.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development | Self::Test)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    /// Business timezone used to interpret form dates and month boundaries.
    pub timezone: Tz,
    pub seed_demo_data: bool,
    pub cnpj_base_url: Url,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: Url,
    pub gemini_model: String,
    pub http_timeout: Duration,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("environment", &self.environment)
            .field("timezone", &self.timezone)
            .field("seed_demo_data", &self.seed_demo_data)
            .field("cnpj_base_url", &self.cnpj_base_url.as_str())
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "***"))
            .field("gemini_base_url", &self.gemini_base_url.as_str())
            .field("gemini_model", &self.gemini_model)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;

        let tz_value = optional("APP_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = tz_value
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(tz_value.clone()))?;

        let seed_demo_data = match optional("APP_SEED_DEMO_DATA") {
            Some(value) => parse_bool("APP_SEED_DEMO_DATA", &value)?,
            None => true,
        };

        let cnpj_base_url = base_url("CNPJ_API_BASE_URL", DEFAULT_CNPJ_API_BASE_URL)?;
        let gemini_base_url = base_url("GEMINI_API_BASE_URL", DEFAULT_GEMINI_API_BASE_URL)?;
        let gemini_api_key = optional("GEMINI_API_KEY").or_else(|| optional("API_KEY"));
        let gemini_model =
            optional("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let http_timeout = match optional("HTTP_TIMEOUT_SECS") {
            Some(value) => value
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidTimeout(value))?,
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            bind_addr,
            environment,
            timezone,
            seed_demo_data,
            cnpj_base_url,
            gemini_api_key,
            gemini_base_url,
            gemini_model,
            http_timeout,
        })
    }
}

/// Reads a variable, treating blank values as unset.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}

/// Parses a base URL, appending the trailing slash `Url::join` needs to keep the path.
fn base_url(name: &'static str, default: &str) -> Result<Url, ConfigError> {
    let mut value = optional(name).unwrap_or_else(|| default.to_string());
    if !value.ends_with('/') {
        value.push('/');
    }
    Url::parse(&value).map_err(|source| ConfigError::InvalidUrl { name, source })
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    InvalidTimezone(String),
    InvalidFlag { name: &'static str, value: String },
    InvalidUrl {
        name: &'static str,
        source: url::ParseError,
    },
    InvalidTimeout(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::InvalidTimezone(value) => {
                write!(f, "APP_TIMEZONE must be an IANA timezone name (got {value})")
            }
            Self::InvalidFlag { name, value } => {
                write!(f, "{name} must be true or false (got {value})")
            }
            Self::InvalidUrl { name, source } => write!(f, "invalid {name} value: {source}"),
            Self::InvalidTimeout(value) => write!(
                f,
                "HTTP_TIMEOUT_SECS must be a positive number of seconds (got {value})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::BindAddress(err) => Some(err),
            Self::InvalidUrl { source, .. } => Some(source),
            _ => None,
        }
    }
}
