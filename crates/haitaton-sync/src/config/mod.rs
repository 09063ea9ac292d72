use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_STORE_PATH: &str = "hakemukset.json";
pub const DEFAULT_DECISION_FALLBACK_NAME: &str = "paatos";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub sync: SyncConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let store_path = env::var("HAKEMUS_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_PATH));

        let poll_interval_secs = match env::var("HAKEMUS_POLL_INTERVAL_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidPollInterval { value: raw })?,
            Err(_) => DEFAULT_POLL_INTERVAL_SECS,
        };

        let decision_fallback_name = env::var("HAKEMUS_DECISION_FALLBACK_NAME")
            .unwrap_or_else(|_| DEFAULT_DECISION_FALLBACK_NAME.to_string());
        if decision_fallback_name.trim().is_empty() {
            return Err(ConfigError::EmptyDecisionFallback);
        }

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            sync: SyncConfig {
                store_path,
                poll_interval: Duration::from_secs(poll_interval_secs),
                decision_fallback_name,
            },
        })
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Settings for the application store and the scheduled history ingestion.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub store_path: PathBuf,
    pub poll_interval: Duration,
    pub decision_fallback_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            decision_fallback_name: DEFAULT_DECISION_FALLBACK_NAME.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPollInterval { value: String },
    EmptyDecisionFallback,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPollInterval { value } => write!(
                f,
                "HAKEMUS_POLL_INTERVAL_SECS must be a positive integer (found '{value}')"
            ),
            ConfigError::EmptyDecisionFallback => {
                write!(f, "HAKEMUS_DECISION_FALLBACK_NAME must not be blank")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
