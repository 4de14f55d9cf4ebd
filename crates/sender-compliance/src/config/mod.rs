use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::workflows::generation::{GenerationConfig, GenerationSettings};
use crate::workflows::numbering::{DidLockPolicy, FieldLimits, LifecycleConfig, StorageBuckets};

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
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub generation: GenerationConfig,
    pub lifecycle: LifecycleConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var_or("APP_LOG_LEVEL", "info");

        let defaults = GenerationConfig::default();
        let generation = GenerationConfig {
            endpoint: var_or("GENERATION_ENDPOINT", &defaults.endpoint),
            api_key: env::var("GENERATION_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            model: var_or("GENERATION_MODEL", &defaults.model),
            timeout_ms: parse_var("GENERATION_TIMEOUT_MS", defaults.timeout_ms)?,
        };

        let sampling = GenerationSettings::default();
        let limits = FieldLimits::default();
        let buckets = StorageBuckets::default();
        let did_lock = match env::var("DID_LOCK_POLICY") {
            Ok(value) => value
                .parse::<DidLockPolicy>()
                .map_err(|_| ConfigError::InvalidPolicy { value })?,
            Err(_) => DidLockPolicy::default(),
        };

        let lifecycle = LifecycleConfig {
            limits: FieldLimits {
                text: parse_var("RECORD_TEXT_MAX_LEN", limits.text)?,
                notes: parse_var("RECORD_NOTES_MAX_LEN", limits.notes)?,
                use_case: parse_var("RECORD_USE_CASE_MAX_LEN", limits.use_case)?,
                sample_copy: parse_var("SAMPLE_COPY_MAX_LEN", limits.sample_copy)?,
            },
            did_lock,
            generation: GenerationSettings {
                max_tokens: parse_var("GENERATION_MAX_TOKENS", sampling.max_tokens)?,
                temperature: parse_var("GENERATION_TEMPERATURE", sampling.temperature)?,
            },
            buckets: StorageBuckets {
                templates: var_or("BRIEF_TEMPLATE_BUCKET", &buckets.templates),
                briefs: var_or("BRIEF_OUTPUT_BUCKET", &buckets.briefs),
            },
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            generation,
            lifecycle,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Colored output; only enabled for local development.
    pub ansi: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str, value: String },
    InvalidPolicy { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be a number (got '{value}')")
            }
            ConfigError::InvalidPolicy { value } => {
                write!(f, "DID_LOCK_POLICY must be 'ignore' or 'reject' (got '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidPolicy { .. } => None,
        }
    }
}
