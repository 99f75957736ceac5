use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::workflows::campaigns::DispatchPolicy;
use crate::workflows::scoring::{ConfigurationError, ScoringConfiguration, ScoringPolicy};

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_SEND_ATTEMPTS: u32 = 10;

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
    pub scheduler: SchedulerConfig,
    pub scoring: ScoringSource,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let poll_interval_secs =
            numeric_var("SCHEDULER_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::InvalidNumber {
                variable: "SCHEDULER_POLL_INTERVAL_SECS",
            });
        }
        let send_timeout_secs =
            numeric_var("SCHEDULER_SEND_TIMEOUT_SECS", DEFAULT_SEND_TIMEOUT_SECS)?;
        let max_send_attempts = numeric_var(
            "SCHEDULER_MAX_SEND_ATTEMPTS",
            u64::from(DEFAULT_MAX_SEND_ATTEMPTS),
        )?;
        let max_send_attempts =
            u32::try_from(max_send_attempts).map_err(|_| ConfigError::InvalidNumber {
                variable: "SCHEDULER_MAX_SEND_ATTEMPTS",
            })?;

        let config_path = env::var("SCORING_CONFIG_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                include_targets: environment != AppEnvironment::Production,
            },
            scheduler: SchedulerConfig {
                poll_interval: Duration::from_secs(poll_interval_secs),
                send_timeout: Duration::from_secs(send_timeout_secs),
                // Zero disables the cap and keeps requeueing failed sends.
                max_send_attempts: (max_send_attempts > 0).then_some(max_send_attempts),
            },
            scoring: ScoringSource { config_path },
        })
    }
}

fn numeric_var(variable: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { variable }),
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
    pub include_targets: bool,
}

/// Campaign poller cadence and delivery guard rails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub send_timeout: Duration,
    pub max_send_attempts: Option<u32>,
}

impl SchedulerConfig {
    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            send_timeout: self.send_timeout,
            max_attempts: self.max_send_attempts,
        }
    }
}

/// Where the operator-edited scoring configuration lives.
#[derive(Debug, Clone, Default)]
pub struct ScoringSource {
    pub config_path: Option<PathBuf>,
}

impl ScoringSource {
    /// Read and validate the scoring configuration. Falls back to the built-in
    /// creator defaults when no file is configured.
    pub fn load_policy(&self) -> Result<ScoringPolicy, ConfigError> {
        let configuration = match &self.config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| {
                    ConfigError::ScoringFile {
                        path: path.clone(),
                        source,
                    }
                })?;
                serde_json::from_str::<ScoringConfiguration>(&raw).map_err(|source| {
                    ConfigError::ScoringFormat {
                        path: path.clone(),
                        source,
                    }
                })?
            }
            None => ScoringConfiguration::default(),
        };

        ScoringPolicy::new(configuration).map_err(ConfigError::Scoring)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidNumber {
        variable: &'static str,
    },
    ScoringFile {
        path: PathBuf,
        source: std::io::Error,
    },
    ScoringFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
    Scoring(ConfigurationError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a positive whole number")
            }
            ConfigError::ScoringFile { path, .. } => {
                write!(f, "unable to read scoring configuration {}", path.display())
            }
            ConfigError::ScoringFormat { path, source } => write!(
                f,
                "scoring configuration {} is not valid JSON: {}",
                path.display(),
                source
            ),
            ConfigError::Scoring(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::ScoringFile { source, .. } => Some(source),
            ConfigError::ScoringFormat { source, .. } => Some(source),
            ConfigError::Scoring(err) => Some(err),
        }
    }
}
