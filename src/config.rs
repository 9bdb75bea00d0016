use crate::error::{Result, VigilError};
use crate::health::batch::{DEFAULT_BATCH_SIZE, DEFAULT_PROBE_TIMEOUT};
use std::env;
use std::time::Duration;
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP front door configuration
    pub api: ApiServerConfig,
    /// Persisted store configuration
    pub store: StoreConfig,
    /// Database configuration (postgres store backend)
    pub database: DatabaseConfig,
    /// Health check configuration
    pub health: HealthCheckConfig,
    /// Import configuration
    pub import: ImportConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port for the API server (default: 8787)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Allowed CORS origins (comma-separated, empty = localhost only)
    pub cors_origins: Vec<String>,
    /// Directory served for every non-API path
    pub static_dir: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Key the serialized proxy list lives under
    pub proxies_key: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// SSL mode (disable, require, prefer)
    pub ssl_mode: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// Base URL of the external probe service
    pub api_base_url: Url,
    /// Records probed concurrently per batch
    pub batch_size: usize,
    /// Deadline for a single probe
    pub probe_timeout: Duration,
    /// Period of the background stale sweep; `None` disables it
    pub sweep_interval: Option<Duration>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_HEALTH_API_BASE_URL)
                .expect("default health API URL is valid"),
            batch_size: DEFAULT_BATCH_SIZE,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            sweep_interval: Some(Duration::from_secs(60)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Timeout for fetching an import source
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

const DEFAULT_HEALTH_API_BASE_URL: &str = "http://127.0.0.1:8080";

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            api: ApiServerConfig {
                port: get_env_or("API_PORT", "8787").parse().map_err(|_| {
                    VigilError::InvalidConfig("API_PORT must be a valid port number".into())
                })?,
                host: get_env_or("API_HOST", "0.0.0.0"),
                cors_origins: get_env_or("CORS_ORIGINS", "")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                static_dir: get_env_or("STATIC_DIR", "public"),
            },
            store: StoreConfig {
                backend: parse_store_backend(&get_env_or("STORE_BACKEND", "postgres"))?,
                proxies_key: get_env_or("KV_PROXIES_KEY", "all_proxies_list"),
            },
            database: DatabaseConfig {
                host: get_env_or("DB_HOST", "localhost"),
                port: get_env_or("DB_PORT", "5432").parse().map_err(|_| {
                    VigilError::InvalidConfig("DB_PORT must be a valid port number".into())
                })?,
                user: get_env_or("DB_USER", "vigil"),
                password: get_env_or("DB_PASSWORD", "vigil_password"),
                name: get_env_or("DB_NAME", "vigil"),
                ssl_mode: get_env_or("DB_SSLMODE", "disable"),
                max_connections: parse_number("DB_MAX_CONNECTIONS", "10")?,
                min_connections: parse_number("DB_MIN_CONNECTIONS", "1")?,
            },
            health: parse_health_config()?,
            import: ImportConfig {
                fetch_timeout: Duration::from_secs(parse_number("IMPORT_FETCH_TIMEOUT", "30")?),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Get the API server address
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_store_backend(raw: &str) -> Result<StoreBackend> {
    match raw.trim().to_lowercase().as_str() {
        "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
        "memory" | "mem" => Ok(StoreBackend::Memory),
        other => Err(VigilError::InvalidConfig(format!(
            "STORE_BACKEND has unsupported value: {}",
            other
        ))),
    }
}

fn parse_health_config() -> Result<HealthCheckConfig> {
    let raw_url = get_env_or("HEALTH_API_BASE_URL", DEFAULT_HEALTH_API_BASE_URL);
    let api_base_url = Url::parse(raw_url.trim()).map_err(|e| {
        VigilError::InvalidConfig(format!("HEALTH_API_BASE_URL must be a valid URL: {}", e))
    })?;
    if !matches!(api_base_url.scheme(), "http" | "https") {
        return Err(VigilError::InvalidConfig(
            "HEALTH_API_BASE_URL must use http or https".into(),
        ));
    }

    let batch_size: usize = parse_number("HEALTH_BATCH_SIZE", "300")?;
    if batch_size == 0 {
        return Err(VigilError::InvalidConfig(
            "HEALTH_BATCH_SIZE must be at least 1".into(),
        ));
    }

    let probe_timeout_secs: u64 = parse_number("HEALTH_PROBE_TIMEOUT", "5")?;
    let sweep_interval_secs: u64 = parse_number("HEALTH_SWEEP_INTERVAL", "60")?;

    Ok(HealthCheckConfig {
        api_base_url,
        batch_size,
        probe_timeout: Duration::from_secs(probe_timeout_secs.max(1)),
        sweep_interval: (sweep_interval_secs > 0).then(|| Duration::from_secs(sweep_interval_secs)),
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    get_env_or(key, default)
        .trim()
        .parse()
        .map_err(|_| VigilError::InvalidConfig(format!("{} must be a valid number", key)))
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
