use anyhow::{bail, Context};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    pub links: LinkConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
    /// Deadline applied to every storage call
    pub timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Prefix for the short URLs handed back to callers, without trailing slash
    pub public_base_url: String,
    /// HTTP status used for successful redirects
    pub redirect_status: u16,
    /// Where unknown codes are sent; `None` answers 404
    pub not_found_redirect: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket peer address only
    None,
    /// Honor `Forwarded` / `X-Forwarded-For`
    Standard,
    /// Honor `CF-Connecting-IP`
    Cloudflare,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    pub geoip_db_path: Option<String>,
    pub trusted_proxy_mode: TrustedProxyMode,
    pub trusted_proxies: Vec<IpNet>,
    pub num_trusted_proxies: Option<usize>,
    pub queue_capacity: usize,
    pub cache_capacity: u64,
    pub cache_ttl_secs: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            geoip_db_path: None,
            trusted_proxy_mode: TrustedProxyMode::None,
            trusted_proxies: Vec::new(),
            num_trusted_proxies: None,
            queue_capacity: 10_000,
            cache_capacity: 10_000,
            cache_ttl_secs: 300,
        }
    }
}

const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend = match env_or("DATABASE_BACKEND", "sqlite").to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "memory" => DatabaseBackend::Memory,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres, memory"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database = DatabaseConfig {
            backend,
            url: env_or("DATABASE_URL", "sqlite://./spaceurl.db?mode=rwc"),
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10)?,
            timeout_ms: env_parse("STORAGE_TIMEOUT_MS", 5_000)?,
        };

        let api_server = ServerConfig {
            host: env_or("API_HOST", "127.0.0.1"),
            port: env_parse("API_PORT", 8080)?,
        };

        let redirect_server = ServerConfig {
            host: env_or("REDIRECT_HOST", "127.0.0.1"),
            port: env_parse("REDIRECT_PORT", 3000)?,
        };

        let redirect_status = env_parse("REDIRECT_STATUS", 302u16)?;
        if !REDIRECT_STATUSES.contains(&redirect_status) {
            bail!("REDIRECT_STATUS must be one of {REDIRECT_STATUSES:?}, got {redirect_status}");
        }

        let links = LinkConfig {
            public_base_url: env_or("PUBLIC_BASE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            redirect_status,
            not_found_redirect: std::env::var("NOT_FOUND_REDIRECT")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        };

        let trusted_proxy_mode = match env_or("TRUSTED_PROXY_MODE", "none").to_lowercase().as_str() {
            "none" => TrustedProxyMode::None,
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, standard, cloudflare"
                );
                TrustedProxyMode::None
            }
        };

        let trusted_proxies = env_or("TRUSTED_PROXIES", "")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<IpNet>()
                    .with_context(|| format!("invalid CIDR in TRUSTED_PROXIES: '{s}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let num_trusted_proxies = std::env::var("NUM_TRUSTED_PROXIES")
            .ok()
            .map(|v| v.trim().parse::<usize>())
            .transpose()
            .context("NUM_TRUSTED_PROXIES must be a non-negative integer")?;

        let defaults = AnalyticsConfig::default();
        let analytics = AnalyticsConfig {
            enabled: env_flag("ANALYTICS_ENABLED", defaults.enabled),
            geoip_db_path: std::env::var("GEOIP_DB_PATH").ok(),
            trusted_proxy_mode,
            trusted_proxies,
            num_trusted_proxies,
            queue_capacity: env_parse("ANALYTICS_QUEUE_CAPACITY", defaults.queue_capacity)?,
            cache_capacity: env_parse("AGGREGATE_CACHE_CAPACITY", defaults.cache_capacity)?,
            cache_ttl_secs: env_parse("AGGREGATE_CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
        };

        Ok(Config {
            database,
            api_server,
            redirect_server,
            links,
            analytics,
        })
    }
}
