use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::ConfigError;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub signing: SigningConfig,
    pub rate_limit: RateLimitConfig,
    pub storage: StorageConfig,
    pub delivery: DeliveryConfig,
    pub observability: ObservabilityConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Stream-URL signing (HMAC-SHA256 over `file_url|expiry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Shared signing secret. Must be non-empty; startup fails otherwise.
    pub secret: String,
    /// Lifetime of issued stream URLs in seconds.
    pub url_ttl_secs: u64,
}

/// Sliding-window (reset variant) rate limiting, keyed by (media, client).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    /// Interval of the background task that evicts stale windows.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory where uploaded media files live.
    pub upload_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub cache_control: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub max_json_body_bytes: usize,
    /// Cap on raw upload bodies.
    pub max_upload_size_bytes: usize,
}

impl AppConfig {
    /// Load configuration with layered overrides:
    /// 1. config/default.toml
    /// 2. config/{env}.toml (based on MEDIAGATE_ENV)
    /// 3. Environment variables (MEDIAGATE_* prefix)
    ///
    /// Fails fast if the signing secret ends up empty.
    pub fn load() -> Result<Self, ConfigError> {
        let default_path = Path::new("config/default.toml");
        let default_content =
            std::fs::read_to_string(default_path).map_err(|e| ConfigError::Unreadable {
                path: default_path.display().to_string(),
                reason: e.to_string(),
            })?;

        let mut config: AppConfig =
            toml::from_str(&default_content).map_err(|e| ConfigError::Unparseable {
                path: default_path.display().to_string(),
                reason: e.to_string(),
            })?;

        // Layer 2: environment-specific overrides
        let env_name = std::env::var("MEDIAGATE_ENV").unwrap_or_else(|_| "development".to_string());
        let env_path = format!("config/{}.toml", env_name);
        if let Ok(env_content) = std::fs::read_to_string(&env_path) {
            config = toml::from_str(&env_content).map_err(|e| ConfigError::Unparseable {
                path: env_path,
                reason: e.to_string(),
            })?;
        }

        // Layer 3: environment variable overrides (selected keys)
        Self::apply_env_overrides(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service cannot run safely with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing.secret.trim().is_empty() {
            return Err(ConfigError::MissingSigningSecret);
        }
        Ok(())
    }

    fn apply_env_overrides(config: &mut AppConfig) {
        if let Ok(v) = std::env::var("MEDIAGATE_SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = std::env::var("MEDIAGATE_SERVER_PORT") {
            if let Ok(port) = v.parse() {
                config.server.port = port;
            }
        }
        if let Ok(v) = std::env::var("MEDIAGATE_SIGNING_SECRET") {
            config.signing.secret = v;
        }
        if let Ok(v) = std::env::var("MEDIAGATE_SIGNING_URL_TTL_SECS") {
            if let Ok(ttl) = v.parse() {
                config.signing.url_ttl_secs = ttl;
            }
        }
        if let Ok(v) = std::env::var("MEDIAGATE_RATE_LIMIT_MAX_REQUESTS") {
            if let Ok(max) = v.parse() {
                config.rate_limit.max_requests = max;
            }
        }
        if let Ok(v) = std::env::var("MEDIAGATE_RATE_LIMIT_WINDOW_SECS") {
            if let Ok(secs) = v.parse() {
                config.rate_limit.window_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("MEDIAGATE_STORAGE_UPLOAD_DIR") {
            config.storage.upload_dir = v;
        }
        if let Ok(v) = std::env::var("MEDIAGATE_OBSERVABILITY_LOG_LEVEL") {
            config.observability.log_level = v;
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            signing: SigningConfig {
                secret: String::new(),
                url_ttl_secs: 600,
            },
            rate_limit: RateLimitConfig {
                max_requests: 5,
                window_secs: 60,
                sweep_interval_secs: 60,
            },
            storage: StorageConfig {
                upload_dir: "uploads".to_string(),
            },
            delivery: DeliveryConfig {
                cache_control: "private, no-store".to_string(),
                cors_allowed_origins: vec!["*".to_string()],
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                log_format: "json".to_string(),
                metrics_enabled: true,
            },
            security: SecurityConfig {
                max_json_body_bytes: 1_048_576,           // 1 MB
                max_upload_size_bytes: 1_073_741_824,     // 1 GB
            },
        }
    }
}
