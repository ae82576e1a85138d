use config::ConfigError;

use crate::auth::{MIN_SECRET_BYTES, SECRET_BYTES};
use crate::error::AppError;

/// Longest accepted token lifetime: ten years
const MAX_TOKEN_EXPIRY: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub http: HttpSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Token and password settings
#[derive(serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct AuthSettings {
    pub access_token_expiry: i64,   // seconds (3600 = 1 hour)
    pub refresh_token_expiry: i64,  // seconds (604800 = 7 days)
    /// Random bytes per secret; the hex secret is twice as long
    pub secret_bytes: usize,
    pub password_hash_cost: u32,
    pub cookie_secure: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            access_token_expiry: 60 * 60,
            refresh_token_expiry: 7 * 24 * 60 * 60,
            secret_bytes: SECRET_BYTES,
            password_hash_cost: bcrypt::DEFAULT_COST,
            cookie_secure: false,
        }
    }
}

impl AuthSettings {
    /// Reject settings that would break issuance at runtime
    pub fn validate(&self) -> Result<(), AppError> {
        for (name, seconds) in [
            ("access_token_expiry", self.access_token_expiry),
            ("refresh_token_expiry", self.refresh_token_expiry),
        ] {
            if seconds <= 0 || seconds > MAX_TOKEN_EXPIRY {
                return Err(AppError::Internal(format!(
                    "auth.{} must be between 1 and {} seconds, got {}",
                    name, MAX_TOKEN_EXPIRY, seconds
                )));
            }
        }

        if self.secret_bytes < MIN_SECRET_BYTES {
            return Err(AppError::Internal(format!(
                "auth.secret_bytes must be at least {}, got {}",
                MIN_SECRET_BYTES, self.secret_bytes
            )));
        }

        Ok(())
    }
}

/// Cross-cutting HTTP settings: CORS and per-IP rate limits
#[derive(serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct HttpSettings {
    /// Origins allowed by CORS; empty allows any origin
    pub cors_allowed_origins: Vec<String>,
    /// Requests per minute per client IP across the whole API
    pub requests_per_minute: u32,
    /// Requests per minute per client IP on `/api/auth`
    pub auth_requests_per_minute: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            cors_allowed_origins: Vec::new(),
            requests_per_minute: 300,
            auth_requests_per_minute: 20,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_max_connections() -> u32 {
    10
}

/// Load settings from `configuration.{yaml,toml,json}` (optional), then from
/// `APP_`-prefixed environment variables, e.g. `APP_DATABASE__HOST`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
