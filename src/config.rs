use std::env;
use thiserror::Error;

/// Fallback signing secret for local development. Never accepted in production.
pub const LOCAL_JWT_SECRET: &str = "local-development-jwt-secret-change-me";

/// Default token lifetime: seven days.
pub const DEFAULT_JWT_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// pulled into handlers and extractors via `FromRef<AppState>`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Postgres connection string. `None` selects the in-memory store (local only).
    pub db_url: Option<String>,
    /// Upper bound of the Postgres connection pool.
    pub db_max_connections: u32,
    /// Address the HTTP listener binds to.
    pub bind_addr: String,
    /// Runtime environment marker. Controls log format and which secrets are mandatory.
    pub env: Env,
    /// HMAC secret used to sign and verify bearer tokens.
    pub jwt_secret: String,
    /// Lifetime of an issued bearer token, in seconds.
    pub jwt_expiry_secs: u64,
}

/// Env
///
/// Defines the runtime context: relaxed defaults locally, every secret explicit in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    MissingVar(&'static str),
    #[error("{name} has an invalid value: {value}")]
    InvalidVar { name: &'static str, value: String },
}

impl Default for AppConfig {
    /// Safe, non-panicking configuration for test state scaffolding.
    fn default() -> Self {
        Self {
            db_url: None,
            db_max_connections: 5,
            bind_addr: "127.0.0.1:5000".to_string(),
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            jwt_expiry_secs: DEFAULT_JWT_EXPIRY_SECS,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables. Production refuses to start
    /// without `DATABASE_URL` and `JWT_SECRET`; local mode falls back to the in-memory
    /// store and a development secret.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let db_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
        let jwt_secret = env::var("JWT_SECRET").ok().filter(|v| !v.trim().is_empty());

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                Some(db_url.ok_or(ConfigError::MissingVar("DATABASE_URL"))?),
                jwt_secret.ok_or(ConfigError::MissingVar("JWT_SECRET"))?,
            ),
            Env::Local => (
                db_url,
                jwt_secret.unwrap_or_else(|| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        Ok(Self {
            db_url,
            db_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            env,
            jwt_secret,
            jwt_expiry_secs: parse_var("JWT_EXPIRY_SECS", DEFAULT_JWT_EXPIRY_SECS)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidVar { name, value }),
        Err(_) => Ok(default),
    }
}
