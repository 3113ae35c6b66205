use std::collections::HashMap;
use std::env;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::rate_limit::client_fingerprint;

const MIN_SESSION_SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub admin_email: String,
    pub admin_password: String,
    pub session_secret: String,
    pub session_ttl: Duration,
    pub max_upload_bytes: usize,
    pub login_rate_limit_window: Duration,
    pub login_rate_limit_per_window: u32,
    pub secure_cookies: bool,
    /// Key login attempts on `x-forwarded-for` / `x-real-ip` instead of the peer address.
    pub trust_proxy_headers: bool,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("db_path", &self.db_path)
            .field("media_dir", &self.media_dir)
            .field(
                "admin_email",
                &format_args!("fp:{:016x}", client_fingerprint(&self.admin_email)),
            )
            .field("admin_password", &"[REDACTED]")
            .field("session_secret", &"[REDACTED]")
            .field("session_ttl", &self.session_ttl)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("login_rate_limit_window", &self.login_rate_limit_window)
            .field(
                "login_rate_limit_per_window",
                &self.login_rate_limit_per_window,
            )
            .field("secure_cookies", &self.secure_cookies)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "CATALOG_API_BIND_ADDR", "127.0.0.1:8080");
        let db_path = PathBuf::from(value_or_default(&lookup, "CATALOG_DB_PATH", "catalog.db"));
        let media_dir = PathBuf::from(value_or_default(&lookup, "CATALOG_MEDIA_DIR", "uploads"));

        let admin_email = required_trimmed(&lookup, "ADMIN_EMAIL")?;
        if !admin_email.contains('@') {
            return Err(ConfigError::Invalid(
                "ADMIN_EMAIL must be an email address".to_string(),
            ));
        }
        let admin_password = required_trimmed(&lookup, "ADMIN_PASSWORD")?;

        let session_secret = required_trimmed(&lookup, "ADMIN_SESSION_SECRET")?;
        if session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(ConfigError::Invalid(format!(
                "ADMIN_SESSION_SECRET must be at least {MIN_SESSION_SECRET_BYTES} bytes"
            )));
        }

        let session_ttl_secs =
            bounded_u64(&lookup, "ADMIN_SESSION_TTL_SECS", 86_400, 300..=604_800)?;
        let max_upload_bytes =
            bounded_u64(&lookup, "MAX_UPLOAD_BYTES", 5 * 1024 * 1024, 1_024..=20_971_520)?;
        let login_window_secs =
            bounded_u64(&lookup, "LOGIN_RATE_LIMIT_WINDOW_SECS", 300, 10..=3_600)?;
        let login_rate_limit_per_window =
            bounded_u64(&lookup, "LOGIN_RATE_LIMIT_PER_WINDOW", 10, 1..=1_000)?;

        let secure_cookies = bool_flag(&lookup, "SECURE_COOKIES")?;
        let trust_proxy_headers = bool_flag(&lookup, "TRUST_PROXY_HEADERS")?;

        Ok(Self {
            bind_addr,
            db_path,
            media_dir,
            admin_email,
            admin_password,
            session_secret,
            session_ttl: Duration::from_secs(session_ttl_secs),
            max_upload_bytes: usize::try_from(max_upload_bytes).map_err(|_| {
                ConfigError::Invalid("MAX_UPLOAD_BYTES does not fit in memory".to_string())
            })?,
            login_rate_limit_window: Duration::from_secs(login_window_secs),
            login_rate_limit_per_window: u32::try_from(login_rate_limit_per_window).map_err(
                |_| ConfigError::Invalid("LOGIN_RATE_LIMIT_PER_WINDOW is too large".to_string()),
            )?,
            secure_cookies,
            trust_proxy_headers,
        })
    }
}

fn bounded_u64(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(default);
    };
    let value = raw.parse::<u64>().map_err(|_| {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    })?;
    if !range.contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{}, {}]",
            range.start(),
            range.end()
        )));
    }
    Ok(value)
}

fn bool_flag(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Result<bool, ConfigError> {
    match optional_trimmed(lookup, name)
        .map(|value| value.to_ascii_lowercase())
        .as_deref()
    {
        None | Some("false" | "0" | "no") => Ok(false),
        Some("true" | "1" | "yes") => Ok(true),
        Some(_) => Err(ConfigError::Invalid(format!("{name} must be true or false"))),
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
