use std::time::Duration;

use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "admin_session";

const CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct AdminSession {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies HS256 admin session tokens.
#[derive(Clone)]
pub struct SessionSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    admin_email: String,
}

impl SessionSigner {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.session_secret.as_bytes(),
            config.session_ttl,
            &config.admin_email,
        )
    }

    pub fn new(secret: &[u8], ttl: Duration, admin_email: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
            admin_email: admin_email.to_string(),
        }
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, email: &str) -> Result<String, AppError> {
        let now = chrono::Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        self.sign(&SessionClaims {
            sub: email.to_string(),
            iat: now,
            exp: now.saturating_add(ttl),
        })
    }

    fn sign(&self, claims: &SessionClaims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|error| {
            AppError::internal(format!("Session token signing failed: {}", sanitize(&error)))
        })
    }

    pub fn verify(&self, token: &str) -> Result<AdminSession, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 0;

        let decoded = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(|error| {
            AppError::unauthorized(format!("Session validation failed: {}", sanitize(&error)))
        })?;

        validate_temporal_claims(&decoded.claims)?;
        // A token minted for a previous admin account is void once the address changes.
        if !decoded.claims.sub.eq_ignore_ascii_case(&self.admin_email) {
            return Err(AppError::unauthorized("Session subject is not the admin"));
        }

        Ok(AdminSession {
            email: decoded.claims.sub,
        })
    }
}

/// Compare submitted credentials with the configured admin account.
pub fn credentials_match(config: &AppConfig, email: &str, password: &str) -> bool {
    let email_ok = email.trim().eq_ignore_ascii_case(&config.admin_email);
    let password_ok = constant_time_eq(password.as_bytes(), config.admin_password.as_bytes());
    email_ok & password_ok
}

/// Compare a submitted secret with the expected one.
///
/// The loop always walks the expected secret, so timing depends on its length
/// only, never on the submitted length or on where the first mismatch is.
fn constant_time_eq(submitted: &[u8], expected: &[u8]) -> bool {
    let mut diff = u8::from(submitted.len() != expected.len());
    for (index, byte) in expected.iter().enumerate() {
        let other = submitted.get(index).copied().unwrap_or(!byte);
        diff |= std::hint::black_box(byte ^ other);
    }
    std::hint::black_box(diff) == 0
}

pub fn extract_session_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let token = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find_map(|(name, value)| (name == SESSION_COOKIE).then(|| value.trim()))
        .ok_or_else(|| AppError::unauthorized("Missing admin session cookie"))?;

    if token.is_empty() {
        return Err(AppError::unauthorized("Admin session cookie is empty"));
    }

    Ok(token)
}

pub fn session_cookie(token: &str, ttl: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        ttl.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", Duration::ZERO, secure)
}

fn validate_temporal_claims(claims: &SessionClaims) -> Result<(), AppError> {
    let now = chrono::Utc::now().timestamp();

    if claims.exp <= now {
        return Err(AppError::unauthorized("Session is expired"));
    }
    if claims.iat > now.saturating_add(CLOCK_SKEW_SECS) {
        return Err(AppError::unauthorized("Session `iat` is in the future"));
    }

    Ok(())
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}
