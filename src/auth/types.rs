// Authentication types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Literal body the auth service returns when the bearer token has expired
pub const EXPIRY_SENTINEL: &str = "jwt.expired";

/// Access/refresh token pair issued by the auth service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    /// Build a pair, rejecting empty tokens
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Result<Self> {
        let pair = Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        };

        if pair.access_token.is_empty() {
            return Err(AuthError::Decode(
                "response does not contain accessToken".to_string(),
            ));
        }
        if pair.refresh_token.is_empty() {
            return Err(AuthError::Decode(
                "response does not contain refreshToken".to_string(),
            ));
        }

        Ok(pair)
    }
}

/// Derived session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Unauthenticated,
    Authenticated(TokenPair),
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }
}

impl From<Option<TokenPair>> for Session {
    fn from(pair: Option<TokenPair>) -> Self {
        match pair {
            Some(pair) => Session::Authenticated(pair),
            None => Session::Unauthenticated,
        }
    }
}

/// One-time authorization code taken from the OAuth redirect URL.
/// Holds the raw query fragment starting at `?code=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode(pub String);

impl AuthorizationCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Persisted form of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&TokenPair> for StoredSession {
    fn from(pair: &TokenPair) -> Self {
        Self {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            updated_at: Utc::now(),
        }
    }
}

impl From<StoredSession> for TokenPair {
    fn from(stored: StoredSession) -> Self {
        Self {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
        }
    }
}

/// OAuth code exchange response
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(rename = "isnew", default = "default_is_new")]
    pub is_new: bool,
}

fn default_is_new() -> bool {
    true
}

/// Refresh request
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh response
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// OTP identity registration request
#[derive(Serialize)]
pub struct OtpIdentityRequest<'a> {
    pub name: &'a str,
}

/// OTP identity registration response (provisioning URL)
#[derive(Deserialize)]
pub struct OtpEnrollmentResponse {
    pub url: String,
}

/// Enrolled OTP identity
#[derive(Deserialize)]
pub struct OtpIdentityResponse {
    pub name: String,
}

/// OTP code verification request
#[derive(Serialize)]
pub struct OtpCodeRequest<'a> {
    pub code: &'a str,
}
