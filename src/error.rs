// Error handling module
// Defines the authentication error taxonomy shared by every component

use thiserror::Error;

/// Message surfaced when the remote service rejects an authorization code
pub const WRONG_CODE_MESSAGE: &str = "Wrong Code";

/// Errors that can occur while exchanging codes or talking to the auth service
#[derive(Error, Debug)]
pub enum AuthError {
    /// Authorization code rejected by the remote service (never retried)
    #[error("{0}")]
    Exchange(String),

    /// Access token still reported as expired after a successful refresh
    #[error("Access token expired again after refresh")]
    Expired,

    /// Refresh endpoint rejected the refresh token; the session is gone
    #[error("Token refresh failed: {0}")]
    Refresh(String),

    /// Any other non-success response, body preserved verbatim
    #[error("Remote rejected request: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// No session has been established
    #[error("Not authenticated")]
    Unauthenticated,

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Success response with a body that does not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Endpoint URL could not be built
    #[error("Invalid URL: {0}")]
    Url(String),

    /// Session persistence backend failed
    #[error("Session storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Build the error returned for a rejected authorization code
    pub fn wrong_code() -> Self {
        AuthError::Exchange(WRONG_CODE_MESSAGE.to_string())
    }

    /// True when the failure means the local session can no longer be used
    /// and the caller should route to logout
    pub fn is_terminal_session_failure(&self) -> bool {
        matches!(self, AuthError::Refresh(_) | AuthError::Unauthenticated)
    }

    /// HTTP status of a remote rejection, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Rejected { status, .. } => Some(*status),
            AuthError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for authentication operations
pub type Result<T> = std::result::Result<T, AuthError>;
