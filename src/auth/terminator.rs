// Session teardown on unrecoverable auth failures

use async_trait::async_trait;
use std::fmt;

use super::store::TokenStore;
use crate::error::AuthError;

/// Why a session is being torn down
#[derive(Debug, Clone, Copy)]
pub enum TerminationReason<'a> {
    /// User asked to log out
    Logout,

    /// Refresh token rejected; the session cannot be recovered
    RefreshFailed(&'a AuthError),
}

impl fmt::Display for TerminationReason<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Logout => write!(f, "logout requested"),
            TerminationReason::RefreshFailed(e) => write!(f, "{}", e),
        }
    }
}

/// Invoked when the session can no longer be used (refresh failed, logout)
#[async_trait]
pub trait SessionTerminator: Send + Sync {
    async fn terminate(&self, reason: TerminationReason<'_>);
}

/// Default teardown: drop the local session and log why
pub struct ClearSession {
    store: TokenStore,
}

impl ClearSession {
    pub fn new(store: TokenStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SessionTerminator for ClearSession {
    async fn terminate(&self, reason: TerminationReason<'_>) {
        tracing::warn!("Terminating session: {}", reason);

        if let Err(e) = self.store.clear().await {
            tracing::error!("Failed to clear session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::persistence::MemoryPersistence;
    use crate::auth::TokenPair;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_clear_session_terminator() {
        let store = TokenStore::new(
            reqwest::Client::new(),
            url::Url::parse("http://127.0.0.1:9/jwt/refresh").unwrap(),
            Arc::new(MemoryPersistence::new()),
        )
        .unwrap();
        store.replace(TokenPair::new("a1", "r1").unwrap()).await.unwrap();

        let terminator = ClearSession::new(store.clone());
        let err = AuthError::Refresh("jwt.invalid".to_string());
        terminator
            .terminate(TerminationReason::RefreshFailed(&err))
            .await;

        assert!(store.current_pair().await.is_none());
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(TerminationReason::Logout.to_string(), "logout requested");

        let err = AuthError::Refresh("401 - jwt.invalid".to_string());
        assert_eq!(
            TerminationReason::RefreshFailed(&err).to_string(),
            "Token refresh failed: 401 - jwt.invalid"
        );
    }
}
