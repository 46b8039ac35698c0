use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use super::persistence::TokenPersistence;
use super::refresh;
use super::types::{Session, TokenPair};
use crate::error::{AuthError, Result};

/// Request metadata carrying the bearer credential and serialized body
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
}

impl RequestOptions {
    /// Same request with a different bearer token; the body is reused as-is
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Attach credentials and body to a request builder
    pub fn apply(&self, mut builder: RequestBuilder) -> RequestBuilder {
        if let Some(ref token) = self.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = self.body {
            builder = builder.json(body);
        }
        builder
    }
}

/// Token store
/// Owns the current token pair, persists it, and performs refreshes
#[derive(Clone)]
pub struct TokenStore {
    /// Current token pair (None = unauthenticated)
    pair: Arc<RwLock<Option<TokenPair>>>,

    /// Persistence backend
    persistence: Arc<dyn TokenPersistence>,

    /// HTTP client for refresh requests
    client: Client,

    /// Refresh endpoint
    refresh_url: Url,

    /// Held while a refresh is in flight so concurrent expiries share it
    refresh_lock: Arc<Mutex<()>>,
}

impl TokenStore {
    /// Create a store, loading any previously persisted session
    pub fn new(
        client: Client,
        refresh_url: Url,
        persistence: Arc<dyn TokenPersistence>,
    ) -> Result<Self> {
        let pair = persistence.load()?;
        if pair.is_some() {
            tracing::info!("Restored persisted session");
        }

        Ok(Self {
            pair: Arc::new(RwLock::new(pair)),
            persistence,
            client,
            refresh_url,
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Current access token, if a session exists
    pub async fn current_access_token(&self) -> Option<String> {
        let pair = self.pair.read().await;
        pair.as_ref().map(|p| p.access_token.clone())
    }

    /// Current token pair, if a session exists
    pub async fn current_pair(&self) -> Option<TokenPair> {
        self.pair.read().await.clone()
    }

    pub async fn session(&self) -> Session {
        Session::from(self.current_pair().await)
    }

    /// Build request options carrying the current access token
    pub async fn build_request_options<B>(
        &self,
        method: Method,
        body: Option<&B>,
    ) -> Result<RequestOptions>
    where
        B: Serialize + ?Sized,
    {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AuthError::Decode(format!("failed to serialize request body: {}", e)))?;

        Ok(RequestOptions {
            method,
            bearer: self.current_access_token().await,
            body,
        })
    }

    /// Persist both tokens, then make them current.
    /// A failed save leaves the in-memory session untouched.
    pub async fn replace(&self, pair: TokenPair) -> Result<()> {
        self.persistence.save(&pair)?;

        let mut current = self.pair.write().await;
        *current = Some(pair);
        Ok(())
    }

    /// Drop the session from memory and persistence
    pub async fn clear(&self) -> Result<()> {
        {
            let mut current = self.pair.write().await;
            *current = None;
        }

        self.persistence.clear()
    }

    /// Refresh the token pair using the current refresh token.
    /// On failure the store is cleared and the caller must treat the
    /// session as gone.
    pub async fn refresh(&self) -> Result<TokenPair> {
        let refresh_token = {
            let pair = self.pair.read().await;
            pair.as_ref().map(|p| p.refresh_token.clone())
        };

        let result = match refresh_token {
            Some(token) => refresh::refresh_token_pair(&self.client, &self.refresh_url, &token).await,
            None => Err(AuthError::Refresh("no refresh token available".to_string())),
        };

        // The old refresh token is spent, so an unsaved pair ends the session too
        let result = match result {
            Ok(pair) => match self.replace(pair.clone()).await {
                Ok(()) => Ok(pair),
                Err(e) => Err(AuthError::Refresh(format!(
                    "failed to store refreshed session: {}",
                    e
                ))),
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(pair) => {
                tracing::debug!(
                    "Stored refreshed token pair (token: {}...)",
                    token_prefix(&pair.access_token)
                );
                Ok(pair)
            }
            Err(e) => {
                tracing::error!("Token refresh failed: {}", e);
                if let Err(clear_err) = self.clear().await {
                    tracing::warn!("Failed to clear session after refresh failure: {}", clear_err);
                }
                Err(e)
            }
        }
    }

    /// Refresh unless another task already replaced `stale_access_token`
    /// while we waited for the refresh lock.
    pub async fn refresh_after(&self, stale_access_token: Option<&str>) -> Result<TokenPair> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.current_pair().await {
            if stale_access_token != Some(current.access_token.as_str()) {
                tracing::debug!("Token already refreshed by a concurrent request");
                return Ok(current);
            }
        }

        self.refresh().await
    }
}

/// Short token prefix safe to log
pub(crate) fn token_prefix(token: &str) -> String {
    token.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::persistence::MemoryPersistence;

    async fn store_with(server_url: &str, pair: Option<TokenPair>) -> TokenStore {
        let persistence = Arc::new(MemoryPersistence::new());
        if let Some(ref pair) = pair {
            persistence.save(pair).unwrap();
        }
        let refresh_url = Url::parse(&format!("{}/jwt/refresh", server_url)).unwrap();
        TokenStore::new(Client::new(), refresh_url, persistence).unwrap()
    }

    #[tokio::test]
    async fn test_loads_persisted_session() {
        let store = store_with("http://127.0.0.1:9", Some(TokenPair::new("a1", "r1").unwrap())).await;
        assert_eq!(store.current_access_token().await.as_deref(), Some("a1"));
        assert!(store.session().await.is_authenticated());
    }

    #[tokio::test]
    async fn test_build_request_options() {
        let store = store_with("http://127.0.0.1:9", Some(TokenPair::new("a1", "r1").unwrap())).await;

        let options = store
            .build_request_options(Method::POST, Some(&serde_json::json!({ "code": "123456" })))
            .await
            .unwrap();
        assert_eq!(options.method, Method::POST);
        assert_eq!(options.bearer.as_deref(), Some("a1"));
        assert_eq!(options.body, Some(serde_json::json!({ "code": "123456" })));

        let options = store
            .build_request_options::<()>(Method::GET, None)
            .await
            .unwrap();
        assert!(options.body.is_none());

        let options = options.with_bearer("a2");
        assert_eq!(options.bearer.as_deref(), Some("a2"));
    }

    #[tokio::test]
    async fn test_replace_and_clear() {
        let store = store_with("http://127.0.0.1:9", None).await;
        assert_eq!(store.session().await, Session::Unauthenticated);

        let pair = TokenPair::new("a1", "r1").unwrap();
        store.replace(pair.clone()).await.unwrap();
        assert_eq!(store.current_pair().await, Some(pair.clone()));
        assert_eq!(store.persistence.load().unwrap(), Some(pair));

        store.clear().await.unwrap();
        assert_eq!(store.current_pair().await, None);
        assert_eq!(store.persistence.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh_replaces_pair() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/jwt/refresh")
            .with_status(200)
            .with_body(r#"{"accessToken":"a2","refreshToken":"r2"}"#)
            .expect(1)
            .create_async()
            .await;

        let store = store_with(&server.url(), Some(TokenPair::new("a1", "r1").unwrap())).await;
        let pair = store.refresh().await.unwrap();

        assert_eq!(pair, TokenPair::new("a2", "r2").unwrap());
        assert_eq!(store.current_access_token().await.as_deref(), Some("a2"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_session() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/jwt/refresh")
            .with_status(401)
            .with_body("jwt.invalid")
            .create_async()
            .await;

        let store = store_with(&server.url(), Some(TokenPair::new("a1", "r1").unwrap())).await;
        let err = store.refresh().await.unwrap_err();

        assert!(matches!(err, AuthError::Refresh(_)));
        assert_eq!(store.session().await, Session::Unauthenticated);
        assert_eq!(store.persistence.load().unwrap(), None);
    }

    struct ReadOnlyPersistence;

    impl TokenPersistence for ReadOnlyPersistence {
        fn load(&self) -> Result<Option<TokenPair>> {
            Ok(Some(TokenPair::new("a1", "r1").unwrap()))
        }

        fn save(&self, _pair: &TokenPair) -> Result<()> {
            Err(AuthError::Storage("disk full".to_string()))
        }

        fn clear(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_replace_keeps_memory_when_save_fails() {
        let refresh_url = Url::parse("http://127.0.0.1:9/jwt/refresh").unwrap();
        let store =
            TokenStore::new(Client::new(), refresh_url, Arc::new(ReadOnlyPersistence)).unwrap();

        let err = store
            .replace(TokenPair::new("a2", "r2").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
        assert_eq!(store.current_access_token().await.as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn test_unsaved_refresh_is_a_refresh_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/jwt/refresh")
            .with_status(200)
            .with_body(r#"{"accessToken":"a2","refreshToken":"r2"}"#)
            .create_async()
            .await;

        let refresh_url = Url::parse(&format!("{}/jwt/refresh", server.url())).unwrap();
        let store =
            TokenStore::new(Client::new(), refresh_url, Arc::new(ReadOnlyPersistence)).unwrap();
        let err = store.refresh().await.unwrap_err();

        assert!(matches!(err, AuthError::Refresh(ref msg) if msg.contains("disk full")));
        assert_eq!(store.session().await, Session::Unauthenticated);
    }

    #[tokio::test]
    async fn test_refresh_without_session() {
        let store = store_with("http://127.0.0.1:9", None).await;
        let err = store.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::Refresh(_)));
    }

    #[tokio::test]
    async fn test_refresh_after_skips_when_already_refreshed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/jwt/refresh")
            .expect(0)
            .create_async()
            .await;

        let store = store_with(&server.url(), Some(TokenPair::new("a2", "r2").unwrap())).await;

        // Request went out with a1 but another task already stored a2
        let pair = store.refresh_after(Some("a1")).await.unwrap();
        assert_eq!(pair.access_token, "a2");
        mock.assert_async().await;
    }

    #[test]
    fn test_token_prefix() {
        assert_eq!(token_prefix("abcdefghijkl"), "abcdefgh");
        assert_eq!(token_prefix("abc"), "abc");
    }
}
