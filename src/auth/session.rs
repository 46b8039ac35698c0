use anyhow::Context;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::endpoints::Endpoints;
use super::persistence::{FilePersistence, TokenPersistence};
use super::store::TokenStore;
use crate::config::Config;
use crate::error::Result;

/// Per-session state shared by the exchanger, session client and 2FA flow.
/// Owns the token store and the new-user hint.
pub struct AuthSession {
    endpoints: Endpoints,
    client: Client,
    store: TokenStore,

    /// Set by the OAuth exchange; defaults to true until then
    new_user: RwLock<bool>,
}

impl AuthSession {
    pub fn new(
        endpoints: Endpoints,
        client: Client,
        persistence: Arc<dyn TokenPersistence>,
    ) -> Result<Self> {
        let store = TokenStore::new(client.clone(), endpoints.refresh()?, persistence)?;

        Ok(Self {
            endpoints,
            client,
            store,
            new_user: RwLock::new(true),
        })
    }

    /// Build a session from configuration, persisted to the session file
    pub fn from_config(config: &Config) -> anyhow::Result<Arc<Self>> {
        let endpoints = Endpoints::new(&config.auth_url)?
            .with_refresh_path(config.refresh_path.clone())
            .with_logout_path(config.logout_path.clone());

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.http_connect_timeout))
            .timeout(Duration::from_secs(config.http_request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        let persistence = Arc::new(FilePersistence::new(config.session_file.clone()));
        tracing::info!("Session file: {}", persistence.path().display());

        Ok(Arc::new(Self::new(endpoints, client, persistence)?))
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub async fn is_new_user(&self) -> bool {
        *self.new_user.read().await
    }

    pub(crate) async fn set_new_user(&self, is_new: bool) {
        let mut new_user = self.new_user.write().await;
        *new_user = is_new;
    }
}
