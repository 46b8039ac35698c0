// Remote auth service endpoint layout

use url::Url;

use crate::error::{AuthError, Result};

use super::types::AuthorizationCode;

pub const DEFAULT_REFRESH_PATH: &str = "jwt/refresh";
pub const DEFAULT_LOGOUT_PATH: &str = "logout";

/// Endpoint paths rooted at the configured auth base URL
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
    refresh_path: String,
    logout_path: String,
}

impl Endpoints {
    /// Create endpoints from a base URL; a missing trailing slash is added
    /// so relative paths resolve under the base instead of replacing its
    /// last segment.
    pub fn new(base_url: &str) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base = Url::parse(&normalized).map_err(|e| AuthError::Url(e.to_string()))?;

        Ok(Self {
            base,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            logout_path: DEFAULT_LOGOUT_PATH.to_string(),
        })
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn with_logout_path(mut self, path: impl Into<String>) -> Self {
        self.logout_path = path.into();
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve a path relative to the base URL
    pub fn join(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| AuthError::Url(format!("{}: {}", path, e)))
    }

    /// `{base}42/code` with the raw code fragment appended verbatim
    pub fn code_exchange(&self, code: &AuthorizationCode) -> Result<Url> {
        let raw = format!("{}42/code{}", self.base, code.as_str());
        Url::parse(&raw).map_err(|e| AuthError::Url(e.to_string()))
    }

    pub fn refresh(&self) -> Result<Url> {
        self.join(&self.refresh_path)
    }

    pub fn logout(&self) -> Result<Url> {
        self.join(&self.logout_path)
    }
}
