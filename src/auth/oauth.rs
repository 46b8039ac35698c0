// OAuth authorization code exchange
// Locates the code in the landing redirect, trades it for the first token
// pair, and strips it from the URL afterwards.

use std::sync::Arc;
use url::Url;

use super::session::AuthSession;
use super::types::{AuthorizationCode, CodeExchangeResponse, TokenPair};
use crate::error::{AuthError, Result};

/// Query marker the identity provider appends to the redirect URL
const CODE_MARKER: &str = "?code=";

pub struct OAuthExchanger {
    session: Arc<AuthSession>,
    root_url: String,
}

impl OAuthExchanger {
    pub fn new(session: Arc<AuthSession>, root_url: impl Into<String>) -> Self {
        Self {
            session,
            root_url: root_url.into(),
        }
    }

    /// True unless `current_url` is exactly the bare application root
    pub fn has_pending_exchange(&self, current_url: &str) -> bool {
        has_pending_exchange(current_url, &self.root_url)
    }

    /// Trade the authorization code for a token pair.
    /// A rejected code is terminal; the user has to restart the OAuth redirect.
    pub async fn exchange(&self, code: &AuthorizationCode) -> Result<(TokenPair, bool)> {
        if code.is_empty() {
            tracing::warn!("Redirect URL carries no authorization code");
        }
        let url = self.session.endpoints().code_exchange(code)?;
        tracing::info!("Exchanging authorization code...");

        let response = self.session.client().get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %error_text,
                "Authorization code rejected"
            );
            return Err(AuthError::wrong_code());
        }

        let data: CodeExchangeResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Decode(format!("code exchange response: {}", e)))?;

        let pair = TokenPair::new(data.access_token, data.refresh_token)?;
        self.session.store().replace(pair.clone()).await?;
        self.session.set_new_user(data.is_new).await;

        tracing::info!(is_new = data.is_new, "Authorization code exchanged");

        Ok((pair, data.is_new))
    }
}

/// True unless `current_url` is exactly `root_url`
pub fn has_pending_exchange(current_url: &str, root_url: &str) -> bool {
    current_url != root_url
}

/// Substring of `url` starting at the `?code=` marker.
/// Not validated: a missing marker yields an empty code, which the remote
/// exchange rejects.
pub fn extract_code(url: &str) -> AuthorizationCode {
    match url.find(CODE_MARKER) {
        Some(pos) => AuthorizationCode(url[pos..].to_string()),
        None => AuthorizationCode(String::new()),
    }
}

/// `url` with every `code` query parameter removed.
/// Unparseable input is returned unchanged.
pub fn sanitize_url(url: &str) -> String {
    let mut parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return url.to_string(),
    };

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != "code")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }

    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ROOT: &str = "https://localhost/";

    #[test]
    fn test_has_pending_exchange() {
        assert!(!has_pending_exchange(ROOT, ROOT));
        assert!(has_pending_exchange("https://localhost/?code=abc", ROOT));
        assert!(has_pending_exchange("https://localhost", ROOT));
        assert!(has_pending_exchange("https://localhost/game", ROOT));
    }

    #[test]
    fn test_extract_code() {
        let code = extract_code("https://localhost/?code=ABC123");
        assert_eq!(code.as_str(), "?code=ABC123");

        // Everything after the marker is kept verbatim
        let code = extract_code("https://localhost/?code=ABC123&state=xyz");
        assert_eq!(code.as_str(), "?code=ABC123&state=xyz");
    }

    #[test]
    fn test_extract_code_missing_marker() {
        assert!(extract_code("https://localhost/").is_empty());
        assert!(extract_code("https://localhost/?state=1&code=ABC").is_empty());
    }

    #[test]
    fn test_sanitize_url() {
        assert_eq!(
            sanitize_url("https://localhost/?code=ABC123"),
            "https://localhost/"
        );
        assert_eq!(
            sanitize_url("https://localhost/?code=ABC123&state=xyz"),
            "https://localhost/?state=xyz"
        );
        assert_eq!(
            sanitize_url("https://localhost/?state=xyz&code=1&code=2"),
            "https://localhost/?state=xyz"
        );
        assert_eq!(
            sanitize_url("https://localhost/login#top"),
            "https://localhost/login#top"
        );
    }

    #[test]
    fn test_sanitize_url_unparseable() {
        assert_eq!(sanitize_url("not a url"), "not a url");
    }

    proptest! {
        #[test]
        fn prop_extract_then_sanitize(code in "[A-Za-z0-9]{1,64}") {
            let url = format!("https://localhost/?code={}", code);

            let extracted = extract_code(&url);
            prop_assert_eq!(extracted.as_str(), format!("?code={}", code));

            let sanitized = sanitize_url(&url);
            let parsed = Url::parse(&sanitized).unwrap();
            prop_assert!(parsed.query_pairs().all(|(k, _)| k != "code"));
            prop_assert!(!sanitized.contains("code="));
        }

        #[test]
        fn prop_only_root_has_no_pending_exchange(path in "[a-z0-9/?=&]{1,32}") {
            let url = format!("{}{}", ROOT, path);
            prop_assert!(has_pending_exchange(&url, ROOT));
            prop_assert!(!has_pending_exchange(ROOT, ROOT));
        }
    }
}
