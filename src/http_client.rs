use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use url::Url;

use crate::auth::{
    AuthSession, ClearSession, RequestOptions, SessionTerminator, TerminationReason,
    EXPIRY_SENTINEL,
};
use crate::error::{AuthError, Result};

/// Authenticated HTTP client for the auth service
/// Attaches the bearer token and transparently refreshes it once on expiry
pub struct SessionClient {
    /// Shared session state (token store, endpoints, HTTP client)
    session: Arc<AuthSession>,

    /// Teardown hook for unrecoverable auth failures
    terminator: Arc<dyn SessionTerminator>,
}

/// Non-success response with its body, read exactly once
#[derive(Debug)]
struct FailedResponse {
    status: StatusCode,
    body: String,
}

impl FailedResponse {
    async fn read(response: Response) -> Self {
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(
                    status = status.as_u16(),
                    error = %e,
                    "Failed to read error response body"
                );
                String::new()
            }
        };
        Self { status, body }
    }

    /// 401 with the literal `jwt.expired` body
    fn is_expired_credential(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED && self.body.trim() == EXPIRY_SENTINEL
    }
}

impl From<FailedResponse> for AuthError {
    fn from(failure: FailedResponse) -> Self {
        AuthError::Rejected {
            status: failure.status.as_u16(),
            message: failure.body,
        }
    }
}

impl SessionClient {
    /// Create a client whose teardown clears the local session
    pub fn new(session: Arc<AuthSession>) -> Self {
        let terminator = Arc::new(ClearSession::new(session.store().clone()));
        Self::with_terminator(session, terminator)
    }

    /// Create a client with a custom teardown hook
    pub fn with_terminator(
        session: Arc<AuthSession>,
        terminator: Arc<dyn SessionTerminator>,
    ) -> Self {
        Self {
            session,
            terminator,
        }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// Issue an authenticated request against `{base}{path}`.
    /// Expired tokens are refreshed and the request replayed once; any
    /// other failure is returned unchanged.
    pub async fn authenticated_request<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.session.endpoints().join(path)?;
        self.request_url(method, url, body).await
    }

    /// GET `{base}{path}` and decode the JSON body
    pub async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .authenticated_request(Method::GET, path, None::<&()>)
            .await?;
        decode(response).await
    }

    /// POST a JSON body to `{base}{path}` and decode the JSON response
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .authenticated_request(Method::POST, path, Some(body))
            .await?;
        decode(response).await
    }

    /// Revoke the session remotely (best effort) and always tear it down locally
    pub async fn logout(&self) -> Result<()> {
        let result = match self.session.store().current_access_token().await {
            Some(_) => {
                let url = self.session.endpoints().logout()?;
                self.request_url(Method::DELETE, url, None::<&()>)
                    .await
                    .map(|_| ())
            }
            None => Ok(()),
        };

        if let Err(ref e) = result {
            tracing::warn!("Remote logout failed: {}", e);
        }

        // A failed refresh already ran the terminator
        if !matches!(result, Err(AuthError::Refresh(_))) {
            self.terminator.terminate(TerminationReason::Logout).await;
        }
        result
    }

    async fn request_url<B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        tracing::debug!(
            method = %method,
            url = %url,
            "Sending authenticated request"
        );

        let options = self
            .session
            .store()
            .build_request_options(method, body)
            .await?;
        let client = self.session.client();

        self.with_refresh_retry(options, |opts| {
            opts.apply(client.request(opts.method.clone(), url.clone()))
                .send()
        })
        .await
    }

    /// Shared refresh-once/retry-once primitive.
    ///
    /// `send` issues the request for the given options. It runs at most
    /// twice: once with the current token and, only after a 401
    /// `jwt.expired` followed by a successful refresh, once more with the
    /// new token. A failed refresh invokes the session terminator and is
    /// returned to the caller.
    pub async fn with_refresh_retry<F, Fut>(
        &self,
        options: RequestOptions,
        send: F,
    ) -> Result<Response>
    where
        F: Fn(&RequestOptions) -> Fut,
        Fut: Future<Output = reqwest::Result<Response>>,
    {
        let Some(stale_token) = options.bearer.clone() else {
            return Err(AuthError::Unauthenticated);
        };

        // First attempt
        let response = send(&options).await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let failure = FailedResponse::read(response).await;
        if !failure.is_expired_credential() {
            tracing::warn!(
                status = failure.status.as_u16(),
                body = %failure.body,
                "Authenticated request rejected"
            );
            return Err(failure.into());
        }

        tracing::warn!("Access token expired, refreshing and retrying once...");

        let pair = match self
            .session
            .store()
            .refresh_after(Some(stale_token.as_str()))
            .await
        {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!("Token refresh failed, ending session: {}", e);
                self.terminator
                    .terminate(TerminationReason::RefreshFailed(&e))
                    .await;
                return Err(e);
            }
        };

        // Single replay with the refreshed token
        let retry_options = options.with_bearer(pair.access_token);
        let response = send(&retry_options).await?;
        if response.status().is_success() {
            tracing::debug!("Request succeeded after token refresh");
            return Ok(response);
        }

        let failure = FailedResponse::read(response).await;
        if failure.is_expired_credential() {
            tracing::error!("Access token rejected as expired right after refresh");
            return Err(AuthError::Expired);
        }

        tracing::warn!(
            status = failure.status.as_u16(),
            body = %failure.body,
            "Authenticated request rejected after refresh"
        );
        Err(failure.into())
    }
}

async fn decode<T>(response: Response) -> Result<T>
where
    T: DeserializeOwned,
{
    response
        .json::<T>()
        .await
        .map_err(|e| AuthError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_credential_detection() {
        let failure = FailedResponse {
            status: StatusCode::UNAUTHORIZED,
            body: "jwt.expired".to_string(),
        };
        assert!(failure.is_expired_credential());

        let failure = FailedResponse {
            status: StatusCode::UNAUTHORIZED,
            body: "jwt.expired\n".to_string(),
        };
        assert!(failure.is_expired_credential());

        // Sentinel on another status is a plain rejection
        let failure = FailedResponse {
            status: StatusCode::BAD_REQUEST,
            body: "jwt.expired".to_string(),
        };
        assert!(!failure.is_expired_credential());

        let failure = FailedResponse {
            status: StatusCode::UNAUTHORIZED,
            body: "jwt.invalid".to_string(),
        };
        assert!(!failure.is_expired_credential());
    }

    #[test]
    fn test_failed_response_into_error() {
        let err: AuthError = FailedResponse {
            status: StatusCode::BAD_REQUEST,
            body: "invalid code".to_string(),
        }
        .into();

        match err {
            AuthError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid code");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
