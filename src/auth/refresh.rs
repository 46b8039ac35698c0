// Token refresh logic

use reqwest::Client;
use url::Url;

use crate::error::{AuthError, Result};

use super::types::{RefreshRequest, RefreshResponse, TokenPair};

/// Exchange a refresh token for a new token pair.
/// Every failure is reported as `AuthError::Refresh`.
pub async fn refresh_token_pair(
    client: &Client,
    url: &Url,
    refresh_token: &str,
) -> Result<TokenPair> {
    tracing::info!("Refreshing access token...");

    let request = RefreshRequest {
        refresh_token: refresh_token.to_string(),
    };

    let response = client
        .post(url.clone())
        .json(&request)
        .send()
        .await
        .map_err(|e| AuthError::Refresh(format!("failed to send refresh request: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(
            status = status.as_u16(),
            body = %error_text,
            "Token refresh rejected"
        );
        return Err(AuthError::Refresh(format!("{} - {}", status, error_text)));
    }

    let data: RefreshResponse = response
        .json()
        .await
        .map_err(|e| AuthError::Refresh(format!("failed to parse refresh response: {}", e)))?;

    let pair = TokenPair::new(data.access_token, data.refresh_token)
        .map_err(|e| AuthError::Refresh(e.to_string()))?;

    tracing::info!("Access token refreshed");

    Ok(pair)
}
