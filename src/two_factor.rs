// Two-factor (OTP) enrollment and verification
// Every call goes through SessionClient, so expired tokens are refreshed
// and replayed transparently.

use reqwest::Method;
use std::sync::Arc;

use crate::auth::{OtpCodeRequest, OtpEnrollmentResponse, OtpIdentityRequest, OtpIdentityResponse};
use crate::error::Result;
use crate::http_client::SessionClient;

const OTP_PATH: &str = "2fa";
const OTP_NEW_PATH: &str = "2fa/new";

/// Which 2FA screen a freshly logged-in user should see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoFactorStep {
    /// New user: register an OTP identity and scan the provisioning URL
    Enroll,
    /// Returning user: enter a code from the enrolled authenticator
    Verify,
}

pub struct TwoFactorFlow {
    client: Arc<SessionClient>,
}

impl TwoFactorFlow {
    pub fn new(client: Arc<SessionClient>) -> Self {
        Self { client }
    }

    /// Register an OTP identity and return its provisioning URL (for a QR code)
    pub async fn register_identity(&self, name: &str) -> Result<String> {
        tracing::info!("Registering OTP identity '{}'", name);

        let response: OtpEnrollmentResponse = self
            .client
            .post_json(OTP_NEW_PATH, &OtpIdentityRequest { name })
            .await?;

        Ok(response.url)
    }

    /// Name of the currently enrolled OTP identity
    pub async fn fetch_identity(&self) -> Result<String> {
        let response: OtpIdentityResponse = self.client.get_json(OTP_PATH).await?;
        Ok(response.name)
    }

    /// Submit an OTP code. Any success response means the code was accepted;
    /// a rejection carries the server's text.
    pub async fn verify_code(&self, code: &str) -> Result<()> {
        self.client
            .authenticated_request(Method::POST, OTP_PATH, Some(&OtpCodeRequest { code }))
            .await?;

        tracing::info!("OTP code accepted");
        Ok(())
    }

    pub async fn is_new_user(&self) -> bool {
        self.client.session().is_new_user().await
    }

    pub async fn next_step(&self) -> TwoFactorStep {
        if self.is_new_user().await {
            TwoFactorStep::Enroll
        } else {
            TwoFactorStep::Verify
        }
    }
}
