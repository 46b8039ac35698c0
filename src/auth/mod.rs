// Authentication module
// Token lifecycle: code exchange, storage, refresh and teardown

mod endpoints;
mod oauth;
mod persistence;
mod refresh;
mod session;
mod store;
mod terminator;
mod types;

pub use endpoints::{Endpoints, DEFAULT_LOGOUT_PATH, DEFAULT_REFRESH_PATH};
pub use oauth::{extract_code, has_pending_exchange, sanitize_url, OAuthExchanger};
pub use persistence::{FilePersistence, MemoryPersistence, TokenPersistence};
pub use session::AuthSession;
pub use store::{RequestOptions, TokenStore};
pub use terminator::{ClearSession, SessionTerminator, TerminationReason};
pub use types::{AuthorizationCode, Session, TokenPair, EXPIRY_SENTINEL};

pub(crate) use types::{
    OtpCodeRequest, OtpEnrollmentResponse, OtpIdentityRequest, OtpIdentityResponse,
};
