// ft-auth client - library root

pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod two_factor;

pub use auth::{AuthSession, OAuthExchanger, Session, TokenPair, TokenStore};
pub use error::{AuthError, Result};
pub use http_client::SessionClient;
pub use two_factor::{TwoFactorFlow, TwoFactorStep};
