use anyhow::{Context, Result};
use dialoguer::Input;
use std::sync::Arc;

use ft_auth_client::auth::{extract_code, sanitize_url, AuthSession, OAuthExchanger, Session};
use ft_auth_client::config::{self, Command, Config};
use ft_auth_client::{AuthError, SessionClient, TwoFactorFlow, TwoFactorStep};

#[tokio::main]
async fn main() -> Result<()> {
    // Check if interactive setup is needed (no .env and no AUTH_URL)
    if config::needs_interactive_setup() {
        let interactive_config = config::run_interactive_setup()?;

        // Set environment variables so Config::load() can use them
        std::env::set_var("AUTH_URL", &interactive_config.auth_url);
        std::env::set_var("APP_ROOT_URL", &interactive_config.root_url);
    }

    // Load configuration first (for log level)
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let session = AuthSession::from_config(&config)?;
    tracing::debug!("Auth service: {}", session.endpoints().base());
    let client = Arc::new(SessionClient::new(session.clone()));

    let result = run(command, &config, session, client).await;

    // A dead session is surfaced to the user the same way on every path
    if let Err(ref e) = result {
        if let Some(auth_err) = e.downcast_ref::<AuthError>() {
            if auth_err.is_terminal_session_failure() {
                eprintln!("❌ {}", auth_err);
                eprintln!("   Session ended. Log in again with: ft-auth login <redirect-url>");
            }
        }
    }

    result
}

async fn run(
    command: Command,
    config: &Config,
    session: Arc<AuthSession>,
    client: Arc<SessionClient>,
) -> Result<()> {
    match command {
        Command::Login { redirect_url } => {
            let exchanger = OAuthExchanger::new(session.clone(), config.root_url.clone());
            if !exchanger.has_pending_exchange(&redirect_url) {
                println!("No authorization code in {}; start the OAuth redirect first.", redirect_url);
                return Ok(());
            }

            let code = extract_code(&redirect_url);
            let (_, is_new) = exchanger.exchange(&code).await?;

            println!("✅ Logged in");
            println!("Sanitized URL: {}", sanitize_url(&redirect_url));

            let flow = TwoFactorFlow::new(client);
            match flow.next_step().await {
                TwoFactorStep::Enroll => println!("Next: register an OTP identity with `ft-auth enroll`"),
                TwoFactorStep::Verify => println!("Next: verify your OTP code with `ft-auth verify`"),
            }
            tracing::debug!(is_new, "Login complete");
        }

        Command::Enroll { name } => {
            let name = match name {
                Some(name) => name,
                None => Input::new()
                    .with_prompt("OTP identity name")
                    .interact_text()
                    .context("Failed to read OTP identity name")?,
            };

            let flow = TwoFactorFlow::new(client);
            let url = flow.register_identity(&name).await?;
            println!("Provisioning URL (scan as QR code):");
            println!("{}", url);
        }

        Command::Identity => {
            let flow = TwoFactorFlow::new(client);
            let name = flow.fetch_identity().await?;
            println!("Enrolled OTP identity: {}", name);
        }

        Command::Verify { code } => {
            let code = match code {
                Some(code) => code,
                None => Input::new()
                    .with_prompt("OTP code")
                    .interact_text()
                    .context("Failed to read OTP code")?,
            };

            let flow = TwoFactorFlow::new(client);
            match flow.verify_code(code.trim()).await {
                Ok(()) => println!("✅ OTP code accepted"),
                Err(AuthError::Rejected { message, .. }) => {
                    println!("❌ OTP code rejected: {}", message);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::Logout => {
            if let Err(e) = client.logout().await {
                tracing::warn!("Remote logout failed, local session cleared anyway: {}", e);
            }
            println!("Logged out");
        }

        Command::Status => match session.store().session().await {
            Session::Authenticated(pair) => {
                println!(
                    "Authenticated (token: {}...)",
                    pair.access_token.chars().take(8).collect::<String>()
                );
            }
            Session::Unauthenticated => println!("Not authenticated"),
        },
    }

    Ok(())
}
