use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input};
use std::io::Write;
use std::path::PathBuf;

use crate::auth::{DEFAULT_LOGOUT_PATH, DEFAULT_REFRESH_PATH};

/// ft-auth - OAuth, JWT session and OTP client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the authentication service
    #[arg(short = 'u', long, env = "AUTH_URL")]
    pub auth_url: Option<String>,

    /// Application root URL (a redirect to exactly this URL carries no code)
    #[arg(long, env = "APP_ROOT_URL", default_value = "https://localhost/")]
    pub root_url: String,

    /// Path to the persisted session file
    #[arg(short = 's', long, env = "SESSION_FILE")]
    pub session_file: Option<String>,

    /// Refresh endpoint path, relative to the auth URL
    #[arg(long, env = "REFRESH_PATH", default_value = DEFAULT_REFRESH_PATH)]
    pub refresh_path: String,

    /// Logout endpoint path, relative to the auth URL
    #[arg(long, env = "LOGOUT_PATH", default_value = DEFAULT_LOGOUT_PATH)]
    pub logout_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "30")]
    pub connect_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "60")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Exchange the authorization code carried by an OAuth redirect URL
    Login {
        /// Full URL the identity provider redirected to
        redirect_url: String,
    },

    /// Register an OTP identity and print its provisioning URL
    Enroll {
        /// OTP identity name (prompted if omitted)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show the enrolled OTP identity
    Identity,

    /// Verify an OTP code
    Verify {
        /// Six-digit code (prompted if omitted)
        #[arg(short, long)]
        code: Option<String>,
    },

    /// Revoke the session and forget stored tokens
    Logout,

    /// Show the local session state
    Status,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Remote service
    pub auth_url: String,
    pub refresh_path: String,
    pub logout_path: String,

    // Application
    pub root_url: String,

    // Session persistence
    pub session_file: PathBuf,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let command = args.command.clone();
        Ok((Self::from_args(args)?, command))
    }

    /// Build configuration from parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let auth_url = args
            .auth_url
            .or_else(|| std::env::var("AUTH_URL").ok())
            .context("AUTH_URL is required (use -u or set AUTH_URL env var)")?;

        let session_file = args
            .session_file
            .map(|s| expand_tilde(&s))
            .unwrap_or_else(default_session_file);

        Ok(Config {
            auth_url,
            refresh_path: args.refresh_path,
            logout_path: args.logout_path,
            root_url: args.root_url,
            session_file,
            http_connect_timeout: args.connect_timeout,
            http_request_timeout: args.http_timeout,
            log_level: args.log_level,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("AUTH_URL", &self.auth_url), ("APP_ROOT_URL", &self.root_url)] {
            let url = url::Url::parse(value)
                .with_context(|| format!("{} is not a valid URL: {}", name, value))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!("{} must use http or https: {}", name, value);
            }
        }

        if self.http_connect_timeout == 0 || self.http_request_timeout == 0 {
            anyhow::bail!("HTTP timeouts must be greater than zero");
        }

        Ok(())
    }
}

/// Default session file under the user config directory
fn default_session_file() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("ft-auth").join("session.json"))
        .unwrap_or_else(|| PathBuf::from(".ft-auth-session.json"))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// === Interactive Setup ===

/// Check if interactive setup is needed (no .env file and no AUTH_URL)
pub fn needs_interactive_setup() -> bool {
    let env_file_exists = std::path::Path::new(".env").exists();
    let has_auth_url = std::env::var("AUTH_URL").is_ok();

    !env_file_exists && !has_auth_url
}

/// Prompt for the auth service location and optionally save it to .env
pub fn run_interactive_setup() -> Result<InteractiveConfig> {
    println!();
    println!("No configuration found. Let's point ft-auth at your auth service.");
    println!();

    let auth_url: String = Input::new()
        .with_prompt("Authentication service URL (AUTH_URL)")
        .default("https://localhost/api/auth/".to_string())
        .interact_text()
        .context("Failed to read AUTH_URL")?;

    let root_url: String = Input::new()
        .with_prompt("Application root URL (APP_ROOT_URL)")
        .default("https://localhost/".to_string())
        .interact_text()
        .context("Failed to read APP_ROOT_URL")?;

    let config = InteractiveConfig { auth_url, root_url };

    let save_to_env = Confirm::new()
        .with_prompt("Save configuration to .env file?")
        .default(true)
        .interact()
        .context("Failed to read save confirmation")?;

    if save_to_env {
        save_env_file(&config)?;
        println!("✅ Configuration saved to .env file");
    }

    Ok(config)
}

/// Configuration collected from interactive setup
#[derive(Debug, Clone)]
pub struct InteractiveConfig {
    pub auth_url: String,
    pub root_url: String,
}

/// Save configuration to .env file
fn save_env_file(config: &InteractiveConfig) -> Result<()> {
    let env_content = format!(
        r#"# ft-auth Configuration
# Generated by interactive setup

# Authentication service base URL (required)
AUTH_URL={}

# Application root URL
APP_ROOT_URL={}

# Logging (trace, debug, info, warn, error)
LOG_LEVEL=info
"#,
        config.auth_url, config.root_url,
    );

    let mut file = std::fs::File::create(".env").context("Failed to create .env file")?;
    file.write_all(env_content.as_bytes())
        .context("Failed to write .env file")?;

    Ok(())
}
