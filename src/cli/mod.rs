pub mod auth;
pub mod console;
pub mod dashboard;
pub mod inbox;
pub mod requests;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{self, Settings};
use crate::dashboard::DashboardFormat;
use crate::error::ConsentError;

#[derive(Parser)]
#[command(
    name = "fintrust",
    version,
    about = "Review and answer third-party requests for access to your financial data"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Base URL of the consent API
    #[arg(long, env = "FINTRUST_API_URL", default_value = config::DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Base URL of the authentication service
    #[arg(long, env = "FINTRUST_AUTH_URL", default_value = config::DEFAULT_AUTH_URL, global = true)]
    pub auth_url: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "FINTRUST_TIMEOUT_SECS", default_value_t = config::DEFAULT_TIMEOUT_SECS, global = true)]
    pub timeout: u64,

    /// Path of the local session database
    #[arg(long, env = "FINTRUST_DB", global = true)]
    pub db: Option<PathBuf>,
}

impl Cli {
    pub fn settings(&self) -> anyhow::Result<Settings> {
        Settings::new(&self.api_url, &self.auth_url, self.timeout, self.db.clone())
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long, env = "FINTRUST_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        /// Prompted for (twice) when omitted
        #[arg(long, env = "FINTRUST_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session tokens
    Logout,
    /// Sign in through the browser with Google
    Oauth {
        /// Poll /api/auth/me until the auth service recognizes this client.
        /// The browser's session cookie is not shared with the CLI, so this
        /// only succeeds when the service also issues tokens to this client;
        /// otherwise it gives up after about two minutes.
        #[arg(long)]
        wait: bool,
    },
    /// Work with pending data-access requests
    Requests {
        #[command(subcommand)]
        command: RequestsCommand,
    },
    /// Interactive session over the request list
    Inbox,
    /// Show the analytics dashboard
    Dashboard {
        /// Output format
        #[arg(long, default_value = "terminal", value_parser = ["terminal", "json", "html"])]
        format: String,
        /// Output file path (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum RequestsCommand {
    /// List requests from the server
    List {
        #[arg(long, value_enum, default_value_t = ListFormat::Table)]
        format: ListFormat,
    },
    /// Show one request with its details and fields
    Show { id: String },
    /// Grant consent, then submit any requested fields
    Accept {
        id: String,
        /// Field value as key=value (repeatable)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },
    /// Decline a request
    Reject { id: String },
    /// Remove a request permanently
    Delete { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Table,
    Json,
}

pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing field key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Print a failed action, with a hint when the server refused the session.
pub fn report_error(err: &anyhow::Error) {
    println!("Error: {err}");
    if let Some(hint) = err.downcast_ref::<ConsentError>().and_then(session_hint) {
        println!("{hint}");
    }
}

fn session_hint(err: &ConsentError) -> Option<&'static str> {
    match err.status()? {
        401 | 403 => Some("The session was refused; run `fintrust login` again."),
        _ => None,
    }
}

pub fn parse_dashboard_format(raw: &str) -> anyhow::Result<DashboardFormat> {
    raw.parse().map_err(|e: String| anyhow::anyhow!(e))
}
