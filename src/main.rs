mod api;
mod cli;
mod config;
mod dashboard;
mod db;
mod error;
mod inbox;
mod model;
mod session;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command, RequestsCommand};

use crate::api::auth::AuthClient;
use crate::api::http::HttpConsentApi;
use crate::inbox::Inbox;
use crate::inbox::flow::ConsentFlow;
use crate::session::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let settings = cli.settings()?;

    // Tokens live in the local database across runs
    let db = Arc::new(db::Database::open(&settings.db_path)?);
    let session = Session::load(db);

    let auth = || AuthClient::new(&settings.auth_url, session.clone(), settings.timeout);
    let consent_flow = || -> anyhow::Result<ConsentFlow> {
        if !session.is_authenticated() {
            tracing::warn!("No stored session; run `fintrust login` first");
        }
        let api = HttpConsentApi::new(&settings.api_url, session.clone(), settings.timeout)?;
        Ok(ConsentFlow::new(Inbox::new(Arc::new(api))))
    };

    match cli.command {
        Command::Login { email, password } => cli::auth::login(&auth()?, &email, password).await?,
        Command::Register {
            email,
            username,
            password,
        } => cli::auth::register(&auth()?, &email, &username, password).await?,
        Command::Logout => cli::auth::logout(&session),
        Command::Oauth { wait } => cli::auth::oauth(&auth()?, wait).await?,
        Command::Requests { command } => {
            let mut flow = consent_flow()?;
            match command {
                RequestsCommand::List { format } => cli::requests::list(&mut flow, format).await?,
                RequestsCommand::Show { id } => cli::requests::show(&mut flow, &id).await?,
                RequestsCommand::Accept { id, fields } => {
                    cli::requests::accept(&mut flow, &id, &fields).await?
                }
                RequestsCommand::Reject { id } => cli::requests::reject(&mut flow, &id).await?,
                RequestsCommand::Delete { id } => cli::requests::delete(&mut flow, &id).await?,
            }
        }
        Command::Inbox => cli::inbox::run(&mut consent_flow()?).await?,
        Command::Dashboard { format, output } => {
            cli::dashboard::show_dashboard(&format, output.as_deref())?
        }
    }

    Ok(())
}
