//! archival-auth command-line driver.
//!
//! Signs in, issues authenticated requests and checks route access against a
//! media archival server, keeping the session in the user's data directory.

#![deny(clippy::all)]

use archival_auth::http::ApiRequest;
use archival_auth::router::navigator::LogNavigator;
use archival_auth::router::GuardDecision;
use archival_auth::{ApiError, AppError, Config, FileStore, Session};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "archival-auth", version, about = "Media archival session client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session token.
    Login { username: String, password: String },
    /// GET an API path with the stored session and print the body.
    Get { path: String },
    /// Check whether a route may be entered.
    Navigate { route: String },
    /// Revoke the session.
    Logout,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything else
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            let err = AppError::Config(format!("{:#}", e));
            eprintln!("{}\n{}", describe(&err), err);
            eprintln!("\nSet ARCHIVAL_API_BASE_URL=<server>/api to point at your server.");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    info!("Starting {} v{}", config.app.name, config.app.version);

    if let Err(e) = run(cli.command, &config).await {
        error!("{}", e);
        eprintln!("{}", describe(&e));
        std::process::exit(1);
    }
}

/// Initialize tracing/logging.
fn init_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Message shown to the user for a failed command.
fn describe(err: &AppError) -> String {
    if err.requires_sign_out() {
        format!("{} The stored session was cleared.", err.user_message())
    } else {
        err.user_message().to_string()
    }
}

async fn run(command: Command, config: &Config) -> Result<(), AppError> {
    let store = FileStore::in_data_dir(&config.store.file_name, config.store.key.clone())?;
    let session = Session::new(config, Arc::new(store), Arc::new(LogNavigator))?;

    match command {
        Command::Login { username, password } => {
            session.login(&username, &password).await?;
            println!("Signed in as {}", username);
        }
        Command::Get { path } => {
            let response = session.api().send(ApiRequest::get(path)).await?;
            let body = response.text().await.map_err(ApiError::from)?;
            println!("{}", body);
        }
        Command::Navigate { route } => match session.navigate(&route).await {
            GuardDecision::Proceed(path) => println!("allowed: {}", path),
            GuardDecision::Redirect(path) => println!("redirect: {}", path),
            // LogNavigator has already reported the login redirect.
            GuardDecision::Abort => println!("aborted"),
        },
        Command::Logout => {
            session.logout().await;
            println!("Signed out");
        }
    }

    Ok(())
}
