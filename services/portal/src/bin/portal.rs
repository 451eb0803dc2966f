//! services/portal/src/bin/portal.rs

use clap::{Parser, Subcommand};
use pcas_core::domain::LoginRequest;
use pcas_core::sections::Section;
use portal_lib::{
    config::Config,
    error::PortalError,
    store::{Portal, ServerStatus},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line client for the application portal API.
#[derive(Parser)]
#[command(name = "portal", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check the API liveness endpoint.
    Health,
    /// Sign in and store the credential in the local cache.
    Login { email: String, password: String },
    /// Show the signed-in user.
    Me,
    /// Show which application sections are filled in.
    Status,
    /// Sign out and purge cached form data.
    Logout,
}

#[tokio::main]
async fn main() -> Result<(), PortalError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    let cli = Cli::parse();

    // --- 2. Build the Stores ---
    let portal = Portal::from_config(config)?;
    portal.session.initialize_auth();
    info!("Configuration loaded.");

    // --- 3. Run the Command ---
    match cli.command {
        Command::Health => match portal.server_status().await {
            ServerStatus::Online => println!("online"),
            ServerStatus::Offline(reason) => println!("offline: {}", reason),
        },
        Command::Login { email, password } => {
            let user = portal
                .session
                .login(&LoginRequest { email, password })
                .await?;
            println!("Signed in as {} <{}>", user.full_name, user.email);
        }
        Command::Me => {
            let user = portal.session.get_current_user().await?;
            println!("{} <{}> ({})", user.full_name, user.email, user.role);
        }
        Command::Status => {
            portal.session.get_current_user().await?;
            portal.application.fetch_all().await?;
            let status = portal.application.completion_status();
            for section in Section::ALL {
                let mark = if status.get(section) { "x" } else { " " };
                println!("[{}] {}", mark, section.label());
            }
            println!("{}% complete", status.percentage());
        }
        Command::Logout => {
            if let Err(e) = portal.session.logout().await {
                println!("Server logout failed ({}); local session cleared.", e);
            } else {
                println!("Signed out.");
            }
        }
    }

    Ok(())
}
