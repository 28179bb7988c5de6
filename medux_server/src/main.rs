//! `medux`: management commands for the MedUX EMR server.
//!
//! Typical first run:
//!
//! ```text
//! cp medux.toml.example medux.toml
//! medux migrate
//! medux createsuperuser
//! medux runserver
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use medux_server::commands::{self, SuperuserArgs};
use medux_server::config::Settings;

#[derive(Parser)]
#[command(name = "medux", version, about = "MedUX Electronic Medical Record server")]
struct Cli {
    /// Settings file (defaults to ./medux.toml)
    #[arg(long, global = true, env = "MEDUX_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate {
        /// Only list migrations and whether they are applied
        #[arg(long)]
        plan: bool,
    },
    /// Create an administrator account with every permission
    Createsuperuser {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Do not prompt; the password is read from MEDUX_SUPERUSER_PASSWORD
        #[arg(long)]
        noinput: bool,
    },
    /// Start the HTTP server
    Runserver {
        /// Listen address (defaults to `listen` from the settings)
        addr: Option<SocketAddr>,
    },
    /// Drop all MedUX tables so the database can be rebuilt from scratch
    Resetdb {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Check settings and database state
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }

    let cli = Cli::parse();
    let settings = Settings::load(cli.settings.as_deref())?;

    match cli.command {
        Command::Migrate { plan } => commands::migrate(&settings, plan).await,
        Command::Createsuperuser {
            username,
            email,
            noinput,
        } => {
            commands::createsuperuser(
                &settings,
                SuperuserArgs {
                    username,
                    email,
                    noinput,
                },
            )
            .await
        }
        Command::Runserver { addr } => commands::runserver(settings, addr).await,
        Command::Resetdb { yes } => commands::resetdb(&settings, yes).await,
        Command::Check => commands::check(&settings).await,
    }
}
