use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod logging;

/// Real-time threaded chat server.
#[derive(Parser, Debug)]
#[command(name = "superchat", version)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, global = true, default_value = "superchat.toml", env = "SUPERCHAT_CONFIG")]
    pub config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub debug: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the server (TCP, SSH, and WebSocket listeners).
    Run,
    /// Validate the configuration file without starting any listener.
    Check,
    /// Probe a running server's TCP listener.
    Healthcheck,
    /// Create a registered user, or reset an existing one's password.
    CreateUser {
        nickname: String,
        #[arg(long)]
        password: Option<String>,
        /// Grant the admin flag.
        #[arg(long)]
        admin: bool,
    },
    /// Hash a password the same way registration does, without touching the database.
    HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli)?;

    match &cli.command {
        Commands::Run => match commands::run::command(&cli.config).await {
            Ok(()) => Ok(()),
            Err(failure) => {
                let code = failure.exit_code();
                let error = failure.into_error();
                tracing::error!(%error, "server exited");
                std::process::exit(code);
            }
        },
        Commands::Check => match commands::check::command(&cli.config) {
            Ok(()) => Ok(()),
            Err(error) => {
                tracing::error!(%error, "configuration check failed");
                std::process::exit(1);
            }
        },
        Commands::Healthcheck => match commands::healthcheck::command(&cli.config).await {
            Ok(()) => Ok(()),
            Err(error) => {
                tracing::error!(%error, "healthcheck failed");
                std::process::exit(1);
            }
        },
        Commands::CreateUser { nickname, password, admin } => {
            let password = match password {
                Some(p) => p.clone(),
                None => dialoguer::Password::new()
                    .with_prompt("Password")
                    .with_confirmation("Confirm password", "passwords didn't match")
                    .interact()?,
            };
            commands::create_user::command(&cli.config, nickname, &password, *admin).await
        }
        Commands::HashPassword => commands::hash::command(),
    }
}
