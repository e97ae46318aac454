//! CLI commands for chatrelay using clap.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::backend::create_backend;
use crate::config::Settings;
use crate::core::identity::normalize;
use crate::daemon::run_relay_daemon;

/// chatrelay - per-conversation chat relay to an HTTP backend.
#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(version)]
#[command(about = "Relay chat messages to a backend service, one conversation at a time", long_about = None)]
pub struct Commands {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the relay daemon
    Serve {
        /// Port for the webhook/health server
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },

    /// Send one message straight to the backend and print the reply
    Send {
        /// Sender identifier to relay as
        #[arg(long, default_value = "cli")]
        from: String,

        /// Message to send
        message: String,
    },

    /// Show effective configuration (secrets redacted)
    Config,
}

impl Commands {
    /// Run the command against already loaded settings.
    pub async fn run(self, mut settings: Settings) -> Result<()> {
        match self.command {
            Command::Serve { port } => {
                if let Some(port) = port {
                    settings.server.port = port;
                }
                run_relay_daemon(settings).await?;
            }
            Command::Send { from, message } => {
                let backend = create_backend(&settings).context("Backend is not configured")?;
                let reply = backend
                    .relay(normalize(&from), &message)
                    .await
                    .context("Backend call failed")?;
                println!("{}", reply);
            }
            Command::Config => {
                println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
            }
        }
        Ok(())
    }
}
