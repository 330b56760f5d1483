mod backend;
mod config;
mod oneshot;
mod serve;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::GatehouseConfig;

#[derive(Parser)]
#[command(
    name = "gatehouse",
    version,
    about = "Cookie gate and snapshot backups in front of a single-tenant file service",
    long_about = "All settings come from the environment: AUTH_PASS, WEBDAV_URL, \
                  WEBDAV_USERNAME, WEBDAV_PASSWORD, WEBDAV_BACKUP_PATH, SYNC_INTERVAL, \
                  BACKUP_WARMUP, REMOTE_TIMEOUT, GATE_LISTEN, BACKEND_ADDR, DATA_DIR, \
                  BACKEND_BIN, BACKEND_ARGS."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Restore, start the backend and backup worker, serve the gate (default).
    Serve,
    /// Restore the newest remote snapshot into DATA_DIR and exit.
    Restore,
    /// Run one backup cycle and exit.
    BackupNow,
    /// Print the effective configuration as JSON, secrets redacted.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = GatehouseConfig::from_env().context("invalid configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve::run(config).await,
        Command::Restore => oneshot::restore(&config).await,
        Command::BackupNow => oneshot::backup_now(&config).await,
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config.summary())?);
            Ok(())
        }
    }
}
