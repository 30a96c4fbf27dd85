//! Lodgebook - lodge events, RSVPs and meetings from the terminal.

mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use lodgebook_core::{BackendConfig, Config, LodgeError};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{App, Cli, Command};

// ============================================================================
// Constants
// ============================================================================

const LOG_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "lodgebook.log";

/// Initialize logging: a daily file in the cache directory, plus stderr
/// when `verbose` is set. `RUST_LOG` controls the level (default warn).
fn init_tracing(cache_dir: &Path, verbose: bool) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_appender = tracing_appender::rolling::daily(cache_dir.join(LOG_DIR), LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(verbose.then(|| fmt::layer().with_writer(io::stderr)))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let cache_dir = Config::cache_dir()?;
    let guard = init_tracing(&cache_dir, cli.verbose);
    info!("lodgebook starting");

    let result = run(cli.command, cache_dir).await;
    drop(guard);

    if let Err(e) = result {
        match e.downcast_ref::<LodgeError>() {
            Some(lodge_error) => {
                eprintln!("{}", lodge_error.user_message());
                if lodge_error.returns_to_sign_in() {
                    eprintln!("Run `lodgebook login` to sign in.");
                }
            }
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Command, cache_dir: std::path::PathBuf) -> Result<()> {
    let backend = BackendConfig::from_env()?;
    let config = Config::load().unwrap_or_default();
    let mut app = App::new(&backend, config, cache_dir)?;
    app.execute(command).await
}
