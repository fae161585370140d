//! tgsession - create, store and reuse messaging-account session strings.
//!
//! An interactive menu walks the operator through phone-number login,
//! prints the exported session string and keeps named copies on disk.

mod app;
mod console;
mod ui;
mod utils;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tgsession_core::auth::interrupt_channel;
use tgsession_core::Config;

use app::App;
use ui::render;

/// Log file name prefix inside the log directory
const LOG_FILE_PREFIX: &str = "tgsession.log";

/// Initialize the tracing subscriber for logging
///
/// Logs go to a daily rolling file so they never interleave with the menu.
/// Use RUST_LOG to control the level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

async fn run() -> Result<()> {
    let config = Config::load_or_default();

    let (interrupt_tx, interrupt_rx) = interrupt_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            if interrupt_tx.send(true).is_err() {
                break;
            }
        }
    });

    let mut app = App::new(config, interrupt_rx)?;
    app.run().await
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let log_dir = Config::log_dir()
        .and_then(|dir| std::fs::create_dir_all(&dir).map(|_| dir).map_err(Into::into))
        .ok();
    let guard = init_tracing(log_dir);
    info!("tgsession starting");

    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            warn!(error = %e, "Exiting with error");
            render::failure(&format!("Error: {:#}", e));
            1
        }
    };

    info!("tgsession exiting");
    drop(guard);
    // An abandoned stdin read would otherwise keep the runtime from shutting down
    std::process::exit(code);
}
