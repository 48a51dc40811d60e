//! # SendLoop
//!
//! Scheduled WhatsApp reminder dispatcher. Polls a Google Sheet acting as a
//! message queue, sends due reminders through the WhatsApp Business Cloud
//! API with bounded retries, writes each outcome back to the sheet, and
//! serves a small operational API.
//!
//! Usage:
//!   sendloop                         # Start scheduler + API (default port 5000)
//!   sendloop --config ./dev.toml     # Custom config file
//!   sendloop --once                  # Run a single check pass and exit

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sendloop_core::SendLoopConfig;
use sendloop_core::traits::{MessageSender, RecordStore};
use sendloop_gateway::AppState;
use sendloop_scheduler::SchedulerEngine;
use sendloop_sheets::GoogleSheetsStore;
use sendloop_whatsapp::{MessageLog, WhatsAppClient};

#[derive(Parser)]
#[command(
    name = "sendloop",
    version,
    about = "📤 SendLoop — scheduled WhatsApp reminder dispatcher"
)]
struct Cli {
    /// Config file path (default: $SENDLOOP_CONFIG or ~/.sendloop/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the operational API port
    #[arg(short, long)]
    port: Option<u16>,

    /// Run exactly one check pass and exit (diagnostic)
    #[arg(long)]
    once: bool,

    /// Serve the API without arming the scheduler timers
    #[arg(long)]
    no_scheduler: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn config_path(cli_path: Option<&str>) -> PathBuf {
    if let Some(p) = cli_path {
        return PathBuf::from(shellexpand::tilde(p).to_string());
    }
    std::env::var("SENDLOOP_CONFIG")
        .map(|p| PathBuf::from(shellexpand::tilde(&p).to_string()))
        .unwrap_or_else(|_| SendLoopConfig::default_path())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "debug,hyper=info,reqwest=info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Load configuration
    let path = config_path(cli.config.as_deref());
    let mut config = if path.exists() {
        tracing::info!("📋 Loading config from {}", path.display());
        SendLoopConfig::load_from(&path)?
    } else {
        tracing::warn!(
            "⚠️ No config file at {} — starting with defaults",
            path.display()
        );
        SendLoopConfig::default()
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // Wire the pipeline: sheet store → scheduler engine → delivery client
    let log = Arc::new(MessageLog::new(config.log.capacity));
    let store: Arc<dyn RecordStore> = Arc::new(GoogleSheetsStore::new(config.sheets.clone()));
    let sender: Arc<dyn MessageSender> =
        Arc::new(WhatsAppClient::new(config.whatsapp.clone(), log.clone()));
    let engine = Arc::new(SchedulerEngine::new(
        store.clone(),
        sender.clone(),
        &config.scheduler,
    ));

    if cli.once {
        engine.trigger_check().await;
        let status = engine.status();
        tracing::info!(
            "✅ Check pass complete (sent: {}, failed: {})",
            status.sent_count,
            status.failed_count
        );
        return Ok(());
    }

    if cli.no_scheduler {
        tracing::warn!("⚠️ Scheduler timers not armed (--no-scheduler)");
    } else {
        engine.start();
    }

    let state = AppState {
        engine,
        log,
        sender,
        store,
        start_time: std::time::Instant::now(),
    };
    sendloop_gateway::start(&config.server, state).await
}
