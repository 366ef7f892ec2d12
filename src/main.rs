//! ncbridge - macOS Notification Center to webhook bridge.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ncbridge::config::{BridgeConfig, ConfigLoader};
use ncbridge::db::{self, DbError, RecordReader};
use ncbridge::sink::WebhookSink;
use ncbridge::state::{self, CursorStore};
use ncbridge::watcher::WalWatcher;

#[derive(Parser)]
#[command(
    name = "ncbridge",
    about = "Forward macOS Notification Center messages to a webhook",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file path (default: .ncbridge.toml, then ~/.config/ncbridge/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cursor file location (overrides the config file)
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Log payloads instead of POSTing them
    #[arg(long)]
    dry_run: bool,

    /// Run a single capture pass and exit
    #[arg(long)]
    once: bool,
}

fn init_tracing(verbosity: u8, config_level: &str) {
    let level = match verbosity {
        0 => config_level,
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path.clone()),
        None => ConfigLoader::new(),
    };
    let config = match loader.load() {
        Ok(config) => config,
        Err(err) => {
            // Tracing is not up yet; config errors go straight to stderr.
            eprintln!("ncbridge: {err}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(cli.verbose, &config.log_level);

    if let Err(err) = config.validate() {
        tracing::error!(error = %err, "invalid configuration");
        tracing::error!("Set webhook_url in .ncbridge.toml or ~/.config/ncbridge/config.toml");
        return ExitCode::FAILURE;
    }

    run(cli, config).await
}

async fn run(cli: Cli, config: BridgeConfig) -> ExitCode {
    let paths = match db::detect_db_paths(config.db_path.as_deref()) {
        Ok(paths) => paths,
        Err(err) => {
            tracing::error!(error = %err, "notification database not found");
            tracing::error!(
                "This bridge requires macOS with an active Notification Center database \
                 (Sequoia and later keep it under \
                 ~/Library/Group Containers/group.com.apple.usernoted/db2/db)"
            );
            return ExitCode::FAILURE;
        }
    };

    let conn = match db::open_validated(&paths.db) {
        Ok(conn) => conn,
        Err(err @ DbError::ReadDenied { .. }) => {
            tracing::error!(error = %err, "cannot read the notification database");
            tracing::error!("Full Disk Access is required:");
            tracing::error!("  1. Open System Settings > Privacy & Security > Full Disk Access");
            tracing::error!("  2. Add your terminal app (Terminal.app, iTerm2, ...)");
            tracing::error!("  3. Restart the bridge");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to open the notification database");
            return ExitCode::FAILURE;
        }
    };
    let reader = RecordReader::new(conn);

    let state_path = cli
        .state_file
        .clone()
        .or_else(|| config.state_path.clone())
        .unwrap_or_else(state::default_state_path);
    let store = CursorStore::new(state_path);

    let persisted = store.load();
    let current_max = match reader.max_rec_id().await {
        Ok(max) => max,
        Err(err) => {
            tracing::error!(error = %err, "failed to read the record high-water mark");
            return ExitCode::FAILURE;
        }
    };
    let last_rec_id = state::reconcile(persisted, current_max);

    tracing::info!(
        db = %paths.db.display(),
        state = %store.path().display(),
        last_rec_id,
        dry_run = cli.dry_run,
        "notification bridge starting"
    );

    let sink = WebhookSink::new(
        config.webhook_url.clone(),
        config.request_timeout(),
        cli.dry_run,
    );
    let mut watcher = WalWatcher::new(
        reader,
        store,
        sink,
        config.allowed_apps.clone(),
        paths.wal.clone(),
        config.poll_interval(),
        last_rec_id,
    );

    if cli.once {
        watcher.run_pass().await;
        return ExitCode::SUCCESS;
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            signal_cancel.cancel();
        }
    });

    watcher.run(cancel).await;
    ExitCode::SUCCESS
}
