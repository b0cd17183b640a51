use anyhow::Result;
use clipkeep_core::crypto::load_or_create_key_file;
use clipkeep_core::platform::{
    ensure_config_dir, get_archive_db_path, get_history_db_path, get_settings_key_path,
    get_settings_path,
};
use clipkeep_core::sync::DirectoryRemote;
use clipkeep_core::{
    ensure_data_dir, ArchiveStore, HistoryStore, RetentionEngine, RetentionPolicy, Settings,
    SyncEngine, TokenKey,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Apply the retention policy on startup and then every `interval`.
///
/// The policy is re-read from `settings_path` before each pass.
async fn run_retention(
    engine: RetentionEngine,
    settings_path: PathBuf,
    settings_key: TokenKey,
    mut policy: RetentionPolicy,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                policy = RetentionPolicy::reload(&settings_path, Some(&settings_key), &policy);
                if let Err(e) = engine.run_pass(&policy) {
                    error!("Retention pass failed: {}", e);
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting clipkeep daemon v{}", VERSION);

    ensure_data_dir()?;
    ensure_config_dir()?;
    let settings_key = load_or_create_key_file(&get_settings_key_path())?;
    let settings = Settings::load(&get_settings_path(), Some(&settings_key))?;

    let history = HistoryStore::open(get_history_db_path())?;
    let archive = ArchiveStore::open(get_archive_db_path())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let policy = RetentionPolicy::from_settings(&settings);
    info!(
        "Retention: {} after {} days, checked every {}s",
        policy.mode, policy.threshold_days, settings.retention_interval_secs
    );
    let retention_handle = tokio::spawn(run_retention(
        RetentionEngine::new(history.clone(), archive),
        get_settings_path(),
        settings_key.clone(),
        policy,
        Duration::from_secs(settings.retention_interval_secs.max(1)),
        shutdown_rx.clone(),
    ));

    let sync_handle = match (settings.sync_enabled, settings.sync_dir.as_ref()) {
        (true, Some(dir)) => {
            info!("Syncing with {:?} every {}s", dir, settings.sync_interval_secs);
            let engine = SyncEngine::new(history.clone(), Arc::new(DirectoryRemote::new(dir)));
            let interval = Duration::from_secs(settings.sync_interval_secs.max(1));
            let rx = shutdown_rx.clone();
            Some(tokio::spawn(async move { engine.run_periodic(interval, rx).await }))
        }
        (true, None) => {
            error!("sync_enabled is set but no sync_dir is configured; sync disabled");
            None
        }
        _ => None,
    };

    info!("Daemon ready. Press Ctrl+C to exit.");

    // Wait for shutdown signal
    signal::ctrl_c().await?;
    info!("Received shutdown signal");
    shutdown_tx.send(true)?;

    retention_handle.await?;
    if let Some(handle) = sync_handle {
        handle.await?;
    }

    info!("Daemon stopped");
    Ok(())
}
