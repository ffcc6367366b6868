use mimalloc::MiMalloc;
use modules::{
    account::entity::MailAccount,
    common::{rustls::RustMailerTls, signal::SignalManager},
    context::Initialize,
    database::manager::DatabaseManager,
    error::RustMailerResult,
    jobs::{
        entity::{JobKind, JobPayload},
        JobOrchestrator,
    },
    logger,
    settings::{cli::SETTINGS, dir::DataDirManager},
    store::StoreGateway,
};
use tracing::{info, warn};

use crate::rustmailer_version;

mod modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

static LOGO: &str = r#"
  __  __       _ _      _             _     _
 |  \/  | __ _(_) |    / \   _ __ ___| |__ (_)_   _____ _ __
 | |\/| |/ _` | | |   / _ \ | '__/ __| '_ \| \ \ / / _ \ '__|
 | |  | | (_| | | |  / ___ \| | | (__| | | | |\ V /  __/ |
 |_|  |_|\__,_|_|_| /_/   \_\_|  \___|_| |_|_| \_/ \___|_|

"#;

#[tokio::main]
async fn main() -> RustMailerResult<()> {
    logger::initialize_logging();
    info!("{}", LOGO);
    info!("Starting mail-archiver");
    info!("Version:  {}", rustmailer_version!());
    info!("Git:      [{}]", env!("GIT_HASH"));

    if let Err(error) = initialize().await {
        eprintln!("{:?}", error);
        return Err(error);
    }

    run().await
}

/// Brings up every singleton in dependency order: signal handling first (so a shutdown during the
/// rest of startup is still observed), then the data directory, the embedded metadata store, TLS,
/// the archive store, and finally the job queues.
async fn initialize() -> RustMailerResult<()> {
    SignalManager::initialize().await?;
    DataDirManager::initialize().await?;
    DatabaseManager::initialize().await?;
    RustMailerTls::initialize().await?;
    StoreGateway::initialize().await?;
    JobOrchestrator::start();
    Ok(())
}

/// No REST/gRPC surface here (an external collaborator owns that); this process's own job is to
/// periodically submit a `Sync` job for every enabled account and run until told to shut down.
async fn run() -> RustMailerResult<()> {
    let mut shutdown = modules::common::signal::SIGNAL_MANAGER.subscribe();
    let interval = std::time::Duration::from_secs(SETTINGS.rustmailer_sync_interval_minutes * 60);
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; skip it so we don't hammer every account the instant the
    // process starts alongside whatever cold-start work initialize() already did.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("shutdown signal received, exiting");
                return Ok(());
            }
            _ = ticker.tick() => {
                submit_sync_for_enabled_accounts().await;
            }
        }
    }
}

async fn submit_sync_for_enabled_accounts() {
    let accounts = match MailAccount::list_all().await {
        Ok(accounts) => accounts,
        Err(e) => {
            warn!("failed to list accounts for scheduled sync: {e:#?}");
            return;
        }
    };

    for account in accounts.into_iter().filter(|a| a.enabled) {
        let payload = JobPayload::Sync { full_resync: false };
        if let Err(e) = JobOrchestrator::submit(JobKind::Sync, Some(account.id), payload).await {
            warn!("failed to submit sync job for account {}: {e:#?}", account.id);
        }
    }
}
