// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Job Orchestrator: five typed FIFO queues — Sync, Restore, Export, Import,
//! AccountDelete — each drained by exactly one worker. `Submit` just inserts a `Queued` row;
//! workers poll their own queue every 100ms and pick up the oldest queued job. A running job's
//! cancel token lives in [`RUNNING`] so `Cancel` can reach a job mid-flight, not only a still
//! queued one.

pub mod entity;

use crate::modules::account::entity::MailAccount;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::RustMailerResult;
use crate::modules::export;
use crate::modules::import;
use crate::modules::provider::{CancelToken, MailProvider};
use crate::modules::settings::cli::SETTINGS;
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use crate::modules::store;
use crate::modules::sync::{self, ProviderHandle};
use crate::{raise_error, utc_now};
use dashmap::DashMap;
use entity::{Job, JobKind, JobPayload, JobStatus};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{info, warn};

/// Cancel tokens for jobs currently `Running`, keyed by job id. A `Queued` job has no entry here
/// — cancelling one just flips its status straight to `Cancelled` (see [`entity::Job::cancel_if_queued`]).
static RUNNING: LazyLock<DashMap<u64, CancelToken>> = LazyLock::new(DashMap::new);

const IDLE_POLL: Duration = Duration::from_millis(100);
const DELETE_BATCH: i64 = 1000;

pub struct JobOrchestrator;

impl JobOrchestrator {
    /// Spawns one worker per queue plus the sweep loop. Call once at startup.
    pub fn start() {
        for kind in [
            JobKind::Sync,
            JobKind::Restore,
            JobKind::Export,
            JobKind::Import,
            JobKind::AccountDelete,
        ] {
            tokio::spawn(worker_loop(kind));
        }
        tokio::spawn(sweep_loop());
    }

    /// `Submit(kind, payload)`: enqueues a new job and returns its id immediately.
    pub async fn submit(kind: JobKind, account_id: Option<u64>, payload: JobPayload) -> RustMailerResult<u64> {
        let job = Job::new(kind, account_id, payload);
        job.save().await?;
        Ok(job.id)
    }

    /// `Cancel(jobId)`: cancels a running job cooperatively, or a queued one immediately.
    pub async fn cancel(job_id: u64) -> RustMailerResult<bool> {
        if let Some(token) = RUNNING.get(&job_id) {
            token.cancel();
            return Ok(true);
        }
        Job::cancel_if_queued(job_id).await
    }

    pub async fn get(job_id: u64) -> RustMailerResult<Job> {
        Job::get(job_id).await
    }

    pub async fn list_active() -> RustMailerResult<Vec<Job>> {
        Job::list_active().await
    }

    pub async fn list_all() -> RustMailerResult<Vec<Job>> {
        Job::list_all().await
    }
}

async fn worker_loop(kind: JobKind) {
    let mut shutdown = crate::modules::common::signal::SIGNAL_MANAGER.subscribe();
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("jobs: {} worker shutting down", kind.as_str());
                return;
            }
            _ = tokio::time::sleep(IDLE_POLL) => {}
        }

        let next = match Job::next_queued(kind).await {
            Ok(Some(job)) => job,
            Ok(None) => continue,
            Err(e) => {
                warn!("jobs: failed to poll {} queue: {e:#?}", kind.as_str());
                continue;
            }
        };

        let cancel = CancelToken::new();
        RUNNING.insert(next.id, cancel.clone());
        if let Err(e) = Job::mark_running(next.id).await {
            warn!("jobs: failed to mark job {} running: {e:#?}", next.id);
            RUNNING.remove(&next.id);
            continue;
        }

        let outcome = run_job(&next, &cancel).await;
        RUNNING.remove(&next.id);

        let terminal = match outcome {
            Ok(output_path) => Job::mark_terminal(next.id, JobStatus::Completed, None, output_path).await,
            Err(e) if e.code() == ErrorCode::JobCancelled => {
                Job::mark_terminal(next.id, JobStatus::Cancelled, None, None).await
            }
            Err(e) => {
                e.log();
                Job::mark_terminal(next.id, JobStatus::Failed, Some(format!("{e}")), None).await
            }
        };
        if let Err(e) = terminal {
            warn!("jobs: failed to record terminal state for job {}: {e:#?}", next.id);
        }
    }
}

/// Dispatches one job to its kind-specific handler; returns the artifact path for jobs that
/// produce one (currently only `Export`).
async fn run_job(job: &Job, cancel: &CancelToken) -> RustMailerResult<Option<String>> {
    match &job.payload {
        JobPayload::Sync { .. } => {
            let account_id = job
                .account_id
                .ok_or_else(|| raise_error!("sync job missing account_id".into(), ErrorCode::InvalidParameter))?;
            sync::run_account(account_id, job.id, cancel).await?;
            Ok(None)
        }
        JobPayload::Restore { email_ids, target_folder } => {
            let account_id = job
                .account_id
                .ok_or_else(|| raise_error!("restore job missing account_id".into(), ErrorCode::InvalidParameter))?;
            run_restore(job.id, account_id, email_ids, target_folder, cancel).await?;
            Ok(None)
        }
        JobPayload::Export { selected_ids, format } => {
            let account_id = job
                .account_id
                .ok_or_else(|| raise_error!("export job missing account_id".into(), ErrorCode::InvalidParameter))?;
            let path = export::run_export(job.id, account_id as i64, selected_ids.clone(), *format, cancel).await?;
            Ok(Some(path))
        }
        JobPayload::Import => {
            let account_id = job
                .account_id
                .ok_or_else(|| raise_error!("import job missing account_id".into(), ErrorCode::InvalidParameter))?;
            import::run_import(job.id, account_id, cancel).await?;
            Ok(None)
        }
        JobPayload::AccountDelete => {
            let account_id = job
                .account_id
                .ok_or_else(|| raise_error!("account-delete job missing account_id".into(), ErrorCode::InvalidParameter))?;
            run_account_delete(account_id, cancel).await?;
            Ok(None)
        }
    }
}

/// Restores `email_ids` into `target_folder` against the account's live provider.
/// Import-only accounts have no provider and the restore queue has no business accepting work for
/// them — that's a submission-time validation concern, not this worker's.
async fn run_restore(
    job_id: u64,
    account_id: u64,
    email_ids: &[i64],
    target_folder: &str,
    cancel: &CancelToken,
) -> RustMailerResult<()> {
    let account = MailAccount::check_active(account_id).await?;
    let provider = ProviderHandle::for_account(&account).await?;

    let mut emails = Vec::with_capacity(email_ids.len());
    for id in email_ids {
        if let Some(email) = store::get_email_with_attachments(*id).await? {
            emails.push(email);
        }
    }

    let mut progress = entity::JobProgress::default();
    provider
        .restore_many(target_folder, &emails, cancel, |_idx, succeeded| {
            progress.processed += 1;
            if !succeeded {
                progress.failed += 1;
            }
        })
        .await?;
    Job::update_progress(job_id, progress).await?;

    if cancel.is_cancelled() {
        return Err(raise_error!(format!("restore job for account {account_id} was cancelled"), ErrorCode::JobCancelled));
    }
    Ok(())
}

/// Account deletion: serialized phases — cancel any running sync for the account, drop the
/// locked flag so retention/dedup stop special-casing its rows, then batch-delete attachments and
/// emails 1000 at a time before removing the account record itself.
async fn run_account_delete(account_id: u64, cancel: &CancelToken) -> RustMailerResult<()> {
    if let Some(running_sync) = find_running_sync_for(account_id).await? {
        if let Some(token) = RUNNING.get(&running_sync) {
            token.cancel();
        }
    }

    store::clear_locked_for_account(account_id as i64).await?;

    loop {
        if cancel.is_cancelled() {
            return Err(raise_error!(format!("account-delete job for account {account_id} was cancelled"), ErrorCode::JobCancelled));
        }
        let ids = store::email_ids_for_account(account_id as i64, DELETE_BATCH).await?;
        if ids.is_empty() {
            break;
        }
        store::batch_delete_attachments_by_email_ids(&ids).await?;
        store::batch_delete_emails_by_ids(&ids).await?;
    }

    MailAccount::delete(account_id).await?;
    Ok(())
}

async fn find_running_sync_for(account_id: u64) -> RustMailerResult<Option<u64>> {
    let sync_jobs = Job::list_by_kind(JobKind::Sync).await?;
    Ok(sync_jobs
        .into_iter()
        .find(|j| j.status == JobStatus::Running && j.account_id == Some(account_id))
        .map(|j| j.id))
}

/// Sweep: every `rustmailer_job_sweep_interval_hours`, removes terminal jobs older than
/// `rustmailer_job_retention_days` along with their export/import artifact directories.
async fn sweep_loop() {
    let mut shutdown = crate::modules::common::signal::SIGNAL_MANAGER.subscribe();
    let interval = Duration::from_secs(SETTINGS.rustmailer_job_sweep_interval_hours * 3600);
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("jobs: sweep loop shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
        if let Err(e) = sweep_once().await {
            warn!("jobs: sweep pass failed: {e:#?}");
        }
    }
}

async fn sweep_once() -> RustMailerResult<()> {
    const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;
    let cutoff = utc_now!() - SETTINGS.rustmailer_job_retention_days as i64 * MILLIS_PER_DAY;

    let jobs = Job::list_all().await?;
    for job in jobs {
        if !job.status.is_terminal() || job.created_at >= cutoff {
            continue;
        }
        let export_dir = DATA_DIR_MANAGER.exports_dir.join(job.id.to_string());
        let upload_dir = DATA_DIR_MANAGER.uploads_dir.join(job.id.to_string());
        let _ = tokio::fs::remove_dir_all(&export_dir).await;
        let _ = tokio::fs::remove_dir_all(&upload_dir).await;
        Job::delete(job.id).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_map_tracks_cancellation() {
        let token = CancelToken::new();
        RUNNING.insert(1, token.clone());
        assert!(RUNNING.get(&1).is_some());
        RUNNING.get(&1).unwrap().cancel();
        assert!(token.is_cancelled());
        RUNNING.remove(&1);
        assert!(RUNNING.get(&1).is_none());
    }
}
