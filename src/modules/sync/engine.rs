// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Sync Engine: drives one account's incremental fetch loop, folder by folder, page by
//! page, through the Normalizer and Archive Writer, then applies remote and local retention.
//! Generic over [`MailProvider`] via [`super::provider_handle::ProviderHandle`] — IMAP and Graph
//! never branch past this module.

use crate::modules::account::entity::MailAccount;
use crate::modules::archive::{self, ArchiveOutcome};
use crate::modules::error::code::ErrorCode;
use crate::modules::error::RustMailerResult;
use crate::modules::jobs::entity::{Job, JobProgress};
use crate::modules::normalizer;
use crate::modules::provider::{CancelToken, MailProvider, ProviderFolder};
use crate::modules::settings::cli::SETTINGS;
use crate::modules::store;
use crate::raise_error;
use crate::utc_now;
use std::time::Duration;
use tracing::warn;

use super::provider_handle::ProviderHandle;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

fn is_excluded(excluded: &std::collections::BTreeSet<String>, folder: &str) -> bool {
    excluded.iter().any(|e| e.eq_ignore_ascii_case(folder))
}

/// Runs one incremental sync pass for `account_id`, reporting progress against `job_id` as it
/// goes. Advances the account's watermark only if the whole run completed without a single
/// failure and wasn't cancelled.
pub async fn run_account(account_id: u64, job_id: u64, cancel: &CancelToken) -> RustMailerResult<()> {
    let account = MailAccount::check_active(account_id).await?;
    let provider = ProviderHandle::for_account(&account).await?;
    provider.test_connection().await?;

    let folders: Vec<ProviderFolder> = provider.list_folders().await?;
    let since_millis = account.last_sync;
    let mut progress = JobProgress::default();
    let mut had_failure = false;

    for folder in &folders {
        if cancel.is_cancelled() {
            break;
        }
        if is_excluded(&account.excluded_folders, &folder.name) {
            continue;
        }

        progress.current_folder = Some(folder.name.clone());
        Job::update_progress(job_id, progress.clone()).await?;

        if let Err(e) = drain_folder(&provider, &folder.name, since_millis, job_id, &mut progress, cancel, account.id as i64, &account.email).await {
            warn!("sync: folder '{}' for account {account_id} failed: {e:#?}", folder.name);
            had_failure = true;
        }

        if cancel.is_cancelled() {
            break;
        }

        if let Some(days) = account.delete_after_days {
            let cutoff = utc_now!() - days as i64 * MILLIS_PER_DAY;
            match provider.delete_old(&folder.name, cutoff, cancel).await {
                Ok(n) => progress.deleted += n,
                Err(e) => {
                    warn!("sync: remote retention delete for folder '{}' failed: {e:#?}", folder.name);
                    had_failure = true;
                }
            }
            Job::update_progress(job_id, progress.clone()).await?;
        }
    }

    if !cancel.is_cancelled() {
        if let Some(days) = account.local_retention_days {
            let cutoff = utc_now!() - days as i64 * MILLIS_PER_DAY;
            if let Some(cutoff_dt) = store::millis_to_datetime(cutoff) {
                loop {
                    let deleted = store::delete_local_retention_batch(account.id as i64, cutoff_dt, 1000).await?;
                    progress.deleted += deleted;
                    if deleted == 0 {
                        break;
                    }
                }
                Job::update_progress(job_id, progress.clone()).await?;
            }
        }
    }

    progress.current_folder = None;
    progress.current_subject = None;
    Job::update_progress(job_id, progress).await?;

    if cancel.is_cancelled() {
        return Err(raise_error!(format!("sync job for account {account_id} was cancelled"), ErrorCode::JobCancelled));
    }

    // Watermark advance is a single write at end-of-run, happening-after every per-message
    // commit above, and only when nothing failed.
    if had_failure {
        return Err(raise_error!(
            format!("sync for account {account_id} completed with one or more folder/message failures"),
            ErrorCode::ImapCommandFailed
        ));
    }
    MailAccount::advance_watermark(account.id, utc_now!()).await?;
    Ok(())
}

/// Pages through one folder until the provider reports no more pages (or cancellation fires),
/// normalizing and archiving each message as it arrives.
async fn drain_folder(
    provider: &ProviderHandle,
    folder: &str,
    since_millis: i64,
    job_id: u64,
    progress: &mut JobProgress,
    cancel: &CancelToken,
    account_id: i64,
    account_email: &str,
) -> RustMailerResult<()> {
    let mut offset = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let page = provider.fetch_page(folder, since_millis, offset, cancel).await?;

        for msg in &page.messages {
            if cancel.is_cancelled() {
                return Ok(());
            }
            progress.current_subject = msg.subject.clone();

            let draft = match normalizer::normalize(account_email, msg) {
                Ok(d) => d,
                Err(e) => {
                    warn!("sync: failed to normalize message in '{folder}': {e:#?}");
                    progress.failed += 1;
                    Job::update_progress(job_id, progress.clone()).await?;
                    continue;
                }
            };

            match archive::archive(account_id, &draft).await {
                Ok(ArchiveOutcome::Inserted { .. }) => {
                    progress.processed += 1;
                    progress.new_count += 1;
                }
                Ok(ArchiveOutcome::AlreadyExists { .. } | ArchiveOutcome::FolderMoved { .. }) => {
                    progress.processed += 1;
                }
                Err(e) => {
                    warn!("sync: failed to archive message in '{folder}': {e:#?}");
                    progress.failed += 1;
                }
            }
            Job::update_progress(job_id, progress.clone()).await?;

            if SETTINGS.rustmailer_pause_between_emails_ms > 0 {
                tokio::time::sleep(Duration::from_millis(SETTINGS.rustmailer_pause_between_emails_ms)).await;
            }
        }

        if !page.has_more || cancel.is_cancelled() {
            return Ok(());
        }
        offset += 1;
        if SETTINGS.rustmailer_pause_between_batches_ms > 0 {
            tokio::time::sleep(Duration::from_millis(SETTINGS.rustmailer_pause_between_batches_ms)).await;
        }
    }
}
