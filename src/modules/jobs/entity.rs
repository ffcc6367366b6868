// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::database::manager::DB_MANAGER;
use crate::modules::database::{
    delete_impl, filter_by_secondary_key_impl, insert_impl, list_all_impl, secondary_find_impl,
    update_impl,
};
use crate::modules::error::code::ErrorCode;
use crate::modules::error::RustMailerResult;
use crate::raise_error;
use crate::{id, utc_now};
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

/// Which FIFO queue a job belongs to (§4.G: one queue, one worker, each).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub enum JobKind {
    Sync,
    Restore,
    Export,
    Import,
    AccountDelete,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Sync => "sync",
            JobKind::Restore => "restore",
            JobKind::Export => "export",
            JobKind::Import => "import",
            JobKind::AccountDelete => "account_delete",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    /// Export-only: the artifact has been fetched by the caller.
    Downloaded,
}

impl JobStatus {
    /// Terminal states are append-only; the sweep only ever touches these.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Downloaded
        )
    }
}

/// Export artifact shape: one `.eml` per message inside a zip, or every message
/// concatenated into a single `.mbox` inside the zip.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ExportFormat {
    Eml,
    Mbox,
}

/// Kind-specific submission payload. `Sync`/`Import`/`AccountDelete` need nothing beyond
/// the job's own `account_id`; `Restore` and `Export` carry the extra parameters their queue's
/// contract requires.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum JobPayload {
    Sync { full_resync: bool },
    Restore { email_ids: Vec<i64>, target_folder: String },
    Export { selected_ids: Option<Vec<i64>>, format: ExportFormat },
    Import,
    AccountDelete,
}

/// Per-kind progress counters; unused fields for a given kind stay zero (§3: "progress counters
/// specific to the kind").
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub processed: u64,
    pub new_count: u64,
    pub failed: u64,
    pub deleted: u64,
    pub current_folder: Option<String>,
    pub current_subject: Option<String>,
    /// Import-only: bytes consumed from the source file so far.
    pub processed_bytes: u64,
}

/// One job record. Lives in the embedded store: it's small, mutated by exactly one
/// worker at a time, and never needs full-text search.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[native_model(id = 10, version = 1)]
#[native_db(primary_key(pk -> String))]
pub struct Job {
    #[secondary_key(unique)]
    pub id: u64,
    #[secondary_key]
    pub kind: JobKind,
    pub account_id: Option<u64>,
    pub payload: JobPayload,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub error_message: Option<String>,
    pub output_path: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl Job {
    fn pk(&self) -> String {
        format!("{}_{}", self.created_at, self.id)
    }

    pub fn new(kind: JobKind, account_id: Option<u64>, payload: JobPayload) -> Self {
        Self {
            id: id!(64),
            kind,
            account_id,
            payload,
            status: JobStatus::Queued,
            progress: JobProgress::default(),
            error_message: None,
            output_path: None,
            created_at: utc_now!(),
            started_at: None,
            completed_at: None,
        }
    }

    pub async fn save(&self) -> RustMailerResult<()> {
        insert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }

    pub async fn find(job_id: u64) -> RustMailerResult<Option<Job>> {
        secondary_find_impl::<Job>(DB_MANAGER.meta_db(), JobKey::id, job_id).await
    }

    pub async fn get(job_id: u64) -> RustMailerResult<Job> {
        Self::find(job_id)
            .await?
            .ok_or_else(|| raise_error!(format!("Job '{job_id}' not found"), ErrorCode::ResourceNotFound))
    }

    pub async fn list_all() -> RustMailerResult<Vec<Job>> {
        list_all_impl(DB_MANAGER.meta_db()).await
    }

    /// Every job ever submitted to one queue, oldest first (primary key is time-ordered).
    pub async fn list_by_kind(kind: JobKind) -> RustMailerResult<Vec<Job>> {
        filter_by_secondary_key_impl::<Job>(DB_MANAGER.meta_db(), JobKey::kind, kind).await
    }

    /// The oldest still-`Queued` job in one queue, if any (§4.G: "pulls jobs in FIFO order").
    pub async fn next_queued(kind: JobKind) -> RustMailerResult<Option<Job>> {
        let jobs = Self::list_by_kind(kind).await?;
        Ok(jobs.into_iter().find(|j| j.status == JobStatus::Queued))
    }

    /// `ListActive(≤24h)`: every job created or still unfinished within the last 24 hours.
    pub async fn list_active() -> RustMailerResult<Vec<Job>> {
        const ONE_DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;
        let cutoff = utc_now!() - ONE_DAY_MILLIS;
        let jobs = Self::list_all().await?;
        Ok(jobs
            .into_iter()
            .filter(|j| !j.status.is_terminal() || j.created_at >= cutoff)
            .collect())
    }

    async fn update_with<F>(job_id: u64, apply: F) -> RustMailerResult<Job>
    where
        F: FnOnce(&mut Job) + Send + 'static,
    {
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .secondary::<Job>(JobKey::id, job_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| raise_error!(format!("Job '{job_id}' not found"), ErrorCode::ResourceNotFound))
            },
            move |current| {
                let mut updated = current.clone();
                apply(&mut updated);
                Ok(updated)
            },
        )
        .await
    }

    pub async fn mark_running(job_id: u64) -> RustMailerResult<()> {
        Self::update_with(job_id, |j| {
            j.status = JobStatus::Running;
            j.started_at = Some(utc_now!());
        })
        .await?;
        Ok(())
    }

    pub async fn update_progress(job_id: u64, progress: JobProgress) -> RustMailerResult<()> {
        Self::update_with(job_id, move |j| j.progress = progress).await?;
        Ok(())
    }

    pub async fn mark_terminal(
        job_id: u64,
        status: JobStatus,
        error_message: Option<String>,
        output_path: Option<String>,
    ) -> RustMailerResult<()> {
        Self::update_with(job_id, move |j| {
            j.status = status;
            j.error_message = error_message;
            j.output_path = output_path;
            j.completed_at = Some(utc_now!());
        })
        .await?;
        Ok(())
    }

    /// `Cancel(jobId)`: flips a still-queued job straight to `Cancelled`; a running job's
    /// cancellation is observed by the worker via the job's cancel token instead (see `jobs::orchestrator`).
    pub async fn cancel_if_queued(job_id: u64) -> RustMailerResult<bool> {
        let job = Self::get(job_id).await?;
        if job.status != JobStatus::Queued {
            return Ok(false);
        }
        Self::mark_terminal(job_id, JobStatus::Cancelled, None, None).await?;
        Ok(true)
    }

    pub async fn delete(job_id: u64) -> RustMailerResult<()> {
        delete_impl(DB_MANAGER.meta_db(), move |rw| {
            rw.get()
                .secondary::<Job>(JobKey::id, job_id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .ok_or_else(|| raise_error!(format!("Job '{job_id}' not found"), ErrorCode::ResourceNotFound))
        })
        .await
    }
}
