// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Export job: streams an account's archived emails — or a
//! caller-selected subset — into a zip artifact on disk, one `.eml` file per message or a single
//! concatenated `.mbox`, reusing the same MIME reconstitution [`crate::modules::mime`] uses for
//! IMAP restore. Cancellation mid-write deletes the partial artifact.

use crate::modules::error::{code::ErrorCode, RustMailerResult};
use crate::modules::jobs::entity::{ExportFormat, Job, JobProgress};
use crate::modules::mime;
use crate::modules::provider::CancelToken;
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use crate::modules::settings::timezone::to_display_zone;
use crate::modules::store;
use crate::modules::store::entity::ArchivedEmailWithAttachments;
use crate::raise_error;
use futures::StreamExt;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Runs one export job: streams `account_id`'s archive (or `selected_ids`, if given) into a zip
/// at `{exports}/{job_id}/export_{job_id}_{timestamp}.zip` and returns that path.
pub async fn run_export(
    job_id: u64,
    account_id: i64,
    selected_ids: Option<Vec<i64>>,
    format: ExportFormat,
    cancel: &CancelToken,
) -> RustMailerResult<String> {
    let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let file_name = format!("export_{job_id}_{timestamp}.zip");
    let path = DATA_DIR_MANAGER.export_path(job_id, &file_name);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| raise_error!(format!("failed to create export directory: {e:#?}"), ErrorCode::InternalError))?;
    }

    let result = write_export(&path, job_id, account_id, selected_ids, format, cancel).await;
    if result.is_err() || cancel.is_cancelled() {
        // Cancellation/failure mid-write must not leave a partial artifact behind.
        let _ = tokio::fs::remove_file(&path).await;
    }
    result?;

    if cancel.is_cancelled() {
        return Err(raise_error!(format!("export job {job_id} was cancelled"), ErrorCode::JobCancelled));
    }
    Ok(path.display().to_string())
}

async fn write_export(
    path: &std::path::Path,
    job_id: u64,
    account_id: i64,
    selected_ids: Option<Vec<i64>>,
    format: ExportFormat,
    cancel: &CancelToken,
) -> RustMailerResult<()> {
    let mut stream = store::export_rows_stream(account_id, selected_ids)?;
    let path = path.to_path_buf();

    // zip/std::io::Write are synchronous; the archive is built on a blocking thread while rows
    // stream in from the async Postgres cursor above.
    let file = std::fs::File::create(&path)
        .map_err(|e| raise_error!(format!("failed to create export file '{}': {e:#?}", path.display()), ErrorCode::InternalError))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut mbox_buffer = Vec::new();
    let mut progress = JobProgress::default();

    while let Some(row) = stream.next().await {
        if cancel.is_cancelled() {
            break;
        }
        let row = row.map_err(|e| raise_error!(format!("export query failed: {e:#?}"), ErrorCode::StoreError))?;
        let attachments = store::attachments_for_email(row.id).await?;
        progress.current_subject = Some(row.subject.clone());
        let email = ArchivedEmailWithAttachments { email: row, attachments };
        let eml = mime::build(&email)?;

        match format {
            ExportFormat::Eml => {
                zip.start_file(format!("{}.eml", email.email.id), options)
                    .map_err(|e| raise_error!(format!("failed to start zip entry: {e:#?}"), ErrorCode::InternalError))?;
                zip.write_all(&eml)
                    .map_err(|e| raise_error!(format!("failed to write zip entry: {e:#?}"), ErrorCode::InternalError))?;
            }
            ExportFormat::Mbox => {
                let from_addr = if email.email.from_addr.is_empty() { "MAILER-DAEMON" } else { &email.email.from_addr };
                let sent = email.email.sent_date.unwrap_or(email.email.received_date.unwrap_or_else(chrono::Utc::now));
                let sent = to_display_zone(sent);
                mbox_buffer.extend_from_slice(format!("From {from_addr} {}\n", sent.format("%a %b %e %T %Y")).as_bytes());
                mbox_buffer.extend_from_slice(&eml);
                if !eml.ends_with(b"\n") {
                    mbox_buffer.push(b'\n');
                }
                mbox_buffer.push(b'\n');
            }
        }

        progress.processed += 1;
        Job::update_progress(job_id, progress.clone()).await?;
    }

    if matches!(format, ExportFormat::Mbox) {
        zip.start_file("mail.mbox", options)
            .map_err(|e| raise_error!(format!("failed to start zip entry: {e:#?}"), ErrorCode::InternalError))?;
        zip.write_all(&mbox_buffer)
            .map_err(|e| raise_error!(format!("failed to write zip entry: {e:#?}"), ErrorCode::InternalError))?;
    }

    zip.finish()
        .map_err(|e| raise_error!(format!("failed to finalize export zip: {e:#?}"), ErrorCode::InternalError))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_file_name_embeds_job_id() {
        let path = DATA_DIR_MANAGER.export_path(42, "export_42_20240101000000.zip");
        assert!(path.to_string_lossy().contains("42"));
    }
}
