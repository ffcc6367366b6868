// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Importer: stream-parses an uploaded mbox file, funneling each message through the
//! Normalizer and Archive Writer exactly like the Sync Engine does for a provider page. Malformed
//! records are skipped by resuming at the next mbox `From ` separator rather than failing the
//! whole job.

use crate::modules::account::entity::MailAccount;
use crate::modules::archive::{self, ArchiveOutcome};
use crate::modules::common::AddrVec;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::RustMailerResult;
use crate::modules::jobs::entity::{Job, JobProgress};
use crate::modules::normalizer;
use crate::modules::normalizer::raw::{RawAttachment, RawMessage};
use crate::modules::provider::CancelToken;
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use crate::raise_error;
use mail_parser::MessageParser;
use tracing::warn;

/// The fixed staging file name an import job's upload is expected under (§4.I; see DESIGN.md for
/// why one job owns exactly one mbox file rather than a caller-chosen name).
pub const IMPORT_FILE_NAME: &str = "import.mbox";

/// Runs one import job: reads the staged mbox file for `job_id` and archives every message it
/// contains against `account_id`. Reports processed bytes, processed/new/failed counts, and the
/// current subject as it goes.
pub async fn run_import(job_id: u64, account_id: u64, cancel: &CancelToken) -> RustMailerResult<()> {
    let account = MailAccount::check_active(account_id).await?;
    let path = DATA_DIR_MANAGER.upload_path(job_id, IMPORT_FILE_NAME);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| raise_error!(format!("failed to read import file '{}': {e:#?}", path.display()), ErrorCode::InternalError))?;

    let mut progress = JobProgress::default();
    let mut cursor = find_separator(&bytes, 0).unwrap_or(0);

    while cursor < bytes.len() {
        if cancel.is_cancelled() {
            break;
        }
        let next = find_separator(&bytes, cursor + 1);
        let end = next.unwrap_or(bytes.len());
        let block = &bytes[cursor..end];
        progress.processed_bytes = end as u64;

        match parse_mbox_record(block) {
            Some(raw) => {
                progress.current_subject = raw.subject.clone();
                match normalizer::normalize(&account.email, &raw) {
                    Ok(draft) => match archive::archive(account.id as i64, &draft).await {
                        Ok(ArchiveOutcome::Inserted { .. }) => {
                            progress.processed += 1;
                            progress.new_count += 1;
                        }
                        Ok(ArchiveOutcome::AlreadyExists { .. } | ArchiveOutcome::FolderMoved { .. }) => {
                            progress.processed += 1;
                        }
                        Err(e) => {
                            warn!("import: failed to archive message from job {job_id}: {e:#?}");
                            progress.failed += 1;
                        }
                    },
                    Err(e) => {
                        warn!("import: failed to normalize message from job {job_id}: {e:#?}");
                        progress.failed += 1;
                    }
                }
            }
            // Malformed record: the cursor has already advanced to the next `From `
            // separator (or EOF) above, so we just count the failure and resume.
            None => progress.failed += 1,
        }

        Job::update_progress(job_id, progress.clone()).await?;
        cursor = next.unwrap_or(bytes.len());
    }

    if cancel.is_cancelled() {
        return Err(raise_error!(format!("import job {job_id} was cancelled"), ErrorCode::JobCancelled));
    }
    Ok(())
}

/// Finds the byte offset of the next mbox separator (a line beginning with `From `) at or after
/// `from`. `from` itself is checked only when it's a line start, i.e. offset 0 or just after `\n`.
fn find_separator(bytes: &[u8], from: usize) -> Option<usize> {
    const SEP: &[u8] = b"From ";
    let mut i = from;
    while i < bytes.len() {
        let at_line_start = i == 0 || bytes[i - 1] == b'\n';
        if at_line_start && bytes[i..].starts_with(SEP) {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Parses one mbox record: the first line is the envelope `From <sender> <date>` separator
/// (discarded), the rest is a MIME message.
fn parse_mbox_record(block: &[u8]) -> Option<RawMessage> {
    let first_newline = block.iter().position(|&b| b == b'\n')?;
    let mime = &block[first_newline + 1..];
    if mime.is_empty() {
        return None;
    }

    let parsed = MessageParser::default().parse(mime)?;
    let header_text = render_headers(mime);
    let headers = RawHeaders::parse(&header_text);

    let attachments = parsed
        .attachments()
        .map(|part| {
            let content_type = part.content_type();
            let mime_type = content_type
                .map(|ct| match ct.subtype() {
                    Some(sub) => format!("{}/{}", ct.c_type, sub),
                    None => ct.c_type.to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let is_inline = content_type.is_some_and(|ct| ct.is_inline());
            let content_id = part.content_id().map(|s| s.trim_start_matches('<').trim_end_matches('>').to_string());
            RawAttachment {
                filename: part.attachment_name().map(|s| s.to_string()),
                content_type: mime_type,
                content_id,
                disposition: Some(if is_inline { "inline".to_string() } else { "attachment".to_string() }),
                content: part.contents().to_vec(),
            }
        })
        .collect();

    Some(RawMessage {
        message_id: parsed.message_id().map(|s| s.to_string()),
        subject: parsed.subject().map(|s| s.to_string()),
        from: parsed.from().map(|a| join_addresses(&AddrVec::from(a))),
        to: parsed.to().map(|a| join_addresses(&AddrVec::from(a))),
        cc: parsed.cc().map(|a| join_addresses(&AddrVec::from(a))),
        bcc: parsed.bcc().map(|a| join_addresses(&AddrVec::from(a))),
        date_header: headers.first("Date"),
        received_headers: headers.all("Received"),
        resent_date: headers.first("Resent-Date"),
        text_body: parsed.body_text(0).map(|s| s.to_string()),
        html_body: parsed.body_html(0).map(|s| s.to_string()),
        raw_header_text: Some(header_text),
        folder: "Import".to_string(),
        received_date: None,
        attachments,
    })
}

fn join_addresses(addrs: &AddrVec) -> String {
    addrs.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
}

/// Minimal unfolded-header view, same approach as the IMAP adapter's: recovers the exact
/// `Date`/`Resent-Date`/`Received` header values verbatim for the Normalizer's date extraction.
struct RawHeaders<'a> {
    lines: Vec<(&'a str, String)>,
}

impl<'a> RawHeaders<'a> {
    fn parse(header_block: &'a str) -> Self {
        let mut lines: Vec<(&str, String)> = Vec::new();
        for raw_line in header_block.lines() {
            if raw_line.starts_with([' ', '\t']) {
                if let Some((_, value)) = lines.last_mut() {
                    value.push(' ');
                    value.push_str(raw_line.trim());
                }
                continue;
            }
            if let Some((name, value)) = raw_line.split_once(':') {
                lines.push((name.trim(), value.trim().to_string()));
            }
        }
        Self { lines }
    }

    fn first(&self, name: &str) -> Option<String> {
        self.lines.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.clone())
    }

    fn all(&self, name: &str) -> Vec<String> {
        self.lines.iter().filter(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.clone()).collect()
    }
}

fn render_headers(raw_message: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw_message);
    let header_part = text.split("\r\n\r\n").next().or_else(|| text.split("\n\n").next()).unwrap_or("");
    header_part.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_separator_at_start_of_file() {
        let bytes = b"From alice@x Mon Jan  1\nSubject: hi\n\nbody";
        assert_eq!(find_separator(bytes, 0), Some(0));
    }

    #[test]
    fn finds_separator_after_a_prior_message() {
        let bytes = b"From a@x Mon\nSubject: one\n\nbody one\nFrom b@x Tue\nSubject: two\n\nbody two";
        let first = find_separator(bytes, 0).unwrap();
        let second = find_separator(bytes, first + 1).unwrap();
        assert!(bytes[second..].starts_with(b"From b@x"));
    }

    #[test]
    fn a_from_header_mid_body_is_not_mistaken_for_a_separator() {
        let bytes = b"From a@x Mon\nSubject: one\n\nFrom: someone@example.com wrote this";
        let first = find_separator(bytes, 0).unwrap();
        assert_eq!(find_separator(bytes, first + 1), None);
    }

    #[test]
    fn parses_a_minimal_mbox_record() {
        let block = b"From a@x Mon Jan 1\nSubject: hello\nFrom: alice@example.com\nTo: bob@example.com\n\nhello world";
        let raw = parse_mbox_record(block).unwrap();
        assert_eq!(raw.subject.as_deref(), Some("hello"));
        assert_eq!(raw.folder, "Import");
    }

    #[test]
    fn empty_body_after_separator_is_treated_as_malformed() {
        let block = b"From a@x Mon Jan 1\n";
        assert!(parse_mbox_record(block).is_none());
    }
}
