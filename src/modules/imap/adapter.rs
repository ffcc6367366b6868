// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! The IMAP side of the [`crate::modules::provider::MailProvider`] contract. Sits on top
//! of [`super::executor::ImapExecutor`] and the `bb8` pool built by [`super::pool::build_imap_pool`]
//! — this module owns only the sync/retention/restore *policy*, not the wire protocol.

use crate::modules::account::entity::MailAccount;
use crate::modules::common::AddrVec;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::RustMailerResult;
use crate::modules::imap::executor::ImapExecutor;
use crate::modules::imap::manager::ImapConnectionManager;
use crate::modules::imap::pool::build_imap_pool;
use crate::modules::normalizer::fingerprint::lookup_variants;
use crate::modules::normalizer::raw::{RawAttachment, RawMessage};
use crate::modules::provider::{CancelToken, MailProvider, ProviderFolder, RawPage};
use crate::modules::settings::cli::SETTINGS;
use crate::modules::store;
use crate::modules::store::entity::ArchivedEmailWithAttachments;
use crate::raise_error;
use async_imap::types::Fetch;
use bb8::Pool;
use mail_parser::MessageParser;
use std::collections::HashSet;
use tracing::warn;

/// Minimal unfolded-header view over the raw header block, used to recover the exact `Date`,
/// `Resent-Date`, and every `Received` header value verbatim (§4.B needs the raw string, not
/// `mail-parser`'s already-interpreted `DateTime`).
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

/// How far before the watermark to re-query, to absorb clock skew between us and the server
///.
const CLOCK_SKEW_GUARD_MS: i64 = 12 * 60 * 60 * 1000;

pub struct ImapProvider {
    account_id: u64,
    pool: Pool<ImapConnectionManager>,
    executor: ImapExecutor,
}

impl ImapProvider {
    pub async fn new(account_id: u64) -> RustMailerResult<Self> {
        let pool = build_imap_pool(account_id).await?;
        let executor = ImapExecutor::new(pool.clone());
        Ok(Self { account_id, pool, executor })
    }

    /// Server-limit detection: a folder reporting `N` messages but a SEARCH returning
    /// `M < N` means the server is silently capping results. When that happens we fall back to a
    /// plain sequence fetch of every UID in the folder.
    async fn uids_since(&self, folder: &str, since_millis: i64) -> RustMailerResult<Vec<u32>> {
        let since = time::OffsetDateTime::from_unix_timestamp(since_millis / 1000)
            .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
        let date = since.date();
        let delivered_after = format!(
            "DELIVEREDAFTER {}-{}-{}",
            date.day(),
            month_abbrev(date.month() as u8),
            date.year()
        );

        let mailbox = self.executor.examine_mailbox(folder).await?;
        let total = mailbox.exists;

        let by_search = match self.executor.uid_search(folder, &delivered_after).await {
            Ok(set) => Some(set),
            Err(e) => {
                warn!("DELIVEREDAFTER search failed for '{folder}': {e:#?}; retrying with SENTSINCE");
                let sentsince = format!("SENTSINCE {}-{}-{}", date.day(), month_abbrev(date.month() as u8), date.year());
                match self.executor.uid_search(folder, &sentsince).await {
                    Ok(set) => Some(set),
                    Err(e) => {
                        warn!("SENTSINCE search failed for '{folder}': {e:#?}; falling back to ALL");
                        self.executor.uid_search(folder, "ALL").await.ok()
                    }
                }
            }
        };

        match by_search {
            Some(uids) if total == 0 || (uids.len() as u32) >= total.min(1) && !looks_capped(uids.len() as u32, total) => {
                let mut v: Vec<u32> = uids.into_iter().collect();
                v.sort_unstable();
                Ok(v)
            }
            _ => {
                warn!("possible server search cap on '{folder}' (reported {total} messages); falling back to sequence fetch");
                let fetches = self.executor.fetch_uid_list(1, folder, true).await?;
                Ok(fetches.iter().filter_map(|f| f.uid).collect())
            }
        }
    }

    async fn parse_raw_message(&self, fetch: &Fetch, folder: &str) -> Option<RawMessage> {
        let body = fetch.body()?;
        let parsed = MessageParser::default().parse(body)?;
        let header_text = render_headers(body);
        let headers = RawHeaders::parse(&header_text);

        let received_date = fetch.internal_date().map(|d| d.timestamp_millis());

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
            folder: folder.to_string(),
            received_date,
            attachments,
        })
    }
}

impl MailProvider for ImapProvider {
    async fn test_connection(&self) -> RustMailerResult<()> {
        self.pool.get().await?;
        Ok(())
    }

    async fn list_folders(&self) -> RustMailerResult<Vec<ProviderFolder>> {
        // Step 1/2: union INBOX with a recursive listing of the personal namespace.
        let mut seen = HashSet::new();
        let mut folders = Vec::new();

        let all = self.executor.list_all_mailboxes().await?;
        for name in &all {
            if is_selectable(name) && seen.insert(name.name().to_string()) {
                folders.push(ProviderFolder { name: name.name().to_string() });
            }
        }

        // Step 3: fall back to a non-recursive listing if the recursive one came back empty.
        if folders.is_empty() {
            let subscribed = self.executor.list_all_subscribed_mailboxes().await?;
            for name in &subscribed {
                if is_selectable(name) && seen.insert(name.name().to_string()) {
                    folders.push(ProviderFolder { name: name.name().to_string() });
                }
            }
        }

        Ok(folders)
    }

    async fn fetch_page(
        &self,
        folder: &str,
        since_millis: i64,
        offset: u64,
        cancel: &CancelToken,
    ) -> RustMailerResult<RawPage> {
        let since = since_millis - CLOCK_SKEW_GUARD_MS;
        let uids = self.uids_since(folder, since.max(0)).await?;

        let page_size = SETTINGS.rustmailer_batch_size as usize;
        let start = offset as usize * page_size;
        if cancel.is_cancelled() || start >= uids.len() {
            return Ok(RawPage { messages: Vec::new(), has_more: false });
        }
        let end = (start + page_size).min(uids.len());
        let page_uids = &uids[start..end];

        let mut messages = Vec::with_capacity(page_uids.len());
        for uid in page_uids {
            if cancel.is_cancelled() {
                break;
            }
            let fetch = self.executor.uid_fetch_full_message(&uid.to_string(), folder).await?;
            if let Some(fetch) = fetch {
                if let Some(raw) = self.parse_raw_message(&fetch, folder).await {
                    messages.push(raw);
                }
            }
        }

        Ok(RawPage { messages, has_more: end < uids.len() })
    }

    async fn delete_old(&self, folder: &str, cutoff_millis: i64, cancel: &CancelToken) -> RustMailerResult<u64> {
        let since = time::OffsetDateTime::from_unix_timestamp(cutoff_millis / 1000)
            .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
        let date = since.date();
        let query = format!("SENTBEFORE {}-{}-{}", date.day(), month_abbrev(date.month() as u8), date.year());
        let uids = self.executor.uid_search(folder, &query).await?;

        let account = MailAccount::get(self.account_id).await?;
        let mut deleted = 0u64;
        let mut to_delete = Vec::new();
        for uid in uids {
            if cancel.is_cancelled() {
                break;
            }
            let fetch = self.executor.uid_fetch_full_message(&uid.to_string(), folder).await?;
            let Some(fetch) = fetch else { continue };
            let Some(raw) = self.parse_raw_message(&fetch, folder).await else { continue };
            let Some(message_id) = raw.message_id.as_deref() else { continue };
            let (bare, bracketed) = lookup_variants(message_id);
            if store::exists_by_fingerprint_variants(account.id, &bare, &bracketed).await? {
                to_delete.push(uid.to_string());
            }
        }

        if !to_delete.is_empty() {
            let uid_set = to_delete.join(",");
            self.executor.uid_delete_envelopes(&uid_set, folder).await?;
            deleted = to_delete.len() as u64;
        }
        Ok(deleted)
    }

    async fn restore_one(&self, folder: &str, email: &ArchivedEmailWithAttachments) -> RustMailerResult<()> {
        let raw = crate::modules::mime::build(email)?;

        match self.executor.append(folder, Some("(\\Seen)"), None, raw.clone()).await {
            Ok(()) => Ok(()),
            Err(_) => self.executor.append("INBOX", Some("(\\Seen)"), None, raw).await,
        }
    }
}

fn join_addresses(addrs: &AddrVec) -> String {
    addrs.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
}

fn is_selectable(name: &async_imap::types::Name) -> bool {
    use async_imap::types::NameAttribute;
    !name.attributes().iter().any(|a| matches!(a, NameAttribute::NoSelect | NameAttribute::NonExistent))
}

fn looks_capped(found: u32, total: u32) -> bool {
    total > 0 && found < total
}

fn month_abbrev(month: u8) -> &'static str {
    const NAMES: [&str; 13] =
        ["", "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
    NAMES[month as usize]
}

fn render_headers(raw_message: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw_message);
    let header_part = text.split("\r\n\r\n").next().or_else(|| text.split("\n\n").next()).unwrap_or("");
    header_part.to_string()
}
