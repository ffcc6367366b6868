// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! The Graph policy layer. Sits on top of [`super::token::acquire_token`] and the shared
//! [`crate::modules::common::http::HttpClient`] — this module owns folder walking, the filter
//! de-escalation ladder, attachment handling, retention delete, and restore, but no wire/HTTP
//! concerns of its own (those live in `HttpClient`).

use crate::modules::account::entity::{GraphConfig, MailAccount, ProviderConfig};
use crate::modules::common::http::HttpClient;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::RustMailerResult;
use crate::modules::normalizer::fingerprint::lookup_variants;
use crate::modules::normalizer::raw::{RawAttachment, RawMessage};
use crate::modules::provider::{CancelToken, MailProvider, ProviderFolder, RawPage};
use crate::modules::settings::cli::SETTINGS;
use crate::modules::store;
use crate::modules::store::entity::{ArchivedEmailWithAttachments, EmailAttachmentRow};
use crate::raise_error;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use dashmap::DashMap;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use super::token;

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// `$select` used for the primary attempt and for individually-refetched messages: everything
/// the normalizer needs without a second round trip.
const RICH_SELECT: &str = "id,internetMessageId,subject,from,toRecipients,ccRecipients,bccRecipients,sentDateTime,receivedDateTime,lastModifiedDateTime,hasAttachments,body,isDraft";
/// Narrower `$select` used once the server has rejected the rich one as "too complex".
const NARROW_SELECT: &str = "id,internetMessageId,subject,lastModifiedDateTime";
/// `$select` used while paging deletion candidates — only enough to derive a fingerprint.
const DELETE_SELECT: &str = "id,internetMessageId";

/// Graph caps `$top` at 999; clamp the configured batch size into that range.
fn batch_top() -> u32 {
    SETTINGS.rustmailer_batch_size.clamp(1, 999)
}
const DELETE_PAGE: u32 = 50;
const PERMISSIVE_WINDOW_MS: i64 = 30 * 24 * 60 * 60 * 1000;
/// Courtesy pause between pages, to stay under throttling.
const INTER_PAGE_PAUSE: Duration = Duration::from_millis(200);
/// Watermark re-query guard (glossary: "the engine re-queries from watermark − 12h"), mirroring
/// the same guard the IMAP adapter applies internally.
const CLOCK_SKEW_GUARD_MS: i64 = 12 * 60 * 60 * 1000;

pub struct GraphProvider {
    account_id: u64,
    upn: String,
    graph: GraphConfig,
    use_proxy: Option<u64>,
    http: HttpClient,
    /// Folder display path (e.g. `Inbox/Projects`) → Graph folder id, populated by `list_folders`.
    folder_ids: DashMap<String, String>,
    /// `@odata.nextLink` to resume from for a folder already mid-page, keyed by display path.
    next_links: DashMap<String, String>,
}

impl GraphProvider {
    pub async fn new(account_id: u64) -> RustMailerResult<Self> {
        let account = MailAccount::get(account_id).await?;
        let ProviderConfig::Graph(graph) = account.provider.clone() else {
            return Err(raise_error!(
                format!("account id={account_id} is not configured for Graph"),
                ErrorCode::InvalidParameter
            ));
        };
        let http = HttpClient::new(account.use_proxy).await?;
        Ok(Self {
            account_id,
            upn: account.email,
            graph,
            use_proxy: account.use_proxy,
            http,
            folder_ids: DashMap::new(),
            next_links: DashMap::new(),
        })
    }

    async fn token(&self) -> RustMailerResult<String> {
        token::acquire_token(&self.graph, self.use_proxy).await
    }

    fn folder_id(&self, folder: &str) -> RustMailerResult<String> {
        self.folder_ids.get(folder).map(|r| r.value().clone()).ok_or_else(|| {
            raise_error!(
                format!("unknown Graph folder '{folder}'; list_folders must run before fetch/delete"),
                ErrorCode::ResourceNotFound
            )
        })
    }

    fn messages_url(&self, folder_id: &str, filter: Option<&str>, select: &str, top: u32) -> String {
        let mut url = format!(
            "{GRAPH_BASE}/users/{}/mailFolders/{}/messages?$top={}&$select={}",
            self.upn, folder_id, top, select
        );
        if let Some(f) = filter {
            url.push_str("&$filter=");
            url.push_str(&urlencoding::encode(f));
        }
        url
    }

    /// Recursively walks `url` (a `mailFolders` or `childFolders` listing) and every child of
    /// any folder with `childFolderCount > 0`, following
    /// `@odata.nextLink` at each level.
    fn walk_folders<'a>(
        &'a self,
        url: String,
        parent_path: String,
        token: &'a str,
        out: &'a mut Vec<ProviderFolder>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = RustMailerResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut next_url = Some(url);
            while let Some(u) = next_url.take() {
                let body = self.http.get_json(&u, token).await?;
                let values = extract_values(&body);
                for item in &values {
                    let Some(id) = item.get("id").and_then(|v| v.as_str()) else { continue };
                    let name = item.get("displayName").and_then(|v| v.as_str()).unwrap_or("Unnamed");
                    let path = if parent_path.is_empty() {
                        name.to_string()
                    } else {
                        format!("{parent_path}/{name}")
                    };
                    self.folder_ids.insert(path.clone(), id.to_string());
                    out.push(ProviderFolder { name: path.clone() });

                    let child_count = item.get("childFolderCount").and_then(|v| v.as_i64()).unwrap_or(0);
                    if child_count > 0 {
                        let child_url = format!(
                            "{GRAPH_BASE}/users/{}/mailFolders/{}/childFolders?$top=100&$select=id,displayName,parentFolderId,childFolderCount,totalItemCount",
                            self.upn, id
                        );
                        self.walk_folders(child_url, path, token, out).await?;
                    }
                }
                next_url = extract_next(&body);
            }
            Ok(())
        })
    }

    /// Executes the filter de-escalation ladder for the first page of a
    /// folder's incremental fetch. Later pages just follow the stored `@odata.nextLink`.
    async fn initial_page(
        &self,
        folder_id: &str,
        since_millis: i64,
        token: &str,
    ) -> RustMailerResult<(Vec<Value>, Option<String>)> {
        let since_iso = to_rfc3339(since_millis);

        // Step 1: primary attempt.
        let url = self.messages_url(folder_id, Some(&format!("lastModifiedDateTime ge {since_iso}")), RICH_SELECT, batch_top());
        let (status, body) = self.http.get_json_allow_error(&url, token).await?;

        if status.is_success() {
            let values = extract_values(&body);
            if !values.is_empty() {
                return Ok((values, extract_next(&body)));
            }

            // Step 2: empty result — a diagnostic probe decides real-empty vs. filter-too-restrictive.
            let probe_url = self.messages_url(folder_id, None, RICH_SELECT, 1);
            let (probe_status, probe_body) = self.http.get_json_allow_error(&probe_url, token).await?;
            if probe_status.is_success() && extract_values(&probe_body).is_empty() {
                return Ok((Vec::new(), None));
            }

            let permissive_since = to_rfc3339(since_millis - PERMISSIVE_WINDOW_MS);
            let permissive_url = self.messages_url(
                folder_id,
                Some(&format!("lastModifiedDateTime ge {permissive_since}")),
                RICH_SELECT,
                batch_top(),
            );
            let (status2, body2) = self.http.get_json_allow_error(&permissive_url, token).await?;
            if status2.is_success() {
                return Ok((extract_values(&body2), extract_next(&body2)));
            }
            warn!("Graph permissive-window retry failed for folder id={folder_id}: {status2}");
            return Ok((Vec::new(), None));
        }

        // Step 3: the primary filter was rejected outright — retry with a narrower `$select`.
        warn!("Graph rejected the primary filter for folder id={folder_id} ({status}); retrying with narrower $select");
        let narrow_url = self.messages_url(folder_id, Some(&format!("lastModifiedDateTime ge {since_iso}")), NARROW_SELECT, batch_top());
        let (status3, body3) = self.http.get_json_allow_error(&narrow_url, token).await?;
        if status3.is_success() {
            return Ok((extract_values(&body3), extract_next(&body3)));
        }

        // Step 4: drop the filter entirely, keep the narrow select.
        warn!("Graph narrow-select retry still failed for folder id={folder_id} ({status3}); retrying without a filter");
        let bare_url = self.messages_url(folder_id, None, NARROW_SELECT, batch_top());
        let (status4, body4) = self.http.get_json_allow_error(&bare_url, token).await?;
        if status4.is_success() {
            return Ok((extract_values(&body4), extract_next(&body4)));
        }

        Err(raise_error!(
            format!("Graph message listing for folder id={folder_id} failed after every fallback: {status4}"),
            ErrorCode::GraphApiCallFailed
        ))
    }

    /// Fetches the full message when a summary row (the narrow-select fallbacks, or any
    /// provider that omits it) is missing body/recipients.
    async fn ensure_full_message(&self, item: Value, token: &str) -> RustMailerResult<Value> {
        let has_body = item.get("body").and_then(|b| b.get("content")).and_then(|v| v.as_str()).is_some();
        let has_to = item.get("toRecipients").is_some();
        if has_body && has_to {
            return Ok(item);
        }
        let Some(id) = item.get("id").and_then(|v| v.as_str()) else {
            return Ok(item);
        };
        let url = format!("{GRAPH_BASE}/users/{}/messages/{}?$select={}", self.upn, id, RICH_SELECT);
        match self.http.get_json(&url, token).await {
            Ok(full) => Ok(full),
            Err(e) => {
                warn!("failed to refetch full Graph message id={id}: {e:#?}");
                Ok(item)
            }
        }
    }

    /// Attachments are always fetched regardless of `hasAttachments` — it under-reports
    /// inline parts. Non-`fileAttachment` kinds (item/reference attachments) have no `contentBytes`
    /// and are skipped.
    async fn fetch_attachments(&self, graph_message_id: &str, token: &str) -> RustMailerResult<Vec<RawAttachment>> {
        let url = format!(
            "{GRAPH_BASE}/users/{}/messages/{}/attachments?$select=name,contentType,isInline,contentId,contentBytes,size",
            self.upn, graph_message_id
        );
        let body = self.http.get_json(&url, token).await?;
        let values = extract_values(&body);
        let mut out = Vec::with_capacity(values.len());
        for item in values {
            let Some(content_b64) = item.get("contentBytes").and_then(|v| v.as_str()) else {
                continue;
            };
            let Ok(content) = BASE64_STANDARD.decode(content_b64) else {
                continue;
            };
            let filename = item.get("name").and_then(|v| v.as_str()).map(str::to_string);
            let content_type = item
                .get("contentType")
                .and_then(|v| v.as_str())
                .unwrap_or("application/octet-stream")
                .to_string();
            let is_inline = item.get("isInline").and_then(|v| v.as_bool()).unwrap_or(false);
            // Strip angle brackets on storage so HTML `cid:` references match.
            let content_id = item
                .get("contentId")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_start_matches('<').trim_end_matches('>').to_string());
            out.push(RawAttachment {
                filename,
                content_type,
                content_id,
                disposition: Some(if is_inline { "inline".to_string() } else { "attachment".to_string() }),
                content,
            });
        }
        Ok(out)
    }

    async fn to_raw_message(&self, item: &Value, token: &str, folder: &str) -> RustMailerResult<RawMessage> {
        let message_id = item.get("internetMessageId").and_then(|v| v.as_str()).map(str::to_string);
        let subject = item.get("subject").and_then(|v| v.as_str()).map(str::to_string);
        let from = extract_address(item.get("from"));
        let to = extract_address_list(item.get("toRecipients"));
        let cc = extract_address_list(item.get("ccRecipients"));
        let bcc = extract_address_list(item.get("bccRecipients"));
        let sent_date_header = item.get("sentDateTime").and_then(|v| v.as_str()).map(str::to_string);
        let received_date = item.get("receivedDateTime").and_then(|v| v.as_str()).and_then(parse_rfc3339_millis);

        let content_type = item
            .get("body")
            .and_then(|b| b.get("contentType"))
            .and_then(|v| v.as_str())
            .unwrap_or("text");
        let content = item.get("body").and_then(|b| b.get("content")).and_then(|v| v.as_str()).unwrap_or_default();
        let (text_body, html_body) = if content_type.eq_ignore_ascii_case("html") {
            (None, Some(content.to_string()))
        } else {
            (Some(content.to_string()), None)
        };

        let attachments = match item.get("id").and_then(|v| v.as_str()) {
            Some(id) => self.fetch_attachments(id, token).await.unwrap_or_else(|e| {
                warn!("failed to fetch attachments for Graph message id={id}: {e:#?}");
                Vec::new()
            }),
            None => Vec::new(),
        };

        Ok(RawMessage {
            message_id,
            subject,
            from,
            to,
            cc,
            bcc,
            // `mail-parser`'s RFC-2822 parser isn't in play here; `date::parse_header_date`
            // falls back to RFC-3339, which is exactly what `sentDateTime` already is.
            date_header: sent_date_header,
            received_headers: Vec::new(),
            resent_date: None,
            text_body,
            html_body,
            raw_header_text: None,
            folder: folder.to_string(),
            received_date,
            attachments,
        })
    }
}

impl MailProvider for GraphProvider {
    async fn test_connection(&self) -> RustMailerResult<()> {
        let token = self.token().await?;
        let url = format!("{GRAPH_BASE}/users/{}?$select=id", self.upn);
        self.http.get_json(&url, &token).await?;
        Ok(())
    }

    async fn list_folders(&self) -> RustMailerResult<Vec<ProviderFolder>> {
        let token = self.token().await?;
        let root_url = format!(
            "{GRAPH_BASE}/users/{}/mailFolders?$top=100&$select=id,displayName,parentFolderId,childFolderCount,totalItemCount",
            self.upn
        );
        let mut folders = Vec::new();
        self.walk_folders(root_url, String::new(), &token, &mut folders).await?;
        Ok(folders)
    }

    async fn fetch_page(
        &self,
        folder: &str,
        since_millis: i64,
        offset: u64,
        cancel: &CancelToken,
    ) -> RustMailerResult<RawPage> {
        if cancel.is_cancelled() {
            return Ok(RawPage { messages: Vec::new(), has_more: false });
        }
        let folder_id = self.folder_id(folder)?;
        let token = self.token().await?;
        let effective_since = since_millis - CLOCK_SKEW_GUARD_MS;

        let (values, next_link) = if offset == 0 {
            self.next_links.remove(folder);
            self.initial_page(&folder_id, effective_since, &token).await?
        } else {
            let Some(url) = self.next_links.get(folder).map(|r| r.value().clone()) else {
                return Ok(RawPage { messages: Vec::new(), has_more: false });
            };
            tokio::time::sleep(INTER_PAGE_PAUSE).await;
            let body = self.http.get_json(&url, &token).await?;
            (extract_values(&body), extract_next(&body))
        };

        match &next_link {
            Some(link) => {
                self.next_links.insert(folder.to_string(), link.clone());
            }
            None => {
                self.next_links.remove(folder);
            }
        }

        let mut messages = Vec::with_capacity(values.len());
        for item in values {
            if cancel.is_cancelled() {
                break;
            }
            // Client-side filter regardless of what the server honored.
            let last_modified = item
                .get("lastModifiedDateTime")
                .and_then(|v| v.as_str())
                .and_then(parse_rfc3339_millis);
            if last_modified.is_some_and(|lm| lm < effective_since) {
                continue;
            }
            let full = self.ensure_full_message(item, &token).await?;
            let raw = self.to_raw_message(&full, &token, folder).await?;
            messages.push(raw);
        }

        Ok(RawPage { messages, has_more: next_link.is_some() })
    }

    async fn delete_old(&self, folder: &str, cutoff_millis: i64, cancel: &CancelToken) -> RustMailerResult<u64> {
        let folder_id = self.folder_id(folder)?;
        let token = self.token().await?;
        let cutoff_iso = to_rfc3339(cutoff_millis);
        let filter = format!("receivedDateTime lt {cutoff_iso}");

        let mut url = self.messages_url(&folder_id, Some(&filter), DELETE_SELECT, DELETE_PAGE);
        let mut deleted = 0u64;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let body = self.http.get_json(&url, &token).await?;
            let values = extract_values(&body);
            for item in &values {
                if cancel.is_cancelled() {
                    break;
                }
                let Some(message_id) = item.get("internetMessageId").and_then(|v| v.as_str()) else {
                    continue;
                };
                let (bare, bracketed) = lookup_variants(message_id);
                if !store::exists_by_fingerprint_variants(self.account_id as i64, &bare, &bracketed).await? {
                    continue;
                }
                let Some(graph_id) = item.get("id").and_then(|v| v.as_str()) else {
                    continue;
                };
                let delete_url = format!("{GRAPH_BASE}/users/{}/messages/{}", self.upn, graph_id);
                self.http.delete(&delete_url, &token).await?;
                deleted += 1;
            }

            match extract_next(&body) {
                Some(next) => {
                    tokio::time::sleep(INTER_PAGE_PAUSE).await;
                    url = next;
                }
                None => break,
            }
        }
        Ok(deleted)
    }

    async fn restore_one(&self, folder: &str, email: &ArchivedEmailWithAttachments) -> RustMailerResult<()> {
        let folder_id = match self.folder_id(folder) {
            Ok(id) => id,
            Err(_) => self.folder_id("Inbox")?,
        };
        let token = self.token().await?;

        let plain = email
            .email
            .original_plain_bytes
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_else(|| email.email.body.clone());
        let html = email
            .email
            .original_html_bytes
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .or_else(|| email.email.html_body.clone());

        let (content_type, content) = match &html {
            Some(h) => ("HTML", h.clone()),
            None => ("Text", plain),
        };

        let mut message = serde_json::json!({
            "subject": email.email.subject,
            "from": recipient_json(&email.email.from_addr),
            "toRecipients": recipients_json(&email.email.to_addr),
            "ccRecipients": recipients_json(&email.email.cc_addr),
            "bccRecipients": recipients_json(&email.email.bcc_addr),
            "body": { "contentType": content_type, "content": content },
            "isRead": false,
            // PidTagMessageFlags: marks the created item as not-a-draft.
            "singleValueExtendedProperties": [
                { "id": "Integer 0x0E07", "value": "1" }
            ],
        });
        if let Some(sent) = email.email.sent_date {
            message["sentDateTime"] = Value::String(sent.to_rfc3339());
        }
        if let Some(received) = email.email.received_date {
            message["receivedDateTime"] = Value::String(received.to_rfc3339());
        }
        if !email.email.message_fingerprint.starts_with("generated-") {
            message["internetMessageId"] = Value::String(format!("<{}>", email.email.message_fingerprint));
        }

        let create_url = format!("{GRAPH_BASE}/users/{}/mailFolders/{}/messages", self.upn, folder_id);
        let created = self.http.post_json(&create_url, &token, &message).await?;
        let Some(message_graph_id) = created.get("id").and_then(|v| v.as_str()) else {
            return Err(raise_error!("Graph message creation did not return an id", ErrorCode::GraphApiCallFailed));
        };

        // Inline attachments first so `cid:` references resolve as soon as the client renders.
        let (inline, regular): (Vec<&EmailAttachmentRow>, Vec<&EmailAttachmentRow>) =
            email.attachments.iter().partition(|a| a.content_id.is_some());

        for attachment in inline.into_iter().chain(regular) {
            let attachment_url = format!("{GRAPH_BASE}/users/{}/messages/{}/attachments", self.upn, message_graph_id);
            let mut payload = serde_json::json!({
                "@odata.type": "#microsoft.graph.fileAttachment",
                "name": attachment.filename,
                "contentType": attachment.content_type,
                "contentBytes": BASE64_STANDARD.encode(&attachment.content),
            });
            if let Some(cid) = &attachment.content_id {
                payload["contentId"] = Value::String(cid.clone());
                payload["isInline"] = Value::Bool(true);
            }
            self.http.post_json(&attachment_url, &token, &payload).await?;
        }
        Ok(())
    }
}

fn extract_values(body: &Value) -> Vec<Value> {
    body.get("value").and_then(|v| v.as_array()).cloned().unwrap_or_default()
}

fn extract_next(body: &Value) -> Option<String> {
    body.get("@odata.nextLink").and_then(|v| v.as_str()).map(str::to_string)
}

fn parse_rfc3339_millis(s: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp_millis())
}

fn to_rfc3339(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .unwrap_or_else(|| chrono::DateTime::from_timestamp_millis(0).expect("epoch is representable"))
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// A Graph `from`/recipient object looks like `{"emailAddress": {"name": ..., "address": ...}}`.
fn extract_address(value: Option<&Value>) -> Option<String> {
    let email = value?.get("emailAddress")?;
    let address = email.get("address").and_then(|v| v.as_str())?;
    let name = email.get("name").and_then(|v| v.as_str());
    Some(match name {
        Some(n) if !n.is_empty() && n != address => format!("{n} <{address}>"),
        _ => address.to_string(),
    })
}

fn extract_address_list(value: Option<&Value>) -> Option<String> {
    let arr = value?.as_array()?;
    let parts: Vec<String> = arr.iter().filter_map(|item| extract_address(Some(item))).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn recipient_json(addr: &str) -> Value {
    serde_json::json!({ "emailAddress": { "address": addr } })
}

fn recipients_json(addrs: &str) -> Vec<Value> {
    addrs.split(',').map(str::trim).filter(|s| !s.is_empty()).map(recipient_json).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_named_address() {
        let v = serde_json::json!({ "emailAddress": { "name": "Alice", "address": "alice@example.com" } });
        assert_eq!(extract_address(Some(&v)).as_deref(), Some("Alice <alice@example.com>"));
    }

    #[test]
    fn falls_back_to_bare_address_when_name_matches_or_missing() {
        let v = serde_json::json!({ "emailAddress": { "name": "", "address": "bob@example.com" } });
        assert_eq!(extract_address(Some(&v)).as_deref(), Some("bob@example.com"));
    }

    #[test]
    fn joins_recipient_list() {
        let v = serde_json::json!([
            { "emailAddress": { "name": "Alice", "address": "alice@example.com" } },
            { "emailAddress": { "name": "", "address": "bob@example.com" } }
        ]);
        assert_eq!(
            extract_address_list(Some(&v)).as_deref(),
            Some("Alice <alice@example.com>, bob@example.com")
        );
    }

    #[test]
    fn empty_recipient_list_is_none() {
        let v = serde_json::json!([]);
        assert_eq!(extract_address_list(Some(&v)), None);
    }

    #[test]
    fn recipients_json_skips_blank_entries() {
        let addrs = "alice@example.com,  , bob@example.com";
        let out = recipients_json(addrs);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn rfc3339_round_trips_through_millis() {
        let millis = 1_700_000_000_000i64;
        let iso = to_rfc3339(millis);
        assert_eq!(parse_rfc3339_millis(&iso), Some(millis));
    }
}
