// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Rebuilds a MIME message from an archived record.
//! Shared by the IMAP restore path and the export job so both reconstitute attachments —
//! inline and regular — the same way, preferring `original_*` bytes over the search-capped
//! columns (§9 open question (c)).

use crate::modules::error::{code::ErrorCode, RustMailerResult};
use crate::modules::store::entity::ArchivedEmailWithAttachments;
use crate::raise_error;
use mail_builder::MessageBuilder;

/// Builds the raw `.eml` bytes for one archived email, reconstructing linked resources from its
/// inline attachments (Content-ID preserved) and regular attachments from the rest.
pub fn build(email: &ArchivedEmailWithAttachments) -> RustMailerResult<Vec<u8>> {
    let mut builder = MessageBuilder::new()
        .from(email.email.from_addr.clone())
        .subject(email.email.subject.clone());

    for to in split_addresses(&email.email.to_addr) {
        builder = builder.to(to);
    }
    for cc in split_addresses(&email.email.cc_addr) {
        builder = builder.cc(cc);
    }

    let plain = email
        .email
        .original_plain_bytes
        .as_deref()
        .and_then(|b| std::str::from_utf8(b).ok())
        .map(str::to_string)
        .unwrap_or_else(|| email.email.body.clone());

    let html = email
        .email
        .original_html_bytes
        .as_deref()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .or_else(|| email.email.html_body.clone());

    builder = match html {
        Some(html) => builder.html_body(html).text_body(plain),
        None => builder.text_body(plain),
    };

    for attachment in &email.attachments {
        if let Some(cid) = &attachment.content_id {
            builder = builder.binary_inline(attachment.content_type.clone(), attachment.content.clone(), cid.clone());
        } else {
            builder = builder.attachment(attachment.content_type.clone(), attachment.filename.clone(), attachment.content.clone());
        }
    }

    builder
        .write_to_vec()
        .map_err(|e| raise_error!(format!("failed to build MIME message: {e:#?}"), ErrorCode::InternalError))
}

fn split_addresses(addrs: &str) -> impl Iterator<Item = String> + '_ {
    addrs.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::store::entity::{ArchivedEmailRow, Direction};

    fn sample() -> ArchivedEmailWithAttachments {
        ArchivedEmailWithAttachments {
            email: ArchivedEmailRow {
                id: 1,
                account_id: 1,
                message_fingerprint: "<a@x>".into(),
                subject: "hello".into(),
                from_addr: "alice@example.com".into(),
                to_addr: "bob@example.com, carol@example.com".into(),
                cc_addr: String::new(),
                bcc_addr: String::new(),
                sent_date: None,
                received_date: None,
                direction: Direction::Incoming,
                has_attachments: false,
                folder_name: "INBOX".into(),
                is_locked: false,
                body: "hi there".into(),
                html_body: None,
                original_plain_bytes: None,
                original_html_bytes: None,
                raw_headers: None,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            },
            attachments: Vec::new(),
        }
    }

    #[test]
    fn builds_a_minimal_message() {
        let bytes = build(&sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("hello"));
        assert!(text.contains("alice@example.com"));
        assert!(text.contains("bob@example.com"));
    }

    #[test]
    fn prefers_original_bytes_over_capped_columns() {
        let mut email = sample();
        email.email.body = "[TRUNCATED]".into();
        email.email.original_plain_bytes = Some(b"the full original body".to_vec());
        let bytes = build(&email).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("the full original body"));
        assert!(!text.contains("[TRUNCATED]"));
    }
}
