// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Turns a provider-agnostic [`raw::RawMessage`] into a [`draft::DraftEmail`] ready for the
//! Archive Writer: text cleaning, date extraction, attachment collection, search-size capping,
//! fingerprinting, and direction detection all happen here. Neither IMAP nor Graph specifics
//! leak past [`raw::RawMessage`] — each adapter is responsible for building one.

pub mod attachments;
pub mod date;
pub mod direction;
pub mod draft;
pub mod fingerprint;
pub mod folders;
pub mod raw;
pub mod text;

use crate::modules::error::RustMailerResult;
use draft::{DraftAttachment, DraftEmail};
use raw::RawMessage;

/// Per-field search-index caps. The full-text index has a ≈1 MiB hard limit per row;
/// these keep any single email well under it even before the final total-bytes safety pass.
pub const SUBJECT_CAP: usize = 50 * 1024;
pub const FROM_CAP: usize = 10 * 1024;
pub const RECIPIENT_CAP: usize = 50 * 1024;
pub const PLAIN_BODY_CAP: usize = 500 * 1024;
pub const HTML_BODY_CAP: usize = 1024 * 1024;
pub const RAW_HEADERS_CAP: usize = 100 * 1024;
/// Total-bytes safety net across the six searchable fields.
pub const TOTAL_SEARCHABLE_CAP: usize = 900 * 1024;

/// Runs the full normalize pipeline for one message and produces a draft ready to archive.
pub fn normalize(account_email: &str, msg: &RawMessage) -> RustMailerResult<DraftEmail> {
    let subject = text::clean_control_chars(msg.subject.as_deref().unwrap_or_default());
    let from = text::clean_control_chars(msg.from.as_deref().unwrap_or_default());
    let to = text::clean_control_chars(msg.to.as_deref().unwrap_or_default());
    let cc = text::clean_control_chars(msg.cc.as_deref().unwrap_or_default());
    let bcc = text::clean_control_chars(msg.bcc.as_deref().unwrap_or_default());

    let sent_date = date::extract_sent_date(msg);

    let raw_headers = msg.raw_header_text.as_deref().map(|h| {
        let cleaned = text::clean_control_chars(h);
        text::cap_plain_text(&cleaned, RAW_HEADERS_CAP).value
    });

    let plain_source = match (&msg.text_body, &msg.html_body) {
        (Some(text), _) => text::clean_control_chars(text),
        (None, Some(html)) => text::clean_control_chars(&text::html_to_text(html)),
        (None, None) => String::new(),
    };
    let html_source = msg.html_body.as_deref().map(text::clean_control_chars);

    let plain_capped = text::cap_plain_text(&plain_source, PLAIN_BODY_CAP);
    let html_capped = html_source
        .as_deref()
        .map(|h| text::cap_html(h, HTML_BODY_CAP));

    // original_* bytes are populated when truncation happened OR the source contained a NUL,
    // per §9 open question (a): both triggers, not just one.
    let plain_had_nul = msg.text_body.as_deref().map(contains_nul).unwrap_or(false)
        || (msg.text_body.is_none() && msg.html_body.as_deref().map(contains_nul).unwrap_or(false));
    let original_plain_bytes = if plain_capped.truncated || plain_had_nul {
        Some(plain_source.clone().into_bytes())
    } else {
        None
    };

    let html_had_nul = msg.html_body.as_deref().map(contains_nul).unwrap_or(false);
    let original_html_bytes = match (&html_capped, &html_source) {
        (Some(c), Some(src)) if c.truncated || html_had_nul => Some(src.clone().into_bytes()),
        _ => None,
    };

    let subject_capped = text::cap_plain_text(&subject, SUBJECT_CAP).value;
    let from_capped = text::cap_plain_text(&from, FROM_CAP).value;
    let to_capped = text::cap_plain_text(&to, RECIPIENT_CAP).value;
    let cc_capped = text::cap_plain_text(&cc, RECIPIENT_CAP).value;
    let bcc_capped = text::cap_plain_text(&bcc, RECIPIENT_CAP).value;
    let mut body_capped = plain_capped.value;
    let mut html_body_capped = html_capped.map(|c| c.value).unwrap_or_default();

    shrink_to_total_budget(
        &subject_capped,
        &from_capped,
        &to_capped,
        &cc_capped,
        &bcc_capped,
        &mut body_capped,
        &mut html_body_capped,
    );

    let direction = direction::classify(&from, account_email, &msg.folder);

    let draft_attachments: Vec<DraftAttachment> = msg
        .attachments
        .iter()
        .map(attachments::normalize_attachment)
        .collect();
    let has_attachments = !draft_attachments.is_empty();

    let fingerprint = fingerprint::derive(msg.message_id.as_deref(), &from, &to, &subject, sent_date);

    Ok(DraftEmail {
        fingerprint,
        subject: subject_capped,
        from: from_capped,
        to: to_capped,
        cc: cc_capped,
        bcc: bcc_capped,
        sent_date,
        received_date: msg.received_date,
        direction,
        has_attachments,
        folder: msg.folder.clone(),
        body: body_capped,
        html_body: if html_body_capped.is_empty() {
            None
        } else {
            Some(html_body_capped)
        },
        original_plain_bytes,
        original_html_bytes,
        raw_headers,
        attachments: draft_attachments,
    })
}

fn contains_nul(s: &str) -> bool {
    s.as_bytes().contains(&0)
}

/// Final safety pass: if the sum of the six searchable fields still exceeds the total
/// budget after per-field capping, shrink the (larger) body fields further. The body is always
/// the field big enough to matter; subject/from/to/cc/bcc are already tightly capped.
#[allow(clippy::too_many_arguments)]
fn shrink_to_total_budget(
    subject: &str,
    from: &str,
    to: &str,
    cc: &str,
    bcc: &str,
    body: &mut String,
    html_body: &mut String,
) {
    let fixed = subject.len() + from.len() + to.len() + cc.len() + bcc.len();
    if fixed + body.len() + html_body.len() <= TOTAL_SEARCHABLE_CAP {
        return;
    }
    let remaining = TOTAL_SEARCHABLE_CAP.saturating_sub(fixed);
    // Give the plain body priority (it's what most searches hit); html eats what's left.
    let body_budget = remaining.min(body.len()).max(remaining / 2).min(remaining);
    if body.len() > body_budget {
        *body = text::cap_plain_text(body, body_budget).value;
    }
    let remaining_for_html = remaining.saturating_sub(body.len());
    if html_body.len() > remaining_for_html {
        *html_body = text::cap_html(html_body, remaining_for_html).value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw::RawAttachment;

    fn sample(text_body: &str) -> RawMessage {
        RawMessage {
            message_id: Some("<a@x>".into()),
            subject: Some("hello".into()),
            from: Some("alice@example.com".into()),
            to: Some("bob@example.com".into()),
            cc: None,
            bcc: None,
            date_header: Some("Tue, 14 Nov 2023 22:13:20 +0000".into()),
            received_headers: vec![],
            resent_date: None,
            text_body: Some(text_body.to_string()),
            html_body: None,
            raw_header_text: Some("Subject: hello\nFrom: alice@example.com\n".into()),
            folder: "INBOX".into(),
            received_date: Some(1_700_000_000_000),
            attachments: vec![],
        }
    }

    #[test]
    fn normalizes_a_plain_message() {
        let raw = sample("hello world");
        let draft = normalize("alice@example.com", &raw).unwrap();
        assert_eq!(draft.subject, "hello");
        assert_eq!(draft.body, "hello world");
        assert_eq!(draft.fingerprint, "<a@x>");
        assert!(!draft.has_attachments);
    }

    #[test]
    fn generates_fingerprint_without_message_id() {
        let mut raw = sample("hi");
        raw.message_id = None;
        let draft = normalize("alice@example.com", &raw).unwrap();
        assert!(draft.fingerprint.starts_with("generated-"));
        assert!(draft.fingerprint.ends_with("@mail-archiver.local"));
    }

    #[test]
    fn collects_inline_and_regular_attachments() {
        let mut raw = sample("hi");
        raw.attachments = vec![
            RawAttachment {
                filename: Some("logo.png".into()),
                content_type: "image/png".into(),
                content_id: Some("logo123".into()),
                disposition: None,
                content: vec![1, 2, 3],
            },
            RawAttachment {
                filename: Some("report.pdf".into()),
                content_type: "application/pdf".into(),
                content_id: None,
                disposition: Some("attachment".into()),
                content: vec![4, 5, 6],
            },
        ];
        let draft = normalize("alice@example.com", &raw).unwrap();
        assert!(draft.has_attachments);
        assert_eq!(draft.attachments.len(), 2);
        assert_eq!(draft.attachments[0].content_id.as_deref(), Some("logo123"));
    }
}
