// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::store::entity::Direction;

/// Output of [`super::normalize`]: a message ready for the Archive Writer. Carries no
/// account id or assigned primary key — the writer owns identity assignment and the
/// fingerprint/folder dedup decision.
#[derive(Clone, Debug)]
pub struct DraftEmail {
    pub fingerprint: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    /// Unix millis. `None` maps to the `MinValue` sentinel.
    pub sent_date: Option<i64>,
    pub received_date: Option<i64>,
    pub direction: Direction,
    pub has_attachments: bool,
    pub folder: String,
    pub body: String,
    pub html_body: Option<String>,
    pub original_plain_bytes: Option<Vec<u8>>,
    pub original_html_bytes: Option<Vec<u8>>,
    pub raw_headers: Option<String>,
    pub attachments: Vec<DraftAttachment>,
}

#[derive(Clone, Debug)]
pub struct DraftAttachment {
    pub filename: String,
    pub content_type: String,
    pub content_id: Option<String>,
    pub content: Vec<u8>,
    pub size: i64,
}
