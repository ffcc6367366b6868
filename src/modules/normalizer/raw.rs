// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! The provider-agnostic shape [`normalizer::normalize`](super::normalize) consumes. The IMAP
//! adapter builds one from a `mail-parser` tree; the Graph adapter builds one from a message
//! JSON payload plus its fetched attachments. Neither provider's own types appear past here.

/// One MIME/Graph attachment part before normalization.
#[derive(Clone, Debug)]
pub struct RawAttachment {
    pub filename: Option<String>,
    pub content_type: String,
    /// Present ⇒ inline part referenced from HTML via `cid:`. Stored as-received for IMAP;
    /// the Graph adapter strips angle brackets before constructing this.
    pub content_id: Option<String>,
    pub disposition: Option<String>,
    pub content: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct RawMessage {
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    /// Raw `Date:` header value, unparsed.
    pub date_header: Option<String>,
    /// Raw `Received:` header values in header order (top-to-bottom, i.e. newest-first as
    /// written on the wire); date extraction walks this reversed (oldest-first) per §4.B.
    pub received_headers: Vec<String>,
    /// Raw `Resent-Date:` header value, unparsed.
    pub resent_date: Option<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub raw_header_text: Option<String>,
    pub folder: String,
    /// Provider-reported received/internal timestamp, unix millis UTC.
    pub received_date: Option<i64>,
    pub attachments: Vec<RawAttachment>,
}
