// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Incoming vs. outgoing.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Incoming => write!(f, "incoming"),
            Direction::Outgoing => write!(f, "outgoing"),
        }
    }
}

/// Row shape of `archived_emails`, joined with its attachments by the Store Gateway when asked.
#[derive(Clone, Debug, FromRow, Serialize, Deserialize)]
pub struct ArchivedEmailRow {
    pub id: i64,
    pub account_id: i64,
    pub message_fingerprint: String,
    pub subject: String,
    pub from_addr: String,
    pub to_addr: String,
    pub cc_addr: String,
    pub bcc_addr: String,
    pub sent_date: Option<chrono::DateTime<chrono::Utc>>,
    pub received_date: Option<chrono::DateTime<chrono::Utc>>,
    pub direction: Direction,
    pub has_attachments: bool,
    pub folder_name: String,
    pub is_locked: bool,
    pub body: String,
    pub html_body: Option<String>,
    pub original_plain_bytes: Option<Vec<u8>>,
    pub original_html_bytes: Option<Vec<u8>>,
    pub raw_headers: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Debug, FromRow, Serialize, Deserialize)]
pub struct EmailAttachmentRow {
    pub id: i64,
    pub email_id: i64,
    pub filename: String,
    pub content_type: String,
    pub content_id: Option<String>,
    pub content: Vec<u8>,
    pub size: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchivedEmailWithAttachments {
    pub email: ArchivedEmailRow,
    pub attachments: Vec<EmailAttachmentRow>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountStats {
    pub account_id: i64,
    pub email_count: i64,
    pub last_sync: Option<chrono::DateTime<chrono::Utc>>,
    pub enabled: bool,
}

/// One `field:term`/`field:"phrase"` predicate the Search Service resolved from the query
/// language; `column` is already whitelisted to a fixed set of text columns, never passed
/// through from raw user input.
#[derive(Clone, Debug)]
pub struct FieldMatch {
    pub column: &'static str,
    pub term: String,
}

/// Parsed text-match predicate: bare words are evaluated through `to_tsquery` (or its
/// `ILIKE` fallback); phrases and field matches become `POSITION` substring clauses either way.
#[derive(Clone, Debug, Default)]
pub struct TextPredicate {
    pub words: Vec<String>,
    pub phrases: Vec<String>,
    pub field_matches: Vec<FieldMatch>,
}

/// Fully-resolved search request the Store Gateway executes. Every field has already been
/// validated/whitelisted by the Search Service; the gateway trusts it and just builds SQL.
#[derive(Clone, Debug)]
pub struct SearchPredicate {
    pub text: TextPredicate,
    pub allowed_accounts: Vec<i64>,
    pub direction: Option<Direction>,
    pub folder: Option<String>,
    pub date_from: Option<chrono::DateTime<chrono::Utc>>,
    /// Already adjusted to the last second of the calendar day (§4.H: "inclusive to the last
    /// second of the specified day").
    pub date_to_inclusive: Option<chrono::DateTime<chrono::Utc>>,
    /// One of `OrderField`'s whitelisted columns — never raw caller input.
    pub order_by: &'static str,
    pub order_desc: bool,
    pub skip: i64,
    pub take: i64,
}
