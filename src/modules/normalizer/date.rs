// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Sent-date extraction: prefer `Date:`; if malformed, scan `Received:` headers
//! oldest-to-newest for a parseable timestamp; else `Resent-Date:`; else the `MinValue`
//! sentinel (represented here as `None`).

use chrono::DateTime;

use super::raw::RawMessage;

/// `Received:` headers end in `; <date>`; everything before the last semicolon is routing
/// info we don't care about.
fn received_date_part(received: &str) -> Option<&str> {
    received.rsplit(';').next().map(str::trim)
}

/// Strips a trailing `(ZONE)` parenthetical comment some servers append after the offset,
/// e.g. `Tue, 1 Jan 2024 00:00:00 +0000 (UTC)`.
fn strip_zone_comment(s: &str) -> &str {
    let trimmed = s.trim();
    if trimmed.ends_with(')') {
        if let Some(open) = trimmed.rfind('(') {
            return trimmed[..open].trim_end();
        }
    }
    trimmed
}

/// Fixed list of RFC-2822-shaped formats tried before the permissive `chrono` fallback.
const FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M %z",
    "%a, %d %b %Y %H:%M:%S %Z",
];

/// Parses a single date-ish header value into unix millis, trying the fixed format list
/// before falling back to `chrono`'s permissive RFC-2822 parser.
pub fn parse_header_date(raw: &str) -> Option<i64> {
    let cleaned = strip_zone_comment(raw);
    for fmt in FORMATS {
        if let Ok(dt) = chrono::DateTime::parse_from_str(cleaned, fmt) {
            return Some(dt.timestamp_millis());
        }
    }
    DateTime::parse_from_rfc2822(cleaned)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(cleaned).ok())
        .map(|dt| dt.timestamp_millis())
}

/// Extracts the sent-date for a message per §4.B's fallback ladder.
pub fn extract_sent_date(msg: &RawMessage) -> Option<i64> {
    if let Some(date) = msg.date_header.as_deref() {
        if let Some(ts) = parse_header_date(date) {
            return Some(ts);
        }
    }
    // `received_headers` is newest-first as written on the wire (each hop prepends); reverse
    // to scan oldest-to-newest per §4.B and take the first one that parses.
    for received in msg.received_headers.iter().rev() {
        if let Some(part) = received_date_part(received) {
            if let Some(ts) = parse_header_date(part) {
                return Some(ts);
            }
        }
    }
    if let Some(resent) = msg.resent_date.as_deref() {
        if let Some(ts) = parse_header_date(resent) {
            return Some(ts);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_date_header() {
        let mut msg = blank();
        msg.date_header = Some("Tue, 1 Jan 2024 00:00:00 +0000".into());
        msg.received_headers = vec!["from a by b; Mon, 31 Dec 2023 00:00:00 +0000".into()];
        let ts = extract_sent_date(&msg).unwrap();
        let expected = DateTime::parse_from_rfc2822("Tue, 1 Jan 2024 00:00:00 +0000")
            .unwrap()
            .timestamp_millis();
        assert_eq!(ts, expected);
    }

    #[test]
    fn falls_back_to_oldest_received_header() {
        let mut msg = blank();
        msg.date_header = Some("not a date".into());
        msg.received_headers = vec![
            "from a by b; Tue, 2 Jan 2024 00:00:00 +0000".into(),
            "from c by d; Mon, 1 Jan 2024 00:00:00 +0000".into(),
        ];
        let ts = extract_sent_date(&msg).unwrap();
        let expected = DateTime::parse_from_rfc2822("Mon, 1 Jan 2024 00:00:00 +0000")
            .unwrap()
            .timestamp_millis();
        assert_eq!(ts, expected, "scans oldest-to-newest, so the oldest entry wins");
    }

    #[test]
    fn strips_trailing_zone_comment() {
        let ts = parse_header_date("Tue, 1 Jan 2024 00:00:00 +0000 (UTC)");
        assert!(ts.is_some());
    }

    #[test]
    fn none_when_nothing_parses() {
        let mut msg = blank();
        msg.date_header = Some("garbage".into());
        assert_eq!(extract_sent_date(&msg), None);
    }

    fn blank() -> RawMessage {
        RawMessage {
            message_id: None,
            subject: None,
            from: None,
            to: None,
            cc: None,
            bcc: None,
            date_header: None,
            received_headers: vec![],
            resent_date: None,
            text_body: None,
            html_body: None,
            raw_header_text: None,
            folder: "INBOX".into(),
            received_date: None,
            attachments: vec![],
        }
    }
}
