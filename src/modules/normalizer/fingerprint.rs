// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Message Fingerprint derivation. The dedup key the Archive Writer keys on, alongside a
//! secondary (from, to, subject, sent-date ±2s) predicate applied by the caller.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};

/// Window (inclusive) the secondary dedup predicate matches sent-date within, in milliseconds.
pub const SECONDARY_MATCH_WINDOW_MS: i64 = 2_000;

/// Strips a leading `<` and trailing `>` so bracketed and unbracketed forms compare equal.
pub fn normalize_message_id(message_id: &str) -> String {
    message_id.trim().trim_start_matches('<').trim_end_matches('>').to_string()
}

/// Both the bracketed and the bare form, for lookups that must match either (§3, §4.D retention
/// delete).
pub fn lookup_variants(message_id: &str) -> (String, String) {
    let bare = normalize_message_id(message_id);
    let bracketed = format!("<{bare}>");
    (bare, bracketed)
}

/// Derives the fingerprint for a message. Prefers a usable `Message-ID`; otherwise derives a
/// deterministic `generated-<hash>@mail-archiver.local` from from/to/subject/sent-date.
pub fn derive(
    message_id: Option<&str>,
    from: &str,
    to: &str,
    subject: &str,
    sent_date: Option<i64>,
) -> String {
    if let Some(mid) = message_id {
        let normalized = normalize_message_id(mid);
        if !normalized.is_empty() {
            return normalized;
        }
    }
    let ticks = sent_date.unwrap_or(0);
    let basis = format!("{from}|{to}|{subject}|{ticks}");
    let digest = Sha256::digest(basis.as_bytes());
    let encoded = URL_SAFE_NO_PAD.encode(digest);
    let truncated: String = encoded.chars().take(16).collect();
    format!("generated-{truncated}@mail-archiver.local")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_message_id_verbatim() {
        assert_eq!(
            derive(Some("<abc@example.com>"), "a", "b", "c", Some(1)),
            "abc@example.com"
        );
    }

    #[test]
    fn bracketed_and_unbracketed_are_equivalent() {
        let bracketed = derive(Some("<abc@example.com>"), "a", "b", "c", Some(1));
        let unbracketed = derive(Some("abc@example.com"), "a", "b", "c", Some(1));
        assert_eq!(bracketed, unbracketed);
    }

    #[test]
    fn generates_deterministic_fingerprint_without_message_id() {
        let first = derive(None, "alice", "bob", "hi", Some(1000));
        let second = derive(None, "alice", "bob", "hi", Some(1000));
        assert_eq!(first, second);
        assert!(first.starts_with("generated-"));
        assert!(first.ends_with("@mail-archiver.local"));
        // hash segment is exactly 16 chars
        let hash_part = first
            .strip_prefix("generated-")
            .unwrap()
            .strip_suffix("@mail-archiver.local")
            .unwrap();
        assert_eq!(hash_part.len(), 16);
    }

    #[test]
    fn different_inputs_generate_different_fingerprints() {
        let a = derive(None, "alice", "bob", "hi", Some(1000));
        let b = derive(None, "alice", "bob", "hi", Some(2000));
        assert_ne!(a, b);
    }
}
