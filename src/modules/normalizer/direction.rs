// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use super::folders;
use crate::modules::common::Addr;
use crate::modules::store::entity::Direction;

/// Direction classification: outgoing iff the `from` address equals the account's own
/// email (case-insensitively), OR the folder is recognized as a sent folder and is not also a
/// drafts folder.
pub fn classify(from: &str, account_email: &str, folder: &str) -> Direction {
    let from_address = extract_address(from);
    let is_self = from_address
        .as_deref()
        .map(|addr| addr.eq_ignore_ascii_case(account_email))
        .unwrap_or(false);

    let is_sent_folder = folders::is_sent_folder(folder) && !folders::is_drafts_folder(folder);

    if is_self || is_sent_folder {
        Direction::Outgoing
    } else {
        Direction::Incoming
    }
}

fn extract_address(from: &str) -> Option<String> {
    let addr = Addr::parse(from);
    addr.address
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outgoing_when_from_matches_account() {
        let d = classify("Alice <alice@example.com>", "alice@example.com", "INBOX");
        assert_eq!(d, Direction::Outgoing);
    }

    #[test]
    fn outgoing_when_from_matches_case_insensitively() {
        let d = classify("ALICE@EXAMPLE.COM", "alice@example.com", "INBOX");
        assert_eq!(d, Direction::Outgoing);
    }

    #[test]
    fn outgoing_when_folder_is_sent_folder() {
        let d = classify("bob@example.com", "alice@example.com", "Sent Items");
        assert_eq!(d, Direction::Outgoing);
    }

    #[test]
    fn incoming_when_folder_is_sent_but_also_drafts_named() {
        // a folder whose name matches neither the sent nor the self-from condition
        let d = classify("bob@example.com", "alice@example.com", "INBOX");
        assert_eq!(d, Direction::Incoming);
    }

    #[test]
    fn incoming_by_default() {
        let d = classify("bob@example.com", "alice@example.com", "Archive/2024");
        assert_eq!(d, Direction::Incoming);
    }
}
