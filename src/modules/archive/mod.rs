// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Archive Writer: the single choke point through which every normalized message passes
//! on its way into the store. Owns the idempotent-insert protocol so the Sync Engine, the
//! Importer, and the Restore path all get the same duplicate handling for free.

use crate::modules::error::RustMailerResult;
use crate::modules::normalizer::draft::DraftEmail;
use crate::modules::store;
use crate::modules::store::entity::ArchivedEmailRow;

/// What happened when a normalized message was handed to the writer.
#[derive(Debug)]
pub enum ArchiveOutcome {
    /// A brand new row was inserted.
    Inserted { email_id: i64 },
    /// A duplicate of an already-archived message, already in the same folder. No write made.
    AlreadyExists { email_id: i64 },
    /// A duplicate that the provider now reports under a different folder — folder moves
    /// (including server-side "Sent"/"Archive" reclassification) follow the message.
    FolderMoved { email_id: i64, from_folder: String, to_folder: String },
}

/// Archives one normalized message for `account_id`. Looks up the existing row by fingerprint and
/// the ±2s secondary predicate first; only inserts when neither matches.
pub async fn archive(account_id: i64, draft: &DraftEmail) -> RustMailerResult<ArchiveOutcome> {
    let sent_date = draft.sent_date.and_then(store::millis_to_datetime);
    let existing: Option<ArchivedEmailRow> =
        store::find_duplicate(account_id, &draft.fingerprint, &draft.from, &draft.to, &draft.subject, sent_date).await?;

    if let Some(row) = existing {
        if row.folder_name == draft.folder {
            return Ok(ArchiveOutcome::AlreadyExists { email_id: row.id });
        }
        let from_folder = row.folder_name.clone();
        store::move_email_folder(row.id, &draft.folder).await?;
        return Ok(ArchiveOutcome::FolderMoved {
            email_id: row.id,
            from_folder,
            to_folder: draft.folder.clone(),
        });
    }

    let email_id = store::insert_email_with_attachments(account_id, draft).await?;
    Ok(ArchiveOutcome::Inserted { email_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_variants_carry_the_email_id() {
        let outcome = ArchiveOutcome::Inserted { email_id: 42 };
        match outcome {
            ArchiveOutcome::Inserted { email_id } => assert_eq!(email_id, 42),
            _ => panic!("wrong variant"),
        }
    }
}
