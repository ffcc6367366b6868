// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Store Gateway: transactional access to the archive — the one place this crate reaches
//! past the teacher's own `native_db` stack onto Postgres via `sqlx`, because the spec is
//! explicit about needing a GIN/tsvector full-text index (see DESIGN.md for the full rationale).
//! `MailAccount` identity/config stays in the embedded store (`account::entity`); this module
//! owns only `ArchivedEmail`/`EmailAttachment`.

pub mod entity;

use crate::modules::context::Initialize;
use crate::modules::error::{code::ErrorCode, RustMailerResult};
use crate::modules::normalizer::draft::DraftEmail;
use crate::modules::settings::cli::SETTINGS;
use crate::raise_error;
use entity::{
    AccountStats, ArchivedEmailRow, ArchivedEmailWithAttachments, Direction, EmailAttachmentRow,
    SearchPredicate,
};
use futures::stream::{BoxStream, StreamExt};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

/// The six text columns a bare word or unqualified phrase matches against.
const TEXT_COLUMNS: [&str; 6] = ["subject", "body", "from_addr", "to_addr", "cc_addr", "bcc_addr"];

static POOL: OnceLock<PgPool> = OnceLock::new();

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS archived_emails (
    id BIGINT PRIMARY KEY,
    account_id BIGINT NOT NULL,
    message_fingerprint TEXT NOT NULL,
    subject TEXT NOT NULL DEFAULT '',
    from_addr TEXT NOT NULL DEFAULT '',
    to_addr TEXT NOT NULL DEFAULT '',
    cc_addr TEXT NOT NULL DEFAULT '',
    bcc_addr TEXT NOT NULL DEFAULT '',
    sent_date TIMESTAMPTZ,
    received_date TIMESTAMPTZ,
    direction TEXT NOT NULL,
    has_attachments BOOLEAN NOT NULL DEFAULT FALSE,
    folder_name TEXT NOT NULL,
    is_locked BOOLEAN NOT NULL DEFAULT FALSE,
    body TEXT NOT NULL DEFAULT '',
    html_body TEXT,
    original_plain_bytes BYTEA,
    original_html_bytes BYTEA,
    raw_headers TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT archived_emails_account_fingerprint_key UNIQUE (account_id, message_fingerprint)
);

CREATE TABLE IF NOT EXISTS email_attachments (
    id BIGINT PRIMARY KEY,
    email_id BIGINT NOT NULL REFERENCES archived_emails(id) ON DELETE CASCADE,
    filename TEXT NOT NULL,
    content_type TEXT NOT NULL,
    content_id TEXT,
    content BYTEA NOT NULL,
    size BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS archived_emails_account_sent_idx
    ON archived_emails (account_id, sent_date);

CREATE INDEX IF NOT EXISTS archived_emails_account_folder_idx
    ON archived_emails (account_id, folder_name);

CREATE INDEX IF NOT EXISTS email_attachments_email_id_idx
    ON email_attachments (email_id);

CREATE INDEX IF NOT EXISTS archived_emails_search_idx ON archived_emails USING GIN (
    to_tsvector('simple',
        coalesce(subject, '') || ' ' || coalesce(body, '') || ' ' ||
        coalesce(from_addr, '') || ' ' || coalesce(to_addr, '') || ' ' ||
        coalesce(cc_addr, '') || ' ' || coalesce(bcc_addr, '')
    )
);
"#;

/// Owns the Postgres pool backing the archive. A single shared pool: writers
/// use the checked-out connection for their transaction's duration, long reads (export) stream
/// via `sqlx`'s row stream rather than collecting eagerly.
pub struct StoreGateway;

impl Initialize for StoreGateway {
    async fn initialize() -> RustMailerResult<()> {
        let pool = PgPoolOptions::new()
            .max_connections(SETTINGS.rustmailer_database_pool_size)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&SETTINGS.rustmailer_database_url)
            .await
            .map_err(|e| raise_error!(format!("failed to connect to archive store: {e:#?}"), ErrorCode::StoreError))?;
        sqlx::query(SCHEMA_SQL)
            .execute(&pool)
            .await
            .map_err(|e| raise_error!(format!("failed to initialize archive schema: {e:#?}"), ErrorCode::StoreError))?;
        POOL.set(pool)
            .map_err(|_| raise_error!("store gateway already initialized".into(), ErrorCode::InternalError))?;
        Ok(())
    }
}

pub fn pool() -> RustMailerResult<&'static PgPool> {
    POOL.get().ok_or_else(|| raise_error!("store gateway not initialized".into(), ErrorCode::InternalError))
}

/// Outcome of an idempotent email insert attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpsertOutcome {
    Inserted,
    AlreadyExists,
    FolderMoved,
}

/// Looks up an existing row by `(account_id, fingerprint)` AND the ±2s secondary predicate
///: some providers re-mint Message-IDs, so fingerprint equality alone isn't enough to
/// catch every duplicate.
pub async fn find_duplicate(
    account_id: i64,
    fingerprint: &str,
    from: &str,
    to: &str,
    subject: &str,
    sent_date: Option<chrono::DateTime<chrono::Utc>>,
) -> RustMailerResult<Option<ArchivedEmailRow>> {
    let pool = pool()?;
    if let Some(row) = sqlx::query_as::<_, ArchivedEmailRow>(
        "SELECT * FROM archived_emails WHERE account_id = $1 AND message_fingerprint = $2",
    )
    .bind(account_id)
    .bind(fingerprint)
    .fetch_optional(pool)
    .await?
    {
        return Ok(Some(row));
    }

    if let Some(sent) = sent_date {
        let window = chrono::Duration::seconds(2);
        let row = sqlx::query_as::<_, ArchivedEmailRow>(
            "SELECT * FROM archived_emails WHERE account_id = $1 AND from_addr = $2 AND to_addr = $3 \
             AND subject = $4 AND sent_date BETWEEN $5 AND $6",
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .bind(subject)
        .bind(sent - window)
        .bind(sent + window)
        .fetch_optional(pool)
        .await?;
        return Ok(row);
    }
    Ok(None)
}

/// Inserts the normalized email and its attachments in one transaction, then recomputes and
/// writes back `has_attachments` from the persisted set.
pub async fn insert_email_with_attachments(account_id: i64, draft: &DraftEmail) -> RustMailerResult<i64> {
    let pool = pool()?;
    let mut tx = pool.begin().await?;
    let id = crate::id!(63) as i64;

    sqlx::query(
        "INSERT INTO archived_emails (
            id, account_id, message_fingerprint, subject, from_addr, to_addr, cc_addr, bcc_addr,
            sent_date, received_date, direction, has_attachments, folder_name, is_locked, body,
            html_body, original_plain_bytes, original_html_bytes, raw_headers
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,FALSE,$14,$15,$16,$17,$18)",
    )
    .bind(id)
    .bind(account_id)
    .bind(&draft.fingerprint)
    .bind(&draft.subject)
    .bind(&draft.from)
    .bind(&draft.to)
    .bind(&draft.cc)
    .bind(&draft.bcc)
    .bind(draft.sent_date.and_then(millis_to_datetime))
    .bind(draft.received_date.and_then(millis_to_datetime))
    .bind(if draft.direction == Direction::Outgoing { Direction::Outgoing } else { Direction::Incoming })
    .bind(draft.has_attachments)
    .bind(&draft.folder)
    .bind(&draft.body)
    .bind(&draft.html_body)
    .bind(&draft.original_plain_bytes)
    .bind(&draft.original_html_bytes)
    .bind(&draft.raw_headers)
    .execute(&mut *tx)
    .await?;

    for attachment in &draft.attachments {
        let attachment_id = crate::id!(63) as i64;
        sqlx::query(
            "INSERT INTO email_attachments (id, email_id, filename, content_type, content_id, content, size) \
             VALUES ($1,$2,$3,$4,$5,$6,$7)",
        )
        .bind(attachment_id)
        .bind(id)
        .bind(&attachment.filename)
        .bind(&attachment.content_type)
        .bind(&attachment.content_id)
        .bind(&attachment.content)
        .bind(attachment.size)
        .execute(&mut *tx)
        .await?;
    }

    let actual_has_attachments = !draft.attachments.is_empty();
    sqlx::query("UPDATE archived_emails SET has_attachments = $1 WHERE id = $2")
        .bind(actual_has_attachments)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(id)
}

pub async fn move_email_folder(email_id: i64, new_folder: &str) -> RustMailerResult<()> {
    sqlx::query("UPDATE archived_emails SET folder_name = $1, updated_at = now() WHERE id = $2")
        .bind(new_folder)
        .bind(email_id)
        .execute(pool()?)
        .await?;
    Ok(())
}

pub async fn set_locked(email_id: i64, locked: bool) -> RustMailerResult<()> {
    sqlx::query("UPDATE archived_emails SET is_locked = $1, updated_at = now() WHERE id = $2")
        .bind(locked)
        .bind(email_id)
        .execute(pool()?)
        .await?;
    Ok(())
}

pub async fn clear_locked_for_account(account_id: i64) -> RustMailerResult<()> {
    sqlx::query("UPDATE archived_emails SET is_locked = FALSE, updated_at = now() WHERE account_id = $1")
        .bind(account_id)
        .execute(pool()?)
        .await?;
    Ok(())
}

pub async fn get_email_with_attachments(email_id: i64) -> RustMailerResult<Option<ArchivedEmailWithAttachments>> {
    let pool = pool()?;
    let Some(email) = sqlx::query_as::<_, ArchivedEmailRow>("SELECT * FROM archived_emails WHERE id = $1")
        .bind(email_id)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };
    let attachments = sqlx::query_as::<_, EmailAttachmentRow>("SELECT * FROM email_attachments WHERE email_id = $1")
        .bind(email_id)
        .fetch_all(pool)
        .await?;
    Ok(Some(ArchivedEmailWithAttachments { email, attachments }))
}

/// Fingerprint lookup for retention delete: checks both bracketed and unbracketed
/// variants so a provider-re-minted Message-ID still resolves to its archived row.
pub async fn exists_by_fingerprint_variants(account_id: i64, bare: &str, bracketed: &str) -> RustMailerResult<bool> {
    let row = sqlx::query(
        "SELECT 1 FROM archived_emails WHERE account_id = $1 AND message_fingerprint IN ($2, $3) LIMIT 1",
    )
    .bind(account_id)
    .bind(bare)
    .bind(bracketed)
    .fetch_optional(pool()?)
    .await?;
    Ok(row.is_some())
}

/// Deletes archive rows older than `cutoff` for an account, in batches, skipping locked rows
/// (§3 invariant: `is_locked` rows must never be retention-deleted). Returns the number deleted.
pub async fn delete_local_retention_batch(
    account_id: i64,
    cutoff: chrono::DateTime<chrono::Utc>,
    batch_size: i64,
) -> RustMailerResult<u64> {
    let result = sqlx::query(
        "DELETE FROM archived_emails WHERE id IN (
            SELECT id FROM archived_emails
            WHERE account_id = $1 AND sent_date < $2 AND is_locked = FALSE
            LIMIT $3
        )",
    )
    .bind(account_id)
    .bind(cutoff)
    .bind(batch_size)
    .execute(pool()?)
    .await?;
    Ok(result.rows_affected())
}

pub async fn batch_delete_emails_by_ids(ids: &[i64]) -> RustMailerResult<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query("DELETE FROM archived_emails WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool()?)
        .await?;
    Ok(result.rows_affected())
}

pub async fn batch_delete_attachments_by_email_ids(email_ids: &[i64]) -> RustMailerResult<u64> {
    if email_ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query("DELETE FROM email_attachments WHERE email_id = ANY($1)")
        .bind(email_ids)
        .execute(pool()?)
        .await?;
    Ok(result.rows_affected())
}

/// Email ids for an account, paginated — used by the account-delete job to batch-delete
/// attachments/emails 1000 at a time.
pub async fn email_ids_for_account(account_id: i64, limit: i64) -> RustMailerResult<Vec<i64>> {
    let rows = sqlx::query("SELECT id FROM archived_emails WHERE account_id = $1 LIMIT $2")
        .bind(account_id)
        .bind(limit)
        .fetch_all(pool()?)
        .await?;
    Ok(rows.iter().map(|r| r.get::<i64, _>("id")).collect())
}

pub async fn count_emails_by_account(account_id: i64) -> RustMailerResult<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS c FROM archived_emails WHERE account_id = $1")
        .bind(account_id)
        .fetch_one(pool()?)
        .await?;
    Ok(row.get("c"))
}

pub async fn count_attachments_by_account(account_id: i64) -> RustMailerResult<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS c FROM email_attachments ea \
         JOIN archived_emails ae ON ae.id = ea.email_id WHERE ae.account_id = $1",
    )
    .bind(account_id)
    .fetch_one(pool()?)
    .await?;
    Ok(row.get("c"))
}

pub async fn count_all() -> RustMailerResult<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS c FROM archived_emails").fetch_one(pool()?).await?;
    Ok(row.get("c"))
}

pub async fn account_stats(account_id: i64, last_sync: Option<chrono::DateTime<chrono::Utc>>, enabled: bool) -> RustMailerResult<AccountStats> {
    Ok(AccountStats {
        account_id,
        email_count: count_emails_by_account(account_id).await?,
        last_sync,
        enabled,
    })
}

/// Streams an account's archived emails, oldest-id-first, for a long-running export job (§4.A
/// concurrency: "long reads (exports) stream via a cursor/async iterator" rather than collecting
/// eagerly). `selected_ids`, when given, narrows the export to exactly those rows (§4.G: export
/// also has "a selected-ids variant").
pub fn export_rows_stream(
    account_id: i64,
    selected_ids: Option<Vec<i64>>,
) -> RustMailerResult<BoxStream<'static, Result<ArchivedEmailRow, sqlx::Error>>> {
    let pool = pool()?;
    let stream = match selected_ids {
        Some(ids) => sqlx::query_as::<_, ArchivedEmailRow>(
            "SELECT * FROM archived_emails WHERE account_id = $1 AND id = ANY($2) ORDER BY id",
        )
        .bind(account_id)
        .bind(ids)
        .fetch(pool)
        .boxed(),
        None => sqlx::query_as::<_, ArchivedEmailRow>("SELECT * FROM archived_emails WHERE account_id = $1 ORDER BY id")
            .bind(account_id)
            .fetch(pool)
            .boxed(),
    };
    Ok(stream)
}

pub async fn attachments_for_email(email_id: i64) -> RustMailerResult<Vec<EmailAttachmentRow>> {
    let rows = sqlx::query_as::<_, EmailAttachmentRow>("SELECT * FROM email_attachments WHERE email_id = $1")
        .bind(email_id)
        .fetch_all(pool()?)
        .await?;
    Ok(rows)
}

pub async fn db_size() -> RustMailerResult<i64> {
    let row = sqlx::query("SELECT pg_database_size(current_database()) AS sz")
        .fetch_one(pool()?)
        .await?;
    Ok(row.get("sz"))
}

pub fn millis_to_datetime(millis: i64) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp_millis(millis)
}

fn push_position_clause(qb: &mut QueryBuilder<'_, Postgres>, column: &str, term: &str) {
    qb.push("POSITION(LOWER(");
    qb.push_bind(term.to_string());
    qb.push(format!(") IN LOWER(COALESCE({column}, ''))) > 0"));
}

fn push_ilike_clause(qb: &mut QueryBuilder<'_, Postgres>, column: &str, term: &str) {
    qb.push(format!("{column} ILIKE "));
    qb.push_bind(format!("%{term}%"));
}

/// Builds the shared `WHERE` clause for both the optimized (tsquery) and fallback (ILIKE) search
/// paths. Phrase and field predicates use the same `POSITION` clauses either way; only the
/// bare-word evaluation differs.
fn push_search_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &SearchPredicate, use_tsquery: bool) {
    qb.push(" WHERE account_id = ANY(");
    qb.push_bind(predicate.allowed_accounts.clone());
    qb.push(")");

    if let Some(direction) = predicate.direction {
        qb.push(" AND direction = ");
        qb.push_bind(direction);
    }
    if let Some(folder) = &predicate.folder {
        qb.push(" AND folder_name = ");
        qb.push_bind(folder.clone());
    }
    if let Some(from) = predicate.date_from {
        qb.push(" AND sent_date >= ");
        qb.push_bind(from);
    }
    if let Some(to) = predicate.date_to_inclusive {
        qb.push(" AND sent_date <= ");
        qb.push_bind(to);
    }

    if !predicate.text.words.is_empty() {
        if use_tsquery {
            qb.push(
                " AND (to_tsvector('simple', coalesce(subject,'') || ' ' || coalesce(body,'') || ' ' || \
                 coalesce(from_addr,'') || ' ' || coalesce(to_addr,'') || ' ' || coalesce(cc_addr,'') || \
                 ' ' || coalesce(bcc_addr,'')) @@ to_tsquery('simple', ",
            );
            qb.push_bind(predicate.text.words.join(" & "));
            qb.push("))");
        } else {
            for word in &predicate.text.words {
                qb.push(" AND (");
                for (idx, column) in TEXT_COLUMNS.iter().enumerate() {
                    if idx > 0 {
                        qb.push(" OR ");
                    }
                    push_ilike_clause(qb, column, word);
                }
                qb.push(")");
            }
        }
    }

    for phrase in &predicate.text.phrases {
        qb.push(" AND (");
        for (idx, column) in TEXT_COLUMNS.iter().enumerate() {
            if idx > 0 {
                qb.push(" OR ");
            }
            push_position_clause(qb, column, phrase);
        }
        qb.push(")");
    }

    for field_match in &predicate.text.field_matches {
        qb.push(" AND (");
        push_position_clause(qb, field_match.column, &field_match.term);
        qb.push(")");
    }
}

async fn run_search(predicate: &SearchPredicate, use_tsquery: bool) -> RustMailerResult<(Vec<ArchivedEmailRow>, i64)> {
    let pool = pool()?;

    let mut count_qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) AS c FROM archived_emails");
    push_search_predicate(&mut count_qb, predicate, use_tsquery);
    let total: i64 = count_qb.build().fetch_one(pool).await?.get("c");

    let mut select_qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM archived_emails");
    push_search_predicate(&mut select_qb, predicate, use_tsquery);
    select_qb.push(format!(" ORDER BY {} {}", predicate.order_by, if predicate.order_desc { "DESC" } else { "ASC" }));
    select_qb.push(" LIMIT ");
    select_qb.push_bind(predicate.take);
    select_qb.push(" OFFSET ");
    select_qb.push_bind(predicate.skip);

    let rows = select_qb.build_query_as::<ArchivedEmailRow>().fetch_all(pool).await?;
    Ok((rows, total))
}

/// Executes a search predicate, trying the optimized tsquery path first and falling back
/// to a semantically equivalent `ILIKE` scan if it errors for any reason.
pub async fn search(predicate: &SearchPredicate) -> RustMailerResult<(Vec<ArchivedEmailRow>, i64)> {
    match run_search(predicate, true).await {
        Ok(result) => Ok(result),
        Err(e) => {
            warn!("optimized search query failed, falling back to an ILIKE scan: {e:#?}");
            run_search(predicate, false).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_to_datetime_round_trips() {
        let dt = millis_to_datetime(1_700_000_000_000).unwrap();
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_000);
    }
}
