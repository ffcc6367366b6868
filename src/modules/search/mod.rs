// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Search Service: parses the query language and resolves it onto a
//! [`store::entity::SearchPredicate`], then hands it to the Store Gateway — the only place that
//! actually touches Postgres.

pub mod query;

use crate::modules::error::RustMailerResult;
use crate::modules::store;
use crate::modules::store::entity::{ArchivedEmailRow, Direction, FieldMatch, SearchPredicate, TextPredicate};
use query::Token;

/// Hard pagination ceiling (§4.H: "take ≤ 1000").
pub const MAX_TAKE: i64 = 1000;

/// `ORDER BY` whitelist: direction is asc/desc only, column is one of these four.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OrderField {
    SentDate,
    ReceivedDate,
    Subject,
    CreatedAt,
}

impl OrderField {
    fn column(self) -> &'static str {
        match self {
            OrderField::SentDate => "sent_date",
            OrderField::ReceivedDate => "received_date",
            OrderField::Subject => "subject",
            OrderField::CreatedAt => "created_at",
        }
    }
}

/// One search request. `allowed_accounts` is enforced here, not trusted from any
/// caller-supplied account filter: an empty allowed set always short-circuits to an empty result.
pub struct SearchRequest {
    pub query: String,
    pub allowed_accounts: Vec<i64>,
    pub direction: Option<Direction>,
    pub folder: Option<String>,
    pub date_from: Option<chrono::DateTime<chrono::Utc>>,
    /// Inclusive calendar day; resolved to the last second of the day before reaching the store.
    pub date_to: Option<chrono::NaiveDate>,
    pub order_by: OrderField,
    pub order_desc: bool,
    pub skip: i64,
    pub take: i64,
}

pub struct SearchResults {
    pub rows: Vec<ArchivedEmailRow>,
    pub total: i64,
}

/// Parses `request.query`, resolves filters, and executes the search.
pub async fn search(request: &SearchRequest) -> RustMailerResult<SearchResults> {
    if request.allowed_accounts.is_empty() {
        return Ok(SearchResults { rows: Vec::new(), total: 0 });
    }

    let mut words = Vec::new();
    let mut phrases = Vec::new();
    let mut field_matches = Vec::new();
    for token in query::parse(&request.query) {
        match token {
            Token::Word(w) => {
                let sanitized = query::sanitize_bare_word(&w);
                if !sanitized.is_empty() {
                    words.push(sanitized);
                }
            }
            Token::Phrase(p) => phrases.push(p),
            Token::FieldMatch(field, term) => field_matches.push(FieldMatch { column: field.column(), term }),
        }
    }

    let date_to_inclusive = request.date_to.and_then(|d| {
        d.and_hms_opt(23, 59, 59)
            .map(|ndt| chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(ndt, chrono::Utc))
    });

    let predicate = SearchPredicate {
        text: TextPredicate { words, phrases, field_matches },
        allowed_accounts: request.allowed_accounts.clone(),
        direction: request.direction,
        folder: request.folder.clone(),
        date_from: request.date_from,
        date_to_inclusive,
        order_by: request.order_by.column(),
        order_desc: request.order_desc,
        skip: request.skip.max(0),
        take: request.take.clamp(1, MAX_TAKE),
    };

    let (rows, total) = store::search(&predicate).await?;
    Ok(SearchResults { rows, total })
}
