// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! The provider capability contract: one trait implemented once for IMAP and once for
//! Graph, so the Sync Engine (`sync::run_account`) is generic over the wire backend instead of
//! branching on it. No inheritance hierarchy, no `dyn` object — the engine is monomorphized per
//! provider at the call site, mirroring how the teacher's `cache::imap::sync::flow` loop is
//! written against one concrete backend, just parameterized here instead of hardcoded.

use crate::modules::error::RustMailerResult;
use crate::modules::normalizer::raw::RawMessage;
use crate::modules::store::entity::ArchivedEmailWithAttachments;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Observed at every folder, batch, and per-message boundary. Cloned cheaply; flipping the
/// flag from anywhere (a job cancel, process shutdown) is visible to the in-flight loop.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One page of raw messages pulled from a folder, plus whether the provider has more.
pub struct RawPage {
    pub messages: Vec<RawMessage>,
    pub has_more: bool,
}

/// A folder as enumerated by a provider: full path/display name, filtered of `NonExistent`/
/// `NoSelect` entries or their Graph equivalent.
#[derive(Clone, Debug)]
pub struct ProviderFolder {
    pub name: String,
}

/// Tallies one provider call contributes to the Sync Engine's run-level counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct FetchTally {
    pub processed: u64,
    pub failed: u64,
}

/// Implemented once per wire backend (IMAP, Graph). `Import`-only accounts never construct one
/// of these — they only ever receive mail through the Importer.
pub trait MailProvider: Send + Sync {
    /// `testConnection`: cheap connectivity+auth probe used before a sync run starts.
    fn test_connection(&self) -> impl std::future::Future<Output = RustMailerResult<()>> + Send;

    /// `listFolders`, already filtered and deduplicated.
    fn list_folders(&self) -> impl std::future::Future<Output = RustMailerResult<Vec<ProviderFolder>>> + Send;

    /// Pulls one page of messages from `folder` delivered/modified since `since_millis`,
    /// starting at `offset` (provider-defined: sequence number for IMAP, skip token cursor for
    /// Graph — opaque to the caller past the first page). Implements the fallback ladders in
    /// §4.D/§4.E internally; callers just loop until `has_more` is false or `cancel` fires.
    fn fetch_page(
        &self,
        folder: &str,
        since_millis: i64,
        offset: u64,
        cancel: &CancelToken,
    ) -> impl std::future::Future<Output = RustMailerResult<RawPage>> + Send;

    /// Retention delete: deletes provider-side messages older than `cutoff_millis`
    /// in `folder`, but only those `archived` reports as already archived — the provider adapter
    /// must call back into the Store Gateway (or be handed a pre-computed membership test) before
    /// issuing any delete.
    fn delete_old(
        &self,
        folder: &str,
        cutoff_millis: i64,
        cancel: &CancelToken,
    ) -> impl std::future::Future<Output = RustMailerResult<u64>> + Send;

    /// Restores one archived message into `folder` (falling back to INBOX if missing).
    fn restore_one(
        &self,
        folder: &str,
        email: &ArchivedEmailWithAttachments,
    ) -> impl std::future::Future<Output = RustMailerResult<()>> + Send;

    /// `restoreMany`: restores every email in order against the one live connection
    /// this provider instance already pins for its lifetime. A connection blip mid-batch is
    /// absorbed by retrying the same append up to 3 times with linearly increasing backoff
    /// before the email is counted as failed and the batch moves on — per-email failure never
    /// aborts the rest of the batch (§7: individual message failures don't abort the run).
    /// `on_progress(index, succeeded)` is called once per email, in order.
    fn restore_many(
        &self,
        folder: &str,
        emails: &[ArchivedEmailWithAttachments],
        cancel: &CancelToken,
        mut on_progress: impl FnMut(usize, bool) + Send,
    ) -> impl std::future::Future<Output = RustMailerResult<()>> + Send
    where
        Self: Sized,
    {
        async move {
            for (idx, email) in emails.iter().enumerate() {
                if cancel.is_cancelled() {
                    break;
                }
                let mut attempt = 0u32;
                let succeeded = loop {
                    attempt += 1;
                    match self.restore_one(folder, email).await {
                        Ok(()) => break true,
                        Err(e) if attempt >= 3 => {
                            tracing::warn!(
                                "restore of email id={} failed after {attempt} attempts: {e:#?}",
                                email.email.id
                            );
                            break false;
                        }
                        Err(e) => {
                            tracing::warn!(
                                "restore attempt {attempt} for email id={} failed, retrying: {e:#?}",
                                email.email.id
                            );
                            tokio::time::sleep(std::time::Duration::from_millis(500 * attempt as u64)).await;
                        }
                    }
                };
                on_progress(idx, succeeded);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_starts_uncancelled_and_observes_cancel() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
