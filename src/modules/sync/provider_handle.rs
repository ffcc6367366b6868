// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Dispatches between providers by enum instead of `dyn Trait`: the Sync Engine, Job Orchestrator,
//! and Restore path all drive one concrete [`ProviderHandle`] rather than either branching on
//! `account.provider` themselves or reaching for a trait object (the async-fn-in-trait shape of
//! [`MailProvider`] isn't object-safe).

use crate::modules::account::entity::{MailAccount, ProviderConfig};
use crate::modules::error::code::ErrorCode;
use crate::modules::error::RustMailerResult;
use crate::modules::graph::GraphProvider;
use crate::modules::imap::adapter::ImapProvider;
use crate::modules::provider::{CancelToken, MailProvider, ProviderFolder, RawPage};
use crate::modules::store::entity::ArchivedEmailWithAttachments;
use crate::raise_error;

pub enum ProviderHandle {
    Imap(ImapProvider),
    Graph(GraphProvider),
}

impl ProviderHandle {
    /// Builds the live provider for an account. `Import`-only accounts have no wire backend —
    /// callers that reach here for one have a bug (the Sync Engine never schedules them).
    pub async fn for_account(account: &MailAccount) -> RustMailerResult<Self> {
        match &account.provider {
            ProviderConfig::Imap(_) => Ok(Self::Imap(ImapProvider::new(account.id).await?)),
            ProviderConfig::Graph(_) => Ok(Self::Graph(GraphProvider::new(account.id).await?)),
            ProviderConfig::Import => Err(raise_error!(
                format!("account id={} has no live provider (import-only)", account.id),
                ErrorCode::InvalidParameter
            )),
        }
    }
}

impl MailProvider for ProviderHandle {
    async fn test_connection(&self) -> RustMailerResult<()> {
        match self {
            Self::Imap(p) => p.test_connection().await,
            Self::Graph(p) => p.test_connection().await,
        }
    }

    async fn list_folders(&self) -> RustMailerResult<Vec<ProviderFolder>> {
        match self {
            Self::Imap(p) => p.list_folders().await,
            Self::Graph(p) => p.list_folders().await,
        }
    }

    async fn fetch_page(
        &self,
        folder: &str,
        since_millis: i64,
        offset: u64,
        cancel: &CancelToken,
    ) -> RustMailerResult<RawPage> {
        match self {
            Self::Imap(p) => p.fetch_page(folder, since_millis, offset, cancel).await,
            Self::Graph(p) => p.fetch_page(folder, since_millis, offset, cancel).await,
        }
    }

    async fn delete_old(&self, folder: &str, cutoff_millis: i64, cancel: &CancelToken) -> RustMailerResult<u64> {
        match self {
            Self::Imap(p) => p.delete_old(folder, cutoff_millis, cancel).await,
            Self::Graph(p) => p.delete_old(folder, cutoff_millis, cancel).await,
        }
    }

    async fn restore_one(&self, folder: &str, email: &ArchivedEmailWithAttachments) -> RustMailerResult<()> {
        match self {
            Self::Imap(p) => p.restore_one(folder, email).await,
            Self::Graph(p) => p.restore_one(folder, email).await,
        }
    }
}
