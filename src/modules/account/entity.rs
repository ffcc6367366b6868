// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeSet;

use crate::encrypt;
use crate::id;
use crate::modules::database::manager::DB_MANAGER;
use crate::modules::database::{delete_impl, insert_impl, list_all_impl, secondary_find_impl, update_impl};
use crate::modules::error::code::ErrorCode;
use crate::modules::error::RustMailerResult;
use crate::raise_error;
use crate::utc_now;
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

/// Which wire backend this account fetches mail through.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ProviderConfig {
    Imap(ImapConfig),
    Graph(GraphConfig),
    /// No live backend: emails only ever arrive through a file import job.
    Import,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Import
    }
}

/// Identity, credentials, and sync bookkeeping for one mailbox.
///
/// Mutable config (sync knobs, retention) is admin-supplied; `last_sync` is
/// owned by the sync engine, and the record is destroyed by the account-delete
/// job only after every one of its archived emails is gone.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[native_model(id = 5, version = 1)]
#[native_db(primary_key(pk -> String))]
pub struct MailAccount {
    #[secondary_key(unique)]
    pub id: u64,
    pub display_name: Option<String>,
    pub email: String,
    pub enabled: bool,
    pub provider: ProviderConfig,
    /// Folder names excluded from sync (matched case-insensitively by the sync engine).
    pub excluded_folders: BTreeSet<String>,
    /// Remote retention: delete mail from the provider after this many days, once archived.
    pub delete_after_days: Option<u32>,
    /// Local retention: prune archive rows older than this many days.
    pub local_retention_days: Option<u32>,
    /// High-water sync timestamp (unix millis). `0` means "never synced", and a
    /// full resync request resets it back to this epoch sentinel.
    pub last_sync: i64,
    /// Optional SOCKS5 proxy to dial through (see `settings::proxy::Proxy`).
    pub use_proxy: Option<u64>,
    /// Accept self-signed / untrusted certificates from the provider.
    pub ignore_self_signed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

pub const EPOCH_WATERMARK: i64 = 0;

impl MailAccount {
    fn pk(&self) -> String {
        format!("{}_{}", self.created_at, self.id)
    }

    pub fn new_imap(
        email: String,
        display_name: Option<String>,
        imap: ImapConfig,
        excluded_folders: BTreeSet<String>,
        delete_after_days: Option<u32>,
        local_retention_days: Option<u32>,
        use_proxy: Option<u64>,
        ignore_self_signed: bool,
    ) -> RustMailerResult<Self> {
        let now = utc_now!();
        Ok(Self {
            id: id!(64),
            display_name,
            email,
            enabled: true,
            provider: ProviderConfig::Imap(imap.try_encrypt_secret()?),
            excluded_folders,
            delete_after_days,
            local_retention_days,
            last_sync: EPOCH_WATERMARK,
            use_proxy,
            ignore_self_signed,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn new_graph(
        email: String,
        display_name: Option<String>,
        graph: GraphConfig,
        excluded_folders: BTreeSet<String>,
        delete_after_days: Option<u32>,
        local_retention_days: Option<u32>,
        use_proxy: Option<u64>,
    ) -> RustMailerResult<Self> {
        let now = utc_now!();
        Ok(Self {
            id: id!(64),
            display_name,
            email,
            enabled: true,
            provider: ProviderConfig::Graph(graph.try_encrypt_secret()?),
            excluded_folders,
            delete_after_days,
            local_retention_days,
            last_sync: EPOCH_WATERMARK,
            use_proxy,
            ignore_self_signed: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn save(&self) -> RustMailerResult<()> {
        insert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }

    pub async fn find(account_id: u64) -> RustMailerResult<Option<MailAccount>> {
        secondary_find_impl::<MailAccount>(DB_MANAGER.meta_db(), MailAccountKey::id, account_id)
            .await
    }

    pub async fn get(account_id: u64) -> RustMailerResult<MailAccount> {
        Self::find(account_id).await?.ok_or_else(|| {
            raise_error!(
                format!("Account with ID '{account_id}' not found"),
                ErrorCode::ResourceNotFound
            )
        })
    }

    /// Fetches the account and errors if it has been disabled by an admin.
    pub async fn check_active(account_id: u64) -> RustMailerResult<MailAccount> {
        let account = Self::get(account_id).await?;
        if !account.enabled {
            return Err(raise_error!(
                format!("Account id='{account_id}' is disabled"),
                ErrorCode::AccountDisabled
            ));
        }
        Ok(account)
    }

    pub async fn list_all() -> RustMailerResult<Vec<MailAccount>> {
        list_all_impl(DB_MANAGER.meta_db()).await
    }

    async fn update_with<F>(account_id: u64, apply: F) -> RustMailerResult<()>
    where
        F: FnOnce(&mut MailAccount) + Send + 'static,
    {
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .secondary::<MailAccount>(MailAccountKey::id, account_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!("Account metadata not found. account_id={account_id}"),
                            ErrorCode::ResourceNotFound
                        )
                    })
            },
            move |current| {
                let mut updated = current.clone();
                apply(&mut updated);
                updated.updated_at = utc_now!();
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    pub async fn set_enabled(account_id: u64, enabled: bool) -> RustMailerResult<()> {
        Self::update_with(account_id, move |a| a.enabled = enabled).await
    }

    pub async fn update_excluded_folders(
        account_id: u64,
        excluded_folders: BTreeSet<String>,
    ) -> RustMailerResult<()> {
        Self::update_with(account_id, move |a| a.excluded_folders = excluded_folders).await
    }

    pub async fn update_retention(
        account_id: u64,
        delete_after_days: Option<u32>,
        local_retention_days: Option<u32>,
    ) -> RustMailerResult<()> {
        Self::update_with(account_id, move |a| {
            a.delete_after_days = delete_after_days;
            a.local_retention_days = local_retention_days;
        })
        .await
    }

    /// Advances the watermark to `now`. The sync engine only calls this when a
    /// run completed with zero failures; any failure leaves the watermark untouched.
    pub async fn advance_watermark(account_id: u64, now: i64) -> RustMailerResult<()> {
        Self::update_with(account_id, move |a| a.last_sync = now).await
    }

    /// Resets the watermark to the epoch sentinel, requesting a full resync.
    pub async fn request_full_resync(account_id: u64) -> RustMailerResult<()> {
        Self::update_with(account_id, |a| a.last_sync = EPOCH_WATERMARK).await
    }

    /// Deletes the account row. Callers (the account-delete job) must have
    /// already removed every archived email/attachment for this account.
    pub async fn delete(account_id: u64) -> RustMailerResult<()> {
        delete_impl(DB_MANAGER.meta_db(), move |rw| {
            rw.get()
                .secondary::<MailAccount>(MailAccountKey::id, account_id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .ok_or_else(|| {
                    raise_error!(
                        format!("Account id={account_id} to delete was not found."),
                        ErrorCode::ResourceNotFound
                    )
                })
        })
        .await
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub encryption: Encryption,
    pub username: String,
    /// AES-256-GCM encrypted at rest; never stored or returned in plaintext.
    pub password: Option<String>,
}

impl ImapConfig {
    pub fn try_encrypt_secret(self) -> RustMailerResult<Self> {
        Ok(Self {
            password: self.password.map(|p| encrypt!(&p)).transpose()?,
            ..self
        })
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    pub tenant_id: String,
    pub client_id: String,
    /// AES-256-GCM encrypted at rest.
    pub client_secret: String,
}

impl GraphConfig {
    pub fn try_encrypt_secret(self) -> RustMailerResult<Self> {
        Ok(Self {
            client_secret: encrypt!(&self.client_secret)?,
            ..self
        })
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum Encryption {
    #[default]
    Ssl,
    StartTls,
    None,
}

impl From<bool> for Encryption {
    fn from(value: bool) -> Self {
        if value {
            Self::Ssl
        } else {
            Self::None
        }
    }
}
