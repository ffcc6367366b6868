use crate::modules::account::entity::{MailAccount, ProviderConfig};
use crate::modules::error::code::ErrorCode;
use crate::modules::error::RustMailerResult;
use crate::modules::imap::capabilities::{check_capabilities, fetch_capabilities};
use crate::modules::imap::client::Client;
use crate::modules::imap::session::SessionStream;
use crate::{decrypt, raise_error};
use async_imap::Session;
use tracing::error;

#[derive(Debug)]
pub struct ImapConnectionManager {
    pub account_id: u64,
}

impl ImapConnectionManager {
    pub fn new(account_id: u64) -> Self {
        Self { account_id }
    }

    #[cfg(test)]
    pub async fn fetch_account(&self) -> RustMailerResult<MailAccount> {
        // Return the default account in test environment
        Ok(default_account())
    }

    #[cfg(not(test))]
    pub async fn fetch_account(&self) -> RustMailerResult<MailAccount> {
        MailAccount::get(self.account_id).await
    }

    async fn create_client(
        &self,
        account: &MailAccount,
        imap: &crate::modules::account::entity::ImapConfig,
    ) -> RustMailerResult<Client> {
        Client::connection(
            imap.host.clone(),
            imap.encryption.clone(),
            imap.port,
            account.ignore_self_signed,
            account.use_proxy,
        )
        .await
    }

    async fn authenticate(
        &self,
        client: Client,
        imap: &crate::modules::account::entity::ImapConfig,
    ) -> RustMailerResult<Session<Box<dyn SessionStream>>> {
        let password = imap.password.clone().ok_or_else(|| {
            raise_error!(
                "IMAP account has no password configured".into(),
                ErrorCode::MissingConfiguration
            )
        })?;
        let password = decrypt!(&password)?;
        client.login(&imap.username, &password).await
    }

    pub async fn build(&self) -> RustMailerResult<Session<Box<dyn SessionStream>>> {
        let account = self.fetch_account().await?;
        let imap = match &account.provider {
            ProviderConfig::Imap(imap) => imap,
            _ => {
                return Err(raise_error!(
                    format!(
                        "Account id={} is not configured as an IMAP account",
                        self.account_id
                    ),
                    ErrorCode::InvalidParameter
                ))
            }
        };

        let client = self.create_client(&account, imap).await.map_err(|error| {
            error!(
                "Failed to create IMAP {}'s client: {:#?}",
                &account.email, error
            );
            error
        })?;

        let mut session = self.authenticate(client, imap).await.map_err(|error| {
            error!("Failed to authenticate IMAP session: {:#?}", error);
            error
        })?;

        let capabilities = fetch_capabilities(&mut session).await.map_err(|error| {
            error!("Failed to fetch IMAP capabilities: {:#?}", error);
            error
        })?;
        check_capabilities(&capabilities).map_err(|error| {
            error!("Failed to check IMAP capabilities: {:#?}", error);
            error
        })?;

        Ok(session)
    }
}

#[cfg(test)]
fn default_account() -> MailAccount {
    use crate::modules::account::entity::{Encryption, ImapConfig};

    let email = "test1@zohomail.com".to_string();
    let imap = ImapConfig {
        host: "imap.zoho.com".to_string(),
        port: 993,
        encryption: Encryption::Ssl,
        username: email.clone(),
        password: Some("xxxxxxxxxx".to_string()),
    };
    MailAccount::new_imap(
        email,
        None,
        imap,
        Default::default(),
        None,
        None,
        None,
        false,
    )
    .expect("build default test account")
}
