// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::code::ErrorCode;
use crate::modules::settings::proxy::Proxy;
use crate::{modules::error::RustMailerResult, raise_error, rustmailer_version};
use std::time::Duration;

/// Thin reqwest wrapper shared by the Graph adapter and OAuth2 token
/// acquisition, optionally tunneled through a stored SOCKS5/HTTP proxy.
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    #[cfg(test)]
    pub fn create(client: reqwest::Client) -> HttpClient {
        Self { client }
    }

    pub async fn new(use_proxy: Option<u64>) -> RustMailerResult<HttpClient> {
        let mut builder = reqwest::ClientBuilder::new()
            .user_agent(format!("mail-archiver/{}", rustmailer_version!()))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10));

        if let Some(proxy_id) = use_proxy {
            let proxy = Proxy::get(proxy_id).await?;
            let proxy_obj = reqwest::Proxy::all(&proxy.url).map_err(|e| {
                raise_error!(
                    format!(
                        "Failed to configure proxy ({}): {:#?}. Please check the proxy URL",
                        &proxy.url, e
                    ),
                    ErrorCode::InternalError
                )
            })?;
            builder = builder
                .redirect(reqwest::redirect::Policy::none())
                .proxy(proxy_obj);
        }

        let client = builder.build().map_err(|e| {
            raise_error!(
                format!("Failed to build HTTP client: {:#?}", e),
                ErrorCode::InternalError
            )
        })?;

        Ok(Self { client })
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn get_json(&self, url: &str, bearer_token: &str) -> RustMailerResult<serde_json::Value> {
        let response = self
            .client
            .get(url)
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::NetworkError))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(raise_error!(
                format!("Graph API request to {} failed with {}: {}", url, status, body),
                ErrorCode::GraphApiCallFailed
            ));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::GraphApiCallFailed))
    }

    /// Like [`Self::get_json`], but returns the response body even on a non-2xx status instead
    /// of erroring — the Graph filter de-escalation ladder needs to inspect the error
    /// body (`ErrorInvalidRestriction`, "too complex") to decide the next retry, not just fail.
    pub async fn get_json_allow_error(
        &self,
        url: &str,
        bearer_token: &str,
    ) -> RustMailerResult<(reqwest::StatusCode, serde_json::Value)> {
        let response = self
            .client
            .get(url)
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::NetworkError))?;
        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .unwrap_or(serde_json::Value::Null);
        Ok((status, body))
    }

    pub async fn post_json(
        &self,
        url: &str,
        bearer_token: &str,
        body: &serde_json::Value,
    ) -> RustMailerResult<serde_json::Value> {
        let response = self
            .client
            .post(url)
            .bearer_auth(bearer_token)
            .json(body)
            .send()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::NetworkError))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(raise_error!(
                format!("Graph API POST to {} failed with {}: {}", url, status, text),
                ErrorCode::GraphApiCallFailed
            ));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::GraphApiCallFailed))
    }

    pub async fn post_bytes(
        &self,
        url: &str,
        bearer_token: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> RustMailerResult<()> {
        let response = self
            .client
            .post(url)
            .bearer_auth(bearer_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::NetworkError))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(raise_error!(
                format!("Graph API POST to {} failed with {}: {}", url, status, text),
                ErrorCode::GraphApiCallFailed
            ));
        }
        Ok(())
    }

    pub async fn get_bytes(&self, url: &str, bearer_token: &str) -> RustMailerResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::NetworkError))?;

        let status = response.status();
        if !status.is_success() {
            return Err(raise_error!(
                format!("Graph API request to {} failed with {}", url, status),
                ErrorCode::GraphApiCallFailed
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::GraphApiCallFailed))?;
        Ok(bytes.to_vec())
    }

    pub async fn delete(&self, url: &str, bearer_token: &str) -> RustMailerResult<()> {
        let response = self
            .client
            .delete(url)
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::NetworkError))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(raise_error!(
                format!("Graph API delete to {} failed with {}: {}", url, status, body),
                ErrorCode::GraphApiCallFailed
            ));
        }
        Ok(())
    }
}
