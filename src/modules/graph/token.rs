// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Token acquisition: client-credentials flow against
//! `/{tenant}/oauth2/v2.0/token` with scope `.../.default`. No cache is kept — a fresh token is
//! acquired once per sync run, which the spec calls out as acceptable for this scale.

use crate::decrypt;
use crate::modules::account::entity::GraphConfig;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::RustMailerResult;
use crate::modules::settings::proxy::Proxy;
use crate::raise_error;
use oauth2::basic::BasicClient;
use oauth2::{ClientId, ClientSecret, Scope, TokenResponse, TokenUrl};

const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

pub async fn acquire_token(graph: &GraphConfig, use_proxy: Option<u64>) -> RustMailerResult<String> {
    let token_url_str = format!(
        "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
        graph.tenant_id
    );
    let token_url = TokenUrl::new(token_url_str)
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InvalidParameter))?;

    let client_secret = decrypt!(&graph.client_secret)?;
    let client = BasicClient::new(ClientId::new(graph.client_id.clone()))
        .set_client_secret(ClientSecret::new(client_secret))
        .set_token_uri(token_url);

    let http_client = build_http_client(use_proxy).await?;

    let response = client
        .exchange_client_credentials()
        .add_scope(Scope::new(GRAPH_DEFAULT_SCOPE.to_string()))
        .request_async(&http_client)
        .await
        .map_err(|e| {
            raise_error!(
                format!("failed to acquire Graph token: {:#?}", e),
                ErrorCode::GraphAuthenticationFailed
            )
        })?;

    Ok(response.access_token().secret().to_owned())
}

async fn build_http_client(use_proxy: Option<u64>) -> RustMailerResult<reqwest::Client> {
    if let Some(proxy_id) = use_proxy {
        let proxy = Proxy::get(proxy_id).await?;
        return oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .proxy(reqwest::Proxy::all(&proxy.url).map_err(|e| {
                raise_error!(
                    format!("failed to configure proxy ({}): {:#?}", &proxy.url, e),
                    ErrorCode::InternalError
                )
            })?)
            .build()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError));
    }
    oauth2::reqwest::ClientBuilder::new()
        .redirect(oauth2::reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
}
