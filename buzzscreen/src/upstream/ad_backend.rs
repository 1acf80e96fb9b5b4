//! The ad backend: resolves ad clicks to landing URLs and serves line item details.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, AUTHORIZATION, LOCATION},
    redirect::Policy,
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::endpoint;

#[derive(Debug, Error)]
pub enum AdBackendError {
    #[error("ad backend did not redirect, responded with {0}")]
    NotRedirected(StatusCode),
    #[error("ad backend redirected without a location")]
    MissingLocation,
    #[error("ad backend request: {0}")]
    Request(#[from] reqwest::Error),
}

/// An ad as known by the ad backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub item_name: String,
    pub organization_id: i64,
    #[serde(default)]
    pub revenue_type: String,
    #[serde(default)]
    pub extra_data: Value,
}

#[async_trait]
pub trait AdBackend: Send + Sync {
    /// Calls the click URL without following redirects and returns the
    /// `Location` of the `301` / `302` response.
    async fn resolve_redirect(
        &self,
        click_url: &str,
        headers: HeaderMap,
    ) -> Result<String, AdBackendError>;

    async fn fetch_line_item(&self, id: i64) -> Result<Option<LineItem>, AdBackendError>;
}

#[derive(Debug, Clone)]
pub struct HttpAdBackend {
    base_url: String,
    access_token: String,
    client: Client,
}

impl HttpAdBackend {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
            client,
        })
    }
}

#[async_trait]
impl AdBackend for HttpAdBackend {
    async fn resolve_redirect(
        &self,
        click_url: &str,
        headers: HeaderMap,
    ) -> Result<String, AdBackendError> {
        let response = self.client.get(click_url).headers(headers).send().await?;

        match response.status() {
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => response
                .headers()
                .get(LOCATION)
                .and_then(|location| location.to_str().ok())
                .filter(|location| !location.is_empty())
                .map(ToString::to_string)
                .ok_or(AdBackendError::MissingLocation),
            status => Err(AdBackendError::NotRedirected(status)),
        }
    }

    async fn fetch_line_item(&self, id: i64) -> Result<Option<LineItem>, AdBackendError> {
        let url = endpoint(
            &self.base_url,
            &format!("adserver/orders/lineitems/{}", id),
        );

        match self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Token {}", self.access_token))
            .send()
            .await?
            .error_for_status()
        {
            Ok(response) => Ok(Some(response.json().await?)),
            // if we have a `404 Not Found` error, return None
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
