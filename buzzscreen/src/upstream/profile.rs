use std::time::Duration;

use async_trait::async_trait;
use primitives::Account;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use super::endpoint;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile service request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("profile service did not answer in time")]
    Timeout,
}

/// The consent & ID-resolution service which links the identifiers of an [`Account`].
#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn profile_id(&self, account: &Account) -> Result<String, ProfileError>;
}

#[derive(Debug, Deserialize)]
struct ProfileIdResponse {
    profile_id: String,
}

#[derive(Debug, Clone)]
pub struct HttpProfileService {
    base_url: String,
    client: Client,
}

impl HttpProfileService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl ProfileService for HttpProfileService {
    async fn profile_id(&self, account: &Account) -> Result<String, ProfileError> {
        let response = self
            .client
            .post(endpoint(&self.base_url, "profiles/id"))
            .json(account)
            .send()
            .await?
            .error_for_status()?
            .json::<ProfileIdResponse>()
            .await?;

        Ok(response.profile_id)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    #[tokio::test]
    async fn sends_only_the_present_identifiers() {
        let server = MockServer::start().await;
        let profiles =
            HttpProfileService::new(server.uri(), Duration::from_secs(1)).expect("Should build");

        Mock::given(method("POST"))
            .and(path("/profiles/id"))
            .and(body_json(json!({"ifa": "ifa-0001", "account_id": 7})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"profile_id": "p-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let account = Account {
            ifa: "ifa-0001".into(),
            account_id: 7,
            ..Account::default()
        };

        assert_eq!(
            "p-1",
            profiles.profile_id(&account).await.expect("Should resolve")
        );
    }
}
