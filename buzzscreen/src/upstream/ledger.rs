//! The external reward ledger, the source of truth for every credit.
use std::{sync::Arc, time::Duration};

use adapter::{JwtError, ServiceToken};
use async_trait::async_trait;
use primitives::{Auth, Clock, EventToken, EventType, Resource, RewardIngredients};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::endpoint;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("reward is already given")]
    Duplicated,
    #[error("reward can not be given")]
    Unprocessable,
    #[error("ledger responded with {0}")]
    Status(StatusCode),
    #[error("ledger request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("service token: {0}")]
    Token(#[from] JwtError),
}

/// The form posted for an impression reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardForm {
    pub unit_device_token: String,
    pub app_id: i64,
    pub unit_id: i64,
    pub device_id: i64,
    pub reward: i32,
    pub base_reward: i32,
    pub campaign_id: i64,
    pub campaign_name: String,
    pub slot: i32,
    pub click_type: String,
}

impl From<&RewardIngredients> for RewardForm {
    fn from(ingredients: &RewardIngredients) -> Self {
        Self {
            unit_device_token: ingredients.unit_device_token.clone(),
            app_id: ingredients.app_id,
            unit_id: ingredients.unit_id,
            device_id: ingredients.device_id,
            reward: ingredients.reward,
            base_reward: ingredients.base_reward,
            campaign_id: ingredients.campaign_id,
            campaign_name: ingredients.campaign_name.clone(),
            slot: ingredients.slot,
            click_type: ingredients.click_type.to_string(),
        }
    }
}

/// The form posted for a two-sided referral reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralReward {
    pub referee_device_id: i64,
    pub referee_reward: i32,
    pub referee_title: String,
    pub referrer_device_id: i64,
    pub referrer_reward: i32,
    pub referrer_title: String,
    pub referrer_max_title: String,
}

/// A reward the ledger prepared for an event on a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedReward {
    pub resource: Resource,
    pub event_type: EventType,
    pub transaction_id: String,
    pub amount: i64,
    /// Upper case as sent by the ledger, e.g. `RECEIVABLE`
    pub status: String,
    pub issue_method: String,
    pub ttl: i64,
    #[serde(default)]
    pub extra: Value,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Classifies `409` as [`LedgerError::Duplicated`] and `422` as
    /// [`LedgerError::Unprocessable`], every other non-`200` status is
    /// a [`LedgerError::Status`]. Never retried.
    async fn give_impression_reward(&self, form: &RewardForm) -> Result<(), LedgerError>;

    async fn give_referral_reward(&self, reward: &ReferralReward) -> Result<(), LedgerError>;

    /// The lowercased status of the reward of the event in `token`.
    async fn check_reward_status(
        &self,
        auth: &Auth,
        token: &EventToken,
    ) -> Result<String, LedgerError>;

    async fn issue_rewards(
        &self,
        auth: &Auth,
        resources: &[Resource],
    ) -> Result<Vec<IssuedReward>, LedgerError>;
}

#[derive(Debug, Serialize)]
struct CheckRewardStatusRequest<'a> {
    resource: &'a Resource,
    event_type: &'a str,
    transaction_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CheckRewardStatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
struct IssueRewardsRequest<'a> {
    resources: &'a [Resource],
}

#[derive(Debug, Deserialize)]
struct IssueRewardsResponse {
    rewards: Vec<IssuedReward>,
}

#[derive(Debug, Clone)]
/// The `HttpLedger` is cheap to clone
pub struct HttpLedger {
    base_url: String,
    client: Client,
    service_token: ServiceToken,
    clock: Arc<dyn Clock>,
}

impl HttpLedger {
    pub fn new(
        base_url: impl Into<String>,
        service_token: ServiceToken,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into(),
            client,
            service_token,
            clock,
        })
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, LedgerError> {
        let bearer = self.service_token.sign(self.clock.now())?;

        Ok(self
            .client
            .post(endpoint(&self.base_url, path))
            .bearer_auth(bearer))
    }

    fn post_as(&self, path: &str, auth: &Auth) -> Result<RequestBuilder, LedgerError> {
        let request = auth
            .headers()
            .into_iter()
            .fold(self.post(path)?, |request, (name, value)| {
                request.header(name, value)
            });

        Ok(request)
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn give_impression_reward(&self, form: &RewardForm) -> Result<(), LedgerError> {
        let response = self
            .post("reward/impression-rewards")?
            .form(form)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::CONFLICT => Err(LedgerError::Duplicated),
            StatusCode::UNPROCESSABLE_ENTITY => Err(LedgerError::Unprocessable),
            status => Err(LedgerError::Status(status)),
        }
    }

    async fn give_referral_reward(&self, reward: &ReferralReward) -> Result<(), LedgerError> {
        let response = self
            .post("reward/referral-rewards")?
            .form(reward)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(LedgerError::Status(status)),
        }
    }

    async fn check_reward_status(
        &self,
        auth: &Auth,
        token: &EventToken,
    ) -> Result<String, LedgerError> {
        let request = CheckRewardStatusRequest {
            resource: &token.resource,
            event_type: &token.event_type,
            transaction_id: &token.transaction_id,
        };

        let response = self
            .post_as("reward/check-reward-status", auth)?
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<CheckRewardStatusResponse>()
            .await?;

        Ok(response.status.to_lowercase())
    }

    async fn issue_rewards(
        &self,
        auth: &Auth,
        resources: &[Resource],
    ) -> Result<Vec<IssuedReward>, LedgerError> {
        let response = self
            .post_as("reward/issue-rewards", auth)?
            .json(&IssueRewardsRequest { resources })
            .send()
            .await?
            .error_for_status()?
            .json::<IssueRewardsResponse>()
            .await?;

        Ok(response.rewards)
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;
    use primitives::{
        event::event_type,
        test_util::{FrozenClock, DUMMY_AUTH, DUMMY_INGREDIENTS},
    };
    use serde_json::json;
    use wiremock::{
        matchers::{body_string_contains, header, header_exists, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn setup_ledger(server: &MockServer) -> HttpLedger {
        HttpLedger::new(
            server.uri(),
            ServiceToken::new("service-secret", ChronoDuration::minutes(5)),
            Arc::new(FrozenClock::default()),
            Duration::from_secs(1),
        )
        .expect("Should build the ledger client")
    }

    #[tokio::test]
    async fn impression_reward_statuses() {
        let server = MockServer::start().await;
        let ledger = setup_ledger(&server);
        let form = RewardForm::from(&*DUMMY_INGREDIENTS);

        Mock::given(method("POST"))
            .and(path("/reward/impression-rewards"))
            .and(header_exists("authorization"))
            .and(body_string_contains("campaign_name=Morning+News"))
            .and(body_string_contains("click_type=l"))
            .respond_with(ResponseTemplate::new(200))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        ledger
            .give_impression_reward(&form)
            .await
            .expect("Should credit the reward");

        Mock::given(method("POST"))
            .and(path("/reward/impression-rewards"))
            .respond_with(ResponseTemplate::new(409))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        assert!(matches!(
            ledger.give_impression_reward(&form).await,
            Err(LedgerError::Duplicated)
        ));

        Mock::given(method("POST"))
            .and(path("/reward/impression-rewards"))
            .respond_with(ResponseTemplate::new(422))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        assert!(matches!(
            ledger.give_impression_reward(&form).await,
            Err(LedgerError::Unprocessable)
        ));

        Mock::given(method("POST"))
            .and(path("/reward/impression-rewards"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        assert!(matches!(
            ledger.give_impression_reward(&form).await,
            Err(LedgerError::Status(StatusCode::SERVICE_UNAVAILABLE))
        ));
    }

    #[tokio::test]
    async fn reward_status_is_lowercased() {
        let server = MockServer::start().await;
        let ledger = setup_ledger(&server);

        Mock::given(method("POST"))
            .and(path("/reward/check-reward-status"))
            .and(header("Buzz-Account-Id", "7"))
            .and(header("Buzz-Ifa", "ifa-0001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ALREADY_RECEIVED"})))
            .expect(1)
            .mount(&server)
            .await;

        let token = EventToken {
            resource: Resource::ad(42),
            event_type: event_type::LANDED.to_string(),
            unit_id: 200,
            transaction_id: "tx-1".into(),
        };

        let status = ledger
            .check_reward_status(&DUMMY_AUTH, &token)
            .await
            .expect("Should check the status");

        assert_eq!("already_received", status);
    }

    #[tokio::test]
    async fn issue_rewards() {
        let server = MockServer::start().await;
        let ledger = setup_ledger(&server);

        Mock::given(method("POST"))
            .and(path("/reward/issue-rewards"))
            .and(body_string_contains(r#""type":"article""#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rewards": [{
                    "resource": {"id": 2000, "type": "article"},
                    "event_type": "landed",
                    "transaction_id": "tx-2000",
                    "amount": 5,
                    "status": "RECEIVABLE",
                    "issue_method": "AUTO",
                    "ttl": 3600
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let rewards = ledger
            .issue_rewards(&DUMMY_AUTH, &[Resource::article(2000)])
            .await
            .expect("Should issue rewards");

        assert_eq!(1, rewards.len());
        assert_eq!(Resource::article(2000), rewards[0].resource);
        assert_eq!("tx-2000", rewards[0].transaction_id);
        assert_eq!(Value::Null, rewards[0].extra);
    }

    #[tokio::test]
    async fn referral_reward_failure() {
        let server = MockServer::start().await;
        let ledger = setup_ledger(&server);

        Mock::given(method("POST"))
            .and(path("/reward/referral-rewards"))
            .and(body_string_contains("referrer_device_id=8"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let reward = ReferralReward {
            referee_device_id: 7,
            referee_reward: 100,
            referee_title: "Welcome reward".into(),
            referrer_device_id: 8,
            referrer_reward: 100,
            referrer_title: "Referral reward".into(),
            referrer_max_title: "Referral limit reached".into(),
        };

        assert!(matches!(
            ledger.give_referral_reward(&reward).await,
            Err(LedgerError::Status(StatusCode::INTERNAL_SERVER_ERROR))
        ));
    }
}
