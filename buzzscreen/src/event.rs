//! Track-event & reward-status callbacks and the events issued with listed resources.
use std::{collections::HashMap, sync::Arc};

use adapter::{EventTokenCodec, TokenError};
use primitives::{
    event::{Event, EventReward},
    Auth, Clock, EventToken, Resource, ResourceType, RewardStatus,
};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    db::{ContentCampaignRepository, RepositoryError},
    publisher::{PublishError, Publisher},
    upstream::{AdBackend, AdBackendError, IssuedReward, Ledger, LedgerError},
};

#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("{resource_type} {id} not found")]
    ResourceNotFound {
        id: i64,
        resource_type: ResourceType,
    },
    #[error("ad details: {0}")]
    AdBackend(#[from] AdBackendError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("unknown reward status {0:?}")]
    UnknownRewardStatus(String),
    #[error("building the callback url: {0}")]
    Url(#[from] serde_qs::Error),
}

impl EventError {
    /// Whether the client sent something we can not act upon,
    /// as opposed to a failing collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Token(_) | Self::ResourceNotFound { .. } | Self::AdBackend(_)
        )
    }
}

/// The message published on the bus for every tracked event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMessage {
    pub resource_id: i64,
    pub resource_type: ResourceType,
    pub event: String,
    pub extra: MessageExtra,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageExtra {
    pub reward: MessageReward,
    pub resource: ResourceData,
    pub unit: UnitData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageReward {
    pub transaction_id: String,
}

/// The details of the resource an event happened on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceData {
    pub id: i64,
    pub name: String,
    pub organization_id: i64,
    /// Empty for articles
    pub revenue_type: String,
    pub is_media: bool,
    pub extra: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitData {
    pub id: i64,
}

impl EventMessage {
    pub fn new(token: &EventToken, resource: ResourceData) -> Self {
        Self {
            resource_id: token.resource.id,
            resource_type: token.resource.resource_type,
            event: token.event_type.clone(),
            extra: MessageExtra {
                reward: MessageReward {
                    transaction_id: token.transaction_id.clone(),
                },
                resource,
                unit: UnitData { id: token.unit_id },
            },
        }
    }
}

#[derive(Serialize)]
struct TokenQuery<'a> {
    token: &'a str,
}

/// An object member of `value`, or an empty object.
fn object_or_empty(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Object(object)) => Value::Object(object.clone()),
        _ => Value::Object(Map::new()),
    }
}

#[derive(Clone)]
pub struct EventService {
    publisher: Arc<dyn Publisher>,
    ledger: Arc<dyn Ledger>,
    ad_backend: Arc<dyn AdBackend>,
    content_campaigns: Arc<dyn ContentCampaignRepository>,
    tokens: EventTokenCodec,
    /// The base URL the callback URLs are built against
    public_base_url: String,
    clock: Arc<dyn Clock>,
}

impl EventService {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        ledger: Arc<dyn Ledger>,
        ad_backend: Arc<dyn AdBackend>,
        content_campaigns: Arc<dyn ContentCampaignRepository>,
        tokens: EventTokenCodec,
        public_base_url: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            publisher,
            ledger,
            ad_backend,
            content_campaigns,
            tokens,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            clock,
        }
    }

    pub fn build_token(&self, token: &EventToken) -> Result<String, EventError> {
        Ok(self.tokens.build(token, self.clock.now())?)
    }

    pub fn parse_token(&self, token: &str) -> Result<EventToken, EventError> {
        Ok(self.tokens.parse(token, self.clock.now())?)
    }

    /// Publishes the event of the token together with the details of its resource.
    pub async fn track_event(&self, auth: &Auth, token: &str) -> Result<(), EventError> {
        let token = self.parse_token(token)?;
        let resource = self.resource_data(&token.resource).await?;

        let message = EventMessage::new(&token, resource);

        self.publisher
            .publish(&token.routing_key(), auth, &message)
            .await?;

        Ok(())
    }

    /// The lowercase status of the reward of the event in the token.
    pub async fn reward_status(&self, auth: &Auth, token: &str) -> Result<String, EventError> {
        let token = self.parse_token(token)?;

        Ok(self.ledger.check_reward_status(auth, &token).await?)
    }

    /// Issues the rewards of the resources and returns their events by resource id.
    ///
    /// Resources without any reward are left out.
    pub async fn issue_events(
        &self,
        auth: &Auth,
        unit_id: i64,
        resources: &[Resource],
    ) -> Result<HashMap<i64, Vec<Event>>, EventError> {
        let issued = self.ledger.issue_rewards(auth, resources).await?;

        let mut events: HashMap<i64, Vec<Event>> = HashMap::new();
        for reward in issued {
            // the token carries the resource as requested, name included
            let resource = match resources.iter().find(|resource| {
                resource.id == reward.resource.id
                    && resource.resource_type == reward.resource.resource_type
            }) {
                Some(resource) => resource,
                None => continue,
            };

            let event = self.build_event(resource, unit_id, reward)?;
            events.entry(resource.id).or_default().push(event);
        }

        Ok(events)
    }

    fn build_event(
        &self,
        resource: &Resource,
        unit_id: i64,
        reward: IssuedReward,
    ) -> Result<Event, EventError> {
        let token = EventToken {
            resource: resource.clone(),
            event_type: reward.event_type.clone(),
            unit_id,
            transaction_id: reward.transaction_id.clone(),
        };
        let encoded = self.build_token(&token)?;

        let status = reward
            .status
            .to_lowercase()
            .parse::<RewardStatus>()
            .map_err(|_| EventError::UnknownRewardStatus(reward.status.clone()))?;

        Ok(Event {
            event_type: reward.event_type,
            tracking_urls: vec![self.callback_url("/api/track-event", &encoded)?],
            reward: Some(EventReward {
                amount: reward.amount,
                status,
                issue_method: reward.issue_method,
                status_check_url: self.callback_url("/api/reward-status", &encoded)?,
                ttl: reward.ttl,
                extra: reward.extra,
            }),
        })
    }

    fn callback_url(&self, path: &str, token: &str) -> Result<String, EventError> {
        let query = serde_qs::to_string(&TokenQuery { token })?;

        Ok(format!("{}{}?{}", self.public_base_url, path, query))
    }

    async fn resource_data(&self, resource: &Resource) -> Result<ResourceData, EventError> {
        let not_found = || EventError::ResourceNotFound {
            id: resource.id,
            resource_type: resource.resource_type,
        };

        match resource.resource_type {
            ResourceType::Ad => {
                let line_item = self
                    .ad_backend
                    .fetch_line_item(resource.id)
                    .await?
                    .ok_or_else(not_found)?;

                Ok(ResourceData {
                    id: resource.id,
                    // the name of the allocation wins over the line item name
                    name: resource.name.clone().unwrap_or(line_item.item_name),
                    organization_id: line_item.organization_id,
                    revenue_type: line_item.revenue_type,
                    is_media: false,
                    extra: object_or_empty(line_item.extra_data.get("extra_data")),
                })
            }
            ResourceType::Article => {
                let campaign = self
                    .content_campaigns
                    .fetch_content_campaign(resource.id)
                    .await?
                    .ok_or_else(not_found)?;

                Ok(ResourceData {
                    id: resource.id,
                    extra: object_or_empty(Some(&campaign.unit_extra())),
                    name: campaign.name,
                    organization_id: campaign.organization_id,
                    revenue_type: String::new(),
                    is_media: false,
                })
            }
        }
    }
}
