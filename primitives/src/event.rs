use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr)]
#[serde(rename_all = "lowercase")]
#[display(style = "lowercase")]
pub enum ResourceType {
    Ad,
    Article,
}

/// Something an event happens on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Resource {
    pub fn ad(id: i64) -> Self {
        Self {
            id,
            resource_type: ResourceType::Ad,
            name: None,
        }
    }

    pub fn article(id: i64) -> Self {
        Self {
            id,
            resource_type: ResourceType::Article,
            name: None,
        }
    }
}

/// The event types the reward service issues rewards for.
pub mod event_type {
    pub const IMPRESSED: &str = "impressed";
    pub const CLICKED: &str = "clicked";
    pub const LANDED: &str = "landed";
}

/// The event type, as issued by the reward service (see [`event_type`]).
pub type EventType = String;

/// The content of an event token.
///
/// Only the server produces these, clients only ever see the encrypted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub resource: Resource,
    pub event_type: EventType,
    pub unit_id: i64,
    pub transaction_id: String,
}

impl Token {
    /// The routing key of the message published for this token.
    pub fn routing_key(&self) -> String {
        format!("{}.{}", self.resource.resource_type, self.event_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr)]
#[serde(rename_all = "snake_case")]
#[display(style = "snake_case")]
pub enum RewardStatus {
    Receivable,
    AlreadyReceived,
}

/// A reward descriptor attached to an [`Event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventReward {
    pub amount: i64,
    pub status: RewardStatus,
    pub issue_method: String,
    pub status_check_url: String,
    pub ttl: i64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub extra: Value,
}

/// An event the SDK should report back through its tracking URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub tracking_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<EventReward>,
}
