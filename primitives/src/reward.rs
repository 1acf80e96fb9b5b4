use std::collections::HashMap;

use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};

/// What the user did for the reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr)]
pub enum ClickType {
    /// A click which lands the user on the campaign page.
    #[display("l")]
    #[serde(rename = "l")]
    Landing,
    /// A lockscreen unlock.
    #[display("u")]
    #[serde(rename = "u")]
    Unlock,
}

/// The ingredients of a reward request.
///
/// Immutable once validated: every fallback validation builds a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardIngredients {
    pub app_id: i64,
    pub unit_id: i64,
    pub device_id: i64,
    pub ifa: String,
    pub unit_device_token: String,
    pub campaign_id: i64,
    pub campaign_type: String,
    pub campaign_name: String,
    pub campaign_owner_id: Option<String>,
    pub campaign_is_media: i32,
    pub slot: i32,
    pub reward: i32,
    pub base_reward: i32,
    pub click_type: ClickType,
    pub checksum: String,
}

impl RewardIngredients {
    /// The canonical source of the checksum fingerprint.
    pub fn checksum_source(&self) -> String {
        format!(
            "buz:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}",
            self.device_id,
            self.ifa,
            self.unit_device_token,
            self.app_id,
            self.campaign_id,
            self.campaign_type,
            self.campaign_name,
            self.campaign_owner_id.as_deref().unwrap_or_default(),
            self.campaign_is_media,
            self.slot,
            self.reward,
            self.base_reward
        )
    }

    /// Returns a copy with `app_id := unit_id`.
    pub fn with_unit_as_app(&self) -> Self {
        Self {
            app_id: self.unit_id,
            ..self.clone()
        }
    }

    /// Returns a copy with a different unit device token.
    pub fn with_unit_device_token(&self, unit_device_token: &str) -> Self {
        Self {
            unit_device_token: unit_device_token.to_string(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[display(style = "lowercase")]
pub enum ReceivedStatus {
    Unknown,
    Received,
}

/// A reward period in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Period(pub i64);

impl Period {
    /// The period in hours, rounded up.
    pub fn hours(&self) -> i64 {
        if self.0 % 3600 != 0 {
            self.0 / 3600 + 1
        } else {
            self.0 / 3600
        }
    }
}

/// Requested period per campaign id.
pub type PeriodForCampaign = HashMap<i64, Period>;

/// The longest requested period, `0` when nothing is requested.
pub fn max_period(periods: &PeriodForCampaign) -> Period {
    periods.values().copied().max().unwrap_or_default()
}
