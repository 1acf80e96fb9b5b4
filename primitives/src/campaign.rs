use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::time::week;

/// Campaign ids at or above this value are ads, below it content campaigns.
pub const AD_CAMPAIGN_ID_OFFSET: i64 = 1_000_000_000;

/// Used when the client did not send a campaign id.
pub const PLACEHOLDER_CAMPAIGN_ID: i64 = 1;

/// Campaign types as sent by the SDKs.
pub mod campaign_type {
    pub const CPM: &str = "I";
    pub const CPC: &str = "J";
    pub const ACTION: &str = "B";

    /// CPM & CPC clicks are resolved to the final landing URL by the ad backend.
    pub fn is_resolved_by_ad_backend(campaign_type: &str) -> bool {
        campaign_type == CPM || campaign_type == CPC
    }
}

/// A campaign id split in its two id spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CampaignKind {
    /// A content campaign (article), the id is kept as is.
    Content(i64),
    /// An ad, with the ad id recovered by subtracting [`AD_CAMPAIGN_ID_OFFSET`].
    Ad(i64),
}

impl CampaignKind {
    pub fn from_campaign_id(campaign_id: i64) -> Self {
        if campaign_id >= AD_CAMPAIGN_ID_OFFSET {
            Self::Ad(campaign_id - AD_CAMPAIGN_ID_OFFSET)
        } else {
            Self::Content(campaign_id)
        }
    }

    pub fn is_ad(&self) -> bool {
        matches!(self, Self::Ad(_))
    }

    pub fn is_content(&self) -> bool {
        matches!(self, Self::Content(_))
    }
}

/// A content campaign from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCampaign {
    pub id: i64,
    pub name: String,
    pub organization_id: i64,
    /// `0` original page only, `1` quick page first, `2` original page first,
    /// `3` both pages are loaded
    pub clean_mode: i32,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub extra_data: Value,
}

impl ContentCampaign {
    /// A content campaign stays rewardable for a week after its end date.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_date + week() < now
    }

    /// Whether a click on this campaign on the given page type
    /// is a duplicate of one already counted for the other page type.
    pub fn is_duplicated_click(&self, use_clean_mode: bool) -> bool {
        matches!(
            (use_clean_mode, self.clean_mode),
            (false, 1) | (true, 2) | (true, 3)
        )
    }

    /// The `unit` object inside the extra data, used for track event messages.
    pub fn unit_extra(&self) -> Value {
        self.extra_data.get("unit").cloned().unwrap_or(Value::Null)
    }
}

#[cfg(feature = "postgres")]
mod postgres {
    use std::convert::TryFrom;

    use tokio_postgres::{Error, Row};

    use super::*;

    impl TryFrom<&Row> for ContentCampaign {
        type Error = Error;

        fn try_from(row: &Row) -> Result<Self, Self::Error> {
            Ok(Self {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                organization_id: row.try_get("organization_id")?,
                clean_mode: row.try_get("clean_mode")?,
                end_date: row.try_get("end_date")?,
                extra_data: row
                    .try_get::<_, Option<Value>>("extra_data")?
                    .unwrap_or(Value::Null),
            })
        }
    }
}
