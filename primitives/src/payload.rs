//! The encrypted objects the allocation API hands to the SDKs
//! and the SDKs send back with clicks, unlocks and impressions.
//!
//! The wire format (AES-CBC + URL-safe base64) is implemented by `adapter::cipher`.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::util::time::week;

/// Placeholder the SDKs send when no payload was allocated.
pub const PAYLOAD_PLACEHOLDER: &str = "__campaign_payload__";

/// Campaign payload, created at allocation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "cou")]
    pub country: String,
    /// Unix seconds
    pub ended_at: i64,
    #[serde(rename = "sex", default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(rename = "oid")]
    pub org_id: i64,
    /// Allocation time, unix seconds
    #[serde(rename = "t")]
    pub time: i64,
    #[serde(rename = "tz")]
    pub timezone: String,
    #[serde(rename = "yob", default, skip_serializing_if = "Option::is_none")]
    pub year_of_birth: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<i64>,
}

impl Payload {
    /// Expired iff `now > ended_at + 7 days`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ended_at.saturating_add(week().num_seconds()) < now.timestamp()
    }

    /// The payload was allocated more than a day ago.
    ///
    /// Not acted upon, only logged.
    pub fn is_allocation_stale(&self, now: DateTime<Utc>) -> bool {
        self.time.saturating_add(Duration::days(1).num_seconds()) < now.timestamp()
    }
}

/// Impression data, signed by the allocation API for the content impression endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpressionData {
    #[serde(rename = "i")]
    pub ifa: String,
    #[serde(rename = "c")]
    pub campaign_id: i64,
    #[serde(rename = "u")]
    pub unit_id: i64,
    #[serde(rename = "d")]
    pub device_id: i64,
    #[serde(rename = "udt")]
    pub unit_device_token: String,
    #[serde(rename = "cou")]
    pub country: String,
    #[serde(rename = "sex", default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(rename = "yob", default, skip_serializing_if = "Option::is_none")]
    pub year_of_birth: Option<i32>,
}

/// Recommendation tracking data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingData {
    #[serde(default)]
    pub model_artifact: String,
}
