use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::Device;

/// The alphabet referral codes are encoded in.
pub const CODE_ENCODING_CHARS: &str = "35689bcdghjkmnpqrstuvwxyz";
/// The alphabet short codes are padded with.
///
/// Disjoint from [`CODE_ENCODING_CHARS`], so a padded code still names a single device.
pub const CODE_PADDING_CHARS: &str = "a4e27f";
/// A code has exactly this many characters before formatting.
pub const CODE_MIN_DIGITS: usize = 8;

/// The referral identity of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceUser {
    pub id: i64,
    pub device_id: i64,
    /// `XXXX-XXXX`
    pub code: String,
    /// `0` when nobody referred this user
    pub referrer_id: i64,
    pub is_verified: bool,
}

/// The referral program of an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralRewardConfig {
    pub app_id: i64,
    pub enabled: bool,
    pub amount: i32,
    /// `0` for no limit
    pub max_referral: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Publisher endpoint which verifies users, empty when not required
    pub verify_url: String,
    pub title_for_referee: String,
    pub title_for_referrer: String,
    pub title_for_max_referrer: String,
    /// `0` for no limit
    pub expire_hours: i64,
    /// `0` for no limit
    pub min_sdk_version: i32,
}

impl ReferralRewardConfig {
    pub fn is_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_date.map_or(false, |end_date| end_date < now)
    }

    /// Whether the device may be referred by someone.
    pub fn is_eligible_referee(&self, device: &Device, now: DateTime<Utc>) -> bool {
        let old_device = self
            .start_date
            .map_or(false, |start_date| start_date > device.created_at);

        let expired_device = self.expire_hours > 0
            && now - device.created_at > Duration::hours(self.expire_hours);

        let outdated_sdk = self.min_sdk_version > 0
            && device.sdk_version.unwrap_or_default() < self.min_sdk_version;

        self.enabled && !old_device && !expired_device && !outdated_sdk
    }

    /// Whether the device may refer someone.
    pub fn is_eligible_referrer(&self, device: &Device) -> bool {
        let same_app = self.app_id == device.app_id;
        let registered_after_end = self
            .end_date
            .map_or(false, |end_date| end_date < device.created_at);

        same_app && !registered_after_end
    }
}

/// Converts the device id into the [`CODE_ENCODING_CHARS`] base.
pub fn encode_device_id(device_id: u64) -> String {
    let alphabet = CODE_ENCODING_CHARS.as_bytes();
    let base = alphabet.len() as u64;

    let mut value = device_id;
    let mut encoded = Vec::new();
    loop {
        encoded.push(alphabet[(value % base) as usize]);
        value /= base;

        if value == 0 {
            break;
        }
    }
    encoded.reverse();

    encoded.into_iter().map(char::from).collect()
}

#[cfg(feature = "postgres")]
mod postgres {
    use std::convert::TryFrom;

    use tokio_postgres::{Error, Row};

    use super::*;

    impl TryFrom<&Row> for DeviceUser {
        type Error = Error;

        fn try_from(row: &Row) -> Result<Self, Self::Error> {
            Ok(Self {
                id: row.try_get("id")?,
                device_id: row.try_get("device_id")?,
                code: row.try_get("code")?,
                referrer_id: row.try_get("referrer_id")?,
                is_verified: row.try_get("is_verified")?,
            })
        }
    }

    impl TryFrom<&Row> for ReferralRewardConfig {
        type Error = Error;

        fn try_from(row: &Row) -> Result<Self, Self::Error> {
            Ok(Self {
                app_id: row.try_get("app_id")?,
                enabled: row.try_get("enabled")?,
                amount: row.try_get("amount")?,
                max_referral: row.try_get("max_referral")?,
                start_date: row.try_get("start_date")?,
                end_date: row.try_get("end_date")?,
                verify_url: row.try_get("verify_url")?,
                title_for_referee: row.try_get("title_for_referee")?,
                title_for_referrer: row.try_get("title_for_referrer")?,
                title_for_max_referrer: row.try_get("title_for_max_referrer")?,
                expire_hours: row.try_get("expire_hours")?,
                min_sdk_version: row.try_get("min_sdk_version")?,
            })
        }
    }
}
