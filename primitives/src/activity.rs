use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};

use crate::reward::{max_period, PeriodForCampaign, ReceivedStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr)]
pub enum ActivityKind {
    #[display("i")]
    #[serde(rename = "i")]
    Impression,
    #[display("c")]
    #[serde(rename = "c")]
    Click,
}

/// A row of the per-device activity log.
///
/// `created_at` carries the microsecond fraction so that two rows
/// of the same device written in the same second do not collide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "did")]
    pub device_id: i64,
    /// Unix seconds with microsecond fraction
    #[serde(rename = "ca")]
    pub created_at: f64,
    #[serde(rename = "at")]
    pub kind: ActivityKind,
    #[serde(rename = "cid")]
    pub campaign_id: i64,
    /// Unix seconds after which the row is ignored
    #[serde(rename = "t")]
    pub ttl: i64,
}

impl Activity {
    pub fn is_alive(&self, now: DateTime<Utc>) -> bool {
        self.ttl >= now.timestamp()
    }
}

/// What a device has seen recently, keyed by the campaign id as string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceActivity {
    /// Campaigns with any activity in the last 2 days
    pub seen_campaign_ids: HashMap<String, bool>,
    /// Impressions per campaign in the last 24 hours
    pub seen_campaign_count_for_day: HashMap<String, u32>,
    /// Impressions per campaign in the last hour
    pub seen_campaign_count_for_hour: HashMap<String, u32>,
}

impl DeviceActivity {
    /// Aggregates the rows of the last two days, ignoring rows past their ttl.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a Activity>, now: DateTime<Utc>) -> Self {
        let two_days_ago = (now - Duration::days(2)).timestamp() as f64;
        let yesterday = (now - Duration::days(1)).timestamp() as f64;
        let hour_ago = (now - Duration::hours(1)).timestamp() as f64;

        let mut activity = Self::default();

        let alive = rows
            .into_iter()
            .filter(|row| row.created_at >= two_days_ago && row.is_alive(now));

        for row in alive {
            let campaign_id = row.campaign_id.to_string();
            activity.seen_campaign_ids.insert(campaign_id.clone(), true);

            if row.kind == ActivityKind::Impression {
                if yesterday <= row.created_at {
                    *activity
                        .seen_campaign_count_for_day
                        .entry(campaign_id.clone())
                        .or_default() += 1;
                }
                if hour_ago <= row.created_at {
                    *activity
                        .seen_campaign_count_for_hour
                        .entry(campaign_id)
                        .or_default() += 1;
                }
            }
        }

        activity
    }
}

/// Computes the received status of every requested campaign.
///
/// `rows` must be ordered by descending `created_at`, the iteration stops
/// at the first row older than the longest requested period.
/// A campaign is [`ReceivedStatus::Received`] iff an alive impression exists
/// within its own period.
pub fn received_status_map<'a>(
    rows: impl IntoIterator<Item = &'a Activity>,
    periods: &PeriodForCampaign,
    now: DateTime<Utc>,
) -> HashMap<i64, ReceivedStatus> {
    let now_secs = now.timestamp();
    let oldest = (now_secs - max_period(periods).0) as f64;

    let mut statuses = HashMap::with_capacity(periods.len());

    for row in rows {
        if row.created_at < oldest {
            break;
        }

        if row.kind != ActivityKind::Impression || !row.is_alive(now) {
            continue;
        }

        let period = match periods.get(&row.campaign_id) {
            Some(period) => period,
            None => continue,
        };

        if (now_secs - period.0) as f64 <= row.created_at {
            statuses.insert(row.campaign_id, ReceivedStatus::Received);
        }
    }

    for campaign_id in periods.keys() {
        statuses
            .entry(*campaign_id)
            .or_insert(ReceivedStatus::Unknown);
    }

    statuses
}
