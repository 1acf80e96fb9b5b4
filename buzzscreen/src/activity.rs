//! The per-device activity log and the received-status oracle built on it.
use std::{collections::HashMap, sync::Arc};

use chrono::Duration;
use primitives::{
    activity::received_status_map, reward::max_period, Activity, ActivityKind, Clock,
    DeviceActivity, PeriodForCampaign, ReceivedStatus,
};

use crate::db::{ActivityRepository, RepositoryError};

#[derive(Clone)]
pub struct ActivityLog {
    repository: Arc<dyn ActivityRepository>,
    clock: Arc<dyn Clock>,
    /// How long a row is alive, also the window of [`ActivityLog::device_activity`]
    ttl: Duration,
    max_records_per_hour: u64,
}

impl ActivityLog {
    pub fn new(
        repository: Arc<dyn ActivityRepository>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        max_records_per_hour: u64,
    ) -> Self {
        Self {
            repository,
            clock,
            ttl,
            max_records_per_hour,
        }
    }

    pub async fn save(
        &self,
        device_id: i64,
        campaign_id: i64,
        kind: ActivityKind,
    ) -> Result<(), RepositoryError> {
        let created_at = self.clock.now_fractional();

        let activity = Activity {
            device_id,
            created_at,
            kind,
            campaign_id,
            ttl: created_at as i64 + self.ttl.num_seconds(),
        };

        self.repository.save(activity).await
    }

    /// What the device has seen in the last two days.
    pub async fn device_activity(&self, device_id: i64) -> Result<DeviceActivity, RepositoryError> {
        let now = self.clock.now();
        let since = (now - Duration::days(2)).timestamp() as f64;

        let rows = self
            .repository
            .list(device_id, None, since, usize::MAX)
            .await?;

        Ok(DeviceActivity::from_rows(&rows, now))
    }

    /// Whether the device received an impression of each campaign within its period.
    ///
    /// Reads at most `max_records_per_hour` impressions per hour of the longest period.
    pub async fn received_status_map(
        &self,
        device_id: i64,
        periods: &PeriodForCampaign,
    ) -> Result<HashMap<i64, ReceivedStatus>, RepositoryError> {
        let now = self.clock.now();
        let max_period = max_period(periods);

        let rows = if max_period.0 > 0 {
            let since = (now.timestamp() - max_period.0) as f64;
            let limit = (max_period.hours() as u64).saturating_mul(self.max_records_per_hour);

            self.repository
                .list(
                    device_id,
                    Some(ActivityKind::Impression),
                    since,
                    usize::try_from(limit).unwrap_or(usize::MAX),
                )
                .await?
        } else {
            vec![]
        };

        Ok(received_status_map(&rows, periods, now))
    }
}
