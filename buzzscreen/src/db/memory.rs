//! In-memory repositories for testing the routes without Postgres & Redis.
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use primitives::{
    test_util::FrozenClock, Activity, ActivityKind, Clock, ContentCampaign, Device, DeviceUser,
    ReferralRewardConfig, Resource, Unit,
};

use super::{
    content_campaign::counter_fields, tracking_url::tracking_url_key, ActivityRepository,
    ContentCampaignRepository, DeviceRepository, ReferralRepository, RepositoryError,
    TrackingUrlRepository, UnitRepository,
};

/// Implements every repository of the service on top of [`DashMap`]s.
///
/// Tracking URLs expire according to the shared [`FrozenClock`].
#[derive(Debug)]
pub struct MemoryRepository {
    pub units: DashMap<i64, Unit>,
    pub devices: DashMap<i64, Device>,
    /// By user id
    pub users: DashMap<i64, DeviceUser>,
    pub referral_configs: DashMap<i64, ReferralRewardConfig>,
    pub content_campaigns: DashMap<i64, ContentCampaign>,
    pub counters: DashMap<(String, String), i64>,
    /// By device id, in insertion order
    pub activities: DashMap<i64, Vec<Activity>>,
    tracking_urls: DashMap<String, (String, DateTime<Utc>)>,
    next_user_id: AtomicI64,
    clock: FrozenClock,
    tracking_url_ttl: Duration,
}

impl MemoryRepository {
    pub fn new(clock: FrozenClock, tracking_url_ttl: Duration) -> Self {
        Self {
            units: DashMap::new(),
            devices: DashMap::new(),
            users: DashMap::new(),
            referral_configs: DashMap::new(),
            content_campaigns: DashMap::new(),
            counters: DashMap::new(),
            activities: DashMap::new(),
            tracking_urls: DashMap::new(),
            next_user_id: AtomicI64::new(1),
            clock,
            tracking_url_ttl,
        }
    }

    /// The counter value of a `(hash, field)` pair, `0` if never incremented.
    pub fn counter(&self, hash: &str, field: &str) -> i64 {
        self.counters
            .get(&(hash.to_string(), field.to_string()))
            .map(|value| *value)
            .unwrap_or_default()
    }

    pub fn activities_of(&self, device_id: i64) -> Vec<Activity> {
        self.activities
            .get(&device_id)
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }

    /// Inserts a user with the given id, bypassing the id sequence.
    pub fn insert_user_with_id(&self, user: DeviceUser) {
        self.next_user_id.fetch_max(user.id + 1, Ordering::SeqCst);
        self.users.insert(user.id, user);
    }

    fn increase(&self, campaign_id: i64, unit_id: i64, kind: ActivityKind) {
        for key in counter_fields(campaign_id, unit_id, kind, self.clock.now()) {
            *self.counters.entry(key).or_default() += 1;
        }
    }
}

#[async_trait]
impl UnitRepository for MemoryRepository {
    async fn fetch_unit(&self, unit_id: i64) -> Result<Option<Unit>, RepositoryError> {
        Ok(self.units.get(&unit_id).map(|unit| unit.clone()))
    }
}

#[async_trait]
impl DeviceRepository for MemoryRepository {
    async fn fetch_device(&self, device_id: i64) -> Result<Option<Device>, RepositoryError> {
        Ok(self.devices.get(&device_id).map(|device| device.clone()))
    }
}

#[async_trait]
impl ReferralRepository for MemoryRepository {
    async fn fetch_user_by_device(
        &self,
        device_id: i64,
    ) -> Result<Option<DeviceUser>, RepositoryError> {
        Ok(self
            .users
            .iter()
            .find(|user| user.device_id == device_id)
            .map(|user| user.clone()))
    }

    async fn fetch_user_by_code(&self, code: &str) -> Result<Option<DeviceUser>, RepositoryError> {
        Ok(self
            .users
            .iter()
            .find(|user| user.code == code)
            .map(|user| user.clone()))
    }

    async fn insert_user(&self, user: DeviceUser) -> Result<DeviceUser, RepositoryError> {
        let user = DeviceUser {
            id: self.next_user_id.fetch_add(1, Ordering::SeqCst),
            ..user
        };
        self.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn bind_referrer(&self, user_id: i64, referrer_id: i64) -> Result<bool, RepositoryError> {
        // the entry stays locked between the check and the write
        Ok(match self.users.get_mut(&user_id) {
            Some(mut user) if user.referrer_id == 0 => {
                user.referrer_id = referrer_id;
                true
            }
            _ => false,
        })
    }

    async fn unbind_referrer(
        &self,
        user_id: i64,
        referrer_id: i64,
    ) -> Result<(), RepositoryError> {
        if let Some(mut user) = self.users.get_mut(&user_id) {
            if user.referrer_id == referrer_id {
                user.referrer_id = 0;
            }
        }

        Ok(())
    }

    async fn referral_count(&self, referrer_id: i64) -> Result<i64, RepositoryError> {
        Ok(self
            .users
            .iter()
            .filter(|user| user.referrer_id == referrer_id)
            .count() as i64)
    }

    async fn fetch_config(
        &self,
        app_id: i64,
    ) -> Result<Option<ReferralRewardConfig>, RepositoryError> {
        Ok(self
            .referral_configs
            .get(&app_id)
            .map(|config| config.clone()))
    }
}

#[async_trait]
impl ContentCampaignRepository for MemoryRepository {
    async fn fetch_content_campaign(
        &self,
        campaign_id: i64,
    ) -> Result<Option<ContentCampaign>, RepositoryError> {
        Ok(self
            .content_campaigns
            .get(&campaign_id)
            .map(|campaign| campaign.clone()))
    }

    async fn increase_impression(
        &self,
        campaign_id: i64,
        unit_id: i64,
    ) -> Result<(), RepositoryError> {
        self.increase(campaign_id, unit_id, ActivityKind::Impression);

        Ok(())
    }

    async fn increase_click(&self, campaign_id: i64, unit_id: i64) -> Result<(), RepositoryError> {
        self.increase(campaign_id, unit_id, ActivityKind::Click);

        Ok(())
    }
}

#[async_trait]
impl ActivityRepository for MemoryRepository {
    async fn save(&self, activity: Activity) -> Result<(), RepositoryError> {
        self.activities
            .entry(activity.device_id)
            .or_default()
            .push(activity);

        Ok(())
    }

    async fn list(
        &self,
        device_id: i64,
        kind: Option<ActivityKind>,
        since: f64,
        limit: usize,
    ) -> Result<Vec<Activity>, RepositoryError> {
        let mut rows: Vec<Activity> = self
            .activities_of(device_id)
            .into_iter()
            .filter(|row| row.created_at >= since)
            .filter(|row| kind.map_or(true, |kind| row.kind == kind))
            .collect();
        rows.sort_by(|a, b| b.created_at.total_cmp(&a.created_at));
        rows.truncate(limit);

        Ok(rows)
    }
}

#[async_trait]
impl TrackingUrlRepository for MemoryRepository {
    async fn save(
        &self,
        device_id: i64,
        resource: &Resource,
        url: &str,
    ) -> Result<(), RepositoryError> {
        let expires_at = self.clock.now() + self.tracking_url_ttl;
        self.tracking_urls.insert(
            tracking_url_key(device_id, resource),
            (url.to_string(), expires_at),
        );

        Ok(())
    }

    async fn get(
        &self,
        device_id: i64,
        resource: &Resource,
    ) -> Result<Option<String>, RepositoryError> {
        let now = self.clock.now();

        Ok(self
            .tracking_urls
            .get(&tracking_url_key(device_id, resource))
            .filter(|entry| entry.1 > now)
            .map(|entry| entry.0.clone()))
    }

    async fn delete(&self, device_id: i64, resource: &Resource) -> Result<(), RepositoryError> {
        self.tracking_urls
            .remove(&tracking_url_key(device_id, resource));

        Ok(())
    }
}
