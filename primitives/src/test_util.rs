use std::{
    io,
    sync::{Arc, Mutex, RwLock},
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use once_cell::sync::Lazy;
use serde_json::json;

use crate::{
    util::time::Clock, Auth, ClickType, ContentCampaign, Device, Payload, Platform,
    ReferralRewardConfig, RewardIngredients, Unit,
};

pub use crate::util::logging::discard_logger;

/// An in-memory [`io::Write`] shared between the logger and the test.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Every written line parsed as JSON.
    pub fn json_lines(&self) -> Vec<serde_json::Value> {
        let buffer = self.0.lock().expect("Should not be poisoned");

        String::from_utf8_lossy(&buffer)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).expect("Should be a JSON line"))
            .collect()
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .expect("Should not be poisoned")
            .extend_from_slice(buf);

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A synchronous JSON event logger writing to a [`SharedBuffer`].
pub fn memory_event_logger() -> (slog::Logger, SharedBuffer) {
    let buffer = SharedBuffer::default();

    (
        crate::util::logging::sync_event_logger_to(buffer.clone()),
        buffer,
    )
}

/// 2021-06-01 09:30:00 UTC
pub static NOW: Lazy<DateTime<Utc>> = Lazy::new(|| {
    Utc.with_ymd_and_hms(2021, 6, 1, 9, 30, 0)
        .single()
        .expect("Valid date")
});

/// A [`Clock`] which only moves when told to.
#[derive(Debug, Clone)]
pub struct FrozenClock(Arc<RwLock<DateTime<Utc>>>);

impl FrozenClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Arc::new(RwLock::new(now)))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.write().expect("Should not be poisoned");
        *now = *now + by;
    }
}

impl Default for FrozenClock {
    fn default() -> Self {
        Self::new(*NOW)
    }
}

impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.read().expect("Should not be poisoned")
    }
}

pub const DUMMY_APP_ID: i64 = 100;
pub const DUMMY_UNIT_ID: i64 = 200;

pub static DUMMY_UNIT: Lazy<Unit> = Lazy::new(|| Unit {
    id: DUMMY_UNIT_ID,
    app_id: DUMMY_APP_ID,
    organization_id: 9,
    country: "KR".into(),
    platform: Platform::Android,
    timezone: "Asia/Seoul".into(),
    base_reward: 3,
    is_active: true,
});

pub static DUMMY_CONTENT_CAMPAIGN: Lazy<ContentCampaign> = Lazy::new(|| ContentCampaign {
    id: 2000,
    name: "Morning News".into(),
    organization_id: 9,
    clean_mode: 0,
    end_date: *NOW + Duration::days(30),
    extra_data: json!({"unit": {"landing_type": 1}}),
});

pub static DUMMY_PAYLOAD: Lazy<Payload> = Lazy::new(|| Payload {
    country: "KR".into(),
    ended_at: (*NOW + Duration::days(30)).timestamp(),
    gender: Some("F".into()),
    org_id: 9,
    time: (*NOW - Duration::hours(1)).timestamp(),
    timezone: "Asia/Seoul".into(),
    year_of_birth: Some(1990),
    unit_id: None,
});

/// Ingredients of a landing click on [`DUMMY_CONTENT_CAMPAIGN`].
///
/// The checksum is left empty, sign it with `adapter::checksum::fingerprint`.
pub static DUMMY_INGREDIENTS: Lazy<RewardIngredients> = Lazy::new(|| RewardIngredients {
    app_id: DUMMY_APP_ID,
    unit_id: DUMMY_UNIT_ID,
    device_id: 7,
    ifa: "ifa-0001".into(),
    unit_device_token: "udt-0001".into(),
    campaign_id: 2000,
    campaign_type: "I".into(),
    campaign_name: "Morning News".into(),
    campaign_owner_id: Some("owner".into()),
    campaign_is_media: 0,
    slot: 1,
    reward: 10,
    base_reward: 3,
    click_type: ClickType::Landing,
    checksum: String::new(),
});

pub static DUMMY_DEVICE: Lazy<Device> = Lazy::new(|| Device {
    id: 7,
    app_id: DUMMY_APP_ID,
    unit_device_token: "udt-0001".into(),
    ifa: "ifa-0001".into(),
    sdk_version: Some(30_100),
    created_at: *NOW - Duration::days(1),
});

pub static DUMMY_REFERRAL_CONFIG: Lazy<ReferralRewardConfig> =
    Lazy::new(|| ReferralRewardConfig {
        app_id: DUMMY_APP_ID,
        enabled: true,
        amount: 100,
        max_referral: 0,
        start_date: None,
        end_date: None,
        verify_url: String::new(),
        title_for_referee: "Welcome reward".into(),
        title_for_referrer: "Referral reward".into(),
        title_for_max_referrer: "Referral limit reached".into(),
        expire_hours: 0,
        min_sdk_version: 0,
    });

pub static DUMMY_AUTH: Lazy<Auth> = Lazy::new(|| Auth {
    account_id: 7,
    app_id: DUMMY_APP_ID,
    publisher_user_id: "publisher-user-1".into(),
    ifa: "ifa-0001".into(),
});
