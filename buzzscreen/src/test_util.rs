//! Testing utilities for the buzzscreen Application
//!
//! In-memory implementations of every collaborator and an [`Application`]
//! wired to them with the development [`Config`](primitives::Config).
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use dashmap::DashMap;
use primitives::{
    config::{Environment, DEVELOPMENT_CONFIG},
    test_util::{
        discard_logger, memory_event_logger, FrozenClock, SharedBuffer, DUMMY_AUTH,
        DUMMY_CONTENT_CAMPAIGN, DUMMY_DEVICE, DUMMY_REFERRAL_CONFIG, DUMMY_UNIT,
    },
    Account, Auth, EventToken, Resource,
};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    db::memory::MemoryRepository,
    publisher::MemoryPublisher,
    upstream::{
        AdBackend, AdBackendError, AuthError, AuthService, IssuedReward, Ledger, LedgerError,
        LineItem, ProfileError, ProfileService, ReferralReward, RewardForm, Web, WebError,
    },
    Application, Repositories, Settings, Upstreams,
};

/// The bearer token [`setup_dummy_app`] resolves to [`DUMMY_AUTH`].
pub const DUMMY_AUTH_TOKEN: &str = "dummy-auth-token";

/// The internal ad backend URL of the dummy app.
pub const DUMMY_INTERNAL_AD_URL: &str = "http://buzzad.internal/";

pub const DUMMY_PUBLIC_BASE_URL: &str = "https://screen.example.com";

/// Records the credits, a credit which was already given is [`LedgerError::Duplicated`].
#[derive(Debug, Default)]
pub struct MemoryLedger {
    rewards: Mutex<Vec<RewardForm>>,
    referral_rewards: Mutex<Vec<ReferralReward>>,
    failure: Mutex<Option<LedgerError>>,
    reward_status: Mutex<Option<String>>,
    issued_rewards: Mutex<Vec<IssuedReward>>,
}

impl MemoryLedger {
    pub fn rewards(&self) -> Vec<RewardForm> {
        self.rewards.lock().expect("Should not be poisoned").clone()
    }

    pub fn referral_rewards(&self) -> Vec<ReferralReward> {
        self.referral_rewards
            .lock()
            .expect("Should not be poisoned")
            .clone()
    }

    /// The next call fails with `error`.
    pub fn fail_with(&self, error: LedgerError) {
        *self.failure.lock().expect("Should not be poisoned") = Some(error);
    }

    /// Defaults to `receivable`.
    pub fn set_reward_status(&self, status: &str) {
        *self.reward_status.lock().expect("Should not be poisoned") = Some(status.to_string());
    }

    pub fn set_issued_rewards(&self, rewards: Vec<IssuedReward>) {
        *self.issued_rewards.lock().expect("Should not be poisoned") = rewards;
    }

    fn take_failure(&self) -> Result<(), LedgerError> {
        match self.failure.lock().expect("Should not be poisoned").take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn give_impression_reward(&self, form: &RewardForm) -> Result<(), LedgerError> {
        self.take_failure()?;

        let mut rewards = self.rewards.lock().expect("Should not be poisoned");
        if rewards.contains(form) {
            return Err(LedgerError::Duplicated);
        }
        rewards.push(form.clone());

        Ok(())
    }

    async fn give_referral_reward(&self, reward: &ReferralReward) -> Result<(), LedgerError> {
        // suspends like a round trip to the ledger would
        tokio::task::yield_now().await;
        self.take_failure()?;

        self.referral_rewards
            .lock()
            .expect("Should not be poisoned")
            .push(reward.clone());

        Ok(())
    }

    async fn check_reward_status(
        &self,
        _auth: &Auth,
        _token: &EventToken,
    ) -> Result<String, LedgerError> {
        self.take_failure()?;

        Ok(self
            .reward_status
            .lock()
            .expect("Should not be poisoned")
            .clone()
            .unwrap_or_else(|| "receivable".to_string()))
    }

    async fn issue_rewards(
        &self,
        _auth: &Auth,
        _resources: &[Resource],
    ) -> Result<Vec<IssuedReward>, LedgerError> {
        self.take_failure()?;

        Ok(self
            .issued_rewards
            .lock()
            .expect("Should not be poisoned")
            .clone())
    }
}

/// Redirects click URLs according to `redirects`, any other URL is not redirected.
#[derive(Debug, Default)]
pub struct MemoryAdBackend {
    /// Click URL to `Location`
    pub redirects: DashMap<String, String>,
    pub line_items: DashMap<i64, LineItem>,
}

#[async_trait]
impl AdBackend for MemoryAdBackend {
    async fn resolve_redirect(
        &self,
        click_url: &str,
        _headers: HeaderMap,
    ) -> Result<String, AdBackendError> {
        self.redirects
            .get(click_url)
            .map(|location| location.clone())
            .ok_or(AdBackendError::NotRedirected(StatusCode::OK))
    }

    async fn fetch_line_item(&self, id: i64) -> Result<Option<LineItem>, AdBackendError> {
        Ok(self.line_items.get(&id).map(|line_item| line_item.clone()))
    }
}

/// Records the called tracking URLs, verifies only the users it was told to.
#[derive(Debug, Default)]
pub struct MemoryWeb {
    tracking_calls: Mutex<Vec<String>>,
    verified_users: Mutex<HashSet<String>>,
    failing_tracking: AtomicBool,
}

impl MemoryWeb {
    pub fn tracking_calls(&self) -> Vec<String> {
        self.tracking_calls
            .lock()
            .expect("Should not be poisoned")
            .clone()
    }

    pub fn verify(&self, user_id: &str) {
        self.verified_users
            .lock()
            .expect("Should not be poisoned")
            .insert(user_id.to_string());
    }

    /// Every following tracking URL call is answered with `500`.
    pub fn fail_tracking(&self) {
        self.failing_tracking.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Web for MemoryWeb {
    async fn call_tracking_url(&self, url: &str) -> Result<(), WebError> {
        self.tracking_calls
            .lock()
            .expect("Should not be poisoned")
            .push(url.to_string());

        if self.failing_tracking.load(Ordering::SeqCst) {
            return Err(WebError::Status {
                url: url.to_string(),
                status: StatusCode::INTERNAL_SERVER_ERROR,
            });
        }

        Ok(())
    }

    async fn verify_user(&self, _verify_url: &str, user_id: &str) -> Result<bool, WebError> {
        Ok(self
            .verified_users
            .lock()
            .expect("Should not be poisoned")
            .contains(user_id))
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuthService {
    pub tokens: DashMap<String, Auth>,
}

#[async_trait]
impl AuthService for MemoryAuthService {
    async fn authenticate(&self, token: &str) -> Result<Option<Auth>, AuthError> {
        Ok(self.tokens.get(token).map(|auth| auth.clone()))
    }
}

/// Records the accounts and answers with a profile id per account.
#[derive(Debug, Default)]
pub struct MemoryProfileService {
    accounts: Mutex<Vec<Account>>,
}

impl MemoryProfileService {
    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.lock().expect("Should not be poisoned").clone()
    }
}

#[async_trait]
impl ProfileService for MemoryProfileService {
    async fn profile_id(&self, account: &Account) -> Result<String, ProfileError> {
        let mut accounts = self.accounts.lock().expect("Should not be poisoned");
        accounts.push(account.clone());

        Ok(format!("profile-{}", accounts.len()))
    }
}

/// The [`Application`] of [`setup_dummy_app`] together with its collaborators.
pub struct DummyApp {
    pub app: Arc<Application>,
    pub clock: FrozenClock,
    pub repository: Arc<MemoryRepository>,
    pub ledger: Arc<MemoryLedger>,
    pub publisher: Arc<MemoryPublisher>,
    pub ad_backend: Arc<MemoryAdBackend>,
    pub web: Arc<MemoryWeb>,
    pub profile: Arc<MemoryProfileService>,
    /// The structured lines the app emitted
    pub event_log: SharedBuffer,
}

/// Development config, a frozen clock and in-memory collaborators.
///
/// The repository holds [`DUMMY_UNIT`], [`DUMMY_DEVICE`], [`DUMMY_CONTENT_CAMPAIGN`]
/// and the [`DUMMY_REFERRAL_CONFIG`], [`DUMMY_AUTH_TOKEN`] authenticates as [`DUMMY_AUTH`].
pub fn setup_dummy_app() -> DummyApp {
    let config = DEVELOPMENT_CONFIG.clone();
    let clock = FrozenClock::default();

    let repository = Arc::new(MemoryRepository::new(
        clock.clone(),
        chrono::Duration::seconds(config.cache.tracking_url_ttl.into()),
    ));
    repository.units.insert(DUMMY_UNIT.id, DUMMY_UNIT.clone());
    repository.devices.insert(DUMMY_DEVICE.id, DUMMY_DEVICE.clone());
    repository
        .content_campaigns
        .insert(DUMMY_CONTENT_CAMPAIGN.id, DUMMY_CONTENT_CAMPAIGN.clone());
    repository
        .referral_configs
        .insert(DUMMY_REFERRAL_CONFIG.app_id, DUMMY_REFERRAL_CONFIG.clone());

    let ledger = Arc::new(MemoryLedger::default());
    let publisher = Arc::new(MemoryPublisher::default());
    let ad_backend = Arc::new(MemoryAdBackend::default());
    let web = Arc::new(MemoryWeb::default());
    let profile = Arc::new(MemoryProfileService::default());
    let auth = Arc::new(MemoryAuthService::default());
    auth.tokens
        .insert(DUMMY_AUTH_TOKEN.to_string(), DUMMY_AUTH.clone());

    let (event_logger, event_log) = memory_event_logger();

    let settings = Settings {
        environment: Environment::Development,
        config,
        internal_ad_url: DUMMY_INTERNAL_AD_URL.to_string(),
        public_base_url: DUMMY_PUBLIC_BASE_URL.to_string(),
        event_token_secret: "dummy-event-token-secret".to_string(),
    };

    let repositories = Repositories {
        units: repository.clone(),
        devices: repository.clone(),
        referrals: repository.clone(),
        content_campaigns: repository.clone(),
        activities: repository.clone(),
        tracking_urls: repository.clone(),
    };

    let upstreams = Upstreams {
        ledger: ledger.clone(),
        ad_backend: ad_backend.clone(),
        auth,
        profile: profile.clone(),
        web: web.clone(),
        publisher: publisher.clone(),
    };

    let app = Application::new(
        settings,
        discard_logger(),
        event_logger,
        Arc::new(clock.clone()),
        repositories,
        upstreams,
        StdRng::seed_from_u64(1),
    )
    .expect("Development codec keys should be valid");

    DummyApp {
        app: Arc::new(app),
        clock,
        repository,
        ledger,
        publisher,
        ad_backend,
        web,
        profile,
        event_log,
    }
}
