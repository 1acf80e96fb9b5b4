#![deny(clippy::all)]
#![deny(rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! The lockscreen reward & click-redirect API.

use std::sync::Arc;

use adapter::{ChecksumValidator, CipherError, Codecs, EventTokenCodec};
use chrono::Duration;
use primitives::{config::Environment, Clock, Config};
use rand::rngs::StdRng;
use slog::Logger;

use crate::{
    activity::ActivityLog,
    cookie::CookieHandler,
    db::{
        ActivityRepository, ContentCampaignRepository, DeviceRepository, ReferralRepository,
        TrackingUrlRepository, UnitRepository,
    },
    event::EventService,
    profile::ProfilePopulator,
    publisher::Publisher,
    referral::ReferralEngine,
    reward::RewardEngine,
    tracking::TrackingUrls,
    upstream::{AdBackend, AuthService, Ledger, ProfileService, Web},
};

pub mod activity;
pub mod application;
pub mod cookie;
pub mod db;
pub mod event;
pub mod log_line;
pub mod middleware;
pub mod profile;
pub mod publisher;
pub mod referral;
pub mod response;
pub mod reward;
pub mod routes;
pub mod tracking;
pub mod upstream;

#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod test_util;

/// Everything the [`Application`] is configured with,
/// besides its collaborators.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub config: Config,
    /// Public ad backend URLs are rewritten to this URL before the server calls them
    pub internal_ad_url: String,
    /// The callback URLs handed to the SDKs are built against this URL
    pub public_base_url: String,
    pub event_token_secret: String,
}

/// The storage behind the [`Application`].
#[derive(Clone)]
pub struct Repositories {
    pub units: Arc<dyn UnitRepository>,
    pub devices: Arc<dyn DeviceRepository>,
    pub referrals: Arc<dyn ReferralRepository>,
    pub content_campaigns: Arc<dyn ContentCampaignRepository>,
    pub activities: Arc<dyn ActivityRepository>,
    pub tracking_urls: Arc<dyn TrackingUrlRepository>,
}

/// The services the [`Application`] mediates between.
#[derive(Clone)]
pub struct Upstreams {
    pub ledger: Arc<dyn Ledger>,
    pub ad_backend: Arc<dyn AdBackend>,
    pub auth: Arc<dyn AuthService>,
    pub profile: Arc<dyn ProfileService>,
    pub web: Arc<dyn Web>,
    pub publisher: Arc<dyn Publisher>,
}

#[derive(Clone)]
pub struct Application {
    pub config: Config,
    pub logger: Logger,
    /// Writes the structured lines of [`log_line`]
    pub event_logger: Logger,
    pub clock: Arc<dyn Clock>,
    pub codecs: Codecs,
    pub internal_ad_url: String,
    pub units: Arc<dyn UnitRepository>,
    pub devices: Arc<dyn DeviceRepository>,
    pub referral_repository: Arc<dyn ReferralRepository>,
    pub content_campaigns: Arc<dyn ContentCampaignRepository>,
    pub ad_backend: Arc<dyn AdBackend>,
    pub auth: Arc<dyn AuthService>,
    pub web: Arc<dyn Web>,
    pub activity: ActivityLog,
    pub tracking_urls: TrackingUrls,
    pub rewards: RewardEngine,
    pub events: EventService,
    pub referrals: ReferralEngine,
    pub cookies: CookieHandler,
    pub profiles: ProfilePopulator,
}

impl Application {
    pub fn new(
        settings: Settings,
        logger: Logger,
        event_logger: Logger,
        clock: Arc<dyn Clock>,
        repositories: Repositories,
        upstreams: Upstreams,
        rng: StdRng,
    ) -> Result<Self, CipherError> {
        let Settings {
            environment,
            config,
            internal_ad_url,
            public_base_url,
            event_token_secret,
        } = settings;

        let codecs = Codecs::new(&config.codec)?;

        // the reserved test checksum is never accepted outside of development
        let test_checksum = match environment {
            Environment::Development => config.reward.test_checksum.clone(),
            Environment::Production => None,
        };

        let activity = ActivityLog::new(
            repositories.activities.clone(),
            clock.clone(),
            Duration::seconds(config.cache.activity_ttl.into()),
            config.reward.max_records_per_hour,
        );

        let rewards = RewardEngine::new(
            upstreams.ledger.clone(),
            ChecksumValidator::new(test_checksum),
            activity.clone(),
        );

        let tracking_urls = TrackingUrls::new(
            repositories.tracking_urls.clone(),
            clock.clone(),
            logger.clone(),
            event_logger.clone(),
        );

        let events = EventService::new(
            upstreams.publisher.clone(),
            upstreams.ledger.clone(),
            upstreams.ad_backend.clone(),
            repositories.content_campaigns.clone(),
            EventTokenCodec::new(
                &event_token_secret,
                Duration::seconds(config.event_token.ttl.into()),
            ),
            public_base_url,
            clock.clone(),
        );

        let referrals = ReferralEngine::new(
            repositories.referrals.clone(),
            upstreams.ledger.clone(),
            upstreams.web.clone(),
            rng,
        );

        let cookies = CookieHandler::new(config.cookie.clone(), clock.clone(), event_logger.clone());

        let profiles = ProfilePopulator::new(
            upstreams.profile.clone(),
            config.timeouts.profile(),
            logger.clone(),
        );

        Ok(Self {
            config,
            logger,
            event_logger,
            clock,
            codecs,
            internal_ad_url,
            units: repositories.units,
            devices: repositories.devices,
            referral_repository: repositories.referrals,
            content_campaigns: repositories.content_campaigns,
            ad_backend: upstreams.ad_backend,
            auth: upstreams.auth,
            web: upstreams.web,
            activity,
            tracking_urls,
            rewards,
            events,
            referrals,
            cookies,
            profiles,
        })
    }

    /// Rewrites a public ad backend URL to the internal one.
    pub fn internal_ad_url(&self, url: &str) -> String {
        self.config.internal_ad_url(url, &self.internal_ad_url)
    }
}
