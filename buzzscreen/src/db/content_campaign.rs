//! The content campaign catalog.
//!
//! Campaigns are read through a Redis cache in front of Postgres and
//! their impressions & clicks are counted in hourly Redis hashes.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use primitives::{ActivityKind, Clock, ContentCampaign};
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};

use super::{PostgresRepository, RepositoryError};

#[async_trait]
pub trait ContentCampaignRepository: Send + Sync {
    async fn fetch_content_campaign(
        &self,
        campaign_id: i64,
    ) -> Result<Option<ContentCampaign>, RepositoryError>;

    async fn increase_impression(
        &self,
        campaign_id: i64,
        unit_id: i64,
    ) -> Result<(), RepositoryError>;

    async fn increase_click(&self, campaign_id: i64, unit_id: i64) -> Result<(), RepositoryError>;
}

pub fn cache_key(campaign_id: i64) -> String {
    format!("CACHE_GO_CONTENTCAMPAIGN-{}", campaign_id)
}

/// The `(hash, field)` pairs incremented for one impression or click.
pub fn counter_fields(
    campaign_id: i64,
    unit_id: i64,
    kind: ActivityKind,
    now: DateTime<Utc>,
) -> [(String, String); 3] {
    let suffix = match kind {
        ActivityKind::Impression => "imp",
        ActivityKind::Click => "clk",
    };
    let hourly = format!("stat:{}", now.format("%Y-%m-%d:%H"));

    [
        (hourly.clone(), format!("cam:{}:all:{}", campaign_id, suffix)),
        (hourly, format!("cam:{}:{}:{}", campaign_id, unit_id, suffix)),
        (
            format!("stat:cam:{}", campaign_id),
            format!("total:{}", suffix),
        ),
    ]
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    /// Unix seconds
    cached_at: i64,
    campaign: ContentCampaign,
}

/// Read-through cache of the content campaigns.
///
/// Entries live for the cache TTL but are refreshed from Postgres once they
/// are older than the freshness window. If the refresh fails the stale entry
/// is served.
#[derive(Clone)]
pub struct CachedContentCampaigns {
    redis: MultiplexedConnection,
    postgres: PostgresRepository,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    freshness: Duration,
}

impl CachedContentCampaigns {
    pub fn new(
        redis: MultiplexedConnection,
        postgres: PostgresRepository,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        freshness: Duration,
    ) -> Self {
        Self {
            redis,
            postgres,
            clock,
            ttl,
            freshness,
        }
    }

    async fn cached(&self, campaign_id: i64) -> Result<Option<CacheEntry>, RepositoryError> {
        let cached = redis::cmd("GET")
            .arg(cache_key(campaign_id))
            .query_async::<_, Option<String>>(&mut self.redis.clone())
            .await?;

        // an entry which does not deserialize is treated as a miss and overwritten
        Ok(cached.and_then(|entry| serde_json::from_str(&entry).ok()))
    }

    async fn cache(&self, campaign: &ContentCampaign) -> Result<(), RepositoryError> {
        let entry = CacheEntry {
            cached_at: self.clock.now().timestamp(),
            campaign: campaign.clone(),
        };

        redis::cmd("SET")
            .arg(cache_key(campaign.id))
            .arg(serde_json::to_string(&entry)?)
            .arg("EX")
            .arg(self.ttl.num_seconds())
            .query_async::<_, ()>(&mut self.redis.clone())
            .await?;

        Ok(())
    }

    async fn increase(
        &self,
        campaign_id: i64,
        unit_id: i64,
        kind: ActivityKind,
    ) -> Result<(), RepositoryError> {
        let mut pipe = redis::pipe();
        for (hash, field) in counter_fields(campaign_id, unit_id, kind, self.clock.now()) {
            pipe.cmd("HINCRBY").arg(hash).arg(field).arg(1).ignore();
        }

        pipe.query_async::<_, ()>(&mut self.redis.clone()).await?;

        Ok(())
    }
}

#[async_trait]
impl ContentCampaignRepository for CachedContentCampaigns {
    async fn fetch_content_campaign(
        &self,
        campaign_id: i64,
    ) -> Result<Option<ContentCampaign>, RepositoryError> {
        let cached = self.cached(campaign_id).await?;

        let stale = match cached {
            Some(entry)
                if self.clock.now().timestamp() - entry.cached_at
                    <= self.freshness.num_seconds() =>
            {
                return Ok(Some(entry.campaign))
            }
            Some(entry) => Some(entry.campaign),
            None => None,
        };

        match self.postgres.fetch_content_campaign(campaign_id).await {
            Ok(Some(campaign)) => {
                self.cache(&campaign).await?;

                Ok(Some(campaign))
            }
            Ok(None) => Ok(stale),
            Err(_) if stale.is_some() => Ok(stale),
            Err(err) => Err(err),
        }
    }

    async fn increase_impression(
        &self,
        campaign_id: i64,
        unit_id: i64,
    ) -> Result<(), RepositoryError> {
        self.increase(campaign_id, unit_id, ActivityKind::Impression)
            .await
    }

    async fn increase_click(&self, campaign_id: i64, unit_id: i64) -> Result<(), RepositoryError> {
        self.increase(campaign_id, unit_id, ActivityKind::Click).await
    }
}

impl PostgresRepository {
    pub async fn fetch_content_campaign(
        &self,
        campaign_id: i64,
    ) -> Result<Option<ContentCampaign>, RepositoryError> {
        let client = self.pool().get().await?;
        let statement = client
            .prepare("SELECT id, name, organization_id, clean_mode, end_date, extra_data FROM content_campaigns WHERE id = $1")
            .await?;

        let row = client.query_opt(&statement, &[&campaign_id]).await?;

        Ok(row.as_ref().map(ContentCampaign::try_from).transpose()?)
    }
}
