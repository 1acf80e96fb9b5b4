use async_trait::async_trait;
use chrono::Duration;
use primitives::Resource;
use redis::aio::MultiplexedConnection;

use super::RepositoryError;

/// Short-lived tracking URLs of deferred landing rewards.
#[async_trait]
pub trait TrackingUrlRepository: Send + Sync {
    async fn save(
        &self,
        device_id: i64,
        resource: &Resource,
        url: &str,
    ) -> Result<(), RepositoryError>;

    async fn get(
        &self,
        device_id: i64,
        resource: &Resource,
    ) -> Result<Option<String>, RepositoryError>;

    /// Deleting a missing entry is not an error.
    async fn delete(&self, device_id: i64, resource: &Resource) -> Result<(), RepositoryError>;
}

pub fn tracking_url_key(device_id: i64, resource: &Resource) -> String {
    format!(
        "CACHE_GO_TRACKINGURL-{}-{}-{}",
        device_id, resource.id, resource.resource_type
    )
}

#[derive(Clone)]
pub struct RedisTrackingUrlRepository {
    redis: MultiplexedConnection,
    ttl: Duration,
}

impl RedisTrackingUrlRepository {
    pub fn new(redis: MultiplexedConnection, ttl: Duration) -> Self {
        Self { redis, ttl }
    }
}

#[async_trait]
impl TrackingUrlRepository for RedisTrackingUrlRepository {
    async fn save(
        &self,
        device_id: i64,
        resource: &Resource,
        url: &str,
    ) -> Result<(), RepositoryError> {
        redis::cmd("SET")
            .arg(tracking_url_key(device_id, resource))
            .arg(url)
            .arg("EX")
            .arg(self.ttl.num_seconds())
            .query_async::<_, ()>(&mut self.redis.clone())
            .await?;

        Ok(())
    }

    async fn get(
        &self,
        device_id: i64,
        resource: &Resource,
    ) -> Result<Option<String>, RepositoryError> {
        let url = redis::cmd("GET")
            .arg(tracking_url_key(device_id, resource))
            .query_async::<_, Option<String>>(&mut self.redis.clone())
            .await?;

        Ok(url)
    }

    async fn delete(&self, device_id: i64, resource: &Resource) -> Result<(), RepositoryError> {
        // the number of deleted keys is irrelevant, 0 is a success too
        redis::cmd("DEL")
            .arg(tracking_url_key(device_id, resource))
            .query_async::<_, i64>(&mut self.redis.clone())
            .await?;

        Ok(())
    }
}
