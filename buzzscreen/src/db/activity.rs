use async_trait::async_trait;
use chrono::Duration;
use primitives::{Activity, ActivityKind};
use redis::aio::MultiplexedConnection;

use super::RepositoryError;

/// The append-only activity log of the devices.
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn save(&self, activity: Activity) -> Result<(), RepositoryError>;

    /// Rows of the device created at or after `since`,
    /// by descending `created_at` and at most `limit` of them.
    ///
    /// With a `kind` only rows of that kind are returned and counted.
    async fn list(
        &self,
        device_id: i64,
        kind: Option<ActivityKind>,
        since: f64,
        limit: usize,
    ) -> Result<Vec<Activity>, RepositoryError>;
}

pub fn activity_key(device_id: i64) -> String {
    format!("activity:{}", device_id)
}

/// One sorted set per device, scored by `created_at`.
///
/// The key expires `ttl` after the last write.
#[derive(Clone)]
pub struct RedisActivityRepository {
    redis: MultiplexedConnection,
    ttl: Duration,
}

impl RedisActivityRepository {
    pub fn new(redis: MultiplexedConnection, ttl: Duration) -> Self {
        Self { redis, ttl }
    }
}

#[async_trait]
impl ActivityRepository for RedisActivityRepository {
    async fn save(&self, activity: Activity) -> Result<(), RepositoryError> {
        let key = activity_key(activity.device_id);
        let member = serde_json::to_string(&activity)?;

        redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(&key)
            .arg(activity.created_at)
            .arg(member)
            .ignore()
            .cmd("EXPIRE")
            .arg(&key)
            .arg(self.ttl.num_seconds())
            .ignore()
            .query_async::<_, ()>(&mut self.redis.clone())
            .await?;

        Ok(())
    }

    async fn list(
        &self,
        device_id: i64,
        kind: Option<ActivityKind>,
        since: f64,
        limit: usize,
    ) -> Result<Vec<Activity>, RepositoryError> {
        let mut cmd = redis::cmd("ZREVRANGEBYSCORE");
        cmd.arg(activity_key(device_id)).arg("+inf").arg(since);
        // the kind is inside the member, so a filtered read scans the whole window
        if kind.is_none() {
            cmd.arg("LIMIT").arg(0).arg(limit);
        }

        let members = cmd
            .query_async::<_, Vec<String>>(&mut self.redis.clone())
            .await?;

        let mut rows = Vec::new();
        for member in &members {
            if rows.len() >= limit {
                break;
            }
            let row: Activity = serde_json::from_str(member)?;
            if kind.map_or(true, |kind| row.kind == kind) {
                rows.push(row);
            }
        }

        Ok(rows)
    }
}
