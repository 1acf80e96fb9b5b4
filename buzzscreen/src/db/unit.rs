use async_trait::async_trait;
use primitives::Unit;

use super::{PostgresRepository, RepositoryError};

#[async_trait]
pub trait UnitRepository: Send + Sync {
    async fn fetch_unit(&self, unit_id: i64) -> Result<Option<Unit>, RepositoryError>;
}

/// ```text
/// SELECT id, app_id, organization_id, country, platform, timezone, base_reward, is_active
/// FROM units WHERE id = $1
/// ```
#[async_trait]
impl UnitRepository for PostgresRepository {
    async fn fetch_unit(&self, unit_id: i64) -> Result<Option<Unit>, RepositoryError> {
        let client = self.pool().get().await?;
        let statement = client
            .prepare("SELECT id, app_id, organization_id, country, platform, timezone, base_reward, is_active FROM units WHERE id = $1")
            .await?;

        let row = client.query_opt(&statement, &[&unit_id]).await?;

        Ok(row.as_ref().map(Unit::try_from).transpose()?)
    }
}
