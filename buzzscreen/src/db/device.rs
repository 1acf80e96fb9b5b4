use async_trait::async_trait;
use primitives::Device;

use super::{PostgresRepository, RepositoryError};

#[async_trait]
pub trait DeviceRepository: Send + Sync {
    async fn fetch_device(&self, device_id: i64) -> Result<Option<Device>, RepositoryError>;
}

#[async_trait]
impl DeviceRepository for PostgresRepository {
    async fn fetch_device(&self, device_id: i64) -> Result<Option<Device>, RepositoryError> {
        let client = self.pool().get().await?;
        let statement = client
            .prepare("SELECT id, app_id, unit_device_token, ifa, sdk_version, created_at FROM devices WHERE id = $1")
            .await?;

        let row = client.query_opt(&statement, &[&device_id]).await?;

        Ok(row.as_ref().map(Device::try_from).transpose()?)
    }
}
