use async_trait::async_trait;
use primitives::{DeviceUser, ReferralRewardConfig};

use super::{PostgresRepository, RepositoryError};

/// The referral users of the devices and the referral programs of the apps.
#[async_trait]
pub trait ReferralRepository: Send + Sync {
    async fn fetch_user_by_device(
        &self,
        device_id: i64,
    ) -> Result<Option<DeviceUser>, RepositoryError>;

    async fn fetch_user_by_code(&self, code: &str) -> Result<Option<DeviceUser>, RepositoryError>;

    /// Inserts a new user, the `id` of `user` is ignored and assigned by the store.
    async fn insert_user(&self, user: DeviceUser) -> Result<DeviceUser, RepositoryError>;

    /// Sets the referrer of a user who has none yet.
    ///
    /// Returns `false` when the user already had a referrer.
    async fn bind_referrer(&self, user_id: i64, referrer_id: i64) -> Result<bool, RepositoryError>;

    /// Undoes [`ReferralRepository::bind_referrer`] if `referrer_id` is still the referrer.
    async fn unbind_referrer(&self, user_id: i64, referrer_id: i64)
        -> Result<(), RepositoryError>;

    /// How many users were referred by `referrer_id`.
    async fn referral_count(&self, referrer_id: i64) -> Result<i64, RepositoryError>;

    async fn fetch_config(
        &self,
        app_id: i64,
    ) -> Result<Option<ReferralRewardConfig>, RepositoryError>;
}

#[async_trait]
impl ReferralRepository for PostgresRepository {
    async fn fetch_user_by_device(
        &self,
        device_id: i64,
    ) -> Result<Option<DeviceUser>, RepositoryError> {
        let client = self.pool().get().await?;
        let statement = client
            .prepare("SELECT id, device_id, code, referrer_id, is_verified FROM device_users WHERE device_id = $1")
            .await?;

        let row = client.query_opt(&statement, &[&device_id]).await?;

        Ok(row.as_ref().map(DeviceUser::try_from).transpose()?)
    }

    async fn fetch_user_by_code(&self, code: &str) -> Result<Option<DeviceUser>, RepositoryError> {
        let client = self.pool().get().await?;
        let statement = client
            .prepare("SELECT id, device_id, code, referrer_id, is_verified FROM device_users WHERE code = $1")
            .await?;

        let row = client.query_opt(&statement, &[&code]).await?;

        Ok(row.as_ref().map(DeviceUser::try_from).transpose()?)
    }

    async fn insert_user(&self, user: DeviceUser) -> Result<DeviceUser, RepositoryError> {
        let client = self.pool().get().await?;
        let statement = client
            .prepare("INSERT INTO device_users (device_id, code, referrer_id, is_verified) VALUES ($1, $2, $3, $4) RETURNING id, device_id, code, referrer_id, is_verified")
            .await?;

        let row = client
            .query_one(
                &statement,
                &[
                    &user.device_id,
                    &user.code,
                    &user.referrer_id,
                    &user.is_verified,
                ],
            )
            .await?;

        Ok(DeviceUser::try_from(&row)?)
    }

    async fn bind_referrer(&self, user_id: i64, referrer_id: i64) -> Result<bool, RepositoryError> {
        let client = self.pool().get().await?;
        let statement = client
            .prepare("UPDATE device_users SET referrer_id = $2 WHERE id = $1 AND referrer_id = 0")
            .await?;

        let updated = client.execute(&statement, &[&user_id, &referrer_id]).await?;

        Ok(updated == 1)
    }

    async fn unbind_referrer(
        &self,
        user_id: i64,
        referrer_id: i64,
    ) -> Result<(), RepositoryError> {
        let client = self.pool().get().await?;
        let statement = client
            .prepare("UPDATE device_users SET referrer_id = 0 WHERE id = $1 AND referrer_id = $2")
            .await?;

        client.execute(&statement, &[&user_id, &referrer_id]).await?;

        Ok(())
    }

    async fn referral_count(&self, referrer_id: i64) -> Result<i64, RepositoryError> {
        let client = self.pool().get().await?;
        let statement = client
            .prepare("SELECT COUNT(*) FROM device_users WHERE referrer_id = $1")
            .await?;

        let row = client.query_one(&statement, &[&referrer_id]).await?;

        Ok(row.try_get(0)?)
    }

    async fn fetch_config(
        &self,
        app_id: i64,
    ) -> Result<Option<ReferralRewardConfig>, RepositoryError> {
        let client = self.pool().get().await?;
        let statement = client
            .prepare("SELECT app_id, enabled, amount, max_referral, start_date, end_date, verify_url, title_for_referee, title_for_referrer, title_for_max_referrer, expire_hours, min_sdk_version FROM referral_reward_configs WHERE app_id = $1")
            .await?;

        let row = client.query_opt(&statement, &[&app_id]).await?;

        Ok(row.as_ref().map(ReferralRewardConfig::try_from).transpose()?)
    }
}
