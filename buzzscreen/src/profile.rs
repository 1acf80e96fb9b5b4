use std::{sync::Arc, time::Duration};

use primitives::Account;
use slog::{debug, warn, Logger};
use tokio::task::JoinHandle;

use crate::upstream::{ProfileError, ProfileService};

/// Links the identifiers of a click in the profile service, in the background.
#[derive(Clone)]
pub struct ProfilePopulator {
    service: Arc<dyn ProfileService>,
    timeout: Duration,
    logger: Logger,
}

impl ProfilePopulator {
    pub fn new(service: Arc<dyn ProfileService>, timeout: Duration, logger: Logger) -> Self {
        Self {
            service,
            timeout,
            logger,
        }
    }

    /// Spawns the profile service call, bounded by the timeout.
    ///
    /// Returns `None` without calling the service when nothing identifies the account.
    /// Failures are only logged.
    pub fn populate(&self, account: Account) -> Option<JoinHandle<()>> {
        if account.is_empty() {
            return None;
        }

        let populator = self.clone();

        Some(tokio::spawn(async move {
            match populator.profile_id(&account).await {
                Ok(profile_id) => {
                    debug!(&populator.logger, "Profile populated"; "profile_id" => profile_id, "account_id" => account.account_id)
                }
                Err(err) => {
                    warn!(&populator.logger, "Populating profile failed"; "error" => %err, "account_id" => account.account_id)
                }
            }
        }))
    }

    async fn profile_id(&self, account: &Account) -> Result<String, ProfileError> {
        tokio::time::timeout(self.timeout, self.service.profile_id(account))
            .await
            .map_err(|_elapsed| ProfileError::Timeout)?
    }
}
