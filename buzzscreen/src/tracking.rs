//! Deferred landing rewards: tracking URLs kept for a short while
//! between the click and the later reward request of the SDK.
use std::sync::Arc;

use primitives::{Clock, Resource};
use slog::{info, warn, Logger};

use crate::{
    db::{RepositoryError, TrackingUrlRepository},
    log_line::{TrackingUrlLine, TrackingUrlMethod},
};

#[derive(Clone)]
pub struct TrackingUrls {
    repository: Arc<dyn TrackingUrlRepository>,
    clock: Arc<dyn Clock>,
    logger: Logger,
    event_logger: Logger,
}

impl TrackingUrls {
    pub fn new(
        repository: Arc<dyn TrackingUrlRepository>,
        clock: Arc<dyn Clock>,
        logger: Logger,
        event_logger: Logger,
    ) -> Self {
        Self {
            repository,
            clock,
            logger,
            event_logger,
        }
    }

    /// Failures are logged and never returned to the caller.
    pub async fn save(&self, device_id: i64, resource: &Resource, url: &str) {
        self.log_activity(TrackingUrlMethod::Save, device_id, resource, url);

        if let Err(err) = self.repository.save(device_id, resource, url).await {
            warn!(&self.logger, "Saving tracking url failed"; "device_id" => device_id, "resource_id" => resource.id, "error" => %err);
        }
    }

    /// Takes the tracking URL out of the store: a hit is deleted right away.
    ///
    /// `None` when nothing is stored for the device & resource.
    pub async fn take(
        &self,
        device_id: i64,
        resource: &Resource,
    ) -> Result<Option<String>, RepositoryError> {
        let url = match self.repository.get(device_id, resource).await? {
            Some(url) => url,
            None => return Ok(None),
        };

        self.log_activity(TrackingUrlMethod::Get, device_id, resource, &url);

        if let Err(err) = self.repository.delete(device_id, resource).await {
            warn!(&self.logger, "Deleting tracking url failed"; "device_id" => device_id, "resource_id" => resource.id, "error" => %err);
        }

        Ok(Some(url))
    }

    fn log_activity(
        &self,
        method: TrackingUrlMethod,
        device_id: i64,
        resource: &Resource,
        url: &str,
    ) {
        let line = TrackingUrlLine {
            method,
            device_id,
            resource_id: resource.id,
            resource_type: resource.resource_type,
            tracking_url: url.to_string(),
            event_at: self.clock.now(),
        };

        info!(&self.event_logger, "tracking url activity"; line);
    }
}
