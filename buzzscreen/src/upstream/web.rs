//! Calls to URLs handed to us by third parties:
//! ad tracking URLs and the user verification endpoints of the publishers.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("{url} responded with {status}")]
    Status { url: String, status: StatusCode },
    #[error("request: {0}")]
    Request(#[from] reqwest::Error),
}

#[async_trait]
pub trait Web: Send + Sync {
    /// `GET` a tracking URL, any non-2xx status is an error.
    async fn call_tracking_url(&self, url: &str) -> Result<(), WebError>;

    /// Asks the publisher whether `user_id` is one of its users,
    /// only a `200 OK` verifies the user.
    async fn verify_user(&self, verify_url: &str, user_id: &str) -> Result<bool, WebError>;
}

#[derive(Debug, Clone)]
pub struct HttpWeb {
    tracker: Client,
    verifier: Client,
}

impl HttpWeb {
    pub fn new(
        tracker_timeout: Duration,
        verification_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            tracker: Client::builder().timeout(tracker_timeout).build()?,
            verifier: Client::builder().timeout(verification_timeout).build()?,
        })
    }
}

#[async_trait]
impl Web for HttpWeb {
    async fn call_tracking_url(&self, url: &str) -> Result<(), WebError> {
        let status = self.tracker.get(url).send().await?.status();

        if status.is_success() {
            Ok(())
        } else {
            Err(WebError::Status {
                url: url.to_string(),
                status,
            })
        }
    }

    async fn verify_user(&self, verify_url: &str, user_id: &str) -> Result<bool, WebError> {
        let response = self
            .verifier
            .get(verify_url)
            .query(&[("user_id", user_id)])
            .send()
            .await?;

        Ok(response.status() == StatusCode::OK)
    }
}
