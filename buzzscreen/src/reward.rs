//! Validation of reward requests and the calls to the reward ledger.
use std::{collections::HashMap, sync::Arc};

use adapter::{ChecksumError, ChecksumValidator};
use primitives::{PeriodForCampaign, ReceivedStatus, RewardIngredients};
use thiserror::Error;

use crate::{
    activity::ActivityLog,
    db::RepositoryError,
    upstream::{Ledger, LedgerError, RewardForm},
};

/// Sent by SDKs which did not substitute the unit device token.
pub const UNIT_DEVICE_TOKEN_PLACEHOLDER: &str = "__unit_device_token__";

#[derive(Debug, Error)]
pub enum RewardError {
    #[error(transparent)]
    Checksum(#[from] ChecksumError),
    #[error("reward is already given")]
    Duplicated,
    #[error("reward can not be given")]
    Unprocessable,
    #[error("{0}")]
    Remote(LedgerError),
}

impl From<LedgerError> for RewardError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::Duplicated => Self::Duplicated,
            LedgerError::Unprocessable => Self::Unprocessable,
            other => Self::Remote(other),
        }
    }
}

/// Picks the unit device token a reward is given for.
///
/// The server token wins when the client did not send one, sent the
/// placeholder, or sent the same token with `+` decoded to a space.
pub fn resolve_unit_device_token<'a>(server: &'a str, client: &'a str) -> &'a str {
    if client.is_empty()
        || client == UNIT_DEVICE_TOKEN_PLACEHOLDER
        || client == server
        || client.replace(' ', "+") == server.replace(' ', "+")
    {
        server
    } else {
        client
    }
}

/// A unit device token must be non-empty and must not start with NUL.
pub fn is_valid_unit_device_token(unit_device_token: &str) -> bool {
    !unit_device_token.is_empty() && !unit_device_token.starts_with('\0')
}

#[derive(Clone)]
pub struct RewardEngine {
    ledger: Arc<dyn Ledger>,
    checksum: ChecksumValidator,
    activity: ActivityLog,
}

impl RewardEngine {
    pub fn new(ledger: Arc<dyn Ledger>, checksum: ChecksumValidator, activity: ActivityLog) -> Self {
        Self {
            ledger,
            checksum,
            activity,
        }
    }

    /// Validates the checksum of the request as sent and then of each fallback.
    ///
    /// Returns the ingredients which passed.
    pub fn validate_request(
        &self,
        ingredients: &RewardIngredients,
        fallbacks: impl IntoIterator<Item = RewardIngredients>,
    ) -> Result<RewardIngredients, RewardError> {
        Ok(self
            .checksum
            .validate_with_fallbacks(ingredients, fallbacks)?)
    }

    /// Gives the reward and returns the credited amount.
    ///
    /// A zero reward is credited without calling the ledger.
    pub async fn give_reward(&self, ingredients: &RewardIngredients) -> Result<i32, RewardError> {
        if ingredients.reward == 0 {
            return Ok(0);
        }

        self.ledger
            .give_impression_reward(&RewardForm::from(ingredients))
            .await?;

        Ok(ingredients.reward)
    }

    pub async fn received_status_map(
        &self,
        device_id: i64,
        periods: &PeriodForCampaign,
    ) -> Result<HashMap<i64, ReceivedStatus>, RepositoryError> {
        self.activity.received_status_map(device_id, periods).await
    }
}
