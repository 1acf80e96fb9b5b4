//! Referral codes and the two-sided referral rewards.
use std::sync::{Arc, Mutex};

use primitives::{
    referral::{encode_device_id, CODE_MIN_DIGITS, CODE_PADDING_CHARS},
    DeviceUser, ReferralRewardConfig,
};
use rand::{rngs::StdRng, seq::SliceRandom};
use thiserror::Error;

use crate::{
    db::{ReferralRepository, RepositoryError},
    upstream::{Ledger, LedgerError, ReferralReward, Web, WebError},
};

#[derive(Debug, Error)]
pub enum ReferralError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("{0}")]
    UserValidation(&'static str),
    #[error("user is not verified by the publisher")]
    NotVerified,
    #[error("verifying the user: {0}")]
    Verification(#[from] WebError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("referral reward: {0}")]
    Ledger(#[from] LedgerError),
}

/// A referee entering the code of a referrer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralRequest {
    pub device_id: i64,
    pub unit_device_token: String,
    pub code: String,
}

#[derive(Clone)]
pub struct ReferralEngine {
    repository: Arc<dyn ReferralRepository>,
    ledger: Arc<dyn Ledger>,
    web: Arc<dyn Web>,
    /// Seeded once per process
    rng: Arc<Mutex<StdRng>>,
}

impl ReferralEngine {
    pub fn new(
        repository: Arc<dyn ReferralRepository>,
        ledger: Arc<dyn Ledger>,
        web: Arc<dyn Web>,
        rng: StdRng,
    ) -> Self {
        Self {
            repository,
            ledger,
            web,
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    /// `XXXX-XXXX`: the device id in the code alphabet, left padded
    /// with random padding characters when shorter than 8 characters.
    pub fn generate_code(&self, device_id: i64) -> String {
        let mut code = encode_device_id(device_id.unsigned_abs());

        if code.len() < CODE_MIN_DIGITS {
            let padding_chars = CODE_PADDING_CHARS.as_bytes();
            let padding: String = {
                let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

                (0..CODE_MIN_DIGITS - 1)
                    .filter_map(|_| padding_chars.choose(&mut *rng))
                    .map(|byte| char::from(*byte))
                    .collect()
            };

            let padded = padding + &code;
            code = padded[padded.len() - CODE_MIN_DIGITS..].to_string();
        }

        let (head, tail) = code.split_at(4);
        format!("{}-{}", head, tail)
    }

    /// Returns the user of the device, creating it if needed.
    ///
    /// When the program has a `verify_url` the publisher has to verify
    /// `unit_device_token` first and the created user is verified.
    pub async fn get_or_create_user_by_device(
        &self,
        device_id: i64,
        unit_device_token: &str,
        verify_url: &str,
    ) -> Result<DeviceUser, ReferralError> {
        if device_id == 0 {
            return Err(ReferralError::InvalidArgument("device_id"));
        }

        if let Some(user) = self.repository.fetch_user_by_device(device_id).await? {
            return Ok(user);
        }

        if !verify_url.is_empty() && !self.web.verify_user(verify_url, unit_device_token).await? {
            return Err(ReferralError::NotVerified);
        }

        let user = DeviceUser {
            id: 0,
            device_id,
            code: self.generate_code(device_id),
            referrer_id: 0,
            is_verified: !verify_url.is_empty(),
        };

        Ok(self.repository.insert_user(user).await?)
    }

    pub async fn get_user_by_code(&self, code: &str) -> Result<Option<DeviceUser>, ReferralError> {
        if code.is_empty() {
            return Err(ReferralError::InvalidArgument("code"));
        }

        Ok(self.repository.fetch_user_by_code(code).await?)
    }

    /// Binds the referee to the referrer and rewards both of them.
    ///
    /// Returns `true` as well when the referee already has a referrer,
    /// in which case nothing is rewarded again.
    /// The referee is bound before the ledger call and unbound if it fails,
    /// so concurrent requests pay out at most once.
    /// The eligibility of both devices is checked by the caller.
    pub async fn create_referral(
        &self,
        request: &ReferralRequest,
        config: &ReferralRewardConfig,
    ) -> Result<bool, ReferralError> {
        if request.code.is_empty() {
            return Err(ReferralError::InvalidArgument("code"));
        }

        let referee = self
            .get_or_create_user_by_device(
                request.device_id,
                &request.unit_device_token,
                &config.verify_url,
            )
            .await?;

        let referrer = self
            .get_user_by_code(&request.code)
            .await?
            .ok_or(ReferralError::InvalidArgument("referrer not found"))?;

        if referee.referrer_id != 0 {
            return Ok(true);
        }

        if referee.id == referrer.id || referrer.referrer_id == referee.id {
            return Err(ReferralError::UserValidation("user can not refer himself"));
        }

        if !config.verify_url.is_empty() && !referee.is_verified {
            return Err(ReferralError::UserValidation("referee is not verified"));
        }

        let referrer_reward = if config.max_referral > 0
            && self.repository.referral_count(referrer.id).await? >= config.max_referral
        {
            0
        } else {
            config.amount
        };

        let reward = ReferralReward {
            referee_device_id: referee.device_id,
            referee_reward: config.amount,
            referee_title: config.title_for_referee.clone(),
            referrer_device_id: referrer.device_id,
            referrer_reward,
            referrer_title: config.title_for_referrer.clone(),
            referrer_max_title: config.title_for_max_referrer.clone(),
        };

        if !self
            .repository
            .bind_referrer(referee.id, referrer.id)
            .await?
        {
            return Ok(true);
        }

        if let Err(err) = self.ledger.give_referral_reward(&reward).await {
            self.repository
                .unbind_referrer(referee.id, referrer.id)
                .await?;

            return Err(err.into());
        }

        Ok(true)
    }
}
