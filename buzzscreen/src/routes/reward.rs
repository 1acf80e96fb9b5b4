//! `POST /api/rewards`
use std::sync::Arc;

use axum::{http::StatusCode, Extension, Form};
use primitives::{CampaignKind, ClickType, Resource, RewardIngredients};
use serde::{Deserialize, Serialize};
use slog::{info, warn};

use crate::{
    response::ResponseError,
    reward::{resolve_unit_device_token, RewardError},
    Application,
};

/// The only reward type given through this route.
pub const IMPRESSION_REWARD_TYPE: &str = "imp";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardForm {
    pub app_id: i64,
    #[serde(default)]
    pub unit_id: i64,
    pub device_id: i64,
    pub ifa: String,
    pub unit_device_token: String,
    #[serde(default)]
    pub client_unit_device_token: Option<String>,
    #[serde(rename = "type")]
    pub reward_type: String,
    pub campaign_id: i64,
    #[serde(default)]
    pub campaign_type: String,
    pub campaign_name: String,
    #[serde(default)]
    pub campaign_owner_id: Option<String>,
    #[serde(default)]
    pub campaign_is_media: i32,
    #[serde(default)]
    pub slot: i32,
    #[serde(default)]
    pub reward: i32,
    #[serde(default)]
    pub base_reward: i32,
    #[serde(default)]
    pub check: String,
}

impl RewardForm {
    pub fn unit_device_token(&self) -> &str {
        resolve_unit_device_token(
            &self.unit_device_token,
            self.client_unit_device_token.as_deref().unwrap_or_default(),
        )
    }

    pub fn ingredients(&self) -> RewardIngredients {
        RewardIngredients {
            app_id: self.app_id,
            unit_id: self.unit_id,
            device_id: self.device_id,
            ifa: self.ifa.clone(),
            unit_device_token: self.unit_device_token().to_string(),
            campaign_id: self.campaign_id,
            campaign_type: self.campaign_type.clone(),
            campaign_name: self.campaign_name.clone(),
            campaign_owner_id: self
                .campaign_owner_id
                .clone()
                .filter(|owner| !owner.is_empty()),
            campaign_is_media: self.campaign_is_media,
            slot: self.slot,
            reward: self.reward,
            base_reward: self.base_reward,
            click_type: ClickType::Landing,
            checksum: self.check.clone(),
        }
    }
}

/// Gives an impression reward.
///
/// When a landing reward of the ad was deferred by the click redirect,
/// its tracking URL is called and only the base reward is given here.
pub async fn post_reward(
    Extension(app): Extension<Arc<Application>>,
    Form(form): Form<RewardForm>,
) -> Result<StatusCode, ResponseError> {
    let logger = &app.logger;

    if form.reward_type != IMPRESSION_REWARD_TYPE {
        return Err(ResponseError::BadRequest("unsupported type".to_string()));
    }

    info!(logger, "Reward requested"; "app_id" => form.app_id, "unit_id" => form.unit_id, "device_id" => form.device_id, "campaign_id" => form.campaign_id, "reward" => form.reward, "base_reward" => form.base_reward, "slot" => form.slot);

    let request = form.ingredients();
    let fallbacks = vec![
        request.with_unit_as_app(),
        request.with_unit_device_token(&form.unit_device_token),
    ];
    let mut ingredients = app
        .rewards
        .validate_request(&request, fallbacks)
        .map_err(|_| {
            ResponseError::BadRequest("failed to ValidateRequest. checksum is invalid".to_string())
        })?;

    if call_tracking_url(&app, form.device_id, form.campaign_id).await {
        ingredients.reward = ingredients.base_reward;
    }

    if ingredients.reward <= 0 {
        return Ok(StatusCode::OK);
    }

    let unit = match app.units.fetch_unit(ingredients.unit_id).await {
        Ok(Some(unit)) if unit.is_active => unit,
        Ok(_) => return Err(ResponseError::BadRequest("empty unit".to_string())),
        Err(err) => return Err(ResponseError::Internal(err.to_string())),
    };

    // iOS SDKs send the name with `+` instead of spaces
    if unit.is_ios() {
        ingredients.campaign_name = ingredients.campaign_name.replace('+', " ");
    }

    match app.rewards.give_reward(&ingredients).await {
        Ok(_) => Ok(StatusCode::OK),
        Err(RewardError::Duplicated) => Err(ResponseError::Conflict(
            RewardError::Duplicated.to_string(),
        )),
        Err(RewardError::Unprocessable) => Err(ResponseError::Unprocessable(
            RewardError::Unprocessable.to_string(),
        )),
        Err(err) => {
            warn!(logger, "Failed to give reward"; "device_id" => ingredients.device_id, "campaign_id" => ingredients.campaign_id, "error" => %err);

            Err(ResponseError::Internal(err.to_string()))
        }
    }
}

/// Calls the tracking URL saved by the click redirect of the ad.
///
/// Returns whether there was one, a failing call counts as tracked as well.
async fn call_tracking_url(app: &Application, device_id: i64, campaign_id: i64) -> bool {
    let ad_id = match CampaignKind::from_campaign_id(campaign_id) {
        CampaignKind::Ad(ad_id) => ad_id,
        CampaignKind::Content(_) => return false,
    };

    let url = match app.tracking_urls.take(device_id, &Resource::ad(ad_id)).await {
        Ok(Some(url)) => url,
        Ok(None) => return false,
        Err(err) => {
            warn!(&app.logger, "Reading tracking url failed"; "device_id" => device_id, "ad_id" => ad_id, "error" => %err);

            return false;
        }
    };

    if let Err(err) = app.web.call_tracking_url(&url).await {
        warn!(&app.logger, "Calling tracking url failed"; "device_id" => device_id, "ad_id" => ad_id, "error" => %err);
    }

    true
}
