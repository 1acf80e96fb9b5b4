//! `POST /api/unlock`
use std::sync::Arc;

use axum::{Extension, Form, Json};
use primitives::{campaign::PLACEHOLDER_CAMPAIGN_ID, ClickType, Payload, RewardIngredients};
use serde::{Deserialize, Serialize};
use slog::{debug, info, warn};

use crate::{response::ResponseError, reward::RewardError, Application};

/// The form of an unlock, new SDKs no longer send the `unit_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockForm {
    pub app_id: Option<i64>,
    pub unit_id: Option<i64>,
    pub device_id: i64,
    pub ifa: String,
    pub unit_device_token: String,
    pub reward: i32,
    pub base_reward: i32,
    #[serde(rename = "click_campaign_id")]
    pub campaign_id: i64,
    #[serde(rename = "click_campaign_type")]
    pub campaign_type: String,
    #[serde(rename = "click_campaign_name")]
    pub campaign_name: String,
    #[serde(rename = "click_campaign_owner_id")]
    pub campaign_owner_id: Option<String>,
    #[serde(rename = "click_campaign_is_media")]
    pub campaign_is_media: i32,
    pub click_type: String,
    pub slot: i32,
    #[serde(rename = "click_campaign_payload")]
    pub payload: String,
    pub check: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockResponse {
    pub reward_received: i32,
}

/// An [`UnlockForm`] with the ids resolved and the payload parsed.
#[derive(Debug, Clone)]
struct Unlock {
    app_id: i64,
    unit_id: i64,
    payload: Payload,
    ingredients: RewardIngredients,
}

impl UnlockForm {
    fn resolve(self, payload: Payload) -> Result<Unlock, ResponseError> {
        let (app_id, unit_id) = match (self.app_id, self.unit_id) {
            (None, None) => {
                let unit_id = payload.unit_id.ok_or_else(|| {
                    ResponseError::BadRequest("app_id & unit_id not found".to_string())
                })?;

                (unit_id, unit_id)
            }
            (Some(app_id), None) => (app_id, 0),
            (None, Some(unit_id)) => (unit_id, unit_id),
            (Some(app_id), Some(unit_id)) => (app_id, unit_id),
        };

        match self.click_type.parse::<ClickType>() {
            Ok(ClickType::Unlock) => {}
            _ => return Err(ResponseError::BadRequest("invalid click type".to_string())),
        }

        let campaign_id = match self.campaign_id {
            0 => PLACEHOLDER_CAMPAIGN_ID,
            campaign_id => campaign_id,
        };

        let ingredients = RewardIngredients {
            app_id,
            unit_id,
            device_id: self.device_id,
            ifa: self.ifa,
            unit_device_token: self.unit_device_token,
            campaign_id,
            campaign_type: self.campaign_type,
            campaign_name: self.campaign_name,
            campaign_owner_id: self.campaign_owner_id.filter(|owner| !owner.is_empty()),
            campaign_is_media: self.campaign_is_media,
            slot: self.slot,
            reward: self.reward,
            base_reward: self.base_reward,
            click_type: ClickType::Unlock,
            checksum: self.check,
        };

        Ok(Unlock {
            app_id,
            unit_id,
            payload,
            ingredients,
        })
    }
}

/// Gives the reward of an unlock and responds with the credited amount.
///
/// A reward which was already given or can not be given is credited as `0`.
pub async fn unlock(
    Extension(app): Extension<Arc<Application>>,
    Form(form): Form<UnlockForm>,
) -> Result<Json<UnlockResponse>, ResponseError> {
    let logger = &app.logger;

    let payload = app.codecs.parse_payload(&form.payload)?;
    let unlock = form.resolve(payload)?;

    if unlock.ingredients.reward == 0 {
        return Ok(received(0));
    }

    info!(logger, "Unlock"; "app_id" => unlock.app_id, "unit_id" => unlock.unit_id, "device_id" => unlock.ingredients.device_id, "campaign_id" => unlock.ingredients.campaign_id, "reward" => unlock.ingredients.reward, "base_reward" => unlock.ingredients.base_reward, "slot" => unlock.ingredients.slot);

    if unlock.payload.is_expired(app.clock.now()) {
        return Ok(received(0));
    }

    let mut ingredients = app
        .rewards
        .validate_request(
            &unlock.ingredients,
            vec![unlock.ingredients.with_unit_as_app()],
        )
        .map_err(|err| {
            debug!(logger, "Invalid unlock request"; "device_id" => unlock.ingredients.device_id, "error" => %err);

            ResponseError::BadRequest(err.to_string())
        })?;

    match app.units.fetch_unit(unlock.unit_id).await {
        Ok(Some(unit)) if unit.is_active => {}
        Ok(_) => return Err(ResponseError::BadRequest("invalid unit_id".to_string())),
        Err(err) => {
            warn!(logger, "Fetching unit failed"; "unit_id" => unlock.unit_id, "error" => %err);

            return Err(ResponseError::BadRequest("invalid unit_id".to_string()));
        }
    }

    // SDKs which did not send the base reward
    if ingredients.reward != 0 && ingredients.base_reward == 0 {
        ingredients.base_reward = ingredients.reward;
    }

    match app.rewards.give_reward(&ingredients).await {
        Ok(reward_received) => Ok(received(reward_received)),
        Err(err @ (RewardError::Duplicated | RewardError::Unprocessable)) => {
            warn!(logger, "Failed to give unlock reward"; "device_id" => ingredients.device_id, "error" => %err);

            Ok(received(0))
        }
        Err(err) => Err(ResponseError::Internal(err.to_string())),
    }
}

fn received(reward_received: i32) -> Json<UnlockResponse> {
    Json(UnlockResponse { reward_received })
}

#[cfg(test)]
mod test {
    use adapter::checksum::fingerprint;
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Request, StatusCode},
        response::Response,
    };
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use primitives::test_util::{DUMMY_INGREDIENTS, DUMMY_PAYLOAD, NOW};
    use tower::Service;

    use crate::{
        middleware::body_to_string,
        routes::router,
        test_util::{setup_dummy_app, DummyApp},
        upstream::LedgerError,
    };

    use super::*;

    fn unlock_ingredients() -> RewardIngredients {
        RewardIngredients {
            click_type: ClickType::Unlock,
            ..DUMMY_INGREDIENTS.clone()
        }
    }

    fn signed_form(app: &Application, ingredients: RewardIngredients) -> UnlockForm {
        UnlockForm {
            app_id: Some(ingredients.app_id),
            unit_id: Some(ingredients.unit_id),
            device_id: ingredients.device_id,
            ifa: ingredients.ifa.clone(),
            unit_device_token: ingredients.unit_device_token.clone(),
            reward: ingredients.reward,
            base_reward: ingredients.base_reward,
            campaign_id: ingredients.campaign_id,
            campaign_type: ingredients.campaign_type.clone(),
            campaign_name: ingredients.campaign_name.clone(),
            campaign_owner_id: ingredients.campaign_owner_id.clone(),
            campaign_is_media: ingredients.campaign_is_media,
            click_type: "u".into(),
            slot: ingredients.slot,
            payload: app
                .codecs
                .build_payload(&DUMMY_PAYLOAD)
                .expect("Should build payload"),
            check: fingerprint(&ingredients),
        }
    }

    async fn post_unlock(app: &Arc<Application>, path: &str, form: &UnlockForm) -> Response {
        let body = serde_qs::to_string(form).expect("Should serialize form");
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .extension(app.clone())
            .body(Body::from(body))
            .expect("should never fail!");

        router()
            .call(request)
            .await
            .expect("Handling the Request shouldn't have failed")
    }

    async fn reward_received(response: Response) -> i32 {
        assert_eq!(StatusCode::OK, response.status());

        serde_json::from_str::<UnlockResponse>(&body_to_string(response).await)
            .expect("Should be an UnlockResponse")
            .reward_received
    }

    #[tokio::test]
    async fn unlock_gives_the_reward() {
        let DummyApp { app, ledger, .. } = setup_dummy_app();
        let form = signed_form(&app, unlock_ingredients());

        let response = post_unlock(&app, "/api/unlock", &form).await;

        assert_eq!(10, reward_received(response).await);
        let rewards = ledger.rewards();
        assert_eq!(1, rewards.len());
        assert_eq!("u", rewards[0].click_type);
    }

    #[tokio::test]
    async fn duplicated_unlock_receives_nothing() {
        let DummyApp { app, ledger, .. } = setup_dummy_app();
        let form = signed_form(&app, unlock_ingredients());
        ledger.fail_with(LedgerError::Duplicated);

        // the legacy alias
        let response = post_unlock(&app, "/api/impression/", &form).await;

        assert_eq!(0, reward_received(response).await);
        assert!(ledger.rewards().is_empty());
    }

    #[tokio::test]
    async fn failing_ledger_is_an_internal_error() {
        let DummyApp { app, ledger, .. } = setup_dummy_app();
        let form = signed_form(&app, unlock_ingredients());
        ledger.fail_with(LedgerError::Status(StatusCode::SERVICE_UNAVAILABLE));

        let response = post_unlock(&app, "/api/unlock", &form).await;

        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status());
    }

    #[tokio::test]
    async fn nothing_to_give() {
        let DummyApp { app, ledger, .. } = setup_dummy_app();

        let zero_reward = signed_form(
            &app,
            RewardIngredients {
                reward: 0,
                ..unlock_ingredients()
            },
        );
        let response = post_unlock(&app, "/api/unlock", &zero_reward).await;
        assert_eq!(0, reward_received(response).await);

        let expired = Payload {
            ended_at: (*NOW - Duration::days(8)).timestamp(),
            ..DUMMY_PAYLOAD.clone()
        };
        let expired_form = UnlockForm {
            payload: app
                .codecs
                .build_payload(&expired)
                .expect("Should build payload"),
            ..signed_form(&app, unlock_ingredients())
        };
        let response = post_unlock(&app, "/api/unlock", &expired_form).await;
        assert_eq!(0, reward_received(response).await);

        assert!(ledger.rewards().is_empty());
    }

    #[tokio::test]
    async fn rejected_unlocks() {
        let DummyApp { app, ledger, .. } = setup_dummy_app();

        let landing = UnlockForm {
            click_type: "l".into(),
            ..signed_form(&app, unlock_ingredients())
        };
        let response = post_unlock(&app, "/api/unlock", &landing).await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());

        let without_payload = UnlockForm {
            payload: "__campaign_payload__".into(),
            ..signed_form(&app, unlock_ingredients())
        };
        let response = post_unlock(&app, "/api/unlock", &without_payload).await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());

        let wrong_checksum = UnlockForm {
            check: "0123456789abcdef0123456789abcdef".into(),
            ..signed_form(&app, unlock_ingredients())
        };
        let response = post_unlock(&app, "/api/unlock", &wrong_checksum).await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());

        assert!(ledger.rewards().is_empty());
    }

    #[tokio::test]
    async fn ids_from_the_payload_and_legacy_base_reward() {
        let DummyApp { app, ledger, .. } = setup_dummy_app();

        // signed with `app_id := unit_id` and without a base reward
        let ingredients = RewardIngredients {
            base_reward: 0,
            ..unlock_ingredients().with_unit_as_app()
        };
        let payload = Payload {
            unit_id: Some(ingredients.unit_id),
            ..DUMMY_PAYLOAD.clone()
        };
        let form = UnlockForm {
            app_id: None,
            unit_id: None,
            payload: app
                .codecs
                .build_payload(&payload)
                .expect("Should build payload"),
            ..signed_form(&app, ingredients)
        };

        let response = post_unlock(&app, "/api/unlock", &form).await;

        assert_eq!(10, reward_received(response).await);
        let rewards = ledger.rewards();
        assert_eq!(200, rewards[0].app_id);
        assert_eq!(10, rewards[0].base_reward);
    }

    #[test]
    fn missing_ids() {
        let form = UnlockForm {
            click_type: "u".into(),
            ..UnlockForm::default()
        };

        assert!(matches!(
            form.clone().resolve(DUMMY_PAYLOAD.clone()),
            Err(ResponseError::BadRequest(message)) if message == "app_id & unit_id not found"
        ));

        let only_app = UnlockForm {
            app_id: Some(100),
            ..form.clone()
        };
        let unlock = only_app
            .resolve(DUMMY_PAYLOAD.clone())
            .expect("Should resolve");
        assert_eq!((100, 0), (unlock.app_id, unlock.unit_id));

        let only_unit = UnlockForm {
            unit_id: Some(200),
            ..form
        };
        let unlock = only_unit
            .resolve(DUMMY_PAYLOAD.clone())
            .expect("Should resolve");
        assert_eq!((200, 200), (unlock.app_id, unlock.unit_id));
        assert_eq!(PLACEHOLDER_CAMPAIGN_ID, unlock.ingredients.campaign_id);
    }
}
