//! `GET /api/users/:device` & `POST /api/users/:device/referral`
//!
//! The mobile SDK expects `{"error": ...}` bodies from these routes.
use std::sync::Arc;

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use primitives::{Device, DeviceUser, ReferralRewardConfig};
use serde::{Deserialize, Serialize};
use serde_json::json;
use slog::{info, warn};

use crate::{
    referral::{ReferralError, ReferralRequest},
    Application,
};

#[derive(Debug)]
pub struct ReferralResponseError {
    status: StatusCode,
    message: String,
}

impl ReferralResponseError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ReferralResponseError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ReferralError> for ReferralResponseError {
    fn from(error: ReferralError) -> Self {
        match error {
            ReferralError::InvalidArgument(_)
            | ReferralError::UserValidation(_)
            | ReferralError::NotVerified => Self::bad_request(error.to_string()),
            _ => Self::internal(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub app_id: i64,
    pub enabled: bool,
    pub amount: i32,
    pub ended: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: DeviceUser,
    pub referral_config: ConfigResponse,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferralForm {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralResponse {
    pub success: bool,
}

/// The referral user of the device together with the program of its app.
///
/// A device which may no longer be referred is shown with `referrer_id = 1`
/// so that the SDK hides the code input.
pub async fn get_user(
    Extension(app): Extension<Arc<Application>>,
    Path(device): Path<String>,
) -> Result<Json<UserResponse>, ReferralResponseError> {
    let device = fetch_device(&app, &device).await?;
    let config = fetch_config(&app, device.app_id).await?;

    let mut user = app
        .referrals
        .get_or_create_user_by_device(device.id, &device.unit_device_token, &config.verify_url)
        .await
        .map_err(|err| {
            warn!(&app.logger, "Getting the referral user failed"; "device_id" => device.id, "error" => %err);

            ReferralResponseError::internal(err.to_string())
        })?;

    let now = app.clock.now();
    if user.referrer_id == 0 && !config.is_eligible_referee(&device, now) {
        user.referrer_id = 1;
    }

    Ok(Json(UserResponse {
        user,
        referral_config: ConfigResponse {
            app_id: config.app_id,
            enabled: config.enabled,
            amount: config.amount,
            ended: config.is_ended(now),
        },
    }))
}

/// The device enters the referral `code` of another device.
pub async fn post_referral(
    Extension(app): Extension<Arc<Application>>,
    Path(device): Path<String>,
    Form(form): Form<ReferralForm>,
) -> Result<Json<ReferralResponse>, ReferralResponseError> {
    let referee_device = fetch_device(&app, &device).await?;

    let referrer = app
        .referrals
        .get_user_by_code(&form.code)
        .await
        .map_err(|err| ReferralResponseError::bad_request(err.to_string()))?
        .ok_or_else(|| ReferralResponseError::not_found("referrer not found"))?;

    let referrer_device = match app.devices.fetch_device(referrer.device_id).await {
        Ok(Some(device)) => device,
        Ok(None) => return Err(ReferralResponseError::internal("referrer device not found")),
        Err(err) => return Err(ReferralResponseError::internal(err.to_string())),
    };

    let config = fetch_config(&app, referee_device.app_id).await?;

    if !config.is_eligible_referee(&referee_device, app.clock.now()) {
        return Err(ReferralResponseError::bad_request(
            "device validation failed - referee device",
        ));
    }
    if !config.is_eligible_referrer(&referrer_device) {
        return Err(ReferralResponseError::bad_request(
            "device validation failed - referrer device",
        ));
    }

    let request = ReferralRequest {
        device_id: referee_device.id,
        unit_device_token: referee_device.unit_device_token.clone(),
        code: form.code,
    };

    let success = app
        .referrals
        .create_referral(&request, &config)
        .await
        .map_err(|err| {
            warn!(&app.logger, "Referral failed"; "device_id" => request.device_id, "code" => &request.code, "error" => %err);

            ReferralResponseError::from(err)
        })?;

    info!(&app.logger, "Referral created"; "device_id" => request.device_id, "referrer_device_id" => referrer_device.id);

    Ok(Json(ReferralResponse { success }))
}

async fn fetch_device(app: &Application, device: &str) -> Result<Device, ReferralResponseError> {
    let device_id = device
        .parse::<i64>()
        .map_err(|_| ReferralResponseError::bad_request("invalid device id"))?;

    app.devices
        .fetch_device(device_id)
        .await
        .map_err(|err| ReferralResponseError::internal(err.to_string()))?
        .ok_or_else(|| ReferralResponseError::not_found("device not found"))
}

async fn fetch_config(
    app: &Application,
    app_id: i64,
) -> Result<ReferralRewardConfig, ReferralResponseError> {
    match app.referral_repository.fetch_config(app_id).await {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Err(ReferralResponseError::internal("config not found")),
        Err(err) => {
            warn!(&app.logger, "Fetching the referral config failed"; "app_id" => app_id, "error" => %err);

            Err(ReferralResponseError::internal("config not found"))
        }
    }
}

#[cfg(test)]
mod test {
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Request},
    };
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use primitives::{
        test_util::{DUMMY_DEVICE, DUMMY_REFERRAL_CONFIG},
        Clock,
    };
    use tower::Service;

    use crate::{
        db::memory::MemoryRepository,
        middleware::body_to_string,
        routes::router,
        test_util::{setup_dummy_app, DummyApp},
    };

    use super::*;

    fn insert_referrer_device(repository: &MemoryRepository) -> Device {
        let device = Device {
            id: 8,
            unit_device_token: "udt-0008".into(),
            ifa: "ifa-0008".into(),
            ..DUMMY_DEVICE.clone()
        };
        repository.devices.insert(device.id, device.clone());

        device
    }

    async fn get(app: &Arc<Application>, device: &str) -> Response {
        let request = Request::builder()
            .uri(format!("/api/users/{}", device))
            .extension(app.clone())
            .body(Body::empty())
            .expect("should never fail!");

        router()
            .call(request)
            .await
            .expect("Handling the Request shouldn't have failed")
    }

    async fn refer(app: &Arc<Application>, device: &str, code: &str) -> Response {
        let body = serde_qs::to_string(&ReferralForm { code: code.into() })
            .expect("Should serialize form");
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/users/{}/referral", device))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .extension(app.clone())
            .body(Body::from(body))
            .expect("should never fail!");

        router()
            .call(request)
            .await
            .expect("Handling the Request shouldn't have failed")
    }

    async fn user_response(response: Response) -> UserResponse {
        serde_json::from_str(&body_to_string(response).await).expect("Should deserialize")
    }

    #[tokio::test]
    async fn get_user_creates_the_user_once() {
        let DummyApp { app, .. } = setup_dummy_app();

        let response = get(&app, "7").await;
        assert_eq!(StatusCode::OK, response.status());
        let first = user_response(response).await;

        assert_eq!(DUMMY_DEVICE.id, first.user.device_id);
        assert_eq!(0, first.user.referrer_id);
        assert_eq!(9, first.user.code.len());
        assert_eq!(
            ConfigResponse {
                app_id: DUMMY_REFERRAL_CONFIG.app_id,
                enabled: true,
                amount: 100,
                ended: false,
            },
            first.referral_config
        );

        let second = user_response(get(&app, "7").await).await;
        assert_eq!(first.user, second.user);
    }

    #[tokio::test]
    async fn ineligible_referees_show_a_referrer() {
        let DummyApp {
            app,
            repository,
            clock,
            ..
        } = setup_dummy_app();
        repository.referral_configs.insert(
            DUMMY_REFERRAL_CONFIG.app_id,
            ReferralRewardConfig {
                expire_hours: 1,
                end_date: Some(clock.now() - Duration::hours(1)),
                ..DUMMY_REFERRAL_CONFIG.clone()
            },
        );

        let response = user_response(get(&app, "7").await).await;

        assert_eq!(1, response.user.referrer_id);
        assert!(response.referral_config.ended);
        // the stored user is left untouched
        let stored = repository
            .users
            .iter()
            .find(|user| user.device_id == 7)
            .map(|user| user.referrer_id);
        assert_eq!(Some(0), stored);
    }

    #[tokio::test]
    async fn get_user_errors() {
        let DummyApp {
            app, repository, ..
        } = setup_dummy_app();

        let response = get(&app, "seven").await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        assert_eq!(
            r#"{"error":"invalid device id"}"#,
            body_to_string(response).await
        );

        assert_eq!(StatusCode::NOT_FOUND, get(&app, "404").await.status());

        repository.referral_configs.clear();
        let response = get(&app, "7").await;
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status());
        assert_eq!(
            r#"{"error":"config not found"}"#,
            body_to_string(response).await
        );
    }

    #[tokio::test]
    async fn referral_rewards_both_sides() {
        let DummyApp {
            app,
            repository,
            ledger,
            ..
        } = setup_dummy_app();
        insert_referrer_device(&repository);
        let referrer = user_response(get(&app, "8").await).await.user;

        let response = refer(&app, "7", &referrer.code).await;

        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(r#"{"success":true}"#, body_to_string(response).await);

        let rewards = ledger.referral_rewards();
        assert_eq!(1, rewards.len());
        assert_eq!(7, rewards[0].referee_device_id);
        assert_eq!(8, rewards[0].referrer_device_id);
        assert_eq!(100, rewards[0].referrer_reward);

        let referee = user_response(get(&app, "7").await).await.user;
        assert_eq!(referrer.id, referee.referrer_id);

        // a referred device stays referred without a second reward
        let response = refer(&app, "7", &referrer.code).await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(1, ledger.referral_rewards().len());
    }

    #[tokio::test]
    async fn self_referral_is_rejected() {
        let DummyApp { app, ledger, .. } = setup_dummy_app();
        let user = user_response(get(&app, "7").await).await.user;

        let response = refer(&app, "7", &user.code).await;

        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        assert_eq!(
            r#"{"error":"user can not refer himself"}"#,
            body_to_string(response).await
        );
        assert!(ledger.referral_rewards().is_empty());
        let user = user_response(get(&app, "7").await).await.user;
        assert_eq!(0, user.referrer_id);
    }

    #[tokio::test]
    async fn referral_validation() {
        let DummyApp {
            app,
            repository,
            ledger,
            ..
        } = setup_dummy_app();
        let referrer_device = insert_referrer_device(&repository);
        let referrer = user_response(get(&app, "8").await).await.user;

        let response = refer(&app, "7", "zzzz-zzzz").await;
        assert_eq!(StatusCode::NOT_FOUND, response.status());
        assert_eq!(
            r#"{"error":"referrer not found"}"#,
            body_to_string(response).await
        );

        assert_eq!(StatusCode::BAD_REQUEST, refer(&app, "7", "").await.status());

        // registered in another app
        repository.devices.insert(
            referrer_device.id,
            Device {
                app_id: 101,
                ..referrer_device.clone()
            },
        );
        let response = refer(&app, "7", &referrer.code).await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        assert_eq!(
            r#"{"error":"device validation failed - referrer device"}"#,
            body_to_string(response).await
        );
        repository.devices.insert(referrer_device.id, referrer_device);

        repository.referral_configs.insert(
            DUMMY_REFERRAL_CONFIG.app_id,
            ReferralRewardConfig {
                enabled: false,
                ..DUMMY_REFERRAL_CONFIG.clone()
            },
        );
        let response = refer(&app, "7", &referrer.code).await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        assert_eq!(
            r#"{"error":"device validation failed - referee device"}"#,
            body_to_string(response).await
        );

        assert!(ledger.referral_rewards().is_empty());
    }
}
