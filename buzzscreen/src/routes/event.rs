//! Callbacks the publisher servers call with the event tokens we issued.
use std::sync::Arc;

use axum::{extract::Query, Extension, Json};
use primitives::Auth;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use slog::warn;

use crate::{event::EventError, response::ResponseError, Application};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardStatusResponse {
    pub reward_status: String,
}

/// `GET /api/track-event`
pub async fn track_event(
    Extension(app): Extension<Arc<Application>>,
    auth: Option<Extension<Auth>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Value>, ResponseError> {
    let Extension(auth) = auth.ok_or_else(forbidden)?;

    app.events
        .track_event(&auth, &query.token)
        .await
        .map_err(|err| into_response_error(&app, err))?;

    Ok(Json(json!({})))
}

/// `GET /api/reward-status`
pub async fn reward_status(
    Extension(app): Extension<Arc<Application>>,
    auth: Option<Extension<Auth>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<RewardStatusResponse>, ResponseError> {
    let Extension(auth) = auth.ok_or_else(forbidden)?;

    let reward_status = app
        .events
        .reward_status(&auth, &query.token)
        .await
        .map_err(|err| into_response_error(&app, err))?;

    Ok(Json(RewardStatusResponse { reward_status }))
}

fn forbidden() -> ResponseError {
    ResponseError::Forbidden("authentication required".to_string())
}

fn into_response_error(app: &Application, err: EventError) -> ResponseError {
    if err.is_client_error() {
        ResponseError::BadRequest(err.to_string())
    } else {
        warn!(&app.logger, "Handling event failed"; "error" => %err);

        ResponseError::Internal(err.to_string())
    }
}
