//! `GET /api/content_impression/`
use std::sync::Arc;

use axum::{extract::Query, Extension, Json};
use primitives::ActivityKind;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use slog::{info, warn};

use crate::{
    log_line::EngagementLine, middleware::ClientIp, response::ResponseError,
    reward::is_valid_unit_device_token, routes::click_redirect::without_placeholder, Application,
};

const PLACE_PLACEHOLDER: &str = "__place__";
const POSITION_PLACEHOLDER: &str = "__position__";
const SESSION_ID_PLACEHOLDER: &str = "__session_id__";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentImpressionQuery {
    /// The encrypted [`ImpressionData`](primitives::ImpressionData)
    pub data: String,
    pub tracking_data: Option<String>,
    pub place: Option<String>,
    pub position: Option<String>,
    pub session_id: Option<String>,
}

/// Counts the impression of a content campaign.
pub async fn content_impression(
    Extension(app): Extension<Arc<Application>>,
    Extension(client_ip): Extension<ClientIp>,
    Query(query): Query<ContentImpressionQuery>,
) -> Result<Json<Value>, ResponseError> {
    let impression = app.codecs.parse_impression_data(&query.data)?;

    if !is_valid_unit_device_token(&impression.unit_device_token) {
        return Err(ResponseError::BadRequest(
            "invalid unit_device_token".to_string(),
        ));
    }

    // a tracking data which can not be parsed is left out
    let tracking_data = query
        .tracking_data
        .as_deref()
        .and_then(|tracking_data| app.codecs.parse_tracking_data(tracking_data).ok());

    if let Err(err) = app
        .content_campaigns
        .increase_impression(impression.campaign_id, impression.unit_id)
        .await
    {
        warn!(&app.logger, "Increasing impression count failed"; "campaign_id" => impression.campaign_id, "error" => %err);
    }

    let mut line = EngagementLine::impression(
        impression.device_id,
        impression.unit_id,
        impression.campaign_id,
        &impression.country,
    );
    line.ifa = impression.ifa.clone();
    line.ip = client_ip.as_i64();
    line.unit_device_token = impression.unit_device_token.clone();
    line.sex = impression.gender.clone();
    line.year_of_birth = impression.year_of_birth;
    line.place = query
        .place
        .as_deref()
        .map(|place| without_placeholder(place, PLACE_PLACEHOLDER))
        .filter(|place| !place.is_empty())
        .map(ToString::to_string);
    line.position = query
        .position
        .as_deref()
        .map(|position| without_placeholder(position, POSITION_PLACEHOLDER))
        .unwrap_or_default()
        .to_string();
    line.session_id = query
        .session_id
        .as_deref()
        .map(|session_id| without_placeholder(session_id, SESSION_ID_PLACEHOLDER))
        .unwrap_or_default()
        .to_string();
    line.model_artifact = tracking_data
        .map(|tracking_data| tracking_data.model_artifact)
        .unwrap_or_default();
    info!(&app.event_logger, "impression"; line);

    if let Err(err) = app
        .activity
        .save(
            impression.device_id,
            impression.campaign_id,
            ActivityKind::Impression,
        )
        .await
    {
        warn!(&app.logger, "Saving impression activity failed"; "device_id" => impression.device_id, "error" => %err);
    }

    Ok(Json(json!({"msg": "ok", "status": 200})))
}
