//! `GET /api/click_redirect/`
use std::sync::Arc;

use axum::{
    extract::Query,
    http::{
        header::{CONTENT_LENGTH, HOST, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    Extension,
};
use primitives::{
    campaign::{campaign_type::is_resolved_by_ad_backend, PLACEHOLDER_CAMPAIGN_ID},
    Account, ActivityKind, CampaignKind, ClickType, ContentCampaign, Payload, Resource,
    RewardIngredients, Unit,
};
use serde::{Deserialize, Deserializer, Serialize};
use slog::{debug, info, warn};

use crate::{
    log_line::EngagementLine,
    middleware::ClientIp,
    response::ResponseError,
    reward::{is_valid_unit_device_token, resolve_unit_device_token, RewardError},
    Application,
};

const POSITION_PLACEHOLDER: &str = "__position__";
const SESSION_ID_PLACEHOLDER: &str = "__session_id__";

/// The query the SDKs open the click URL with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickRedirectQuery {
    /// Defaults to the `unit_id`
    pub app_id: Option<i64>,
    pub unit_id: i64,
    pub device_id: i64,
    pub ifa: String,
    /// Set by the server at allocation time
    pub unit_device_token: String,
    /// Substituted by the SDK
    pub client_unit_device_token: Option<String>,
    pub reward: i32,
    pub base_reward: i32,
    pub campaign_id: i64,
    pub campaign_type: String,
    pub campaign_name: String,
    pub campaign_owner_id: Option<String>,
    pub campaign_is_media: i32,
    pub external_campaign_id: Option<String>,
    pub redirect_url: String,
    pub redirect_url_clean: Option<String>,
    pub slot: i32,
    pub position: String,
    pub session_id: String,
    pub campaign_payload: String,
    /// A number, any positive value means the quick page was opened
    pub use_clean_mode: String,
    /// `1` when the click was not made by the user
    pub false_click: String,
    pub tracking_data: Option<String>,
    pub tracking_url: Option<String>,
    #[serde(deserialize_with = "deserialize_flag")]
    pub use_reward_api: bool,
    pub check: String,
}

impl ClickRedirectQuery {
    pub fn app_id(&self) -> i64 {
        self.app_id.unwrap_or(self.unit_id)
    }

    pub fn campaign_id(&self) -> i64 {
        match self.campaign_id {
            0 => PLACEHOLDER_CAMPAIGN_ID,
            campaign_id => campaign_id,
        }
    }

    pub fn use_clean_mode(&self) -> bool {
        self.use_clean_mode.trim().parse::<i64>().unwrap_or_default() > 0
    }

    pub fn is_false_click(&self) -> bool {
        self.false_click == "1"
    }

    pub fn position(&self) -> &str {
        without_placeholder(&self.position, POSITION_PLACEHOLDER)
    }

    pub fn session_id(&self) -> &str {
        without_placeholder(&self.session_id, SESSION_ID_PLACEHOLDER)
    }

    pub fn unit_device_token(&self) -> &str {
        resolve_unit_device_token(
            &self.unit_device_token,
            self.client_unit_device_token.as_deref().unwrap_or_default(),
        )
    }

    /// The ingredients of the landing reward as requested.
    pub fn ingredients(&self) -> RewardIngredients {
        RewardIngredients {
            app_id: self.app_id(),
            unit_id: self.unit_id,
            device_id: self.device_id,
            ifa: self.ifa.clone(),
            unit_device_token: self.unit_device_token().to_string(),
            campaign_id: self.campaign_id(),
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

pub(crate) fn without_placeholder<'a>(value: &'a str, placeholder: &str) -> &'a str {
    if value == placeholder {
        ""
    } else {
        value
    }
}

/// Accepts `1` and `true`, anything else is `false`.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;

    Ok(matches!(value.as_str(), "1" | "true" | "True"))
}

/// Counts the click, gives the landing reward and redirects to the landing page.
///
/// Once the request is validated the device is always redirected,
/// a reward which was already given or can not be given only gets logged.
pub async fn click_redirect(
    Extension(app): Extension<Arc<Application>>,
    Extension(client_ip): Extension<ClientIp>,
    headers: HeaderMap,
    Query(query): Query<ClickRedirectQuery>,
) -> Result<(StatusCode, HeaderMap), ResponseError> {
    let logger = &app.logger;

    let request = query.ingredients();
    let mut fallbacks = vec![request.with_unit_as_app()];
    if request.unit_device_token != query.unit_device_token {
        fallbacks.push(request.with_unit_device_token(&query.unit_device_token));
    }

    let mut ingredients = app
        .rewards
        .validate_request(&request, fallbacks)
        .map_err(|err| {
            debug!(logger, "Invalid click request"; "device_id" => query.device_id, "campaign_id" => request.campaign_id, "error" => %err);

            ResponseError::BadRequest(format!("failed to ValidateRequest. {}", err))
        })?;

    if !is_valid_unit_device_token(query.unit_device_token()) {
        return Err(ResponseError::BadRequest(
            "invalid unit_device_token".to_string(),
        ));
    }

    let unit = match app.units.fetch_unit(query.unit_id).await {
        Ok(Some(unit)) if unit.is_active => unit,
        Ok(_) => return Err(ResponseError::BadRequest("invalid unit_id".to_string())),
        Err(err) => {
            warn!(logger, "Fetching unit failed"; "unit_id" => query.unit_id, "error" => %err);

            return Err(ResponseError::BadRequest("invalid unit_id".to_string()));
        }
    };

    if query
        .external_campaign_id
        .as_deref()
        .map_or(false, |id| !id.is_empty())
    {
        return redirect(&query.redirect_url, Vec::new());
    }

    let now = app.clock.now();
    let payload = app.codecs.parse_payload(&query.campaign_payload).ok();
    let expired = match &payload {
        Some(payload) => {
            if payload.is_allocation_stale(now) {
                debug!(logger, "Click on a stale allocation"; "device_id" => query.device_id, "campaign_id" => request.campaign_id, "allocated_at" => payload.time);
            }

            payload.is_expired(now)
        }
        None => fetch_content_campaign(&app, request.campaign_id)
            .await?
            .is_expired(now),
    };

    count_click(&app, &query, &unit, payload.as_ref(), &client_ip).await?;

    let redirect_url = resolve_redirect_url(&app, &query, &headers).await?;

    if let Some(tracking_url) = &query.tracking_url {
        // the landing part of the reward is given once the landing is tracked
        ingredients.reward = ingredients.base_reward;
        let tracking_url = app.internal_ad_url(tracking_url);

        match (
            query.use_reward_api,
            CampaignKind::from_campaign_id(request.campaign_id),
        ) {
            (true, CampaignKind::Ad(ad_id)) => {
                app.tracking_urls
                    .save(query.device_id, &Resource::ad(ad_id), &tracking_url)
                    .await
            }
            (true, CampaignKind::Content(_)) => {}
            (false, _) => {
                if let Err(err) = app.web.call_tracking_url(&tracking_url).await {
                    warn!(logger, "Calling tracking url failed"; "device_id" => query.device_id, "error" => %err);
                }
            }
        }
    }

    if !expired && ingredients.reward > 0 {
        match app.rewards.give_reward(&ingredients).await {
            Ok(_) => {}
            Err(err @ (RewardError::Duplicated | RewardError::Unprocessable)) => {
                warn!(logger, "Failed to give reward"; "device_id" => ingredients.device_id, "campaign_id" => ingredients.campaign_id, "error" => %err);
            }
            Err(err) => {
                warn!(logger, "Failed to give reward"; "device_id" => ingredients.device_id, "campaign_id" => ingredients.campaign_id, "error" => %err);

                return Err(ResponseError::BadRequest(err.to_string()));
            }
        }
    }

    let cookies = app.cookies.handle(&headers, &query.ifa);

    app.profiles.populate(Account {
        app_id: query.app_id(),
        ifa: query.ifa.clone(),
        account_id: query.device_id,
        cookie_id: cookies.cookie_id,
        app_user_id: query.unit_device_token.clone(),
    });

    let location = match query.redirect_url_clean.as_deref() {
        Some(clean) if query.use_clean_mode() && !clean.is_empty() => clean,
        _ => redirect_url.as_str(),
    };

    redirect(location, cookies.set_cookies)
}

fn redirect(
    location: &str,
    set_cookies: Vec<HeaderValue>,
) -> Result<(StatusCode, HeaderMap), ResponseError> {
    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, HeaderValue::from_str(location)?);
    for cookie in set_cookies {
        headers.append(SET_COOKIE, cookie);
    }

    Ok((StatusCode::FOUND, headers))
}

async fn fetch_content_campaign(
    app: &Application,
    campaign_id: i64,
) -> Result<ContentCampaign, ResponseError> {
    match app.content_campaigns.fetch_content_campaign(campaign_id).await {
        Ok(Some(campaign)) => Ok(campaign),
        Ok(None) => Err(ResponseError::BadRequest(format!(
            "content campaign {} not found",
            campaign_id
        ))),
        Err(err) => {
            warn!(&app.logger, "Fetching content campaign failed"; "campaign_id" => campaign_id, "error" => %err);

            Err(ResponseError::BadRequest(err.to_string()))
        }
    }
}

/// Clicks are only counted for content campaigns.
async fn count_click(
    app: &Application,
    query: &ClickRedirectQuery,
    unit: &Unit,
    payload: Option<&Payload>,
    client_ip: &ClientIp,
) -> Result<(), ResponseError> {
    let campaign_id = match CampaignKind::from_campaign_id(query.campaign_id()) {
        CampaignKind::Content(campaign_id) => campaign_id,
        CampaignKind::Ad(_) => return Ok(()),
    };

    // legacy SDKs may load both the quick and the original page of a campaign
    let is_duplicated_click = if app
        .config
        .reward
        .legacy_clean_mode_units
        .contains(&query.unit_id)
    {
        fetch_content_campaign(app, campaign_id)
            .await?
            .is_duplicated_click(query.use_clean_mode())
    } else {
        false
    };

    if query.is_false_click() || is_duplicated_click {
        return Ok(());
    }

    if let Err(err) = app
        .content_campaigns
        .increase_click(campaign_id, query.unit_id)
        .await
    {
        warn!(&app.logger, "Increasing click count failed"; "campaign_id" => campaign_id, "error" => %err);
    }

    let model_artifact = query
        .tracking_data
        .as_deref()
        .and_then(|tracking_data| app.codecs.parse_tracking_data(tracking_data).ok())
        .map(|tracking_data| tracking_data.model_artifact)
        .unwrap_or_default();

    let mut line = EngagementLine::click(query.device_id, query.unit_id, campaign_id, &unit.country);
    if let Some(payload) = payload {
        line = line.with_payload(payload);
    }
    line.ifa = query.ifa.clone();
    line.ip = client_ip.as_i64();
    line.unit_device_token = query.unit_device_token().to_string();
    line.session_id = query.session_id().to_string();
    line.model_artifact = model_artifact;
    line.position = query.position().to_string();
    info!(&app.event_logger, "click"; line);

    if let Err(err) = app
        .activity
        .save(query.device_id, campaign_id, ActivityKind::Click)
        .await
    {
        warn!(&app.logger, "Saving click activity failed"; "device_id" => query.device_id, "error" => %err);
    }

    Ok(())
}

/// CPM & CPC clicks go through the ad backend, which answers with the landing page.
async fn resolve_redirect_url(
    app: &Application,
    query: &ClickRedirectQuery,
    headers: &HeaderMap,
) -> Result<String, ResponseError> {
    if !is_resolved_by_ad_backend(&query.campaign_type) {
        return Ok(query.redirect_url.clone());
    }

    let mut forwarded = headers.clone();
    forwarded.remove(HOST);
    forwarded.remove(CONTENT_LENGTH);

    app.ad_backend
        .resolve_redirect(&app.internal_ad_url(&query.redirect_url), forwarded)
        .await
        .map_err(|err| {
            warn!(&app.logger, "Resolving the ad redirect failed"; "campaign_id" => query.campaign_id, "error" => %err);

            ResponseError::BadRequest(err.to_string())
        })
}

#[cfg(test)]
mod test {
    use adapter::checksum::fingerprint;
    use axum::{body::Body, http::Request, response::Response};
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use primitives::{
        campaign::AD_CAMPAIGN_ID_OFFSET,
        test_util::{DUMMY_CONTENT_CAMPAIGN, DUMMY_INGREDIENTS, DUMMY_PAYLOAD, NOW},
    };
    use tower::Service;

    use crate::{
        routes::router,
        test_util::{setup_dummy_app, DummyApp, DUMMY_INTERNAL_AD_URL},
    };

    use super::*;

    const LANDING_PAGE: &str = "https://news.example.com/article/2000";

    /// The query of a signed landing click on the dummy content campaign.
    fn signed_query(app: &Application, ingredients: RewardIngredients) -> ClickRedirectQuery {
        let check = fingerprint(&ingredients);

        ClickRedirectQuery {
            app_id: Some(ingredients.app_id),
            unit_id: ingredients.unit_id,
            device_id: ingredients.device_id,
            ifa: ingredients.ifa.clone(),
            unit_device_token: ingredients.unit_device_token.clone(),
            client_unit_device_token: None,
            reward: ingredients.reward,
            base_reward: ingredients.base_reward,
            campaign_id: ingredients.campaign_id,
            campaign_type: "X".into(),
            campaign_name: ingredients.campaign_name.clone(),
            campaign_owner_id: ingredients.campaign_owner_id.clone(),
            campaign_is_media: ingredients.campaign_is_media,
            redirect_url: LANDING_PAGE.into(),
            slot: ingredients.slot,
            position: "3".into(),
            session_id: "session-1".into(),
            campaign_payload: app
                .codecs
                .build_payload(&DUMMY_PAYLOAD)
                .expect("Should build payload"),
            check,
            ..ClickRedirectQuery::default()
        }
    }

    /// The campaign type is part of the checksum.
    fn landing_ingredients() -> RewardIngredients {
        RewardIngredients {
            campaign_type: "X".into(),
            ..DUMMY_INGREDIENTS.clone()
        }
    }

    async fn click(app: &Arc<Application>, query: &ClickRedirectQuery) -> Response {
        let uri = format!(
            "/api/click_redirect/?{}",
            serde_qs::to_string(query).expect("Should serialize query")
        );
        let request = Request::builder()
            .uri(uri)
            .header("device-ip", "1.2.3.4")
            .extension(app.clone())
            .body(Body::empty())
            .expect("should never fail!");

        router()
            .call(request)
            .await
            .expect("Handling the Request shouldn't have failed")
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(LOCATION)
            .and_then(|location| location.to_str().ok())
            .expect("Should have a Location")
    }

    #[tokio::test]
    async fn happy_click_with_landing_reward() {
        let DummyApp {
            app,
            ledger,
            repository,
            event_log,
            profile,
            ..
        } = setup_dummy_app();
        let query = signed_query(&app, landing_ingredients());

        let response = click(&app, &query).await;

        assert_eq!(StatusCode::FOUND, response.status());
        assert_eq!(LANDING_PAGE, location(&response));
        assert_eq!(3, response.headers().get_all(SET_COOKIE).iter().count());

        let rewards = ledger.rewards();
        assert_eq!(1, rewards.len());
        assert_eq!(10, rewards[0].reward);

        let activities = repository.activities_of(7);
        assert_eq!(1, activities.len());
        assert_eq!(ActivityKind::Click, activities[0].kind);
        assert_eq!(
            1,
            repository.counter(&format!("stat:cam:{}", DUMMY_CONTENT_CAMPAIGN.id), "total:clk")
        );

        let device_activity = app
            .activity
            .device_activity(7)
            .await
            .expect("Should read the activity");
        assert!(device_activity
            .seen_campaign_ids
            .contains_key(&DUMMY_CONTENT_CAMPAIGN.id.to_string()));

        let lines = event_log.json_lines();
        let click_line = lines
            .iter()
            .find(|line| line["type"] == "click")
            .expect("Should log the click");
        assert_eq!(16_909_060, click_line["ip"]);
        assert_eq!("F", click_line["sex"]);
        assert_eq!("session-1", click_line["session_id"]);

        // the profile is populated in the background
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let accounts = profile.accounts();
        assert_eq!(1, accounts.len());
        assert_eq!("udt-0001", accounts[0].app_user_id);
    }

    #[tokio::test]
    async fn repeated_click_is_redirected_without_second_credit() {
        let DummyApp { app, ledger, .. } = setup_dummy_app();
        let query = signed_query(&app, landing_ingredients());

        let first = click(&app, &query).await;
        let second = click(&app, &query).await;

        assert_eq!(StatusCode::FOUND, first.status());
        assert_eq!(StatusCode::FOUND, second.status());
        assert_eq!(1, ledger.rewards().len());
    }

    #[tokio::test]
    async fn deferred_landing_reward_on_an_ad() {
        let DummyApp {
            app,
            ledger,
            repository,
            web,
            ..
        } = setup_dummy_app();

        let ad_id = 55;
        let ingredients = RewardIngredients {
            campaign_id: AD_CAMPAIGN_ID_OFFSET + ad_id,
            ..landing_ingredients()
        };
        let query = ClickRedirectQuery {
            tracking_url: Some("https://api.buzzad.io/track/55".into()),
            use_reward_api: true,
            ..signed_query(&app, ingredients)
        };

        let response = click(&app, &query).await;
        assert_eq!(StatusCode::FOUND, response.status());

        // only the base reward, the landing reward waits for the tracking
        let rewards = ledger.rewards();
        assert_eq!(1, rewards.len());
        assert_eq!(3, rewards[0].reward);

        // ads are not counted
        assert!(repository.activities_of(7).is_empty());
        assert!(web.tracking_calls().is_empty());

        let saved = app
            .tracking_urls
            .take(7, &Resource::ad(ad_id))
            .await
            .expect("Should read the store");
        assert_eq!(Some(format!("{}track/55", DUMMY_INTERNAL_AD_URL)), saved);
    }

    #[tokio::test]
    async fn tracking_url_is_called_without_reward_api() {
        let DummyApp { app, web, .. } = setup_dummy_app();
        web.fail_tracking();

        let query = ClickRedirectQuery {
            tracking_url: Some("https://tracker.example.com/t/1".into()),
            ..signed_query(&app, landing_ingredients())
        };

        let response = click(&app, &query).await;

        // a failing tracker does not stop the redirect
        assert_eq!(StatusCode::FOUND, response.status());
        assert_eq!(
            vec!["https://tracker.example.com/t/1".to_string()],
            web.tracking_calls()
        );
    }

    #[tokio::test]
    async fn expired_payload_counts_the_click_without_reward() {
        let DummyApp {
            app,
            ledger,
            repository,
            ..
        } = setup_dummy_app();

        let expired = Payload {
            ended_at: (*NOW - Duration::days(30)).timestamp(),
            ..DUMMY_PAYLOAD.clone()
        };
        let query = ClickRedirectQuery {
            campaign_payload: app
                .codecs
                .build_payload(&expired)
                .expect("Should build payload"),
            ..signed_query(&app, landing_ingredients())
        };

        let response = click(&app, &query).await;

        assert_eq!(StatusCode::FOUND, response.status());
        assert!(ledger.rewards().is_empty());
        assert_eq!(1, repository.activities_of(7).len());
    }

    #[tokio::test]
    async fn expiry_falls_back_to_the_content_campaign() {
        let DummyApp {
            app,
            ledger,
            repository,
            ..
        } = setup_dummy_app();
        repository.content_campaigns.insert(
            DUMMY_CONTENT_CAMPAIGN.id,
            ContentCampaign {
                end_date: *NOW - Duration::days(8),
                ..DUMMY_CONTENT_CAMPAIGN.clone()
            },
        );

        let query = ClickRedirectQuery {
            campaign_payload: "__campaign_payload__".into(),
            ..signed_query(&app, landing_ingredients())
        };

        let response = click(&app, &query).await;
        assert_eq!(StatusCode::FOUND, response.status());
        assert!(ledger.rewards().is_empty());

        // without a payload an unknown campaign can not be judged
        let unknown = RewardIngredients {
            campaign_id: 3000,
            ..landing_ingredients()
        };
        let query = ClickRedirectQuery {
            campaign_payload: String::new(),
            ..signed_query(&app, unknown)
        };
        assert_eq!(StatusCode::BAD_REQUEST, click(&app, &query).await.status());
    }

    #[tokio::test]
    async fn invalid_checksum_is_rejected() {
        let DummyApp { app, ledger, .. } = setup_dummy_app();
        let query = ClickRedirectQuery {
            check: "0123456789abcdef0123456789abcdef".into(),
            ..signed_query(&app, landing_ingredients())
        };

        let response = click(&app, &query).await;

        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        assert!(ledger.rewards().is_empty());
    }

    #[tokio::test]
    async fn checksum_retries() {
        let DummyApp { app, ledger, .. } = setup_dummy_app();

        // signed with `app_id := unit_id` but sent with the app id
        let as_unit = landing_ingredients().with_unit_as_app();
        let query = ClickRedirectQuery {
            app_id: Some(DUMMY_INGREDIENTS.app_id),
            ..signed_query(&app, as_unit)
        };
        assert_eq!(StatusCode::FOUND, click(&app, &query).await.status());

        // signed with the server token while the client substituted its own
        let other_slot = RewardIngredients {
            slot: 2,
            ..landing_ingredients()
        };
        let query = ClickRedirectQuery {
            client_unit_device_token: Some("client-udt".into()),
            ..signed_query(&app, other_slot)
        };
        assert_eq!(StatusCode::FOUND, click(&app, &query).await.status());

        assert_eq!(2, ledger.rewards().len());
    }

    #[tokio::test]
    async fn sdks_without_an_app_id_are_profiled_under_the_unit() {
        let DummyApp {
            app,
            ledger,
            profile,
            ..
        } = setup_dummy_app();

        let query = ClickRedirectQuery {
            app_id: None,
            ..signed_query(&app, landing_ingredients().with_unit_as_app())
        };
        assert_eq!(StatusCode::FOUND, click(&app, &query).await.status());
        assert_eq!(1, ledger.rewards().len());

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let accounts = profile.accounts();
        assert_eq!(1, accounts.len());
        assert_eq!(DUMMY_INGREDIENTS.unit_id, accounts[0].app_id);
    }

    #[tokio::test]
    async fn inactive_unit_and_malformed_token() {
        let DummyApp {
            app, repository, ..
        } = setup_dummy_app();

        let malformed = RewardIngredients {
            unit_device_token: "\0udt".into(),
            ..landing_ingredients()
        };
        let query = signed_query(&app, malformed);
        assert_eq!(StatusCode::BAD_REQUEST, click(&app, &query).await.status());

        let mut unit = repository
            .units
            .get(&landing_ingredients().unit_id)
            .map(|unit| unit.clone())
            .expect("Should have the dummy unit");
        unit.is_active = false;
        repository.units.insert(unit.id, unit);

        let query = signed_query(&app, landing_ingredients());
        assert_eq!(StatusCode::BAD_REQUEST, click(&app, &query).await.status());
    }

    #[tokio::test]
    async fn external_campaigns_are_redirected_right_away() {
        let DummyApp { app, ledger, .. } = setup_dummy_app();
        let query = ClickRedirectQuery {
            external_campaign_id: Some("ext-1".into()),
            ..signed_query(&app, landing_ingredients())
        };

        let response = click(&app, &query).await;

        assert_eq!(StatusCode::FOUND, response.status());
        assert_eq!(LANDING_PAGE, location(&response));
        assert!(ledger.rewards().is_empty());
    }

    #[tokio::test]
    async fn ad_clicks_are_resolved_by_the_ad_backend() {
        let DummyApp {
            app, ad_backend, ..
        } = setup_dummy_app();

        let ingredients = RewardIngredients {
            campaign_id: AD_CAMPAIGN_ID_OFFSET + 1,
            campaign_type: "I".into(),
            ..DUMMY_INGREDIENTS.clone()
        };
        let query = ClickRedirectQuery {
            campaign_type: "I".into(),
            redirect_url: "https://api.buzzad.io/click/1".into(),
            ..signed_query(&app, ingredients)
        };

        // not redirected by the ad backend
        assert_eq!(StatusCode::BAD_REQUEST, click(&app, &query).await.status());

        ad_backend.redirects.insert(
            app.internal_ad_url("https://api.buzzad.io/click/1"),
            "https://shop.example.com".into(),
        );
        let response = click(&app, &query).await;
        assert_eq!(StatusCode::FOUND, response.status());
        assert_eq!("https://shop.example.com", location(&response));
    }

    #[tokio::test]
    async fn clean_mode_redirect_and_legacy_duplicates() {
        let DummyApp {
            app, repository, ..
        } = setup_dummy_app();

        let legacy_unit_id = app.config.reward.legacy_clean_mode_units[0];
        let mut legacy_unit = repository
            .units
            .get(&landing_ingredients().unit_id)
            .map(|unit| unit.clone())
            .expect("Should have the dummy unit");
        legacy_unit.id = legacy_unit_id;
        repository.units.insert(legacy_unit_id, legacy_unit);
        repository.content_campaigns.insert(
            DUMMY_CONTENT_CAMPAIGN.id,
            ContentCampaign {
                clean_mode: 2,
                ..DUMMY_CONTENT_CAMPAIGN.clone()
            },
        );

        let ingredients = RewardIngredients {
            unit_id: legacy_unit_id,
            ..landing_ingredients()
        };
        let query = ClickRedirectQuery {
            use_clean_mode: "1".into(),
            redirect_url_clean: Some("https://quick.example.com/2000".into()),
            ..signed_query(&app, ingredients)
        };

        let response = click(&app, &query).await;

        assert_eq!(StatusCode::FOUND, response.status());
        assert_eq!("https://quick.example.com/2000", location(&response));
        // the quick page of a clean mode 2 campaign is a duplicated click
        assert!(repository.activities_of(7).is_empty());
    }

    #[test]
    fn query_normalization() {
        let query: ClickRedirectQuery = serde_qs::from_str(
            "unit_id=200&campaign_id=0&position=__position__&session_id=__session_id__&use_clean_mode=2&false_click=1&use_reward_api=1",
        )
        .expect("Should parse");

        assert_eq!(200, query.app_id());
        assert_eq!(PLACEHOLDER_CAMPAIGN_ID, query.campaign_id());
        assert_eq!("", query.position());
        assert_eq!("", query.session_id());
        assert!(query.use_clean_mode());
        assert!(query.is_false_click());
        assert!(query.use_reward_api);

        let query: ClickRedirectQuery =
            serde_qs::from_str("unit_id=200&app_id=100&use_clean_mode=0&use_reward_api=false")
                .expect("Should parse");
        assert_eq!(100, query.app_id());
        assert!(!query.use_clean_mode());
        assert!(!query.use_reward_api);
    }
}
