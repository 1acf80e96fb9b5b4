//! Buzzscreen REST API documentation
//!
//! All routes are listed below:
//! - [GET `/api/click_redirect/`](#get-apiclick_redirect) and its alias `/api/external/click_redirect/`
//! - [POST `/api/unlock`](#post-apiunlock) and its legacy alias `/api/impression/`
//! - [POST `/api/rewards`](#post-apirewards)
//! - [GET `/api/content_impression/`](#get-apicontent_impression)
//! - [GET `/api/track-event`](#get-apitrack-event-auth-required) (auth required)
//! - [GET `/api/reward-status`](#get-apireward-status-auth-required) (auth required)
//! - [GET `/api/users/:device`](#get-apiusersdevice)
//! - [POST `/api/users/:device/referral`](#post-apiusersdevicereferral)
//!
//! Every route has the [`ClientIp`](crate::middleware::ClientIp) of the device in its extensions.
//!
//! #### GET `/api/click_redirect/`
//!
//! Counts the click, gives the landing reward and redirects the device to the landing page.
//!
//! The route is handled by [`click_redirect::click_redirect()`].
//!
//! Request query parameters: [`ClickRedirectQuery`](click_redirect::ClickRedirectQuery)
//!
//! Response: `302 Found` with the `Location` of the landing page and the identity cookies.
//!
//! #### POST `/api/unlock`
//!
//! Gives the reward of a lockscreen unlock.
//!
//! The route is handled by [`unlock::unlock()`].
//!
//! Request body (form): [`UnlockForm`](unlock::UnlockForm)
//!
//! Response: [`UnlockResponse`](unlock::UnlockResponse)
//!
//! #### POST `/api/rewards`
//!
//! Gives an impression reward, completing a landing reward deferred by the click redirect.
//!
//! The route is handled by [`reward::post_reward()`].
//!
//! Request body (form): [`RewardForm`](reward::RewardForm)
//!
//! Response: `200 OK` with an empty body, `409 Conflict` for a reward which was already given
//! and `422 Unprocessable Entity` for a reward which can not be given.
//!
//! #### GET `/api/content_impression/`
//!
//! Counts the impression of a content campaign.
//!
//! The route is handled by [`content_impression::content_impression()`].
//!
//! Request query parameters: [`ContentImpressionQuery`](content_impression::ContentImpressionQuery)
//!
//! Response: `{"msg":"ok","status":200}`
//!
//! #### GET `/api/track-event` (auth required)
//!
//! Publishes the event of the `?token=` on the message bus.
//!
//! The route is handled by [`event::track_event()`].
//!
//! Response: `{}`
//!
//! #### GET `/api/reward-status` (auth required)
//!
//! The route is handled by [`event::reward_status()`].
//!
//! Response: [`RewardStatusResponse`](event::RewardStatusResponse)
//!
//! #### GET `/api/users/:device`
//!
//! The referral user of the device together with the referral program of its app.
//!
//! The route is handled by [`referral::get_user()`].
//!
//! Response: [`UserResponse`](referral::UserResponse)
//!
//! #### POST `/api/users/:device/referral`
//!
//! Binds the device to the referrer of the `code`.
//!
//! The route is handled by [`referral::post_referral()`].
//!
//! Request body (form): [`ReferralForm`](referral::ReferralForm)
//!
//! Response: [`ReferralResponse`](referral::ReferralResponse)
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;

use crate::middleware::{
    auth::{authenticate, authentication_required},
    client_ip,
};

pub mod click_redirect;
pub mod content_impression;
pub mod event;
pub mod referral;
pub mod reward;
pub mod unlock;

/// The router of the whole API.
///
/// Expects the [`Application`](crate::Application) in an [`Extension`](axum::Extension).
pub fn router() -> Router {
    let authenticated = ServiceBuilder::new()
        .layer(from_fn(authenticate))
        .layer(from_fn(authentication_required));

    Router::new()
        .route("/api/click_redirect/", get(click_redirect::click_redirect))
        .route(
            "/api/external/click_redirect/",
            get(click_redirect::click_redirect),
        )
        .route("/api/unlock", post(unlock::unlock))
        .route("/api/impression/", post(unlock::unlock))
        .route("/api/rewards", post(reward::post_reward))
        .route(
            "/api/content_impression/",
            get(content_impression::content_impression),
        )
        .route(
            "/api/track-event",
            get(event::track_event).route_layer(authenticated.clone()),
        )
        .route(
            "/api/reward-status",
            get(event::reward_status).route_layer(authenticated),
        )
        .route("/api/users/:device", get(referral::get_user))
        .route("/api/users/:device/referral", post(referral::post_referral))
        .layer(from_fn(client_ip))
}
