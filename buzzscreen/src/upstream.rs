//! Clients of the services the API mediates between.
//!
//! Every collaborator is a trait so that the routes can be tested
//! with in-memory implementations, the `Http*` types are the production
//! implementations on top of [`reqwest`].
pub use self::{
    ad_backend::{AdBackend, AdBackendError, HttpAdBackend, LineItem},
    auth::{AuthError, AuthService, CachedAuthService, HttpAuthService},
    ledger::{HttpLedger, IssuedReward, Ledger, LedgerError, ReferralReward, RewardForm},
    profile::{HttpProfileService, ProfileError, ProfileService},
    web::{HttpWeb, Web, WebError},
};

pub mod ad_backend;
pub mod auth;
pub mod ledger;
pub mod profile;
pub mod web;

/// Joins a base URL, with or without a trailing slash, and a path.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
