#![deny(rust_2018_idioms)]
#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use self::{
    activity::{Activity, ActivityKind, DeviceActivity},
    auth::Auth,
    campaign::{CampaignKind, ContentCampaign},
    config::Config,
    device::Device,
    event::{EventType, Resource, ResourceType, RewardStatus, Token as EventToken},
    payload::{ImpressionData, Payload, TrackingData},
    profile::Account,
    referral::{DeviceUser, ReferralRewardConfig},
    reward::{ClickType, Period, PeriodForCampaign, ReceivedStatus, RewardIngredients},
    unit::{Platform, Unit},
    util::time::{Clock, SystemClock},
};

pub mod activity;
pub mod auth;
pub mod campaign;
pub mod config;
pub mod device;
pub mod event;
pub mod payload;
pub mod profile;
pub mod referral;
pub mod reward;
pub mod unit;

pub mod util {
    pub mod ip;
    pub mod logging;
    pub mod time;
}

#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod test_util;
