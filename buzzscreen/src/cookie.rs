//! The durable first-party identity cookies set on click redirects.
use std::sync::Arc;

use adapter::cookie::{checksum, cookie_id, is_valid_checksum};
use axum::http::{
    header::{COOKIE, USER_AGENT},
    HeaderMap, HeaderValue,
};
use chrono::Duration;
use primitives::{config::CookieConfig, Clock};
use slog::{info, Logger};

use crate::log_line::ProfileLine;

pub const COOKIE_ID: &str = "cookie_id";
pub const COOKIE_VERSION: &str = "cookie_version";
pub const CHECKSUM: &str = "checksum";

/// The outcome of [`CookieHandler::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookies {
    /// The `Set-Cookie` values to respond with, empty when nothing changed
    pub set_cookies: Vec<HeaderValue>,
    pub cookie_id: String,
}

impl Cookies {
    pub fn updated(&self) -> bool {
        !self.set_cookies.is_empty()
    }
}

/// Returns the value of the `name` cookie among all `Cookie` headers.
pub fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

#[derive(Clone)]
pub struct CookieHandler {
    config: CookieConfig,
    clock: Arc<dyn Clock>,
    event_logger: Logger,
}

impl CookieHandler {
    pub fn new(config: CookieConfig, clock: Arc<dyn Clock>, event_logger: Logger) -> Self {
        Self {
            config,
            clock,
            event_logger,
        }
    }

    /// Sets each identity cookie which is missing or stale.
    ///
    /// A stale `checksum` no longer matches `cookie_id` & `ifa`,
    /// a stale `cookie_version` is not the configured version.
    pub fn handle(&self, headers: &HeaderMap, ifa: &str) -> Cookies {
        let mut set_cookies = vec![];

        let cookie_id = match request_cookie(headers, COOKIE_ID).filter(|id| !id.is_empty()) {
            Some(cookie_id) => cookie_id,
            None => {
                let cookie_id = cookie_id(ifa);
                set_cookies.extend(self.set_cookie(COOKIE_ID, &cookie_id));
                cookie_id
            }
        };

        let version_is_current = request_cookie(headers, COOKIE_VERSION).as_deref()
            == Some(self.config.version.as_str());
        if !version_is_current {
            set_cookies.extend(self.set_cookie(COOKIE_VERSION, &self.config.version));
        }

        let checksum_is_valid = request_cookie(headers, CHECKSUM)
            .map_or(false, |value| is_valid_checksum(&cookie_id, ifa, &value));
        if !checksum_is_valid {
            set_cookies.extend(self.set_cookie(CHECKSUM, &checksum(&cookie_id, ifa)));
        }

        if !set_cookies.is_empty() {
            let user_agent = headers
                .get(USER_AGENT)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();

            let line = ProfileLine {
                cookie_id: cookie_id.clone(),
                ifa: ifa.to_string(),
                user_agent: user_agent.to_string(),
            };
            info!(&self.event_logger, "profile"; line);
        }

        Cookies {
            set_cookies,
            cookie_id,
        }
    }

    /// `None` if the value can not be a header value.
    fn set_cookie(&self, name: &str, value: &str) -> Option<HeaderValue> {
        let expires = self.clock.now() + Duration::days(self.config.max_age_days.into());

        let cookie = format!(
            "{}={}; Domain={}; Expires={}; Path=/; SameSite=None; Secure",
            name,
            value,
            self.config.domain,
            expires.format("%a, %d %b %Y %H:00:00 GMT")
        );

        HeaderValue::from_str(&cookie).ok()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use primitives::{
        config::DEVELOPMENT_CONFIG,
        test_util::{discard_logger, memory_event_logger, FrozenClock},
    };
    use serde_json::json;

    use super::*;

    fn setup_handler(event_logger: Logger) -> CookieHandler {
        CookieHandler::new(
            DEVELOPMENT_CONFIG.cookie.clone(),
            Arc::new(FrozenClock::default()),
            event_logger,
        )
    }

    /// The `Cookie` header a browser would send back after `set_cookies`.
    fn cookie_header(set_cookies: &[HeaderValue]) -> HeaderMap {
        let pairs: Vec<_> = set_cookies
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .collect();

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&pairs.join("; ")).expect("Valid header"),
        );
        headers
    }

    #[test]
    fn sets_every_cookie_once() {
        let (event_logger, buffer) = memory_event_logger();
        let handler = setup_handler(event_logger);

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("BuzzSDK/3.1"));

        let first = handler.handle(&headers, "ifa-0001");
        assert_eq!(3, first.set_cookies.len());
        assert_eq!(cookie_id("ifa-0001"), first.cookie_id);
        assert_eq!(
            format!(
                "cookie_id={}; Domain=localhost; Expires=Wed, 01 Jun 2022 09:00:00 GMT; Path=/; SameSite=None; Secure",
                first.cookie_id
            ),
            first.set_cookies[0].to_str().expect("Valid header")
        );

        let second = handler.handle(&cookie_header(&first.set_cookies), "ifa-0001");
        assert!(!second.updated());
        assert_eq!(first.cookie_id, second.cookie_id);

        let lines = buffer.json_lines();
        assert_eq!(1, lines.len());
        assert_eq!(json!("profile"), lines[0]["type"]);
        assert_eq!(json!("BuzzSDK/3.1"), lines[0]["payload"]["user_agent"]);
        assert_eq!(json!(first.cookie_id), lines[0]["payload"]["cookie_id"]);
        assert_eq!(json!("ifa-0001"), lines[0]["payload"]["ifa"]);
        assert!(lines[0].get("ifa").is_none());
    }

    #[test]
    fn changed_ifa_only_resets_the_checksum() {
        let handler = setup_handler(discard_logger());

        let first = handler.handle(&HeaderMap::new(), "ifa-0001");
        let changed = handler.handle(&cookie_header(&first.set_cookies), "ifa-0002");

        assert_eq!(1, changed.set_cookies.len());
        assert!(changed.set_cookies[0]
            .to_str()
            .expect("Valid header")
            .starts_with(&format!("checksum={}", checksum(&first.cookie_id, "ifa-0002"))));
        // the cookie id is kept
        assert_eq!(first.cookie_id, changed.cookie_id);
    }

    #[test]
    fn outdated_version_is_replaced() {
        let handler = setup_handler(discard_logger());
        let identity_cookie_id = cookie_id("ifa-0001");

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!(
                "cookie_id={}; cookie_version=2; checksum={}",
                identity_cookie_id,
                checksum(&identity_cookie_id, "ifa-0001")
            ))
            .expect("Valid header"),
        );

        let cookies = handler.handle(&headers, "ifa-0001");

        assert_eq!(1, cookies.set_cookies.len());
        assert!(cookies.set_cookies[0]
            .to_str()
            .expect("Valid header")
            .starts_with("cookie_version=3;"));
    }
}
