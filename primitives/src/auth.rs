use serde::{Deserialize, Serialize};

/// The header names the identity is propagated with,
/// both on HTTP calls to other services and on message bus messages.
pub mod header_name {
    pub const APP_ID: &str = "Buzz-App-Id";
    pub const ACCOUNT_ID: &str = "Buzz-Account-Id";
    pub const PUBLISHER_USER_ID: &str = "Buzz-Publisher-User-Id";
    pub const IFA: &str = "Buzz-Ifa";
}

/// The identity behind a bearer token, as resolved by the auth service.
///
/// Carried to the message bus as message headers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Auth {
    pub account_id: i64,
    pub app_id: i64,
    pub publisher_user_id: String,
    pub ifa: String,
}

impl Auth {
    /// The identity as `(header name, value)` pairs.
    pub fn headers(&self) -> [(&'static str, String); 4] {
        [
            (header_name::APP_ID, self.app_id.to_string()),
            (header_name::ACCOUNT_ID, self.account_id.to_string()),
            (header_name::PUBLISHER_USER_ID, self.publisher_user_id.clone()),
            (header_name::IFA, self.ifa.clone()),
        ]
    }
}
