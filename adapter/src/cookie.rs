//! First-party identity cookie values.
use uuid::Uuid;

use crate::md5_hex;

/// The identity cookies of an advertising id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieIdentity {
    pub cookie_id: String,
    pub checksum: String,
}

impl CookieIdentity {
    pub fn for_ifa(ifa: &str) -> Self {
        let cookie_id = cookie_id(ifa);
        let checksum = checksum(&cookie_id, ifa);

        Self {
            cookie_id,
            checksum,
        }
    }
}

/// `UUIDv5(nil, ifa)`
pub fn cookie_id(ifa: &str) -> String {
    Uuid::new_v5(&Uuid::nil(), ifa.as_bytes()).to_string()
}

/// `MD5(cookie_id ++ ifa)`
pub fn checksum(cookie_id: &str, ifa: &str) -> String {
    md5_hex(format!("{}{}", cookie_id, ifa))
}

/// Whether the `checksum` cookie belongs to the `cookie_id` & `ifa` pair.
pub fn is_valid_checksum(cookie_id: &str, ifa: &str, checksum_value: &str) -> bool {
    checksum(cookie_id, ifa) == checksum_value
}
