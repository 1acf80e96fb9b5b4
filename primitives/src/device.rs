use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered SDK installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub app_id: i64,
    pub unit_device_token: String,
    pub ifa: String,
    #[serde(default)]
    pub sdk_version: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[cfg(feature = "postgres")]
mod postgres {
    use std::convert::TryFrom;

    use tokio_postgres::{Error, Row};

    use super::*;

    impl TryFrom<&Row> for Device {
        type Error = Error;

        fn try_from(row: &Row) -> Result<Self, Self::Error> {
            Ok(Self {
                id: row.try_get("id")?,
                app_id: row.try_get("app_id")?,
                unit_device_token: row.try_get("unit_device_token")?,
                ifa: row.try_get("ifa")?,
                sdk_version: row.try_get("sdk_version")?,
                created_at: row.try_get("created_at")?,
            })
        }
    }
}
