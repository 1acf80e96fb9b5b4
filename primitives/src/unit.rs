use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};

/// The OS a unit is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr)]
pub enum Platform {
    #[display("A")]
    #[serde(rename = "A")]
    Android,
    #[display("I")]
    #[serde(rename = "I")]
    Ios,
    #[display("W")]
    #[serde(rename = "W")]
    Web,
}

/// A configured slot belonging to an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: i64,
    pub app_id: i64,
    pub organization_id: i64,
    pub country: String,
    pub platform: Platform,
    pub timezone: String,
    pub base_reward: i32,
    pub is_active: bool,
}

impl Unit {
    pub fn is_ios(&self) -> bool {
        self.platform == Platform::Ios
    }
}

#[cfg(feature = "postgres")]
mod postgres {
    use std::convert::TryFrom;

    use tokio_postgres::{Error, Row};

    use super::*;

    impl TryFrom<&Row> for Unit {
        type Error = Error;

        fn try_from(row: &Row) -> Result<Self, Self::Error> {
            let platform: String = row.try_get("platform")?;

            Ok(Self {
                id: row.try_get("id")?,
                app_id: row.try_get("app_id")?,
                organization_id: row.try_get("organization_id")?,
                country: row.try_get("country")?,
                // unknown platforms are served as Android units
                platform: platform.parse().unwrap_or(Platform::Android),
                timezone: row.try_get("timezone")?,
                base_reward: row.try_get("base_reward")?,
                is_active: row.try_get("is_active")?,
            })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn platform_from_code() {
        assert_eq!(Some(Platform::Ios), "I".parse::<Platform>().ok());
        assert_eq!(Some(Platform::Android), "A".parse::<Platform>().ok());
        assert_eq!(Some(Platform::Web), "W".parse::<Platform>().ok());
        assert!("X".parse::<Platform>().is_err());
        assert_eq!("I", Platform::Ios.to_string());
    }
}
