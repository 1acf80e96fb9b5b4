use serde::{Deserialize, Serialize};

/// The identifiers the profile service links into a single profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub app_id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ifa: String,
    /// The device id
    #[serde(default, skip_serializing_if = "is_zero")]
    pub account_id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cookie_id: String,
    /// The unit device token
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_user_id: String,
}

impl Account {
    /// Nothing identifies the user, the profile service is not called.
    pub fn is_empty(&self) -> bool {
        self.app_id == 0
            && self.ifa.is_empty()
            && self.account_id == 0
            && self.cookie_id.is_empty()
            && self.app_user_id.is_empty()
    }
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_account() {
        assert!(Account::default().is_empty());

        let account = Account {
            cookie_id: "cookie".into(),
            ..Account::default()
        };
        assert!(!account.is_empty());
    }
}
