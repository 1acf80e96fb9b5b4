//! Reconstructible request checksums.
use primitives::RewardIngredients;
use thiserror::Error;

use crate::md5_hex;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("checksum invalid")]
    Invalid,
    #[error("campaign_name is empty")]
    EmptyCampaignName,
}

/// The fingerprint the SDK is expected to send as `check`.
pub fn fingerprint(ingredients: &RewardIngredients) -> String {
    md5_hex(ingredients.checksum_source())
}

/// Validates the `checksum` of [`RewardIngredients`].
///
/// Accepts the checksum as sent or lowercased, computed either over the
/// canonical source or over the source with every space replaced by `+`.
#[derive(Debug, Clone, Default)]
pub struct ChecksumValidator {
    /// Sentinel accepted for every request, only configured in development.
    test_checksum: Option<String>,
}

impl ChecksumValidator {
    pub fn new(test_checksum: Option<String>) -> Self {
        Self {
            test_checksum: test_checksum.filter(|checksum| !checksum.is_empty()),
        }
    }

    pub fn validate(&self, ingredients: &RewardIngredients) -> Result<(), ChecksumError> {
        if ingredients.campaign_name.is_empty() {
            return Err(ChecksumError::EmptyCampaignName);
        }

        let checksum = ingredients.checksum.as_str();
        if self.test_checksum.as_deref() == Some(checksum) {
            return Ok(());
        }

        let source = ingredients.checksum_source();
        let expected = [md5_hex(&source), md5_hex(source.replace(' ', "+"))];
        let lowercased = checksum.to_lowercase();

        let matches = expected
            .iter()
            .any(|fingerprint| fingerprint == checksum || *fingerprint == lowercased);

        if matches {
            Ok(())
        } else {
            Err(ChecksumError::Invalid)
        }
    }

    /// Validates the request as sent and, if that fails, each of the
    /// `fallbacks` in order.
    ///
    /// Returns the ingredients which passed.
    pub fn validate_with_fallbacks(
        &self,
        ingredients: &RewardIngredients,
        fallbacks: impl IntoIterator<Item = RewardIngredients>,
    ) -> Result<RewardIngredients, ChecksumError> {
        match self.validate(ingredients) {
            Ok(()) => return Ok(ingredients.clone()),
            Err(ChecksumError::EmptyCampaignName) => return Err(ChecksumError::EmptyCampaignName),
            Err(ChecksumError::Invalid) => {}
        }

        fallbacks
            .into_iter()
            .find(|fallback| self.validate(fallback).is_ok())
            .ok_or(ChecksumError::Invalid)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use primitives::{test_util::DUMMY_INGREDIENTS, RewardIngredients};

    use super::*;

    fn signed(ingredients: RewardIngredients) -> RewardIngredients {
        let checksum = fingerprint(&ingredients);
        RewardIngredients {
            checksum,
            ..ingredients
        }
    }

    #[test]
    fn accepts_the_fingerprint() {
        let validator = ChecksumValidator::default();
        let ingredients = signed(DUMMY_INGREDIENTS.clone());

        assert_eq!(Ok(()), validator.validate(&ingredients));
    }

    #[test]
    fn checksum_case_does_not_matter() {
        let validator = ChecksumValidator::default();
        let mut ingredients = signed(DUMMY_INGREDIENTS.clone());
        ingredients.checksum = ingredients.checksum.to_uppercase();

        assert_eq!(Ok(()), validator.validate(&ingredients));
    }

    #[test]
    fn tolerates_plus_decoded_as_space() {
        let validator = ChecksumValidator::default();

        // the SDK signed "Morning+News", the query decoder turned it into a space
        let signed_with_plus = signed(RewardIngredients {
            campaign_name: "Morning+News".into(),
            ..DUMMY_INGREDIENTS.clone()
        });
        let received = RewardIngredients {
            campaign_name: "Morning News".into(),
            ..signed_with_plus
        };

        assert_eq!(Ok(()), validator.validate(&received));
    }

    #[test]
    fn rejects_a_wrong_checksum() {
        let validator = ChecksumValidator::default();
        let mut ingredients = signed(DUMMY_INGREDIENTS.clone());
        ingredients.reward += 1;

        assert_eq!(Err(ChecksumError::Invalid), validator.validate(&ingredients));
    }

    #[test]
    fn rejects_an_empty_campaign_name() {
        let validator = ChecksumValidator::default();
        let ingredients = signed(RewardIngredients {
            campaign_name: String::new(),
            ..DUMMY_INGREDIENTS.clone()
        });

        assert_eq!(
            Err(ChecksumError::EmptyCampaignName),
            validator.validate(&ingredients)
        );
    }

    #[test]
    fn test_sentinel_only_when_configured() {
        let ingredients = RewardIngredients {
            checksum: "sentinel".into(),
            ..DUMMY_INGREDIENTS.clone()
        };

        assert_eq!(
            Err(ChecksumError::Invalid),
            ChecksumValidator::default().validate(&ingredients)
        );
        assert_eq!(
            Ok(()),
            ChecksumValidator::new(Some("sentinel".into())).validate(&ingredients)
        );
    }

    #[test]
    fn falls_back_to_the_unit_as_app() {
        let validator = ChecksumValidator::default();

        // signed with app_id == unit_id
        let lockscreen = signed(DUMMY_INGREDIENTS.with_unit_as_app());
        let received = RewardIngredients {
            app_id: DUMMY_INGREDIENTS.app_id,
            ..lockscreen.clone()
        };

        assert_eq!(
            Err(ChecksumError::Invalid),
            validator.validate_with_fallbacks(&received, vec![])
        );

        let passed = validator
            .validate_with_fallbacks(&received, vec![received.with_unit_as_app()])
            .expect("The fallback should pass");
        assert_eq!(lockscreen, passed);
    }
}
