use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::terms::{normalize_rights, UsageRight};
use crate::licensing::format_usd;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RightsValidation {
    pub valid: bool,
    pub invalid_rights: Vec<UsageRight>,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceValidation {
    pub valid: bool,
    pub message: String,
}

/// Set difference `requested - allowed` after uppercasing both sides.
/// `invalid_rights` keeps the order in which the buyer asked for them.
pub fn validate_usage_rights<R, A>(requested: &[R], allowed: &[A]) -> RightsValidation
where
    R: AsRef<str>,
    A: AsRef<str>,
{
    let allowed = normalize_rights(allowed);
    let invalid_rights: Vec<UsageRight> = normalize_rights(requested)
        .into_iter()
        .filter(|right| !allowed.contains(right))
        .collect();

    let message = if invalid_rights.is_empty() {
        "All requested rights are available".to_string()
    } else {
        format!(
            "These rights are not available: {}. Available rights: {}",
            join(&invalid_rights),
            join(&allowed)
        )
    };

    RightsValidation { valid: invalid_rights.is_empty(), invalid_rights, message }
}

pub fn validate_price(offered: Decimal, minimum: Decimal) -> PriceValidation {
    if offered >= minimum {
        PriceValidation {
            valid: true,
            message: format!("Price {} meets minimum requirement", format_usd(offered)),
        }
    } else {
        PriceValidation {
            valid: false,
            message: format!(
                "Price {} is below minimum of {}",
                format_usd(offered),
                format_usd(minimum)
            ),
        }
    }
}

fn join(rights: &[UsageRight]) -> String {
    rights.iter().map(UsageRight::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{validate_price, validate_usage_rights};
    use crate::domain::terms::UsageRight;

    #[test]
    fn rejects_rights_outside_the_allow_list_case_insensitively() {
        let result = validate_usage_rights(&["youtube", "commercial"], &["YOUTUBE", "STREAMING"]);

        assert!(!result.valid);
        assert_eq!(result.invalid_rights, vec![UsageRight::new("COMMERCIAL")]);
        assert_eq!(
            result.message,
            "These rights are not available: COMMERCIAL. Available rights: YOUTUBE, STREAMING"
        );
    }

    #[test]
    fn invalid_rights_keep_request_order_without_duplicates() {
        let result = validate_usage_rights(&["film", "tiktok", "FILM", "podcast"], &["podcast"]);
        assert_eq!(
            result.invalid_rights,
            vec![UsageRight::new("FILM"), UsageRight::new("TIKTOK")]
        );
    }

    #[test]
    fn accepts_subsets_and_empty_requests() {
        let subset = validate_usage_rights(&["Streaming"], &["youtube", "streaming"]);
        assert!(subset.valid);
        assert!(subset.invalid_rights.is_empty());
        assert_eq!(subset.message, "All requested rights are available");

        let empty: [&str; 0] = [];
        assert!(validate_usage_rights(&empty, &["YOUTUBE"]).valid);
    }

    #[test]
    fn price_validation_is_inclusive_of_the_floor() {
        let floor = Decimal::new(50, 0);

        let at_floor = validate_price(floor, floor);
        assert!(at_floor.valid);
        assert_eq!(at_floor.message, "Price $50 meets minimum requirement");

        let below = validate_price(Decimal::new(45, 0), floor);
        assert!(!below.valid);
        assert_eq!(below.message, "Price $45 is below minimum of $50");
    }
}
