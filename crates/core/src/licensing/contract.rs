use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::terms::{normalize_rights, NegotiationRequest, Territory, UsageRight};
use crate::licensing::format_usd;
use crate::licensing::pricing::{DeterministicPricingEngine, PriceBreakdown, PricingEngine};

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_TERRITORY: &str = "worldwide";

/// Negotiated terms as reported by a tool call or assembled by the orchestrator.
/// Every field is optional; `generate_contract` fills the defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractTerms {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub usage_rights: Vec<String>,
    #[serde(default)]
    pub exclusivity: Option<bool>,
    #[serde(default)]
    pub territory: Option<String>,
    #[serde(default, alias = "duration")]
    pub duration_months: Option<u32>,
    #[serde(default)]
    pub attribution: Option<bool>,
    #[serde(default)]
    pub custom_terms: Option<String>,
}

/// Terminal artifact of a negotiation. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseContract {
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub currency: String,
    pub usage_rights: Vec<UsageRight>,
    pub exclusivity: bool,
    pub territory: String,
    /// `None` is a perpetual license.
    pub duration_months: Option<u32>,
    pub attribution: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_terms: Option<String>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<PriceBreakdown>,
}

impl LicenseContract {
    pub fn is_perpetual(&self) -> bool {
        self.duration_months.is_none()
    }

    pub fn to_request(&self) -> NegotiationRequest {
        NegotiationRequest {
            usage_rights: self.usage_rights.clone(),
            exclusivity: self.exclusivity,
            territory: Territory::from_label(&self.territory),
            duration_months: self.duration_months,
        }
    }
}

/// Builds a contract with the standard pricing table.
pub fn generate_contract(terms: &ContractTerms, base_price: Option<Decimal>) -> LicenseContract {
    generate_contract_with(&DeterministicPricingEngine::default(), terms, base_price)
}

/// The negotiated price is stored as given, even when it sits below the
/// producer floor. Floor checks belong to the caller.
pub fn generate_contract_with<P: PricingEngine + ?Sized>(
    pricing_engine: &P,
    terms: &ContractTerms,
    base_price: Option<Decimal>,
) -> LicenseContract {
    let territory = terms
        .territory
        .as_deref()
        .map(str::trim)
        .filter(|territory| !territory.is_empty())
        .unwrap_or(DEFAULT_TERRITORY)
        .to_string();
    let currency = terms
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|currency| !currency.is_empty())
        .unwrap_or(DEFAULT_CURRENCY)
        .to_string();

    let mut contract = LicenseContract {
        price: terms.price.unwrap_or(Decimal::ZERO),
        currency,
        usage_rights: normalize_rights(&terms.usage_rights),
        exclusivity: terms.exclusivity.unwrap_or(false),
        territory,
        duration_months: terms.duration_months.filter(|months| *months > 0),
        attribution: terms.attribution != Some(false),
        custom_terms: terms.custom_terms.clone(),
        summary: String::new(),
        breakdown: None,
    };

    contract.breakdown = base_price
        .filter(|base| *base > Decimal::ZERO)
        .map(|base| pricing_engine.price(base, &contract.to_request()));
    contract.summary = contract_summary(&contract);
    contract
}

pub fn contract_summary(contract: &LicenseContract) -> String {
    let exclusivity = if contract.exclusivity { "Exclusive" } else { "Non-exclusive" };
    let mut parts = vec![
        format!("{exclusivity} license for {}", format_usd(contract.price)),
        format!(
            "Rights: {}",
            contract.usage_rights.iter().map(UsageRight::as_str).collect::<Vec<_>>().join(", ")
        ),
        format!("Territory: {}", contract.territory),
        format!("Duration: {}", duration_label(contract.duration_months)),
    ];
    if contract.attribution {
        parts.push("Attribution required".to_string());
    }
    parts.join(" • ")
}

pub fn duration_label(duration_months: Option<u32>) -> String {
    let Some(months) = duration_months.filter(|months| *months > 0) else {
        return "Perpetual".to_string();
    };

    let (years, remainder) = (months / 12, months % 12);
    match (years, remainder) {
        (0, months) => format!("{months} month(s)"),
        (years, 0) => format!("{years} year(s)"),
        (years, months) => format!("{years} year(s) {months} month(s)"),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{duration_label, generate_contract, ContractTerms};
    use crate::domain::terms::UsageRight;

    fn terms(price: i64, duration_months: Option<u32>) -> ContractTerms {
        ContractTerms {
            price: Some(Decimal::new(price, 0)),
            usage_rights: vec!["youtube".to_string(), "commercial".to_string()],
            duration_months,
            ..ContractTerms::default()
        }
    }

    #[test]
    fn fills_defaults() {
        let contract = generate_contract(&terms(75, None), None);

        assert_eq!(contract.currency, "USD");
        assert_eq!(contract.territory, "worldwide");
        assert!(contract.attribution);
        assert!(!contract.exclusivity);
        assert!(contract.is_perpetual());
        assert!(contract.breakdown.is_none());
        assert_eq!(
            contract.usage_rights,
            vec![UsageRight::new("YOUTUBE"), UsageRight::new("COMMERCIAL")]
        );
    }

    #[test]
    fn summary_describes_duration() {
        let perpetual = generate_contract(&terms(75, None), None);
        assert!(perpetual.summary.contains("Perpetual"));
        assert_eq!(
            perpetual.summary,
            "Non-exclusive license for $75 • Rights: YOUTUBE, COMMERCIAL • Territory: worldwide • Duration: Perpetual • Attribution required"
        );

        assert!(generate_contract(&terms(75, Some(6)), None).summary.contains("6 month(s)"));
        assert!(generate_contract(&terms(75, Some(24)), None).summary.contains("2 year(s)"));
        assert_eq!(duration_label(Some(0)), "Perpetual");
        assert_eq!(duration_label(Some(18)), "1 year(s) 6 month(s)");
    }

    #[test]
    fn attribution_only_dropped_when_explicitly_false() {
        let mut explicit = terms(75, None);
        explicit.attribution = Some(false);
        let contract = generate_contract(&explicit, None);

        assert!(!contract.attribution);
        assert!(!contract.summary.contains("Attribution"));
    }

    #[test]
    fn audit_breakdown_may_differ_from_negotiated_price() {
        let contract = generate_contract(&terms(200, Some(12)), Some(Decimal::new(100, 0)));
        let breakdown = contract.breakdown.as_ref().expect("base price yields a breakdown");

        assert_eq!(contract.price, Decimal::new(200, 0));
        assert_eq!(breakdown.duration_discount, Decimal::new(7, 1));
        assert_eq!(breakdown.final_price, Decimal::new(17_850, 2));
    }

    #[test]
    fn below_floor_price_is_not_rejected() {
        let floor = Decimal::new(50, 0);
        let contract = generate_contract(&terms(10, None), Some(floor));

        assert_eq!(contract.price, Decimal::new(10, 0));
        assert!(contract.price < floor);
    }

    #[test]
    fn terms_accept_duration_alias_and_float_prices() {
        let parsed: ContractTerms = serde_json::from_str(
            r#"{"price":127.5,"usageRights":["YOUTUBE"],"duration":24,"exclusivity":true}"#,
        )
        .expect("terms should parse");

        assert_eq!(parsed.price, Some(Decimal::new(1_275, 1)));
        assert_eq!(parsed.duration_months, Some(24));
        assert_eq!(parsed.exclusivity, Some(true));
    }
}
