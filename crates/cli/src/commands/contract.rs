use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use soundchain_core::domain::license::expires_at_for;
use soundchain_core::licensing::contract::{ContractTerms, DEFAULT_TERRITORY};
use soundchain_core::licensing::rights::validate_price;
use soundchain_core::licensing::{DeterministicLicensingRuntime, LicensingRuntime};

use super::{reject_negative, CommandResult};

const COMMAND: &str = "contract";

#[derive(Clone, Debug)]
pub struct ContractInput {
    pub price: Decimal,
    pub rights: Vec<String>,
    pub territory: Option<String>,
    pub exclusive: bool,
    pub months: Option<u32>,
    pub no_attribution: bool,
    /// Producer floor; also priced into the contract breakdown.
    pub base: Option<Decimal>,
    /// License start used to derive the expiry.
    pub starts_at: DateTime<Utc>,
}

/// Drafts a contract. A price under `--base` is reported, never refused.
pub fn run(input: &ContractInput) -> CommandResult {
    if let Some(rejected) = reject_negative(COMMAND, "--price", input.price) {
        return rejected;
    }
    if let Some(rejected) = input.base.and_then(|base| reject_negative(COMMAND, "--base", base)) {
        return rejected;
    }

    let terms = ContractTerms {
        price: Some(input.price),
        usage_rights: input.rights.clone(),
        exclusivity: Some(input.exclusive),
        territory: Some(
            input.territory.clone().unwrap_or_else(|| DEFAULT_TERRITORY.to_string()),
        ),
        duration_months: input.months,
        attribution: Some(!input.no_attribution),
        ..ContractTerms::default()
    };
    let contract = DeterministicLicensingRuntime::default().generate_contract(&terms, input.base);
    let floor_check = input.base.map(|minimum| validate_price(contract.price, minimum));
    let below_floor = floor_check.as_ref().is_some_and(|check| !check.valid);

    let message = match &floor_check {
        Some(check) if below_floor => format!("{} ({})", contract.summary, check.message),
        _ => contract.summary.clone(),
    };
    let result = json!({
        "contract": contract,
        "expiresAt": expires_at_for(input.starts_at, contract.duration_months),
        "priceValidation": floor_check,
        "priceFloorViolation": below_floor,
    });

    CommandResult::success_with(COMMAND, message, Some(result))
}
