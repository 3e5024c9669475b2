use rust_decimal::Decimal;
use soundchain_core::domain::terms::{normalize_rights, NegotiationRequest, Territory};
use soundchain_core::licensing::{format_usd, DeterministicLicensingRuntime, LicensingRuntime};

use super::{reject_negative, CommandResult};

const COMMAND: &str = "price";

#[derive(Clone, Debug)]
pub struct PriceInput {
    pub base: Decimal,
    pub rights: Vec<String>,
    pub territory: String,
    pub exclusive: bool,
    pub months: Option<u32>,
}

pub fn run(input: &PriceInput) -> CommandResult {
    if let Some(rejected) = reject_negative(COMMAND, "--base", input.base) {
        return rejected;
    }

    let request = NegotiationRequest {
        usage_rights: normalize_rights(&input.rights),
        exclusivity: input.exclusive,
        territory: Territory::from_label(&input.territory),
        duration_months: input.months,
    };
    let breakdown = DeterministicLicensingRuntime::default().calculate_price(input.base, &request);

    CommandResult::success_with(
        COMMAND,
        format!("final price {}", format_usd(breakdown.final_price)),
        serde_json::to_value(&breakdown).ok(),
    )
}
