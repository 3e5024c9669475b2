pub mod contract;
pub mod presets;
pub mod pricing;
pub mod rights;

use rust_decimal::Decimal;

use crate::domain::terms::{BaseTerms, NegotiationRequest};

use self::{
    contract::{generate_contract_with, ContractTerms, LicenseContract},
    pricing::{DeterministicPricingEngine, PriceBreakdown, PricingEngine},
    rights::{validate_price, validate_usage_rights, PriceValidation, RightsValidation},
};

/// Formats an amount as dollars, dropping the cents when they are zero.
pub fn format_usd(amount: Decimal) -> String {
    let normalized = amount.normalize();
    if normalized.scale() == 0 {
        format!("${normalized}")
    } else {
        format!("${:.2}", normalized)
    }
}

/// The three pure licensing operations bundled over one pricing engine, so every
/// negotiation backend prices, validates and drafts contracts identically.
pub trait LicensingRuntime: Send + Sync {
    fn calculate_price(&self, base_price: Decimal, request: &NegotiationRequest) -> PriceBreakdown;

    fn validate_usage_rights(
        &self,
        requested: &[String],
        base_terms: &BaseTerms,
    ) -> RightsValidation;

    fn validate_price(&self, offered: Decimal, base_terms: &BaseTerms) -> PriceValidation;

    fn generate_contract(
        &self,
        terms: &ContractTerms,
        base_price: Option<Decimal>,
    ) -> LicenseContract;
}

#[derive(Clone, Debug)]
pub struct DeterministicLicensingRuntime<P = DeterministicPricingEngine> {
    pricing_engine: P,
}

impl<P> DeterministicLicensingRuntime<P> {
    pub fn new(pricing_engine: P) -> Self {
        Self { pricing_engine }
    }
}

impl Default for DeterministicLicensingRuntime<DeterministicPricingEngine> {
    fn default() -> Self {
        Self::new(DeterministicPricingEngine::default())
    }
}

impl<P> LicensingRuntime for DeterministicLicensingRuntime<P>
where
    P: PricingEngine,
{
    fn calculate_price(&self, base_price: Decimal, request: &NegotiationRequest) -> PriceBreakdown {
        self.pricing_engine.price(base_price, request)
    }

    fn validate_usage_rights(
        &self,
        requested: &[String],
        base_terms: &BaseTerms,
    ) -> RightsValidation {
        validate_usage_rights(requested, &base_terms.allowed_labels())
    }

    fn validate_price(&self, offered: Decimal, base_terms: &BaseTerms) -> PriceValidation {
        validate_price(offered, base_terms.min_price)
    }

    fn generate_contract(
        &self,
        terms: &ContractTerms,
        base_price: Option<Decimal>,
    ) -> LicenseContract {
        generate_contract_with(&self.pricing_engine, terms, base_price)
    }
}
