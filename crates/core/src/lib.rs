pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod intent;
pub mod language;
pub mod licensing;

pub use domain::conversation::{ConversationState, Message, Role};
pub use domain::license::{LicenseRecord, LicenseStatus, LicenseStatusReport, RenewalQuote};
pub use domain::terms::{BaseTerms, NegotiationRequest, Territory, UsageRight};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{Stage, StageEngine, StagePolicy, StageTransition, TurnSignals};
pub use intent::{classify_intent, needs_more_info, BuyerIntent};
pub use language::{detect_language, Language};
pub use licensing::contract::{generate_contract, ContractTerms, LicenseContract};
pub use licensing::pricing::{
    calculate_price, DeterministicPricingEngine, PriceBreakdown, PricingEngine, PricingTable,
};
pub use licensing::rights::{
    validate_price, validate_usage_rights, PriceValidation, RightsValidation,
};
pub use licensing::{DeterministicLicensingRuntime, LicensingRuntime};
