use rust_decimal::Decimal;
use soundchain_core::licensing::format_usd;
use soundchain_core::licensing::rights::PriceValidation;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailIntent {
    /// A contract is about to be returned at `price` against the producer floor.
    EmitContract { price: Decimal, minimum: Decimal, validation: PriceValidation },
}

impl GuardrailIntent {
    pub fn action_key(&self) -> &'static str {
        match self {
            Self::EmitContract { .. } => "contract.emit",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String, fallback_path: &'static str },
    Degrade { reason_code: &'static str, user_message: String, fallback_path: &'static str },
}

impl GuardrailDecision {
    pub fn withholds_contract(&self) -> bool {
        matches!(self, Self::Deny { .. })
    }

    pub fn flags_violation(&self) -> bool {
        !matches!(self, Self::Allow)
    }
}

/// Below-floor contracts are flagged by default and withheld when enforced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub enforce_price_floor: bool,
}

impl GuardrailPolicy {
    pub fn new(enforce_price_floor: bool) -> Self {
        Self { enforce_price_floor }
    }

    pub fn evaluate(&self, intent: &GuardrailIntent) -> GuardrailDecision {
        match intent {
            GuardrailIntent::EmitContract { validation, .. } if validation.valid => {
                GuardrailDecision::Allow
            }
            GuardrailIntent::EmitContract { price, minimum, .. } if self.enforce_price_floor => {
                GuardrailDecision::Deny {
                    reason_code: "price_below_floor",
                    user_message: format!(
                        "The agreed price of {} is below the producer's minimum of {}.",
                        format_usd(*price),
                        format_usd(*minimum)
                    ),
                    fallback_path: "withhold_contract",
                }
            }
            GuardrailIntent::EmitContract { price, minimum, .. } => GuardrailDecision::Degrade {
                reason_code: "price_below_floor",
                user_message: format!(
                    "Contract price {} is below the producer's minimum of {} and needs review.",
                    format_usd(*price),
                    format_usd(*minimum)
                ),
                fallback_path: "flag_price_floor_violation",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use soundchain_core::licensing::rights::validate_price;

    use super::{GuardrailDecision, GuardrailIntent, GuardrailPolicy};

    fn emit(price: i64, minimum: i64) -> GuardrailIntent {
        let (price, minimum) = (Decimal::new(price, 0), Decimal::new(minimum, 0));
        GuardrailIntent::EmitContract { price, minimum, validation: validate_price(price, minimum) }
    }

    #[test]
    fn contract_at_or_above_floor_is_allowed() {
        let policy = GuardrailPolicy::new(true);
        assert_eq!(policy.evaluate(&emit(50, 50)), GuardrailDecision::Allow);
        assert_eq!(emit(50, 50).action_key(), "contract.emit");
    }

    #[test]
    fn below_floor_is_flagged_by_default() {
        let decision = GuardrailPolicy::default().evaluate(&emit(40, 50));

        assert!(decision.flags_violation());
        assert!(!decision.withholds_contract());
        assert!(matches!(
            decision,
            GuardrailDecision::Degrade {
                reason_code: "price_below_floor",
                fallback_path: "flag_price_floor_violation",
                ..
            }
        ));
    }

    #[test]
    fn below_floor_is_withheld_when_enforced() {
        let decision = GuardrailPolicy::new(true).evaluate(&emit(40, 50));

        let (reason_code, user_message, fallback_path) = match decision {
            GuardrailDecision::Deny { reason_code, user_message, fallback_path } => {
                (reason_code, user_message, fallback_path)
            }
            _ => ("", String::new(), ""),
        };

        assert_eq!(reason_code, "price_below_floor");
        assert!(user_message.contains("$40"));
        assert_eq!(fallback_path, "withhold_contract");
    }
}
