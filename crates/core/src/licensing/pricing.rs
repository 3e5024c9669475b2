use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::terms::{NegotiationRequest, Territory, UsageRight};
use crate::licensing::format_usd;

/// Additive usage bonus applied when any of `rights` is requested.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageBonus {
    pub rights: Vec<String>,
    pub bonus: Decimal,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationTier {
    pub max_months: u32,
    pub factor: Decimal,
}

/// Multipliers used by the pricing engine. `Default` is the standard table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTable {
    pub usage_bonuses: Vec<UsageBonus>,
    pub exclusive_multiplier: Decimal,
    pub national_multiplier: Decimal,
    pub worldwide_multiplier: Decimal,
    /// Checked in order; the first tier whose `max_months` covers the term wins.
    pub duration_tiers: Vec<DurationTier>,
}

impl Default for PricingTable {
    fn default() -> Self {
        let bonus = |rights: &[&str], bonus: Decimal, label: &str| UsageBonus {
            rights: rights.iter().map(|right| (*right).to_string()).collect(),
            bonus,
            label: label.to_string(),
        };

        Self {
            usage_bonuses: vec![
                bonus(&[UsageRight::COMMERCIAL], Decimal::new(5, 1), "Commercial use"),
                bonus(
                    &[UsageRight::BROADCAST, UsageRight::TV],
                    Decimal::new(3, 1),
                    "Broadcast rights",
                ),
                bonus(
                    &[UsageRight::FILM, UsageRight::MOVIE],
                    Decimal::new(4, 1),
                    "Film/movie rights",
                ),
                bonus(&[UsageRight::STREAMING], Decimal::new(1, 1), "Streaming rights"),
                bonus(
                    &[UsageRight::YOUTUBE, UsageRight::TIKTOK],
                    Decimal::new(2, 1),
                    "Social media rights",
                ),
            ],
            exclusive_multiplier: Decimal::new(25, 1),
            national_multiplier: Decimal::new(12, 1),
            worldwide_multiplier: Decimal::new(15, 1),
            duration_tiers: vec![
                DurationTier { max_months: 12, factor: Decimal::new(7, 1) },
                DurationTier { max_months: 36, factor: Decimal::new(85, 2) },
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    #[serde(with = "rust_decimal::serde::float")]
    pub base_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub usage_multiplier: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub exclusivity_multiplier: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub territory_multiplier: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub duration_discount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub final_price: Decimal,
    pub reasoning: String,
}

pub trait PricingEngine: Send + Sync {
    fn price(&self, base_price: Decimal, request: &NegotiationRequest) -> PriceBreakdown;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicPricingEngine {
    table: PricingTable,
}

impl DeterministicPricingEngine {
    pub fn new(table: PricingTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PricingTable {
        &self.table
    }
}

impl PricingEngine for DeterministicPricingEngine {
    fn price(&self, base_price: Decimal, request: &NegotiationRequest) -> PriceBreakdown {
        self.table.calculate(base_price, request)
    }
}

/// Prices a request against the standard table.
pub fn calculate_price(base_price: Decimal, request: &NegotiationRequest) -> PriceBreakdown {
    PricingTable::default().calculate(base_price, request)
}

impl PricingTable {
    pub fn calculate(&self, base_price: Decimal, request: &NegotiationRequest) -> PriceBreakdown {
        let mut reasoning = vec![format!("Base price: {}", format_usd(base_price))];

        let mut usage_multiplier = Decimal::ONE;
        for bonus in &self.usage_bonuses {
            if bonus.rights.iter().any(|tag| request.has_right(tag)) {
                usage_multiplier += bonus.bonus;
                reasoning.push(format!("{}: +{}%", bonus.label, percent(bonus.bonus)));
            }
        }

        let exclusivity_multiplier = if request.exclusivity {
            reasoning.push(format!(
                "Exclusive license: {}x multiplier",
                self.exclusive_multiplier.normalize()
            ));
            self.exclusive_multiplier
        } else {
            Decimal::ONE
        };

        let territory_multiplier = match request.territory {
            Territory::Worldwide => self.worldwide_multiplier,
            Territory::National => self.national_multiplier,
            Territory::Regional => Decimal::ONE,
        };
        if territory_multiplier != Decimal::ONE {
            reasoning.push(format!(
                "{} territory: +{}%",
                capitalize(request.territory.as_str()),
                percent(territory_multiplier - Decimal::ONE)
            ));
        }

        let duration_tier = request.effective_duration().and_then(|months| {
            self.duration_tiers.iter().find(|tier| months <= tier.max_months)
        });
        let duration_discount = match duration_tier {
            Some(tier) => {
                reasoning.push(format!(
                    "Term up to {} months: {}% discount",
                    tier.max_months,
                    percent(Decimal::ONE - tier.factor)
                ));
                tier.factor
            }
            None => Decimal::ONE,
        };

        let final_price = (base_price
            * usage_multiplier
            * exclusivity_multiplier
            * territory_multiplier
            * duration_discount)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .max(Decimal::ZERO);
        reasoning.push(format!("Final price: {}", format_usd(final_price)));

        PriceBreakdown {
            base_price,
            usage_multiplier,
            exclusivity_multiplier,
            territory_multiplier,
            duration_discount,
            final_price,
            reasoning: reasoning.join(" • "),
        }
    }
}

fn percent(fraction: Decimal) -> Decimal {
    (fraction * Decimal::ONE_HUNDRED).normalize()
}

fn capitalize(word: &str) -> String {
    let mut characters = word.chars();
    match characters.next() {
        Some(first) => first.to_uppercase().chain(characters).collect(),
        None => String::new(),
    }
}
