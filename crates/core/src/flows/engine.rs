use std::sync::OnceLock;

use regex::Regex;

use crate::flows::states::{Stage, StagePolicy, StageTransition, TurnSignals};

pub trait StageDefinition {
    fn policy(&self) -> StagePolicy;
    fn classify(&self, signals: &TurnSignals) -> Stage;
}

#[derive(Clone, Debug, Default)]
pub struct TextSignalFlow;

impl StageDefinition for TextSignalFlow {
    fn policy(&self) -> StagePolicy {
        StagePolicy::TextSignals
    }

    fn classify(&self, signals: &TurnSignals) -> Stage {
        if signals.contract_produced {
            Stage::Finalizing
        } else if signals.pricing_tool_ran {
            Stage::Proposing
        } else if signals.reply_mentions_price {
            Stage::Negotiating
        } else {
            Stage::Understanding
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct QuestionSignalFlow;

impl StageDefinition for QuestionSignalFlow {
    fn policy(&self) -> StagePolicy {
        StagePolicy::QuestionSignals
    }

    fn classify(&self, signals: &TurnSignals) -> Stage {
        if signals.contract_produced {
            Stage::Finalizing
        } else if signals.pricing_tool_ran {
            Stage::Proposing
        } else if !signals.needs_more_info {
            Stage::Negotiating
        } else {
            Stage::Understanding
        }
    }
}

/// Derives the next stage from a turn's signals. The classification is
/// stateless, so a stage can move backwards; the transition says when it did.
#[derive(Clone, Debug, Default)]
pub struct StageEngine {
    text: TextSignalFlow,
    question: QuestionSignalFlow,
}

impl StageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn definition(&self, policy: StagePolicy) -> &dyn StageDefinition {
        match policy {
            StagePolicy::TextSignals => &self.text,
            StagePolicy::QuestionSignals => &self.question,
        }
    }

    pub fn advance(
        &self,
        current: Stage,
        signals: &TurnSignals,
        policy: StagePolicy,
    ) -> StageTransition {
        let to = self.definition(policy).classify(signals);
        StageTransition { from: current, to, policy, regressed: to.rank() < current.rank() }
    }
}

/// A dollar amount or the Vietnamese word for price.
pub fn reply_mentions_price(reply: &str) -> bool {
    static DOLLARS: OnceLock<Option<Regex>> = OnceLock::new();
    let quoted = DOLLARS
        .get_or_init(|| Regex::new(r"\$\d").ok())
        .as_ref()
        .is_some_and(|regex| regex.is_match(reply));
    quoted || reply.to_lowercase().contains("giá")
}

#[cfg(test)]
mod tests {
    use super::{reply_mentions_price, StageEngine};
    use crate::flows::states::{Stage, StagePolicy, TurnSignals};

    fn signals(contract: bool, pricing: bool, price_text: bool, question: bool) -> TurnSignals {
        TurnSignals {
            contract_produced: contract,
            pricing_tool_ran: pricing,
            reply_mentions_price: price_text,
            needs_more_info: question,
            intent: None,
        }
    }

    #[test]
    fn text_policy_ranks_contract_then_pricing_then_price_text() {
        let engine = StageEngine::new();
        let advance =
            |s: TurnSignals| engine.advance(Stage::Understanding, &s, StagePolicy::TextSignals).to;

        assert_eq!(advance(signals(true, true, true, false)), Stage::Finalizing);
        assert_eq!(advance(signals(false, true, true, false)), Stage::Proposing);
        assert_eq!(advance(signals(false, false, true, true)), Stage::Negotiating);
        assert_eq!(advance(signals(false, false, false, false)), Stage::Understanding);
    }

    #[test]
    fn question_policy_treats_statements_as_negotiation() {
        let engine = StageEngine::new();
        let advance = |s: TurnSignals| {
            engine.advance(Stage::Understanding, &s, StagePolicy::QuestionSignals).to
        };

        assert_eq!(advance(signals(true, false, false, true)), Stage::Finalizing);
        assert_eq!(advance(signals(false, true, false, true)), Stage::Proposing);
        assert_eq!(advance(signals(false, false, false, false)), Stage::Negotiating);
        assert_eq!(advance(signals(false, false, true, true)), Stage::Understanding);
    }

    #[test]
    fn regression_is_allowed_and_flagged() {
        let engine = StageEngine::new();
        let pricing_only = signals(false, true, false, false);
        let transition = engine.advance(Stage::Finalizing, &pricing_only, StagePolicy::TextSignals);

        assert_eq!(transition.to, Stage::Proposing);
        assert!(transition.regressed);
        assert!(transition.changed());

        let steady = engine.advance(Stage::Proposing, &pricing_only, StagePolicy::TextSignals);
        assert!(!steady.regressed);
        assert!(!steady.changed());
    }

    #[test]
    fn price_mentions_cover_both_languages() {
        assert!(reply_mentions_price("That would be $75 worldwide"));
        assert!(reply_mentions_price("Giá là bao nhiêu"));
        assert!(!reply_mentions_price("What is the video for?"));
        assert!(!reply_mentions_price("Costs a few $ only"));
    }
}
