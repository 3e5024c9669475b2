use std::fmt;

use serde::{Deserialize, Serialize};

use crate::intent::BuyerIntent;

/// Coarse negotiation progress marker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Understanding,
    Proposing,
    Negotiating,
    Finalizing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Understanding => "understanding",
            Self::Proposing => "proposing",
            Self::Negotiating => "negotiating",
            Self::Finalizing => "finalizing",
        }
    }

    /// Position in the nominal `understanding → proposing → negotiating → finalizing` order.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Understanding => 0,
            Self::Proposing => 1,
            Self::Negotiating => 2,
            Self::Finalizing => 3,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which classification rules a backend's turns are judged by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePolicy {
    /// Free-text replies: a quoted dollar amount means the parties are negotiating.
    TextSignals,
    /// Tool-calling replies: anything that is not a question means negotiating.
    QuestionSignals,
}

/// Facts about one completed turn, gathered by the orchestrator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSignals {
    pub contract_produced: bool,
    pub pricing_tool_ran: bool,
    pub reply_mentions_price: bool,
    pub needs_more_info: bool,
    pub intent: Option<BuyerIntent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: Stage,
    pub to: Stage,
    pub policy: StagePolicy,
    pub regressed: bool,
}

impl StageTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}
