use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What the buyer is trying to do with their latest message. Classified before
/// any stage decision so transitions never depend on ad hoc substring checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyerIntent {
    Agree,
    Reject,
    AskInfo,
    ProposeAlternative,
    DescribeUse,
}

impl BuyerIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agree => "agree",
            Self::Reject => "reject",
            Self::AskInfo => "ask_info",
            Self::ProposeAlternative => "propose_alternative",
            Self::DescribeUse => "describe_use",
        }
    }

    pub fn is_agreement(&self) -> bool {
        matches!(self, Self::Agree)
    }
}

const REJECT_PATTERNS: &[&str] = &[
    r"\b(don'?t|do not|won'?t|will not)\s+(agree|accept|want)",
    r"\bdisagree\b",
    r"\btoo\s+(expensive|much|high)\b",
    r"\bnot\s+interested\b",
    r"\b(decline|reject)",
    r"^\s*no[.!]*$",
    r"^\s*no\s*,\s*(thanks|thank\s+you|not|pass|i'?ll\s+pass|i\s+(can'?t|won'?t|don'?t))",
    r"\bno\s+(thanks|deal)\b",
    r"không\s+đồng\s+ý",
    r"không\s+được",
    r"không\s+muốn",
    r"đắt\s+quá",
    r"quá\s+đắt",
];

const AGREE_PATTERNS: &[&str] = &[
    r"đồng\s+ý",
    r"được",
    r"\bok(ay)?\b",
    r"\bagree",
    r"\baccept",
    r"^\s*(yes|yeah|yep|sure)\b",
    r"\bsounds\s+good\b",
    r"\bperfect\b",
    r"^\s*deal[.!]*$",
    r"\blet'?s\s+do\s+it\b",
];

const ALTERNATIVE_PATTERNS: &[&str] = &[
    r"\$\s*\d",
    r"\b(how|what)\s+about\b",
    r"\bbudget\b",
    r"\bcheaper\b",
    r"\bdiscount\b",
    r"\bcounter",
    r"giảm\s+giá",
    r"ngân\s+sách",
];

const QUESTION_WORDS: &[&str] = &[
    r"\b(what|how|which)\b",
    r"\b(gì|nào|sao|bao\s+nhiêu)\b",
];

fn compiled(cell: &'static OnceLock<Vec<Regex>>, patterns: &[&str]) -> &'static [Regex] {
    cell.get_or_init(|| {
        patterns.iter().filter_map(|pattern| Regex::new(&format!("(?i){pattern}")).ok()).collect()
    })
}

fn matches_any(cell: &'static OnceLock<Vec<Regex>>, patterns: &[&str], text: &str) -> bool {
    compiled(cell, patterns).iter().any(|regex| regex.is_match(text))
}

fn rejects(text: &str) -> bool {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    matches_any(&CELL, REJECT_PATTERNS, text)
}

fn agrees(text: &str) -> bool {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    matches_any(&CELL, AGREE_PATTERNS, text)
}

fn proposes_alternative(text: &str) -> bool {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    matches_any(&CELL, ALTERNATIVE_PATTERNS, text)
}

/// Rejection wins over agreement, so "I don't agree" never finalizes a deal.
pub fn classify_intent(text: &str) -> BuyerIntent {
    let text = text.trim();
    if rejects(text) {
        BuyerIntent::Reject
    } else if agrees(text) {
        BuyerIntent::Agree
    } else if proposes_alternative(text) {
        BuyerIntent::ProposeAlternative
    } else if text.contains('?') {
        BuyerIntent::AskInfo
    } else {
        BuyerIntent::DescribeUse
    }
}

/// True when a reply asks the buyer something outright.
pub fn asks_question(reply: &str) -> bool {
    reply.contains('?')
}

/// True when a reply is still gathering information from the buyer, either by a
/// question mark or an interrogative word.
pub fn needs_more_info(reply: &str) -> bool {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    reply.contains('?') || matches_any(&CELL, QUESTION_WORDS, reply)
}
