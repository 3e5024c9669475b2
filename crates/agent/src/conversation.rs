//! Reads negotiation facts out of free-text replies for backends that cannot
//! report structured tool calls.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use soundchain_core::domain::conversation::ConversationState;
use soundchain_core::domain::terms::UsageRight;
use soundchain_core::intent::{classify_intent, BuyerIntent};

const RIGHT_KEYWORDS: &[(&str, &str)] = &[
    (UsageRight::YOUTUBE, r"(?i)youtube"),
    (UsageRight::TIKTOK, r"(?i)tiktok"),
    (UsageRight::PODCAST, r"(?i)podcast"),
    (UsageRight::COMMERCIAL, r"(?i)commercial|monetiz|\bads\b"),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PriceSource {
    Reply,
    /// The buyer agreed to a reply that quoted nothing; the last assistant turn did.
    History,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextInference {
    pub intent: BuyerIntent,
    pub quoted_price: Option<Decimal>,
    pub price_source: Option<PriceSource>,
    pub usage_rights: Vec<UsageRight>,
}

impl TextInference {
    pub fn buyer_agreed(&self) -> bool {
        self.intent.is_agreement()
    }
}

fn dollar_pattern() -> Option<&'static Regex> {
    static DOLLARS: OnceLock<Option<Regex>> = OnceLock::new();
    DOLLARS.get_or_init(|| Regex::new(r"\$(\d+\.?\d*)").ok()).as_ref()
}

fn right_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RIGHT_KEYWORDS
            .iter()
            .filter_map(|(right, pattern)| Regex::new(pattern).ok().map(|regex| (*right, regex)))
            .collect()
    })
}

/// First dollar amount in `text`, e.g. `$127.50` or `$75`.
pub fn extract_price(text: &str) -> Option<Decimal> {
    let captures = dollar_pattern()?.captures(text)?;
    let amount = captures.get(1)?.as_str().trim_end_matches('.');
    Decimal::from_str(amount).ok()
}

/// Rights implied by keywords in any of `texts`, in a fixed order.
/// Falls back to `STREAMING` when nothing matches.
pub fn infer_usage_rights<'a, I>(texts: I) -> Vec<UsageRight>
where
    I: IntoIterator<Item = &'a str>,
{
    let texts: Vec<&str> = texts.into_iter().collect();
    let mut rights: Vec<UsageRight> = right_patterns()
        .iter()
        .filter(|(_, regex)| texts.iter().any(|text| regex.is_match(text)))
        .map(|(right, _)| UsageRight::new(right))
        .collect();

    if rights.is_empty() {
        rights.push(UsageRight::new(UsageRight::STREAMING));
    }
    rights
}

/// `state` is the conversation as it stood before this turn. The previous quote
/// is only carried forward when the buyer is agreeing to it.
pub fn infer_from_text(
    reply: &str,
    user_message: &str,
    state: &ConversationState,
) -> TextInference {
    let intent = classify_intent(user_message);
    let carried = || {
        intent
            .is_agreement()
            .then(|| state.last_assistant_message().and_then(extract_price))
            .flatten()
    };
    let (quoted_price, price_source) = match extract_price(reply) {
        Some(price) => (Some(price), Some(PriceSource::Reply)),
        None => match carried() {
            Some(price) => (Some(price), Some(PriceSource::History)),
            None => (None, None),
        },
    };

    let texts = [reply, user_message].into_iter().chain(state.user_messages());

    TextInference { intent, quoted_price, price_source, usage_rights: infer_usage_rights(texts) }
}
