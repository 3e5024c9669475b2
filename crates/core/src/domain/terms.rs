use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A usage right tag such as `YOUTUBE` or `COMMERCIAL`.
///
/// Input is case-insensitive; the stored form is always trimmed uppercase, so
/// `"youtube"` and `" YouTube "` compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct UsageRight(String);

impl UsageRight {
    pub const YOUTUBE: &'static str = "YOUTUBE";
    pub const TIKTOK: &'static str = "TIKTOK";
    pub const PODCAST: &'static str = "PODCAST";
    pub const COMMERCIAL: &'static str = "COMMERCIAL";
    pub const STREAMING: &'static str = "STREAMING";
    pub const FILM: &'static str = "FILM";
    pub const MOVIE: &'static str = "MOVIE";
    pub const BROADCAST: &'static str = "BROADCAST";
    pub const TV: &'static str = "TV";

    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is(&self, tag: &str) -> bool {
        self.0 == tag
    }
}

impl From<String> for UsageRight {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for UsageRight {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<UsageRight> for String {
    fn from(value: UsageRight) -> Self {
        value.0
    }
}

impl fmt::Display for UsageRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize_rights<R: AsRef<str>>(raw: &[R]) -> Vec<UsageRight> {
    let mut rights: Vec<UsageRight> = Vec::with_capacity(raw.len());
    for right in raw.iter().map(UsageRight::new) {
        if !right.as_str().is_empty() && !rights.contains(&right) {
            rights.push(right);
        }
    }
    rights
}

/// License territory. Unknown labels fall back to [`Territory::Regional`],
/// which carries no territory multiplier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Territory {
    Regional,
    National,
    #[default]
    Worldwide,
}

impl Territory {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "worldwide" | "global" => Self::Worldwide,
            "national" => Self::National,
            _ => Self::Regional,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regional => "regional",
            Self::National => "national",
            Self::Worldwide => "worldwide",
        }
    }
}

impl From<String> for Territory {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

impl From<Territory> for String {
    fn from(value: Territory) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Territory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Producer-set floor constraints for one track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseTerms {
    #[serde(with = "rust_decimal::serde::float")]
    pub min_price: Decimal,
    pub allowed_usage_rights: Vec<UsageRight>,
    pub exclusivity_available: bool,
    pub territory: String,
}

impl BaseTerms {
    pub fn allowed_labels(&self) -> Vec<&str> {
        self.allowed_usage_rights.iter().map(UsageRight::as_str).collect()
    }
}

/// Buyer terms as interpreted from the conversation, input to the pricing engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationRequest {
    #[serde(default)]
    pub usage_rights: Vec<UsageRight>,
    #[serde(default)]
    pub exclusivity: bool,
    #[serde(default)]
    pub territory: Territory,
    #[serde(default, alias = "duration")]
    pub duration_months: Option<u32>,
}

impl NegotiationRequest {
    pub fn has_right(&self, tag: &str) -> bool {
        self.usage_rights.iter().any(|right| right.is(tag))
    }

    /// A zero-month duration is treated as unspecified (perpetual).
    pub fn effective_duration(&self) -> Option<u32> {
        self.duration_months.filter(|months| *months > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_rights, NegotiationRequest, Territory, UsageRight};

    #[test]
    fn usage_rights_normalize_case_and_whitespace() {
        assert_eq!(UsageRight::new(" youTube "), UsageRight::new("YOUTUBE"));
        assert_eq!(
            normalize_rights(&["tiktok", "TikTok", "", "podcast"]),
            vec![UsageRight::new("TIKTOK"), UsageRight::new("PODCAST")]
        );
    }

    #[test]
    fn unknown_territory_labels_fall_back_to_regional() {
        assert_eq!(Territory::from_label("Worldwide"), Territory::Worldwide);
        assert_eq!(Territory::from_label("national"), Territory::National);
        assert_eq!(Territory::from_label("Vietnam only"), Territory::Regional);
    }

    #[test]
    fn request_deserializes_with_lenient_fields() {
        let request: NegotiationRequest = serde_json::from_str(
            r#"{"usageRights":["youtube","commercial"],"territory":"NATIONAL","duration":0}"#,
        )
        .expect("request should parse");

        assert!(request.has_right(UsageRight::YOUTUBE));
        assert!(request.has_right(UsageRight::COMMERCIAL));
        assert_eq!(request.territory, Territory::National);
        assert!(!request.exclusivity);
        assert_eq!(request.effective_duration(), None);
    }
}
