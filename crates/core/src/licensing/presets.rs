use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::conversation::Message;
use crate::licensing::contract::ContractTerms;

/// A named bundle of usage rights offered as a shortcut in prompts and the CLI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePackage {
    pub key: String,
    pub name: String,
    pub rights: Vec<String>,
    pub multiplier: Decimal,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePackages {
    packages: Vec<UsagePackage>,
}

impl UsagePackages {
    pub fn new(packages: Vec<UsagePackage>) -> Self {
        Self { packages }
    }

    pub fn get(&self, key: &str) -> Option<&UsagePackage> {
        let key = key.trim();
        self.packages.iter().find(|package| package.key.eq_ignore_ascii_case(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = &UsagePackage> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl Default for UsagePackages {
    fn default() -> Self {
        let package =
            |key: &str, name: &str, rights: &[&str], multiplier: Decimal, description: &str| {
                UsagePackage {
                    key: key.to_string(),
                    name: name.to_string(),
                    rights: rights.iter().map(|right| (*right).to_string()).collect(),
                    multiplier,
                    description: description.to_string(),
                }
            };

        Self::new(vec![
            package(
                "youtube-basic",
                "YouTube Basic",
                &["YOUTUBE", "STREAMING"],
                Decimal::new(13, 1),
                "Personal YouTube videos, non-monetized",
            ),
            package(
                "youtube-monetized",
                "YouTube Monetized",
                &["YOUTUBE", "COMMERCIAL", "STREAMING"],
                Decimal::new(18, 1),
                "YouTube with ads or sponsorships",
            ),
            package(
                "podcast",
                "Podcast",
                &["PODCAST", "STREAMING"],
                Decimal::new(12, 1),
                "Podcast intro and outro music",
            ),
            package(
                "tiktok-instagram",
                "TikTok/Instagram",
                &["TIKTOK", "INSTAGRAM", "SOCIAL_MEDIA"],
                Decimal::new(13, 1),
                "Short-form social media content",
            ),
            package(
                "film-festival",
                "Film Festival",
                &["FILM", "FESTIVAL"],
                Decimal::new(2, 0),
                "Film festival screenings",
            ),
            package(
                "commercial-full",
                "Full Commercial",
                &["COMMERCIAL", "BROADCAST", "STREAMING", "FILM"],
                Decimal::new(3, 0),
                "Full commercial rights",
            ),
        ])
    }
}

/// A worked negotiation loaded into agent memory as a reference dialogue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationExample {
    pub key: String,
    pub scenario: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub min_price: Decimal,
    pub dialogue: Vec<Message>,
    pub final_contract: ContractTerms,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationExamples {
    examples: Vec<NegotiationExample>,
}

impl NegotiationExamples {
    pub fn new(examples: Vec<NegotiationExample>) -> Self {
        Self { examples }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NegotiationExample> {
        self.examples.iter()
    }

    /// Plain-text rendering used for the agent's `examples` memory block.
    pub fn render(&self) -> String {
        self.examples
            .iter()
            .map(|example| {
                let dialogue = example
                    .dialogue
                    .iter()
                    .map(|message| format!("{}: {}", message.role.as_str(), message.content))
                    .collect::<Vec<_>>()
                    .join("\n");
                let price = example
                    .final_contract
                    .price
                    .map(crate::licensing::format_usd)
                    .unwrap_or_else(|| "n/a".to_string());
                format!(
                    "## {} (minimum {})\n{}\nAgreed: {} for {}",
                    example.scenario,
                    crate::licensing::format_usd(example.min_price),
                    dialogue,
                    price,
                    example.final_contract.usage_rights.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Default for NegotiationExamples {
    fn default() -> Self {
        let example = |key: &str,
                       scenario: &str,
                       min_price: i64,
                       dialogue: Vec<Message>,
                       price: Decimal,
                       rights: &[&str],
                       duration_months: Option<u32>| NegotiationExample {
            key: key.to_string(),
            scenario: scenario.to_string(),
            min_price: Decimal::new(min_price, 0),
            dialogue,
            final_contract: ContractTerms {
                price: Some(price),
                usage_rights: rights.iter().map(|right| (*right).to_string()).collect(),
                exclusivity: Some(false),
                territory: Some("worldwide".to_string()),
                duration_months,
                ..ContractTerms::default()
            },
        };

        Self::new(vec![
            example(
                "youtube_creator",
                "YouTuber wants to use a beat in videos",
                50,
                vec![
                    Message::user("I want to use this beat in my YouTube videos"),
                    Message::assistant("Great! YouTube use is allowed. Are you planning to monetize the videos?"),
                    Message::user("Yes, I have ads enabled"),
                    Message::assistant(
                        "For monetized YouTube use worldwide the license comes to $127.50 (base $50, commercial +50%, social +20%, worldwide +50%). Shall I draft it?",
                    ),
                ],
                Decimal::new(12_750, 2),
                &["YOUTUBE", "COMMERCIAL"],
                None,
            ),
            example(
                "podcast_intro",
                "Podcaster wants intro music",
                30,
                vec![
                    Message::user("Tôi cần nhạc intro cho podcast"),
                    Message::assistant("Podcast intro là một lựa chọn tuyệt vời! Bạn có bao nhiêu người nghe mỗi tập?"),
                    Message::user("Khoảng 5000 người"),
                    Message::assistant("Với quy mô đó, giá chuẩn là $45 ($30 cơ bản + 50% thương mại). Bạn muốn độc quyền không?"),
                ],
                Decimal::new(45, 0),
                &["PODCAST", "COMMERCIAL"],
                None,
            ),
            example(
                "film_soundtrack",
                "Filmmaker needs a soundtrack",
                200,
                vec![
                    Message::user("I need this for a short film soundtrack"),
                    Message::assistant("Film soundtracks are exciting! Is this for festival distribution or commercial release?"),
                    Message::user("Film festival circuit, maybe streaming later"),
                    Message::assistant("For festival and streaming rights over three years I can offer $350. If it gets picked up for wider distribution we can extend the license."),
                ],
                Decimal::new(350, 0),
                &["FILM", "FESTIVAL", "STREAMING"],
                Some(36),
            ),
            example(
                "tiktok_viral",
                "TikToker wants a viral sound",
                25,
                vec![
                    Message::user("Em muốn dùng beat này cho TikTok ạ"),
                    Message::assistant("TikTok là nền tảng rất phù hợp! Em có dự định kiếm tiền từ video không?"),
                    Message::user("Có ạ, em đã có creator fund"),
                    Message::assistant("Vậy giá phù hợp là $40 cho TikTok thương mại, worldwide và vĩnh viễn nhé."),
                ],
                Decimal::new(40, 0),
                &["TIKTOK", "COMMERCIAL"],
                None,
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{NegotiationExamples, UsagePackages};
    use crate::language::{detect_language, Language};

    #[test]
    fn standard_packages_are_addressable_by_key() {
        let packages = UsagePackages::default();
        assert_eq!(packages.len(), 6);

        let monetized = packages.get("YouTube-Monetized").expect("package exists");
        assert_eq!(monetized.rights, vec!["YOUTUBE", "COMMERCIAL", "STREAMING"]);
        assert_eq!(monetized.multiplier, Decimal::new(18, 1));
        assert!(packages.get("radio").is_none());
    }

    #[test]
    fn examples_cover_both_languages() {
        let examples = NegotiationExamples::default();
        let languages: Vec<Language> = examples
            .iter()
            .map(|example| detect_language(&example.dialogue[0].content))
            .collect();

        assert!(languages.contains(&Language::English));
        assert!(languages.contains(&Language::Vietnamese));
    }

    #[test]
    fn rendered_examples_include_agreed_terms() {
        let rendered = NegotiationExamples::default().render();
        assert!(rendered.contains("## Filmmaker needs a soundtrack (minimum $200)"));
        assert!(rendered.contains("Agreed: $350 for FILM, FESTIVAL, STREAMING"));
        assert!(rendered.contains("user: Em muốn dùng beat này cho TikTok ạ"));
    }
}
