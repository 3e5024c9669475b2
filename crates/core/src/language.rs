use serde::{Deserialize, Serialize};

/// Lowercase Vietnamese letters carrying diacritics. Uppercase input is folded
/// before the lookup.
const VIETNAMESE_LETTERS: &str = "àáạảãâầấậẩẫăằắặẳẵèéẹẻẽêềếệểễìíịỉĩòóọỏõôồốộổỗơờớợởỡùúụủũưừứựửữỳýỵỷỹđ";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "vi")]
    Vietnamese,
    #[default]
    #[serde(rename = "en")]
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Vietnamese => "vi",
            Self::English => "en",
        }
    }
}

/// Classifies text as Vietnamese if any diacritic letter appears, English otherwise.
pub fn detect_language(text: &str) -> Language {
    let vietnamese = text
        .chars()
        .flat_map(char::to_lowercase)
        .any(|character| VIETNAMESE_LETTERS.contains(character));

    if vietnamese {
        Language::Vietnamese
    } else {
        Language::English
    }
}
