use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Language detected for a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    En,
    #[serde(rename = "zh-CN")]
    ZhCn,
    #[serde(rename = "ja")]
    Ja,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::ZhCn => "zh-CN",
            Language::Ja => "ja",
            Language::Unknown => "unknown",
        }
    }

    /// Parses a stored language code. Unrecognized codes map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "en" => Language::En,
            "zh-CN" => Language::ZhCn,
            "ja" => Language::Ja,
            _ => Language::Unknown,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-submitted idea. Only `tags` may change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaPrompt {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub language: Language,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdeaPrompt {
    /// Creates a prompt record, detecting its language from the text.
    pub fn new(author_id: &str, text: &str, tags: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            author_id: author_id.to_string(),
            text: text.to_string(),
            language: crate::text::detect_language(text),
            tags,
            created_at: now,
            updated_at: now,
        }
    }
}
