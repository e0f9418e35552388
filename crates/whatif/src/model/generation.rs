use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form JSON metadata attached to a generation.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key holding the text the runner sends to the provider.
pub const ENHANCED_PROMPT_KEY: &str = "enhancedPrompt";

/// Kind of media a generation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationType {
    Image,
    Video,
}

impl GenerationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationType::Image => "image",
            GenerationType::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(GenerationType::Image),
            "video" => Some(GenerationType::Video),
            _ => None,
        }
    }
}

impl fmt::Display for GenerationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a generation: `queued -> running -> complete | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Queued,
    Running,
    Complete,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Queued => "queued",
            GenerationStatus::Running => "running",
            GenerationStatus::Complete => "complete",
            GenerationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(GenerationStatus::Queued),
            "running" => Some(GenerationStatus::Running),
            "complete" => Some(GenerationStatus::Complete),
            "failed" => Some(GenerationStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Complete | GenerationStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a forward step.
    pub fn can_transition_to(&self, next: GenerationStatus) -> bool {
        matches!(
            (self, next),
            (GenerationStatus::Queued, GenerationStatus::Running)
                | (GenerationStatus::Running, GenerationStatus::Complete)
                | (GenerationStatus::Running, GenerationStatus::Failed)
        )
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User feedback on whether a result matched what they meant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentFeedback {
    pub matches_intent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One request to produce media from a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub id: String,
    pub prompt_id: String,
    #[serde(rename = "type")]
    pub generation_type: GenerationType,
    pub status: GenerationStatus,
    pub model: String,
    pub refinement_of: Option<String>,
    pub alignment_feedback: Option<AlignmentFeedback>,
    pub asset_urls: Option<Vec<String>>,
    pub metadata: Option<Metadata>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Generation {
    /// Creates a new queued generation.
    pub fn queued(prompt_id: &str, generation_type: GenerationType, model: &str) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            prompt_id: prompt_id.to_string(),
            generation_type,
            status: GenerationStatus::Queued,
            model: model.to_string(),
            refinement_of: None,
            alignment_feedback: None,
            asset_urls: None,
            metadata: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_refinement_of(mut self, generation_id: &str) -> Self {
        self.refinement_of = Some(generation_id.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The enhanced prompt stored by the planner, if any.
    pub fn enhanced_prompt(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(ENHANCED_PROMPT_KEY))
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}
