use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Prompt,
    Generation,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Prompt => "prompt",
            TargetType::Generation => "generation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prompt" => Some(TargetType::Prompt),
            "generation" => Some(TargetType::Generation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Blocked,
    Allowed,
    NeedsReview,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Blocked => "blocked",
            Resolution::Allowed => "allowed",
            Resolution::NeedsReview => "needs_review",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blocked" => Some(Resolution::Blocked),
            "allowed" => Some(Resolution::Allowed),
            "needs_review" => Some(Resolution::NeedsReview),
            _ => None,
        }
    }
}

/// A persisted policy decision. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyFlag {
    pub id: String,
    pub target_type: TargetType,
    pub target_id: String,
    pub reason: String,
    pub severity: Severity,
    pub resolution: Resolution,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_wire_format() {
        assert_eq!(
            serde_json::to_string(&Resolution::NeedsReview).unwrap(),
            "\"needs_review\""
        );
        assert_eq!(Resolution::parse("needs_review"), Some(Resolution::NeedsReview));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }
}
