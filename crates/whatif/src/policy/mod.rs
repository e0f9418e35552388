//! Keyword-based content policy.
//!
//! Each category is an independent check over the lower-cased text. Latin
//! keywords match whole words (with common English inflections); CJK keywords
//! match as substrings since those scripts have no word separators.

mod keywords;

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PolicyConfig;
use crate::model::{new_id, PolicyFlag, Resolution, Severity, TargetType};
use crate::sanitize::truncate_for_log;

use keywords::{CategoryRule, EXPLICIT_INTENT, GENERIC_TIPS, INNOCENT_CONTEXT, RULES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationCategory {
    Violence,
    Adult,
    Harassment,
    Misinformation,
    Spam,
}

impl ViolationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCategory::Violence => "violence",
            ViolationCategory::Adult => "adult",
            ViolationCategory::Harassment => "harassment",
            ViolationCategory::Misinformation => "misinformation",
            ViolationCategory::Spam => "spam",
        }
    }
}

/// One triggered check and how it resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyViolation {
    pub category: ViolationCategory,
    pub reason: String,
    pub severity: Severity,
    pub suggestion: String,
    pub resolution: Resolution,
}

/// Outcome of checking one piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyCheck {
    pub allowed: bool,
    pub violations: Vec<PolicyViolation>,
    pub recommendations: Vec<String>,
}

impl PolicyCheck {
    /// Converts the decisions into flag records for `target`.
    pub fn flags_for(&self, target_type: TargetType, target_id: &str) -> Vec<PolicyFlag> {
        let now = Utc::now();
        self.violations
            .iter()
            .map(|v| PolicyFlag {
                id: new_id(),
                target_type,
                target_id: target_id.to_string(),
                reason: v.reason.clone(),
                severity: v.severity,
                resolution: v.resolution,
                created_at: now,
            })
            .collect()
    }

    pub fn needs_review(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.resolution == Resolution::NeedsReview)
    }
}

/// Lower-cased keyword matcher.
struct KeywordMatcher {
    words: Option<Regex>,
    substrings: Vec<&'static str>,
}

impl KeywordMatcher {
    fn new(keywords: &[&'static str]) -> Self {
        let (latin, cjk): (Vec<&'static str>, Vec<&'static str>) =
            keywords.iter().copied().partition(|k| k.is_ascii());
        let words = if latin.is_empty() {
            None
        } else {
            let alternation = latin
                .iter()
                .map(|k| regex::escape(k).replace(' ', r"\s+"))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"\b(?:{})(?:s|es|ed|d|ing|er|ers)?\b", alternation);
            Some(Regex::new(&pattern).unwrap())
        };
        Self {
            words,
            substrings: cjk,
        }
    }

    /// Returns the first matching term in `lowered`.
    fn find<'t>(&self, lowered: &'t str) -> Option<&'t str> {
        if let Some(m) = self.words.as_ref().and_then(|re| re.find(lowered)) {
            return Some(m.as_str());
        }
        self.substrings
            .iter()
            .find_map(|k| lowered.find(k).map(|i| &lowered[i..i + k.len()]))
    }
}

static CATEGORY_MATCHERS: LazyLock<Vec<KeywordMatcher>> =
    LazyLock::new(|| RULES.iter().map(|r| KeywordMatcher::new(r.keywords)).collect());
static INNOCENT_MATCHER: LazyLock<KeywordMatcher> =
    LazyLock::new(|| KeywordMatcher::new(INNOCENT_CONTEXT));
static EXPLICIT_MATCHER: LazyLock<KeywordMatcher> =
    LazyLock::new(|| KeywordMatcher::new(EXPLICIT_INTENT));

/// Below this share of unique words, text counts as repetitive spam.
const SPAM_UNIQUE_RATIO: f64 = 0.3;
const SPAM_MIN_CHARS: usize = 3;

pub struct PolicyEnforcer {
    config: PolicyConfig,
}

impl PolicyEnforcer {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Checks a prompt submitted by `author_id`.
    pub fn check_prompt(&self, prompt: &str, author_id: &str) -> PolicyCheck {
        let _span = tracing::info_span!("policy.check_prompt", author_id = %author_id).entered();
        let check = self.check_text(prompt);
        if !check.violations.is_empty() {
            info!(
                allowed = check.allowed,
                violations = check.violations.len(),
                prompt = %truncate_for_log(prompt),
                "Policy flagged prompt"
            );
        }
        check
    }

    /// Runs every category check over `text`.
    pub fn check_text(&self, text: &str) -> PolicyCheck {
        let lowered = text.to_lowercase();
        let mut violations = Vec::new();

        for (rule, matcher) in RULES.iter().zip(CATEGORY_MATCHERS.iter()) {
            let Some(term) = matcher.find(&lowered) else {
                continue;
            };
            if rule.category == ViolationCategory::Violence && is_innocent_context(&lowered) {
                debug!(term, "Violence keyword suppressed by innocent context");
                continue;
            }
            violations.push(self.violation(rule, term));
        }

        if is_spam(text) {
            violations.push(PolicyViolation {
                category: ViolationCategory::Spam,
                reason: keywords::SPAM_REASON.to_string(),
                severity: Severity::Low,
                suggestion: keywords::SPAM_SUGGESTION.to_string(),
                resolution: self.resolve(Severity::Low),
            });
        }

        let allowed = violations.iter().all(|v| v.resolution != Resolution::Blocked);
        let recommendations = recommendations(&violations);
        PolicyCheck {
            allowed,
            violations,
            recommendations,
        }
    }

    fn violation(&self, rule: &CategoryRule, term: &str) -> PolicyViolation {
        PolicyViolation {
            category: rule.category,
            reason: format!("{} (\"{}\")", rule.reason, term),
            severity: rule.severity,
            suggestion: rule.suggestion.to_string(),
            resolution: self.resolve(rule.severity),
        }
    }

    /// Maps a severity to a resolution under the current configuration.
    pub fn resolve(&self, severity: Severity) -> Resolution {
        if self.config.strict_mode {
            return match severity {
                Severity::Low => Resolution::NeedsReview,
                Severity::Medium | Severity::High => Resolution::Blocked,
            };
        }
        match severity {
            Severity::High if self.config.block_high_severity => Resolution::Blocked,
            Severity::High => Resolution::NeedsReview,
            Severity::Medium if self.config.require_review_medium => Resolution::NeedsReview,
            Severity::Medium | Severity::Low => Resolution::Allowed,
        }
    }
}

fn is_innocent_context(lowered: &str) -> bool {
    INNOCENT_MATCHER.find(lowered).is_some() && EXPLICIT_MATCHER.find(lowered).is_none()
}

fn is_spam(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < SPAM_MIN_CHARS {
        return true;
    }
    let words: Vec<String> = trimmed.split_whitespace().map(str::to_lowercase).collect();
    if words.len() <= 1 {
        return false;
    }
    let unique: HashSet<&String> = words.iter().collect();
    (unique.len() as f64 / words.len() as f64) < SPAM_UNIQUE_RATIO
}

fn recommendations(violations: &[PolicyViolation]) -> Vec<String> {
    if violations.is_empty() {
        return Vec::new();
    }
    let mut seen = HashSet::new();
    violations
        .iter()
        .map(|v| v.suggestion.as_str())
        .chain(GENERIC_TIPS.iter().copied())
        .filter(|s| seen.insert(*s))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enforcer() -> PolicyEnforcer {
        PolicyEnforcer::new(PolicyConfig::default())
    }

    fn categories(check: &PolicyCheck) -> Vec<ViolationCategory> {
        check.violations.iter().map(|v| v.category).collect()
    }

    #[test]
    fn test_clean_prompt_allowed() {
        let check = enforcer().check_prompt("what if the ocean were made of glass", "u1");
        assert!(check.allowed);
        assert!(check.violations.is_empty());
        assert!(check.recommendations.is_empty());
    }

    #[test]
    fn test_robot_vacuum_float_is_allowed() {
        let check = enforcer().check_prompt("what if a robot vacuum makes chairs float", "u1");
        assert!(check.allowed);
        assert!(check.violations.is_empty());
    }

    #[test]
    fn test_explicit_intent_overrides_innocent_context() {
        let check = enforcer().check_prompt(
            "a robot vacuum arrives and destroys the room violently",
            "u1",
        );
        assert_eq!(categories(&check), vec![ViolationCategory::Violence]);
        assert_eq!(check.violations[0].severity, Severity::High);
        assert!(!check.allowed);
    }

    #[test]
    fn test_innocent_context_suppresses_violence() {
        let check = enforcer().check_prompt("a water gun battle in the living room", "u1");
        assert!(check.allowed);
        assert!(check.violations.is_empty());
    }

    #[test]
    fn test_violence_blocked_by_default() {
        let check = enforcer().check_prompt("kill the soldiers in the war", "u1");
        assert!(!check.allowed);
        let violence = &check.violations[0];
        assert_eq!(violence.category, ViolationCategory::Violence);
        assert_eq!(violence.severity, Severity::High);
        assert_eq!(violence.resolution, Resolution::Blocked);
        assert!(violence.reason.contains("kill"));
    }

    #[test]
    fn test_word_boundaries() {
        let e = enforcer();
        assert!(e.check_text("a warm blanket over a skilled baker").violations.is_empty());
        assert!(e.check_text("a stargazer begun at dusk").violations.is_empty());
        assert_eq!(
            categories(&e.check_text("robots attacked the city")),
            vec![ViolationCategory::Violence]
        );
        assert_eq!(
            categories(&e.check_text("Bombs over the harbor")),
            vec![ViolationCategory::Violence]
        );
    }

    #[test]
    fn test_cjk_substring_match() {
        let check = enforcer().check_text("如果世界充满暴力");
        assert_eq!(categories(&check), vec![ViolationCategory::Violence]);

        let check = enforcer().check_text("もしも世界がデマで溢れたら");
        assert_eq!(categories(&check), vec![ViolationCategory::Misinformation]);
    }

    #[test]
    fn test_medium_needs_review_but_allowed() {
        let check = enforcer().check_prompt("what if the flat earth were real", "u1");
        assert!(check.allowed);
        assert_eq!(check.violations[0].category, ViolationCategory::Misinformation);
        assert_eq!(check.violations[0].resolution, Resolution::NeedsReview);
        assert!(check.needs_review());
    }

    #[test]
    fn test_multiword_keyword() {
        let check = enforcer().check_text("I hate   you so much");
        assert_eq!(categories(&check), vec![ViolationCategory::Harassment]);
    }

    #[test]
    fn test_spam_detection() {
        let e = enforcer();
        let check = e.check_text("buy buy buy buy buy buy buy");
        assert_eq!(categories(&check), vec![ViolationCategory::Spam]);
        assert_eq!(check.violations[0].resolution, Resolution::Allowed);
        assert!(check.allowed);

        assert_eq!(categories(&e.check_text("hi")), vec![ViolationCategory::Spam]);
        assert!(e.check_text("glass").violations.is_empty());
    }

    #[test]
    fn test_strict_mode_resolutions() {
        let strict = PolicyEnforcer::new(PolicyConfig {
            strict_mode: true,
            ..PolicyConfig::default()
        });
        assert_eq!(strict.resolve(Severity::Low), Resolution::NeedsReview);
        assert_eq!(strict.resolve(Severity::Medium), Resolution::Blocked);
        assert_eq!(strict.resolve(Severity::High), Resolution::Blocked);

        let check = strict.check_text("what if the flat earth were real");
        assert!(!check.allowed);
    }

    #[test]
    fn test_lenient_resolutions() {
        let lenient = PolicyEnforcer::new(PolicyConfig {
            strict_mode: false,
            block_high_severity: false,
            require_review_medium: false,
        });
        assert_eq!(lenient.resolve(Severity::High), Resolution::NeedsReview);
        assert_eq!(lenient.resolve(Severity::Medium), Resolution::Allowed);
        assert_eq!(lenient.resolve(Severity::Low), Resolution::Allowed);
        assert!(lenient.check_text("kill the dragon").allowed);
    }

    #[test]
    fn test_recommendations_deduplicated_with_tips() {
        let check = enforcer().check_text("kill and murder with a gun, you idiot");
        assert_eq!(
            categories(&check),
            vec![ViolationCategory::Violence, ViolationCategory::Harassment]
        );
        let recs = &check.recommendations;
        assert_eq!(recs.len(), 4);
        assert_eq!(recs[2], GENERIC_TIPS[0]);
        assert_eq!(recs[3], GENERIC_TIPS[1]);
    }

    #[test]
    fn test_flags_for_target() {
        let check = enforcer().check_text("kill the soldiers in the war");
        let flags = check.flags_for(TargetType::Prompt, "prompt-1");
        assert_eq!(flags.len(), check.violations.len());
        assert!(flags.iter().all(|f| f.target_id == "prompt-1"));
        assert_eq!(flags[0].resolution, Resolution::Blocked);
        assert_eq!(flags[0].target_type, TargetType::Prompt);
    }
}
