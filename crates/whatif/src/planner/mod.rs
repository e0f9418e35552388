//! Prompt planning: local validation plus an iterative enhancement loop
//! driven by a text model.
//!
//! The loop is strictly sequential. Each attempt asks the model to rewrite
//! the candidate, scores the rewrite, and stops as soon as the score reaches
//! the configured threshold. Below the threshold the model proposes
//! suggestions, which are folded into the next candidate. Provider failures
//! never escape: the plan falls back to the last good candidate with a
//! length-based confidence.

mod prompts;

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};

use crate::config::PlannerConfig;
use crate::model::{Generation, GenerationType, Language};
use crate::provider::{ProviderError, TextModel, TextRequest, TextTask};
use crate::sanitize::{sanitize_for_prompt, truncate_for_log};
use crate::text::{detect_language, validate_prompt_text, PromptValidationError, MAX_PROMPT_CHARS};

static RE_SCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?(?:\d+(?:\.\d+)?|\.\d+)").unwrap());
static RE_LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)]|\(\d+\))\s*").unwrap());

/// Most suggestions kept from one reply.
const MAX_SUGGESTIONS: usize = 4;

/// Result of planning a new generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPlan {
    pub original_prompt: String,
    pub enhanced_prompt: String,
    pub confidence: f64,
    pub suggestions: Vec<String>,
    pub language: Language,
    pub attempts: u32,
    /// The text model failed and the plan used the heuristic confidence.
    pub used_fallback: bool,
}

/// Result of planning a refinement of a completed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementPlan {
    pub refined_prompt: String,
    pub improvements: Vec<String>,
    pub language: Language,
}

const IMPROVEMENT_KEYWORDS: &[(&[&str], &str)] = &[
    (&["more", "additional"], "Added more detail"),
    (&["better", "improved"], "Enhanced quality"),
    (&["different", "change"], "Modified style or approach"),
    (&["color", "lighting"], "Adjusted visual elements"),
];

const GENERAL_REFINEMENT: &str = "General refinement applied";

pub struct PromptPlanner {
    text_model: Arc<dyn TextModel>,
    config: PlannerConfig,
}

impl PromptPlanner {
    pub fn new(text_model: Arc<dyn TextModel>, config: PlannerConfig) -> Self {
        Self { text_model, config }
    }

    /// Validates `prompt` and runs the enhancement loop for `media_type`.
    pub async fn plan_generation(
        &self,
        prompt: &str,
        media_type: GenerationType,
    ) -> Result<GenerationPlan, PromptValidationError> {
        validate_prompt_text(prompt)?;

        let original = prompt.trim().to_string();
        let language = detect_language(&original);
        let span = tracing::info_span!(
            "plan_generation",
            media_type = %media_type,
            language = %language,
            prompt = %truncate_for_log(&original),
        );

        let plan = self
            .enhance_loop(&original, media_type)
            .instrument(span)
            .await;

        Ok(GenerationPlan {
            original_prompt: original,
            language,
            ..plan
        })
    }

    async fn enhance_loop(&self, original: &str, media_type: GenerationType) -> GenerationPlan {
        let max_attempts = self.config.max_attempts.max(1);
        let mut candidate = original.to_string();
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, "Enhancing prompt");

            let enhanced = match self.enhance(&candidate, media_type).await {
                Ok(text) => text,
                Err(e) => return fallback(original, &candidate, attempts, &e),
            };

            let score = match self.evaluate(&enhanced, media_type).await {
                Ok(score) => score,
                Err(e) => return fallback(original, &enhanced, attempts, &e),
            };
            debug!(attempt = attempts, score, "Scored enhanced prompt");

            if score >= self.config.confidence_threshold {
                info!(attempts, score, "Prompt reached confidence threshold");
                return plan(original, enhanced, score, Vec::new(), attempts);
            }

            let suggestions = match self.suggest(&enhanced, media_type).await {
                Ok(list) => list,
                Err(e) => return fallback(original, &enhanced, attempts, &e),
            };

            if attempts >= max_attempts {
                info!(attempts, score, "Attempts exhausted below threshold");
                return plan(original, enhanced, score, suggestions, attempts);
            }

            candidate = match self.apply_suggestions(&enhanced, &suggestions).await {
                Ok(text) => text,
                Err(e) => return fallback(original, &enhanced, attempts, &e),
            };
        }
    }

    async fn ask(&self, task: TextTask, subject: &str, prompt: String) -> Result<String, ProviderError> {
        let request = TextRequest {
            task,
            system: prompts::SYSTEM.to_string(),
            prompt,
            subject: subject.to_string(),
            temperature: Some(if task == TextTask::Evaluate { 0.0 } else { 0.7 }),
            max_output_tokens: Some(if task == TextTask::Evaluate { 16 } else { 512 }),
        };
        self.text_model.complete(&request).await
    }

    async fn enhance(&self, candidate: &str, media_type: GenerationType) -> Result<String, ProviderError> {
        let safe = sanitize_for_prompt(candidate);
        let reply = self
            .ask(TextTask::Enhance, candidate, prompts::enhance(&safe, media_type))
            .await?;
        clean_prompt_reply(&reply)
    }

    async fn evaluate(&self, candidate: &str, media_type: GenerationType) -> Result<f64, ProviderError> {
        let safe = sanitize_for_prompt(candidate);
        let reply = self
            .ask(TextTask::Evaluate, candidate, prompts::evaluate(&safe, media_type))
            .await?;
        parse_score(&reply)
    }

    async fn suggest(&self, candidate: &str, media_type: GenerationType) -> Result<Vec<String>, ProviderError> {
        let safe = sanitize_for_prompt(candidate);
        let reply = self
            .ask(TextTask::Suggest, candidate, prompts::suggest(&safe, media_type))
            .await?;
        Ok(parse_suggestions(&reply))
    }

    async fn apply_suggestions(&self, candidate: &str, suggestions: &[String]) -> Result<String, ProviderError> {
        if suggestions.is_empty() {
            return Ok(candidate.to_string());
        }
        let safe = sanitize_for_prompt(candidate);
        let safe_suggestions: Vec<String> = suggestions.iter().map(|s| sanitize_for_prompt(s)).collect();
        let reply = self
            .ask(
                TextTask::ApplySuggestions,
                candidate,
                prompts::apply_suggestions(&safe, &safe_suggestions),
            )
            .await?;
        clean_prompt_reply(&reply)
    }

    /// Builds a refined prompt from a completed generation plus user
    /// guidance. Purely local; the enhancement happens when the refinement
    /// generation itself is planned.
    pub fn plan_refinement(
        &self,
        original: &Generation,
        original_prompt_text: &str,
        guidance: &str,
    ) -> Result<RefinementPlan, PromptValidationError> {
        validate_prompt_text(guidance)?;

        let guidance = guidance.trim();
        let mut addition = format!("Refinement: {}", guidance);
        if let Some(note) = original
            .alignment_feedback
            .as_ref()
            .and_then(|f| f.note.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            addition.push_str(&format!(". Address feedback: {}", note));
        }

        // The original text gives way first so the guidance always survives the cap.
        let room = MAX_PROMPT_CHARS.saturating_sub(addition.chars().count() + 2);
        let base: String = original_prompt_text
            .trim()
            .trim_end_matches('.')
            .chars()
            .take(room)
            .collect();
        let base = base.trim_end();
        let refined = if base.is_empty() {
            addition
        } else {
            format!("{}. {}", base, addition)
        };
        let refined: String = refined.chars().take(MAX_PROMPT_CHARS).collect();

        let words = crate::text::tokenize(guidance);
        let mut improvements: Vec<String> = IMPROVEMENT_KEYWORDS
            .iter()
            .filter(|(keywords, _)| words.iter().any(|w| keywords.contains(&w.as_str())))
            .map(|(_, label)| label.to_string())
            .collect();
        if improvements.is_empty() {
            improvements.push(GENERAL_REFINEMENT.to_string());
        }

        Ok(RefinementPlan {
            language: detect_language(&refined),
            refined_prompt: refined,
            improvements,
        })
    }
}

fn plan(
    original: &str,
    enhanced: String,
    confidence: f64,
    suggestions: Vec<String>,
    attempts: u32,
) -> GenerationPlan {
    GenerationPlan {
        original_prompt: original.to_string(),
        enhanced_prompt: enhanced,
        confidence,
        suggestions,
        language: Language::Unknown,
        attempts,
        used_fallback: false,
    }
}

fn fallback(original: &str, last_good: &str, attempts: u32, error: &ProviderError) -> GenerationPlan {
    warn!(attempts, error = %error, "Text model failed; using last good prompt");
    GenerationPlan {
        confidence: heuristic_confidence(last_good),
        used_fallback: true,
        ..plan(original, last_good.to_string(), 0.0, Vec::new(), attempts)
    }
}

/// Length-based confidence used when the text model is unavailable.
pub fn heuristic_confidence(text: &str) -> f64 {
    (0.3 + text.chars().count() as f64 / 200.0).min(1.0)
}

/// Extracts the first decimal number from a score reply, clamped to `[0, 1]`.
pub fn parse_score(reply: &str) -> Result<f64, ProviderError> {
    let m = RE_SCORE
        .find(reply)
        .ok_or_else(|| ProviderError::Parse(format!("no score in reply '{}'", truncate_for_log(reply))))?;
    let value: f64 = m
        .as_str()
        .parse()
        .map_err(|_| ProviderError::Parse(format!("bad score '{}'", m.as_str())))?;
    Ok(value.clamp(0.0, 1.0))
}

/// Splits a suggestion reply into items, dropping list markers and blanks.
pub fn parse_suggestions(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(|line| RE_LIST_MARKER.replace(line, "").trim().to_string())
        // Lead-in lines such as "Suggestions:" are not suggestions.
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Strips wrapping quotes and labels models like to add, and caps length.
fn clean_prompt_reply(reply: &str) -> Result<String, ProviderError> {
    let mut text = reply.trim();
    for label in ["Enhanced prompt:", "Prompt:", "Revised prompt:"] {
        if let Some(rest) = text.strip_prefix(label) {
            text = rest.trim();
        }
    }
    let text = text.trim_matches(|c| c == '"' || c == '\'' || c == '`').trim();
    if text.is_empty() {
        return Err(ProviderError::Parse("empty prompt in reply".to_string()));
    }
    Ok(text.chars().take(MAX_PROMPT_CHARS).collect())
}
