//! Local text helpers: prompt validation, language detection and summaries.
//!
//! Nothing here calls a provider.

use thiserror::Error;

use crate::model::Language;

/// Maximum prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 2000;

/// Minimum trimmed prompt length in characters.
pub const MIN_PROMPT_CHARS: usize = 3;

/// Prompts this short are checked for vague filler words.
const AMBIGUOUS_MAX_TOKENS: usize = 3;

const AMBIGUOUS_WORDS: &[&str] = &["something", "it", "that", "this", "maybe"];

pub const ERR_EMPTY: &str = "Prompt cannot be empty";
pub const ERR_TOO_LONG: &str = "Prompt cannot exceed 2000 characters";
pub const ERR_TOO_SHORT: &str = "Prompt is too short (minimum 3 characters)";
pub const ERR_AMBIGUOUS: &str =
    "Prompt is too ambiguous; describe the scene or idea you want to see";

/// Prompt text failed one or more validation rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid prompt: {}", errors.join("; "))]
pub struct PromptValidationError {
    pub errors: Vec<String>,
}

/// Checks prompt text against the length and ambiguity rules.
///
/// Returns every violated rule, in a stable order.
pub fn validate_prompt_text(text: &str) -> Result<(), PromptValidationError> {
    let mut errors = Vec::new();
    let trimmed = text.trim();
    let trimmed_len = trimmed.chars().count();

    if trimmed.is_empty() {
        errors.push(ERR_EMPTY.to_string());
    }
    if text.chars().count() > MAX_PROMPT_CHARS {
        errors.push(ERR_TOO_LONG.to_string());
    }
    if trimmed_len < MIN_PROMPT_CHARS {
        errors.push(ERR_TOO_SHORT.to_string());
    }
    if is_ambiguous(trimmed) {
        errors.push(ERR_AMBIGUOUS.to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(PromptValidationError { errors })
    }
}

fn is_ambiguous(text: &str) -> bool {
    let tokens = tokenize(text);
    !tokens.is_empty()
        && tokens.len() <= AMBIGUOUS_MAX_TOKENS
        && tokens.iter().any(|t| AMBIGUOUS_WORDS.contains(&t.as_str()))
}

/// Splits on whitespace, lower-cases, and strips surrounding punctuation.
/// Tokens that are pure punctuation are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

fn is_kana(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309F}'   // hiragana
        | '\u{30A0}'..='\u{30FF}' // katakana
        | '\u{31F0}'..='\u{31FF}' // katakana phonetic extensions
        | '\u{FF66}'..='\u{FF9D}' // halfwidth katakana
    )
}

fn is_cjk_ideograph(c: char) -> bool {
    matches!(c,
        '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
    )
}

/// Heuristic language detection.
///
/// Kana is checked before ideographs because Japanese text mixes both.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(is_kana) {
        return Language::Ja;
    }
    if text.chars().any(is_cjk_ideograph) {
        return Language::ZhCn;
    }
    if text.is_ascii() && text.chars().any(|c| c.is_ascii_alphabetic()) {
        return Language::En;
    }
    Language::Unknown
}

/// Shortens `text` to at most `max_len` characters, cutting at a word
/// boundary and appending `...`.
pub fn generate_prompt_summary(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    if max_len <= 3 {
        return ".".repeat(max_len);
    }

    let budget = max_len - 3;
    let cut: String = text.chars().take(budget).collect();

    // Only back up to a space if the cut landed mid-word.
    let next_is_break = text
        .chars()
        .nth(budget)
        .map(char::is_whitespace)
        .unwrap_or(true);
    let head = if next_is_break {
        cut.as_str()
    } else {
        match cut.rfind(char::is_whitespace) {
            Some(idx) if idx > 0 => &cut[..idx],
            _ => cut.as_str(),
        }
    };

    format!("{}...", head.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors_of(text: &str) -> Vec<String> {
        validate_prompt_text(text).err().map(|e| e.errors).unwrap_or_default()
    }

    #[test]
    fn test_valid_prompt() {
        assert!(validate_prompt_text("what if whales could fly over Tokyo").is_ok());
    }

    #[test]
    fn test_short_prompts_rejected() {
        for text in ["", " ", "ab", "  x  ", "\t\n"] {
            let errors = errors_of(text);
            assert!(
                errors.iter().any(|e| e == ERR_TOO_SHORT),
                "expected too-short for {:?}, got {:?}",
                text,
                errors
            );
        }
        assert!(errors_of("").contains(&ERR_EMPTY.to_string()));
    }

    #[test]
    fn test_long_prompt_rejected() {
        let text = "a".repeat(MAX_PROMPT_CHARS + 1);
        assert_eq!(errors_of(&text), vec![ERR_TOO_LONG.to_string()]);

        let exact = "a".repeat(MAX_PROMPT_CHARS);
        assert!(validate_prompt_text(&exact).is_ok());
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 700 three-byte characters is 2100 bytes but only 700 characters.
        let text = "猫".repeat(700);
        assert!(validate_prompt_text(&text).is_ok());
    }

    #[test]
    fn test_ambiguous_prompts_rejected() {
        for text in ["maybe something", "do it", "this one?", "That thing now"] {
            assert!(
                errors_of(text).contains(&ERR_AMBIGUOUS.to_string()),
                "expected ambiguous for {:?}",
                text
            );
        }
    }

    #[test]
    fn test_longer_prompt_with_filler_is_fine() {
        assert!(validate_prompt_text("what if this city floated in clouds").is_ok());
        assert!(validate_prompt_text("three purple dragons").is_ok());
    }

    #[test]
    fn test_tokenize_strips_punctuation() {
        assert_eq!(tokenize("  Maybe, IT... works! "), vec!["maybe", "it", "works"]);
        assert!(tokenize("?? !!").is_empty());
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("what if the moon were cheese"), Language::En);
        assert_eq!(detect_language("如果猫会飞"), Language::ZhCn);
        assert_eq!(detect_language("もしも猫が空を飛んだら"), Language::Ja);
        assert_eq!(detect_language("カタカナ"), Language::Ja);
        assert_eq!(detect_language("Что если"), Language::Unknown);
        assert_eq!(detect_language(""), Language::Unknown);
        assert_eq!(detect_language("12345 !?"), Language::Unknown);
        assert_eq!(detect_language("café au lait"), Language::Unknown);
    }

    #[test]
    fn test_kana_wins_over_ideographs() {
        assert_eq!(detect_language("東京の猫"), Language::Ja);
        assert_eq!(detect_language("robot 東京 ロボット"), Language::Ja);
    }

    #[test]
    fn test_detect_language_is_deterministic() {
        let inputs = ["hello", "你好", "こんにちは", "😀", "mixed 你好 text"];
        for input in inputs {
            assert_eq!(detect_language(input), detect_language(input));
        }
    }

    #[test]
    fn test_summary_truncates_at_word_boundary() {
        let summary =
            generate_prompt_summary("A very long prompt that exceeds the maximum length", 30);
        assert_eq!(summary, "A very long prompt that...");
        assert!(summary.chars().count() <= 30);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_summary_keeps_short_text() {
        assert_eq!(generate_prompt_summary("short idea", 30), "short idea");
    }

    #[test]
    fn test_summary_cut_on_space_keeps_whole_word() {
        // Character 27 is a space, so the 27-character head is already a whole word.
        let text = "abcdefghijklmnopqrstuvwxyz0 next words here";
        let summary = generate_prompt_summary(text, 30);
        assert_eq!(summary, "abcdefghijklmnopqrstuvwxyz0...");
        assert!(summary.chars().count() <= 30);
    }

    #[test]
    fn test_summary_without_spaces_hard_cuts() {
        let text = "x".repeat(50);
        let summary = generate_prompt_summary(&text, 10);
        assert_eq!(summary, "xxxxxxx...");
    }

    #[test]
    fn test_summary_handles_multibyte() {
        let text = "夢".repeat(40);
        let summary = generate_prompt_summary(&text, 20);
        assert_eq!(summary.chars().count(), 20);
        assert!(summary.ends_with("..."));
    }
}
