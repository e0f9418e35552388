//! Instruction templates for the enhancement loop. Inputs must already be
//! passed through `sanitize_for_prompt`.

use crate::model::GenerationType;

pub(super) const SYSTEM: &str = "You help people turn short \"what if\" ideas into prompts for \
image and video generation models. Keep the user's idea intact, stay family friendly, \
and answer with exactly what is asked for and nothing else.";

fn media_focus(media_type: GenerationType) -> &'static str {
    match media_type {
        GenerationType::Image => {
            "a still image: describe composition, lighting, color palette, artistic style and mood"
        }
        GenerationType::Video => {
            "a short video clip of a few seconds: describe camera motion, pacing and how the scene progresses"
        }
    }
}

pub(super) fn enhance(candidate: &str, media_type: GenerationType) -> String {
    format!(
        "Rewrite the idea below as a single vivid prompt for {}.\n\
         Reply with the prompt only.\n\nIdea:\n{}",
        media_focus(media_type),
        candidate
    )
}

pub(super) fn evaluate(candidate: &str, media_type: GenerationType) -> String {
    format!(
        "Rate how clear, specific and ready-to-generate this prompt is for {}.\n\
         Reply with a single number between 0 and 1.\n\nPrompt:\n{}",
        media_focus(media_type),
        candidate
    )
}

pub(super) fn suggest(candidate: &str, media_type: GenerationType) -> String {
    format!(
        "List 2 to 4 short, concrete suggestions that would make this prompt better for {}.\n\
         One suggestion per line.\n\nPrompt:\n{}",
        media_focus(media_type),
        candidate
    )
}

pub(super) fn apply_suggestions(candidate: &str, suggestions: &[String]) -> String {
    let list: String = suggestions.iter().map(|s| format!("- {}\n", s)).collect();
    format!(
        "Revise the prompt below by applying these suggestions:\n{}\n\
         Reply with the revised prompt only.\n\nPrompt:\n{}",
        list, candidate
    )
}
