//! Helpers for sanitizing untrusted text before it reaches a model prompt,
//! an error message or a tracing span.

/// Longest provider error body kept in an error message.
pub const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Longest prompt excerpt written to logs and span fields.
pub const MAX_LOG_EXCERPT: usize = 60;

/// Breaks up chat-template control sequences so user text embedded in a
/// model prompt cannot impersonate system or assistant turns.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("<s>", "< s >")
        .replace("</s>", "< / s >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("<<SYS>>", "< < SYS > >")
        .replace("<</SYS>>", "< < / SYS > >")
}

/// Truncates an upstream error body so a misbehaving provider cannot flood
/// our logs or API responses.
pub fn truncate_error_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        Some((cut, _)) => format!("{}... (truncated)", &body[..cut]),
        None => body.to_string(),
    }
}

/// Returns a short single-line excerpt of prompt text for span fields.
///
/// Prompts are user content; logs only ever carry the first few words.
pub fn truncate_for_log(text: &str) -> String {
    let single_line: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let trimmed = single_line.trim();
    match trimmed.char_indices().nth(MAX_LOG_EXCERPT) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
