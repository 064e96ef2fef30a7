//! Turns the model's raw output into display text.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// A space followed by a step number such as ` 2.`.
///
/// Also matches decimals like ` 12.5`; those get split too.
static STEP_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" (\d+\.)").expect("Invalid step marker regex"));

/// Extracted and reflowed model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    /// Everything the model returned, prompt included.
    pub raw_text: String,
    pub display_text: String,
}

/// Runs the three post-processing steps in order: strip the echoed prompt,
/// cut at the end-of-sequence marker, reflow step numbers.
pub fn format_generation(full_text: &str, prompt: &str, eos_token: &str) -> GenerationResult {
    let continuation = strip_prompt(full_text, prompt);
    let continuation = truncate_at_eos(continuation, eos_token);
    GenerationResult {
        raw_text: full_text.to_string(),
        display_text: reflow_steps(continuation),
    }
}

/// Returns the trimmed text after the prompt.
///
/// Backends are expected to echo the prompt. When one does not, the whole
/// output is kept rather than chopping off a prompt-sized chunk of it.
pub fn strip_prompt<'a>(full_text: &'a str, prompt: &str) -> &'a str {
    match full_text.strip_prefix(prompt) {
        Some(rest) => rest.trim(),
        None => {
            warn!(
                prompt_len = prompt.len(),
                output_len = full_text.len(),
                "generated text does not start with the prompt"
            );
            full_text.trim()
        }
    }
}

/// Drops the first end-of-sequence marker and everything after it.
pub fn truncate_at_eos<'a>(text: &'a str, eos_token: &str) -> &'a str {
    if eos_token.is_empty() {
        return text;
    }
    match text.find(eos_token) {
        Some(end) => &text[..end],
        None => text,
    }
}

/// Puts a blank line before every ` <digits>.` and trims the result.
pub fn reflow_steps(text: &str) -> String {
    STEP_MARKER
        .replace_all(text, "\n\n${1}")
        .trim()
        .to_string()
}
