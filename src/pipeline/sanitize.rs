//! Sanitizing of model-produced JSON text.
//!
//! ## Why is this necessary?
//!
//! Even when prompted to answer with JSON only, language models occasionally
//! return output that is *semantically correct* but *structurally wrapped* —
//! for example:
//!
//! - The payload inside ` ```json ... ``` ` fences despite the prompt saying
//!   "no markdown"
//! - A polite sentence before or after the JSON object
//! - Windows-style `\r\n` line endings or a stray BOM
//!
//! These rules are cheap, deterministic string fixes applied before parsing.
//! Keeping them here rather than in the prompts means the prompts stay focused
//! on *what to produce*, not on formatting edge-cases, and each rule is
//! independently testable.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```\s*$").unwrap());

/// Strip outer code fences (` ```json … ``` `) if the whole payload is fenced.
pub fn strip_code_fences(input: &str) -> &str {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(input).trim(),
        None => input.trim(),
    }
}

/// Locate the outermost JSON value of the given delimiters inside free text.
///
/// Models sometimes preface the payload with prose; the original behaviour is
/// to take everything from the first opening delimiter to the last closing
/// one and try that.
fn extract_delimited<'a>(input: &'a str, open: char, close: char) -> Option<&'a str> {
    let start = input.find(open)?;
    let end = input.rfind(close)?;
    if end > start {
        Some(&input[start..=end])
    } else {
        None
    }
}

/// Parse model output expected to be a JSON object, tolerating fences and
/// surrounding prose.
pub fn parse_object(raw: &str) -> Option<serde_json::Value> {
    parse_with(raw, '{', '}').filter(serde_json::Value::is_object)
}

/// Parse model output expected to be a JSON array, tolerating fences and
/// surrounding prose.
pub fn parse_array(raw: &str) -> Option<serde_json::Value> {
    parse_with(raw, '[', ']').filter(serde_json::Value::is_array)
}

fn parse_with(raw: &str, open: char, close: char) -> Option<serde_json::Value> {
    let cleaned = strip_code_fences(raw)
        .trim_start_matches('\u{FEFF}')
        .replace("\r\n", "\n");

    if let Ok(v) = serde_json::from_str(&cleaned) {
        return Some(v);
    }

    let inner = extract_delimited(&cleaned, open, close)?;
    serde_json::from_str(inner).ok()
}
