#[cfg(test)]
mod tests;

use serde_json::{Map, Value};

/// Context fields that must be known before tailored advice is possible.
/// Only the crop is mandatory; region and season can be asked for later.
const CRITICAL: &[&str] = &["crop"];

const KNOWN_CROPS: &[&str] = &[
    "rice", "wheat", "corn", "maize", "soy", "soybean", "cotton", "sorghum",
];

/// Supported US states, full name to abbreviation. The underlying model
/// data currently covers California and Texas only.
const US_STATES: &[(&str, &str)] = &[("california", "CA"), ("texas", "TX")];

const SPRING_HINTS: &[&str] = &["spring", "march", "april", "may"];
const FALL_HINTS: &[&str] = &["fall", "autumn", "sept", "oct"];

/// Result of running context extraction over one message
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContext {
    /// Merged context after heuristic extraction
    pub context: Map<String, Value>,
    /// Critical fields that are still unknown
    pub missing: Vec<String>,
    /// Follow-up question to ask the user, when something is missing
    pub followup: Option<String>,
}

/// Detect crop, region, and season mentions in `message` and merge them
/// into `context` without overwriting fields the user already provided
#[inline]
pub fn extract(message: &str, context: &Map<String, Value>) -> ExtractedContext {
    let mut out = context.clone();
    let msg = message.to_lowercase();

    for crop in KNOWN_CROPS {
        if msg.contains(crop) && !has_value(&out, "crop") {
            out.insert("crop".to_string(), Value::String((*crop).to_string()));
        }
    }

    for (name, abbr) in US_STATES {
        if msg.contains(name) && !has_value(&out, "region") {
            out.insert("region".to_string(), Value::String(title_case(name)));
            out.insert("state".to_string(), Value::String((*abbr).to_string()));
            break;
        }
    }

    if SPRING_HINTS.iter().any(|hint| msg.contains(hint)) && !has_value(&out, "season") {
        out.insert("season".to_string(), Value::String("spring".to_string()));
    }
    if FALL_HINTS.iter().any(|hint| msg.contains(hint)) && !has_value(&out, "season") {
        out.insert("season".to_string(), Value::String("fall".to_string()));
    }

    let missing = find_missing(&out);
    let followup = next_followup(&missing);

    ExtractedContext {
        context: out,
        missing,
        followup,
    }
}

/// Which critical fields are still absent or empty
fn find_missing(context: &Map<String, Value>) -> Vec<String> {
    CRITICAL
        .iter()
        .filter(|field| !has_value(context, field))
        .map(|field| (*field).to_string())
        .collect()
}

/// The next clarifying question, driven by the first missing field
fn next_followup(missing: &[String]) -> Option<String> {
    let first = missing.first()?;
    match first.as_str() {
        "crop" => Some("Which crop are you asking about?".to_string()),
        _ => None,
    }
}

/// A field counts as present only when it holds a non-empty string or any
/// non-null, non-string value
fn has_value(context: &Map<String, Value>, field: &str) -> bool {
    match context.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Fetch a context field as a lowercase string, when present
#[inline]
pub fn get_str<'a>(context: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    context
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
