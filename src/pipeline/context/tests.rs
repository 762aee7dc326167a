use super::*;
use serde_json::json;

fn empty_context() -> Map<String, Value> {
    Map::new()
}

fn context_with(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

#[test]
fn detects_crop_and_state() {
    let result = extract("When should I plant rice in Texas?", &empty_context());

    assert_eq!(result.context.get("crop"), Some(&json!("rice")));
    assert_eq!(result.context.get("region"), Some(&json!("Texas")));
    assert_eq!(result.context.get("state"), Some(&json!("TX")));
    assert!(result.missing.is_empty());
    assert!(result.followup.is_none());
}

#[test]
fn detects_season_keywords() {
    let spring = extract("thinking about an april planting of wheat", &empty_context());
    assert_eq!(spring.context.get("season"), Some(&json!("spring")));

    let fall = extract("wheat for the autumn window", &empty_context());
    assert_eq!(fall.context.get("season"), Some(&json!("fall")));
}

#[test]
fn existing_context_is_not_overwritten() {
    let prior = context_with(&[("crop", json!("cotton")), ("season", json!("fall"))]);
    let result = extract("what about rice in california this spring", &prior);

    assert_eq!(result.context.get("crop"), Some(&json!("cotton")));
    assert_eq!(result.context.get("season"), Some(&json!("fall")));
    // Region was free, so the state mention still lands
    assert_eq!(result.context.get("region"), Some(&json!("California")));
}

#[test]
fn missing_crop_produces_followup() {
    let result = extract("how is the weather in texas", &empty_context());

    assert_eq!(result.missing, vec!["crop".to_string()]);
    assert_eq!(
        result.followup.as_deref(),
        Some("Which crop are you asking about?")
    );
}

#[test]
fn empty_string_fields_count_as_missing() {
    let prior = context_with(&[("crop", json!(""))]);
    let result = extract("tell me about irrigation", &prior);

    assert_eq!(result.missing, vec!["crop".to_string()]);
}

#[test]
fn detection_is_case_insensitive() {
    let result = extract("RICE yields in CALIFORNIA", &empty_context());

    assert_eq!(result.context.get("crop"), Some(&json!("rice")));
    assert_eq!(result.context.get("state"), Some(&json!("CA")));
}

#[test]
fn unknown_regions_are_ignored() {
    let result = extract("cotton fields in kansas", &empty_context());

    assert_eq!(result.context.get("crop"), Some(&json!("cotton")));
    assert!(result.context.get("region").is_none());
}

#[test]
fn shorter_crop_names_match_first() {
    // "soy" precedes "soybean" in the crop list, so it wins on substring match
    let result = extract("soybean fields", &empty_context());
    assert_eq!(result.context.get("crop"), Some(&json!("soy")));
}

#[test]
fn get_str_skips_blank_and_non_string_values() {
    let context = context_with(&[
        ("crop", json!("rice")),
        ("blank", json!("  ")),
        ("num", json!(4)),
    ]);

    assert_eq!(get_str(&context, "crop"), Some("rice"));
    assert_eq!(get_str(&context, "blank"), None);
    assert_eq!(get_str(&context, "num"), None);
    assert_eq!(get_str(&context, "absent"), None);
}
