use super::*;
use serde_json::json;
use tempfile::TempDir;

fn context_with(entries: &[(&str, &str)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), json!(v)))
        .collect()
}

#[test]
fn region_file_takes_priority() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(temp_dir.path().join("texas.json"), r#"{"temp_c": 31}"#)
        .expect("should write file");
    fs::write(temp_dir.path().join("tx.json"), r#"{"temp_c": 20}"#).expect("should write file");
    fs::write(temp_dir.path().join("default.json"), r#"{"temp_c": 0}"#)
        .expect("should write file");

    let store = WeatherStore::new(temp_dir.path());
    let weather = store.lookup(&context_with(&[("region", "Texas"), ("state", "TX")]));
    assert_eq!(weather, json!({"temp_c": 31}));
}

#[test]
fn falls_back_to_state_then_default() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(temp_dir.path().join("ca.json"), r#"{"temp_c": 18}"#).expect("should write file");
    fs::write(temp_dir.path().join("default.json"), r#"{"temp_c": 10}"#)
        .expect("should write file");

    let store = WeatherStore::new(temp_dir.path());

    let weather = store.lookup(&context_with(&[("region", "Fresno"), ("state", "CA")]));
    assert_eq!(weather, json!({"temp_c": 18}));

    let weather = store.lookup(&context_with(&[("region", "Somewhere")]));
    assert_eq!(weather, json!({"temp_c": 10}));
}

#[test]
fn region_names_are_normalized() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(temp_dir.path().join("rio_grande.json"), r#"{"rain_mm": 4}"#)
        .expect("should write file");

    let store = WeatherStore::new(temp_dir.path());
    let weather = store.lookup(&context_with(&[("region", "Rio Grande")]));
    assert_eq!(weather, json!({"rain_mm": 4}));
}

#[test]
fn invalid_json_is_skipped() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(temp_dir.path().join("texas.json"), "{broken").expect("should write file");
    fs::write(temp_dir.path().join("default.json"), r#"{"temp_c": 7}"#)
        .expect("should write file");

    let store = WeatherStore::new(temp_dir.path());
    let weather = store.lookup(&context_with(&[("region", "Texas")]));
    assert_eq!(weather, json!({"temp_c": 7}));
}

#[test]
fn missing_everything_returns_a_note() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = WeatherStore::new(temp_dir.path());

    let weather = store.lookup(&Map::new());
    assert!(weather.get("note").is_some());
}
