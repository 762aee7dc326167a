#[cfg(test)]
mod tests;

use std::fs;
use std::path::PathBuf;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::pipeline::context::get_str;

/// Loads local weather JSON files keyed by region or state.
///
/// Candidate files are tried most-specific first: `<region>.json`,
/// `<state>.json`, then `default.json`. Unparseable candidates are skipped
/// rather than failing the request.
#[derive(Debug, Clone)]
pub struct WeatherStore {
    dir: PathBuf,
}

impl WeatherStore {
    #[inline]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    pub fn lookup(&self, context: &Map<String, Value>) -> Value {
        let mut candidates = Vec::new();

        if let Some(region) = get_str(context, "region") {
            candidates.push(format!("{}.json", normalize(region)));
        }
        if let Some(state) = get_str(context, "state") {
            candidates.push(format!("{}.json", normalize(state)));
        }
        candidates.push("default.json".to_string());

        for candidate in candidates {
            let path = self.dir.join(&candidate);
            if !path.exists() {
                continue;
            }

            match fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<Value>(&content) {
                    Ok(value) => {
                        debug!("Loaded weather data from {}", path.display());
                        return value;
                    }
                    Err(e) => {
                        warn!("Skipping invalid weather file {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Skipping unreadable weather file {}: {}", path.display(), e);
                }
            }
        }

        json!({
            "note": format!(
                "No weather file found; add JSON to {} (region.json or state.json).",
                self.dir.display()
            )
        })
    }
}

fn normalize(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}
