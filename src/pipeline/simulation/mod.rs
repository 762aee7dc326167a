
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Inputs to a crop-model run, taken from the conversation context.
/// Field order is fixed so the serialized form (and thus the cache key) is
/// canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub crop: Option<String>,
    pub region: Option<String>,
    pub season: Option<String>,
    pub soil: Option<String>,
    pub water: Option<String>,
    pub planting_method: Option<String>,
}

/// Output of a crop-model run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub sim_id: String,
    pub yield_kg_ha: u32,
    pub planting_date: String,
    pub maturity_date: String,
    pub irrigation_mm: u32,
    pub ratoon_possible: bool,
    pub notes: String,
}

/// Stand-in for a crop simulation model such as DSSAT or APSIM.
///
/// Results are deterministic for a given parameter set and memoized by the
/// SHA-256 of the canonical parameter JSON, so repeated runs with the same
/// inputs are free.
#[derive(Debug, Default)]
pub struct CropSimulator {
    cache: Mutex<HashMap<String, SimulationResult>>,
}

impl CropSimulator {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn run(&self, params: &SimulationParams) -> SimulationResult {
        let key = cache_key(params);

        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(result) = cache.get(&key) {
            debug!("Simulation cache hit for {}", &key[..8.min(key.len())]);
            return result.clone();
        }

        let result = simulate(&key);
        cache.insert(key, result.clone());
        result
    }
}

fn cache_key(params: &SimulationParams) -> String {
    // Struct field order fixes the JSON key order, making the digest stable
    let canonical = serde_json::to_string(params).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{:x}", digest)
}

/// Placeholder results standing in for real model output files
fn simulate(key: &str) -> SimulationResult {
    SimulationResult {
        sim_id: key.get(..8).unwrap_or(key).to_string(),
        yield_kg_ha: 7800,
        planting_date: "auto".to_string(),
        maturity_date: "auto+120d".to_string(),
        irrigation_mm: 900,
        ratoon_possible: true,
        notes: "Stub model run. Wire a real crop simulator into the simulation module."
            .to_string(),
    }
}
