
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::pipeline::context::get_str;

/// Columns treated as location identifiers when counting region matches
const REGION_COLUMNS: &[&str] = &["county", "region", "state", "zip", "zipcode"];

/// Summary of one CSV dataset, serialized into the chat response sections
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub summary: Option<String>,
    pub dataset: Option<String>,
    pub rows: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_rows: Option<u64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub numeric_summary: BTreeMap<String, ColumnStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Describe-style statistics for a numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub count: u64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Reads and summarizes CSV datasets stored under the docs tree
#[derive(Debug, Clone)]
pub struct CsvEngine {
    dir: PathBuf,
}

impl CsvEngine {
    #[inline]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Summarize the dataset best matching the conversation context:
    /// row/column counts, a region-matching row count when a location
    /// column exists, and describe statistics for numeric columns
    #[inline]
    pub fn summarize(&self, context: &Map<String, Value>) -> DatasetSummary {
        let Some(path) = self.pick_file(context) else {
            return DatasetSummary {
                summary: Some("No CSV datasets found.".to_string()),
                ..DatasetSummary::default()
            };
        };

        debug!("Summarizing dataset {}", path.display());

        match summarize_file(&path, context) {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Failed to summarize {}: {}", path.display(), e);
                DatasetSummary {
                    dataset: Some(path.display().to_string()),
                    error: Some(format!("Failed to read CSV: {}", e)),
                    ..DatasetSummary::default()
                }
            }
        }
    }

    /// Choose the CSV to read: prefer a crop/region subdirectory when one
    /// exists, then a file named after the crop, then the first file in
    /// path order
    fn pick_file(&self, context: &Map<String, Value>) -> Option<PathBuf> {
        let crop = get_str(context, "crop").map(str::to_lowercase);
        let region = get_str(context, "region").map(str::to_lowercase);

        let mut search_dir = self.dir.clone();
        match (&crop, &region) {
            (Some(crop), Some(region)) => {
                search_dir = search_dir.join(crop).join(region);
            }
            (Some(crop), None) => {
                search_dir = search_dir.join(crop);
            }
            _ => {}
        }
        if !search_dir.exists() {
            search_dir = self.dir.clone();
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&search_dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return None;
        }

        if let Some(crop) = &crop {
            let by_crop = files.iter().find(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.to_lowercase().contains(crop))
            });
            if let Some(path) = by_crop {
                return Some(path.clone());
            }
        }

        files.into_iter().next()
    }
}

fn summarize_file(path: &Path, context: &Map<String, Value>) -> anyhow::Result<DatasetSummary> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let region = get_str(context, "region").map(str::to_lowercase);
    let region_column = headers.iter().position(|column| {
        REGION_COLUMNS
            .iter()
            .any(|known| column.eq_ignore_ascii_case(known))
    });

    let mut rows: u64 = 0;
    let mut region_rows: u64 = 0;
    // Numeric columns start as candidates and are disqualified by the first
    // non-numeric, non-empty value
    let mut numeric: Vec<Option<Vec<f64>>> = vec![Some(Vec::new()); headers.len()];

    for record in reader.records() {
        let record = record?;
        rows += 1;

        if let (Some(col), Some(region)) = (region_column, &region) {
            if record
                .get(col)
                .is_some_and(|value| value.to_lowercase().contains(region))
            {
                region_rows += 1;
            }
        }

        for (i, value) in record.iter().enumerate() {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Some(slot) = numeric.get_mut(i) else {
                continue;
            };
            match trimmed.parse::<f64>() {
                Ok(parsed) => {
                    if let Some(values) = slot {
                        values.push(parsed);
                    }
                }
                Err(_) => *slot = None,
            }
        }
    }

    let mut numeric_summary = BTreeMap::new();
    for (column, values) in headers.iter().zip(numeric) {
        let Some(values) = values else { continue };
        if values.is_empty() {
            continue;
        }
        numeric_summary.insert(column.clone(), column_stats(&values));
    }

    Ok(DatasetSummary {
        summary: None,
        dataset: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        rows,
        columns: headers,
        region_rows: (region_column.is_some() && region.is_some()).then_some(region_rows),
        numeric_summary,
        error: None,
    })
}

fn column_stats(values: &[f64]) -> ColumnStats {
    let count = values.len() as u64;
    let mean = values.iter().sum::<f64>() / values.len() as f64;

    let variance = if values.len() > 1 {
        values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / (values.len() - 1) as f64
    } else {
        0.0
    };

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    ColumnStats {
        count,
        mean,
        std: variance.sqrt(),
        min,
        max,
    }
}
