// Chat pipeline module
// Sequences context extraction, retrieval, auxiliary data sources, and
// LLM synthesis for a single chat turn

#[cfg(test)]
mod tests;

pub mod context;
pub mod datasets;
pub mod simulation;
pub mod weather;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::config::Config;
use crate::index::{IndexStore, ScoredChunk};
use crate::pipeline::datasets::{CsvEngine, DatasetSummary};
use crate::pipeline::simulation::{CropSimulator, SimulationParams};
use crate::pipeline::weather::WeatherStore;
use crate::provider::{ChatMessage, CompletionProvider, EmbeddingProvider};
use crate::{HolosError, Result};

const SYSTEM_PROMPT: &str = "You are Holos Agri Assistant. Merge retrieved insights, dataset \
findings, weather context, and crop-model outputs. Provide a concise, practical recommendation \
for a farmer. If inputs are missing, state assumptions and ask ONE clarifying question.";

/// Retrieved snippets are truncated to this many characters in the prompt
const SNIPPET_LIMIT: usize = 500;

/// How many retrieved chunks are surfaced in the response sections
const INSIGHT_LIMIT: usize = 3;

/// A prior exchange supplied by the client for conversational context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub user: String,
    pub bot: String,
}

/// Structured parts of the assistant's answer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssistantSections {
    pub rag_insights: Option<Vec<Value>>,
    pub csv_findings: Option<DatasetSummary>,
    pub weather_context: Option<Value>,
    pub csm_results: Option<Value>,
    pub recommendations: Option<String>,
    pub assumptions: Option<Value>,
    pub sources: Option<Vec<Value>>,
}

/// Everything produced by one pass through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub reply: String,
    pub followup: Option<String>,
    pub sections: AssistantSections,
    /// Updated conversation context, to be stored for the session
    pub context: Map<String, Value>,
}

/// Orchestrates one chat turn over explicitly injected components.
///
/// Stage order mirrors the assistant's data flow: context extraction,
/// document retrieval, dataset summary, weather lookup, conditional crop
/// simulation, then synthesis through the completion provider.
pub struct ChatPipeline {
    store: Arc<IndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionProvider>,
    datasets: CsvEngine,
    weather: WeatherStore,
    simulator: CropSimulator,
    top_k: usize,
}

impl ChatPipeline {
    #[inline]
    pub fn new(
        config: &Config,
        store: Arc<IndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            store,
            embedder,
            completer,
            datasets: CsvEngine::new(config.docs_dir()),
            weather: WeatherStore::new(config.weather_dir()),
            simulator: CropSimulator::new(),
            top_k: config.retrieval.top_k,
        }
    }

    /// The index backing retrieval
    #[inline]
    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Run the full pipeline for one message.
    ///
    /// Provider failures (embedding or completion) propagate as
    /// [`HolosError::Provider`] so the caller can surface them to the user;
    /// missing auxiliary data (datasets, weather) degrades gracefully.
    #[inline]
    pub async fn answer(
        &self,
        message: &str,
        context: Map<String, Value>,
        history: &[HistoryTurn],
    ) -> Result<ChatOutcome> {
        let extracted = context::extract(message, &context);
        debug!(
            "Extracted context: {} fields, {} missing",
            extracted.context.len(),
            extracted.missing.len()
        );

        let docs = self.retrieve(message).await?;

        let dataset = self.datasets.summarize(&extracted.context);
        let weather = self.weather.lookup(&extracted.context);

        let simulation = if can_run_simulation(&extracted.context) {
            Some(self.simulator.run(&SimulationParams::from_context(
                &extracted.context,
            )))
        } else {
            None
        };

        let simulation_value = simulation.as_ref().map(|result| json!(result));
        let user_prompt = build_user_prompt(
            message,
            &extracted.context,
            &dataset,
            &weather,
            simulation_value.as_ref(),
            &docs,
        );

        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
        for turn in history {
            messages.push(ChatMessage::user(turn.user.clone()));
            messages.push(ChatMessage::assistant(turn.bot.clone()));
        }
        messages.push(ChatMessage::user(user_prompt));

        let completer = Arc::clone(&self.completer);
        let mut reply = tokio::task::spawn_blocking(move || completer.complete(&messages))
            .await
            .map_err(|e| HolosError::Other(anyhow::anyhow!("Completion task failed: {e}")))?
            .map_err(|e| HolosError::Provider(format!("Failed to synthesize answer: {e:#}")))?;

        if let Some(followup) = &extracted.followup {
            reply = format!("{reply}\n\nQuick question to tailor the advice: {followup}");
        }

        let sections = AssistantSections {
            rag_insights: Some(docs.iter().take(INSIGHT_LIMIT).map(insight_value).collect()),
            csv_findings: Some(dataset),
            weather_context: Some(weather),
            csm_results: Some(simulation.map_or_else(
                || json!({"note": "Crop model skipped until crop and region are provided."}),
                |result| json!(result),
            )),
            recommendations: None,
            assumptions: Some(json!({"missing": extracted.missing})),
            sources: Some(docs.iter().map(source_value).collect()),
        };

        Ok(ChatOutcome {
            reply,
            followup: extracted.followup,
            sections,
            context: extracted.context,
        })
    }

    async fn retrieve(&self, message: &str) -> Result<Vec<ScoredChunk>> {
        if self.store.is_empty() {
            debug!("Vector index is empty; skipping retrieval");
            return Ok(Vec::new());
        }

        let embedder = Arc::clone(&self.embedder);
        let text = message.to_string();
        let vector = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| HolosError::Other(anyhow::anyhow!("Embedding task failed: {e}")))?
            .map_err(|e| HolosError::Provider(format!("Failed to embed query: {e:#}")))?;

        self.store.query(&vector, self.top_k)
    }
}

impl SimulationParams {
    /// Pull the model inputs out of a conversation context
    #[inline]
    pub fn from_context(context: &Map<String, Value>) -> Self {
        let field =
            |name: &str| context::get_str(context, name).map(str::to_string);

        Self {
            crop: field("crop"),
            region: field("region"),
            season: field("season"),
            soil: field("soil"),
            water: field("water"),
            planting_method: field("planting_method"),
        }
    }
}

/// The crop model only runs once both crop and region are known
fn can_run_simulation(context: &Map<String, Value>) -> bool {
    context::get_str(context, "crop").is_some() && context::get_str(context, "region").is_some()
}

fn build_user_prompt(
    message: &str,
    context: &Map<String, Value>,
    dataset: &DatasetSummary,
    weather: &Value,
    simulation: Option<&Value>,
    docs: &[ScoredChunk],
) -> String {
    let doc_snips = docs
        .iter()
        .map(|doc| format!("- {}", truncate_chars(&doc.chunk.content, SNIPPET_LIMIT)))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "User question: {}\nContext: {}\nDatasets: {}\nWeather: {}\nCrop model: {}\nDocs:\n{}",
        message,
        json!(context),
        json!(dataset),
        weather,
        simulation.map_or_else(|| json!({}), Clone::clone),
        doc_snips
    )
}

fn insight_value(doc: &ScoredChunk) -> Value {
    json!({
        "content": doc.chunk.content,
        "metadata": {
            "source": doc.chunk.source,
            "offset": doc.chunk.offset,
            "score": doc.score,
        },
    })
}

fn source_value(doc: &ScoredChunk) -> Value {
    json!({
        "source": doc.chunk.source,
        "offset": doc.chunk.offset,
    })
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
