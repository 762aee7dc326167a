use super::*;
use anyhow::anyhow;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use crate::config::Config;
use crate::documents::SourceDocument;

/// Embedder with a call counter, returning a fixed query vector
struct StubEmbedder {
    calls: AtomicUsize,
}

impl StubEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl EmbeddingProvider for StubEmbedder {
    fn model(&self) -> &str {
        "stub-embed"
    }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.contains("rice") {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![0.0, 1.0])
        }
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Completer that records the messages it was given
struct RecordingCompleter {
    reply: String,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl RecordingCompleter {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn last_messages(&self) -> Vec<ChatMessage> {
        self.seen
            .lock()
            .expect("should lock")
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

impl CompletionProvider for RecordingCompleter {
    fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        self.seen
            .lock()
            .expect("should lock")
            .push(messages.to_vec());
        Ok(self.reply.clone())
    }
}

struct FailingCompleter;

impl CompletionProvider for FailingCompleter {
    fn complete(&self, _messages: &[ChatMessage]) -> anyhow::Result<String> {
        Err(anyhow!("model overloaded"))
    }
}

struct PipelineFixture {
    pipeline: ChatPipeline,
    embedder: Arc<StubEmbedder>,
    completer: Arc<RecordingCompleter>,
    _dirs: Vec<TempDir>,
}

fn build_fixture(index_chunks: &[(&str, &str)]) -> PipelineFixture {
    let index_dir = TempDir::new().expect("should create index dir");
    let docs_dir = TempDir::new().expect("should create docs dir");
    let weather_dir = TempDir::new().expect("should create weather dir");

    let mut config = Config::default();
    config.paths.docs_dir = Some(docs_dir.path().to_path_buf());
    config.paths.weather_dir = Some(weather_dir.path().to_path_buf());

    let embedder = Arc::new(StubEmbedder::new());
    let completer = Arc::new(RecordingCompleter::new("Here is my advice."));

    let store = IndexStore::empty(index_dir.path(), "stub-embed");
    if !index_chunks.is_empty() {
        let documents: Vec<SourceDocument> = index_chunks
            .iter()
            .map(|(path, content)| SourceDocument::new(PathBuf::from(path), *content))
            .collect();
        store
            .rebuild(&documents, &config.retrieval, embedder.as_ref())
            .expect("should rebuild");
        embedder.calls.store(0, Ordering::SeqCst);
    }

    let pipeline = ChatPipeline::new(
        &config,
        Arc::new(store),
        Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
        Arc::clone(&completer) as Arc<dyn CompletionProvider>,
    );

    PipelineFixture {
        pipeline,
        embedder,
        completer,
        _dirs: vec![index_dir, docs_dir, weather_dir],
    }
}

#[tokio::test]
async fn answer_appends_followup_when_crop_is_missing() {
    let fixture = build_fixture(&[]);

    let outcome = fixture
        .pipeline
        .answer("how do I improve my soil?", Map::new(), &[])
        .await
        .expect("should answer");

    assert!(outcome.reply.starts_with("Here is my advice."));
    assert!(outcome.reply.contains("Which crop are you asking about?"));
    assert_eq!(
        outcome.followup.as_deref(),
        Some("Which crop are you asking about?")
    );
    assert_eq!(
        outcome.sections.assumptions,
        Some(json!({"missing": ["crop"]}))
    );
}

#[tokio::test]
async fn answer_without_followup_when_context_is_complete() {
    let fixture = build_fixture(&[]);

    let outcome = fixture
        .pipeline
        .answer("rice in texas", Map::new(), &[])
        .await
        .expect("should answer");

    assert_eq!(outcome.reply, "Here is my advice.");
    assert!(outcome.followup.is_none());
    assert_eq!(outcome.context.get("crop"), Some(&json!("rice")));
    assert_eq!(outcome.context.get("region"), Some(&json!("Texas")));
}

#[tokio::test]
async fn empty_index_skips_retrieval_entirely() {
    let fixture = build_fixture(&[]);

    let outcome = fixture
        .pipeline
        .answer("rice in texas", Map::new(), &[])
        .await
        .expect("should answer");

    assert_eq!(fixture.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.sections.rag_insights, Some(vec![]));
    assert_eq!(outcome.sections.sources, Some(vec![]));
}

#[tokio::test]
async fn retrieved_chunks_feed_sections_and_prompt() {
    let fixture = build_fixture(&[
        ("rice.md", "rice thrives in flooded paddies"),
        ("wheat.md", "wheat prefers cooler weather"),
    ]);

    let outcome = fixture
        .pipeline
        .answer("tell me about rice", Map::new(), &[])
        .await
        .expect("should answer");

    let insights = outcome
        .sections
        .rag_insights
        .as_ref()
        .expect("should have insights");
    assert!(!insights.is_empty());
    assert_eq!(
        insights[0]["content"],
        json!("rice thrives in flooded paddies")
    );
    assert_eq!(insights[0]["metadata"]["source"], json!("rice.md"));

    let messages = fixture.completer.last_messages();
    assert_eq!(messages[0].role, "system");
    let prompt = &messages.last().expect("should have user message").content;
    assert!(prompt.contains("rice thrives in flooded paddies"));
    assert!(prompt.contains("User question: tell me about rice"));
}

#[tokio::test]
async fn simulation_runs_only_with_crop_and_region() {
    let fixture = build_fixture(&[]);

    let outcome = fixture
        .pipeline
        .answer("rice in texas", Map::new(), &[])
        .await
        .expect("should answer");
    let csm = outcome.sections.csm_results.expect("should have results");
    assert!(csm.get("sim_id").is_some());

    let outcome = fixture
        .pipeline
        .answer("tell me about rice", Map::new(), &[])
        .await
        .expect("should answer");
    let csm = outcome.sections.csm_results.expect("should have results");
    assert!(csm.get("note").is_some());
}

#[tokio::test]
async fn history_turns_are_forwarded_to_the_model() {
    let fixture = build_fixture(&[]);

    let history = vec![HistoryTurn {
        user: "what about cotton?".to_string(),
        bot: "Cotton needs a long frost-free season.".to_string(),
    }];

    fixture
        .pipeline
        .answer("and rice in texas?", Map::new(), &history)
        .await
        .expect("should answer");

    let messages = fixture.completer.last_messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[1].role, "user");
    assert_eq!(messages[1].content, "what about cotton?");
    assert_eq!(messages[2].role, "assistant");
}

#[tokio::test]
async fn session_context_carries_between_calls() {
    let fixture = build_fixture(&[]);

    let first = fixture
        .pipeline
        .answer("I grow rice", Map::new(), &[])
        .await
        .expect("should answer");

    // Second turn reuses the stored context; crop is no longer missing
    let second = fixture
        .pipeline
        .answer("what about irrigation in texas?", first.context, &[])
        .await
        .expect("should answer");

    assert!(second.followup.is_none());
    assert_eq!(second.context.get("crop"), Some(&json!("rice")));
    assert_eq!(second.context.get("region"), Some(&json!("Texas")));
}

#[tokio::test]
async fn completion_failure_propagates_as_provider_error() {
    let fixture = build_fixture(&[]);
    let config = Config::default();

    let pipeline = ChatPipeline::new(
        &config,
        Arc::new(IndexStore::empty(
            fixture.pipeline.store().dir(),
            "stub-embed",
        )),
        Arc::clone(&fixture.embedder) as Arc<dyn EmbeddingProvider>,
        Arc::new(FailingCompleter),
    );

    let result = pipeline.answer("rice in texas", Map::new(), &[]).await;
    assert!(matches!(result, Err(HolosError::Provider(_))));
}
