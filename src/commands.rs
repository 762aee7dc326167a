use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::HolosError;
use crate::config::{Config, get_config_dir};
use crate::documents::load_documents;
use crate::index::IndexStore;
use crate::pipeline::ChatPipeline;
use crate::provider::{CompletionProvider, EmbeddingProvider, OpenAiClient};
use crate::server::{self, AppState};

/// Start the HTTP chat server
#[inline]
pub async fn serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = load_config()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.server.validate().context("Invalid server settings")?;

    // Fail fast on provider misconfiguration before doing any index work
    let client = OpenAiClient::new(&config.provider)
        .context("Provider configuration is incomplete")?;

    let store = open_or_build_index(&config, &client)?;

    let client = Arc::new(client);
    let pipeline = ChatPipeline::new(
        &config,
        Arc::new(store),
        Arc::clone(&client) as Arc<dyn EmbeddingProvider>,
        client as Arc<dyn CompletionProvider>,
    );
    let state = AppState::new(Arc::new(pipeline));

    println!(
        "🌐 Serving Holos backend on http://{}:{}",
        config.server.host, config.server.port
    );
    println!("   POST /chat to talk to the assistant, GET / for service info");

    server::serve(&config.server, state).await?;
    Ok(())
}

/// Load the persisted index; a missing index is rebuilt from the docs tree
/// on the spot, a corrupt one is surfaced to the operator untouched
fn open_or_build_index(config: &Config, client: &OpenAiClient) -> Result<IndexStore> {
    let index_dir = config.index_dir();

    match IndexStore::load(&index_dir) {
        Ok(store) => {
            println!(
                "📚 Loaded vector index: {} chunks from {}",
                store.len(),
                index_dir.display()
            );
            Ok(store)
        }
        Err(HolosError::IndexMissing(path)) => {
            info!("No vector index at {}, building from scratch", path.display());
            println!(
                "📭 No vector index found; indexing documents from {}",
                config.docs_dir().display()
            );

            let store = IndexStore::empty(&index_dir, &config.provider.embed_model);
            let documents = load_documents(&config.docs_dir())?;

            if documents.is_empty() {
                println!(
                    "⚠️  No documents found; retrieval will be empty until 'holos rebuild' runs"
                );
            } else {
                let stats = store.rebuild(&documents, &config.retrieval, client)?;
                println!(
                    "✅ Indexed {} chunks from {} documents",
                    stats.chunks, stats.documents
                );
            }

            Ok(store)
        }
        Err(e @ HolosError::IndexCorrupt(_)) => {
            error!("Refusing to start with a corrupt vector index: {}", e);
            println!("❌ {}", e);
            println!("The index was left untouched. Move it aside or run 'holos rebuild' to replace it.");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Rebuild the vector index from the documents directory, atomically
/// replacing the previous snapshot
#[inline]
pub fn rebuild() -> Result<()> {
    let config = load_config()?;

    let client = OpenAiClient::new(&config.provider)
        .context("Provider configuration is incomplete")?;

    let docs_dir = config.docs_dir();
    if !docs_dir.exists() {
        println!("❌ Documents directory does not exist: {}", docs_dir.display());
        println!("Set DOCS_PATH or paths.docs_dir in config.toml to your document tree.");
        return Err(anyhow::anyhow!(
            "documents directory not found: {}",
            docs_dir.display()
        ));
    }

    let documents = load_documents(&docs_dir)?;
    println!(
        "📄 Found {} documents under {}",
        documents.len(),
        docs_dir.display()
    );

    let index_dir = config.index_dir();
    let store = IndexStore::empty(&index_dir, &config.provider.embed_model);

    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(format!("Embedding {} documents...", documents.len()));
    bar.enable_steady_tick(Duration::from_millis(120));

    let result = store.rebuild(&documents, &config.retrieval, &client);
    bar.finish_and_clear();

    let stats = result?;
    println!(
        "✅ Rebuilt vector index at {}: {} chunks from {} documents ({} dimensions)",
        index_dir.display(),
        stats.chunks,
        stats.documents,
        stats.dimension
    );

    Ok(())
}

/// Search the vector index from the command line
#[inline]
pub fn query(text: &str, limit: usize) -> Result<()> {
    let config = load_config()?;

    let client = OpenAiClient::new(&config.provider)
        .context("Provider configuration is incomplete")?;

    let index_dir = config.index_dir();
    let store = match IndexStore::load(&index_dir) {
        Ok(store) => store,
        Err(HolosError::IndexMissing(_)) => {
            println!("📭 No vector index at {}", index_dir.display());
            println!("Run 'holos rebuild' to build one first.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let limit = limit.max(1);
    let vector = client.embed(text).context("Failed to embed query")?;
    let results = store.query(&vector, limit)?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!("Top {} results for \"{}\":", results.len(), text);
    println!();
    for (rank, result) in results.iter().enumerate() {
        let preview: String = result
            .chunk
            .content
            .chars()
            .take(200)
            .collect::<String>()
            .replace('\n', " ");
        println!(
            "{}. [{:.3}] {} (offset {})",
            rank + 1,
            result.score,
            result.chunk.source,
            result.chunk.offset
        );
        println!("   {}", preview);
        println!();
    }

    Ok(())
}

/// Show detailed status of configuration, provider, and index
#[inline]
pub fn status() -> Result<()> {
    let config = load_config()?;

    println!("📊 Holos Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("⚙️  Configuration:");
    println!("   Config file: {}", config.config_file_path().display());
    println!("   API base: {}", config.provider.api_base);
    println!("   Embedding model: {}", config.provider.embed_model);
    println!("   Chat model: {}", config.provider.chat_model);
    println!();

    println!("🤖 Provider Status:");
    match OpenAiClient::new(&config.provider) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!("   ✅ Provider reachable at {}", config.provider.api_base);
            }
            Err(e) => {
                println!("   ⚠️  Provider configured but unreachable - {}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Provider not configured - {}", e);
        }
    }
    println!();

    println!("🔍 Vector Index:");
    let index_dir = config.index_dir();
    match IndexStore::load(&index_dir) {
        Ok(store) => {
            println!("   ✅ Snapshot: {}", IndexStore::snapshot_path(&index_dir).display());
            println!("   📄 Chunks: {}", store.len());
            println!("   🔢 Dimensions: {}", store.dimension());
            println!("   📋 Embedding model: {}", store.embed_model());
        }
        Err(HolosError::IndexMissing(path)) => {
            println!("   📭 Not built yet (no snapshot at {})", path.display());
        }
        Err(e) => {
            println!("   ❌ {}", e);
        }
    }
    println!();

    println!("📄 Documents:");
    let docs_dir = config.docs_dir();
    if docs_dir.exists() {
        match load_documents(&docs_dir) {
            Ok(documents) => {
                println!(
                    "   ✅ {} documents under {}",
                    documents.len(),
                    docs_dir.display()
                );
            }
            Err(e) => {
                warn!("Failed to scan documents: {}", e);
                println!("   ⚠️  Failed to scan {} - {}", docs_dir.display(), e);
            }
        }
    } else {
        println!("   📭 Documents directory does not exist: {}", docs_dir.display());
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'holos rebuild' to (re)build the vector index");
    println!("   • Use 'holos query <text>' to test retrieval");
    println!("   • Use 'holos serve' to start the chat backend");

    Ok(())
}

/// Print the effective configuration as TOML
#[inline]
pub fn show_config() -> Result<()> {
    let mut config = load_config()?;
    if !config.provider.api_key.is_empty() {
        config.provider.api_key = "<redacted>".to_string();
    }
    let content =
        toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
    print!("{}", content);
    Ok(())
}

/// Point the user at the config file and how to change settings
#[inline]
pub fn config_info() -> Result<()> {
    let config = load_config()?;
    let path = config.config_file_path();

    if path.exists() {
        println!("Config file: {}", path.display());
    } else {
        println!("Config file: {} (not created yet)", path.display());
    }
    println!();
    println!("Edit the file directly, or override with environment variables:");
    println!("  OPENAI_API_KEY, OPENAI_API_BASE, EMBED_MODEL, MODEL_NAME,");
    println!("  VECTOR_PATH, DOCS_PATH, WEATHER_PATH, HOLOS_HOST, HOLOS_PORT, CORS_ORIGINS");
    println!();
    println!("Use 'holos config --show' to print the effective configuration.");

    Ok(())
}

fn load_config() -> Result<Config> {
    let config_dir = get_config_dir().context("Failed to determine config directory")?;
    Config::load(&config_dir).context("Failed to load configuration")
}
