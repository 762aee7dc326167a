
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::documents::SourceDocument;
use crate::documents::splitter::split_document;
use crate::index::{DocumentChunk, ScoredChunk};
use crate::provider::EmbeddingProvider;
use crate::{HolosError, Result};

pub const SNAPSHOT_FILE: &str = "index.json";
const SNAPSHOT_VERSION: u32 = 1;

/// On-disk form of the vector index
#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    version: u32,
    embed_model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

/// One (embedding vector, chunk) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    id: u64,
    vector: Vec<f32>,
    chunk: DocumentChunk,
}

/// In-memory index state guarded by the store's lock
#[derive(Debug)]
struct VectorIndex {
    embed_model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    fn empty(embed_model: &str) -> Self {
        Self {
            embed_model: embed_model.to_string(),
            dimension: 0,
            entries: Vec::new(),
        }
    }

    fn from_snapshot(snapshot: IndexSnapshot) -> Self {
        Self {
            embed_model: snapshot.embed_model,
            dimension: snapshot.dimension,
            entries: snapshot.entries,
        }
    }
}

/// Outcome of a successful rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildStats {
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
}

/// Store for a persisted vector index.
///
/// Queries are read-only and may run concurrently; a rebuild constructs the
/// replacement index entirely outside the lock, atomically replaces the
/// on-disk snapshot, and only then swaps the in-memory state under the
/// write lock. A failed rebuild leaves both disk and memory untouched.
#[derive(Debug)]
pub struct IndexStore {
    dir: PathBuf,
    index: RwLock<VectorIndex>,
}

impl IndexStore {
    /// Load a previously persisted index from `dir`.
    ///
    /// Fails with [`HolosError::IndexMissing`] when no snapshot exists
    /// (recoverable: build one with [`IndexStore::rebuild`]) and with
    /// [`HolosError::IndexCorrupt`] when a snapshot exists but cannot be
    /// used.
    #[inline]
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let index = read_snapshot(&dir)?;

        info!(
            "Loaded vector index from {} ({} entries, {} dimensions, model {})",
            dir.display(),
            index.entries.len(),
            index.dimension,
            index.embed_model
        );

        Ok(Self {
            dir,
            index: RwLock::new(index),
        })
    }

    /// Create a store handle over `dir` with an empty in-memory index.
    ///
    /// Nothing is written until the first rebuild; queries answer with an
    /// empty result set in the meantime.
    #[inline]
    pub fn empty(dir: impl Into<PathBuf>, embed_model: &str) -> Self {
        Self {
            dir: dir.into(),
            index: RwLock::new(VectorIndex::empty(embed_model)),
        }
    }

    /// The directory holding this store's snapshot
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot file within an index directory
    #[inline]
    pub fn snapshot_path(dir: &Path) -> PathBuf {
        dir.join(SNAPSHOT_FILE)
    }

    /// Number of indexed chunks
    #[inline]
    pub fn len(&self) -> usize {
        self.read_index().entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedding model the current index was built with
    #[inline]
    pub fn embed_model(&self) -> String {
        self.read_index().embed_model.clone()
    }

    /// Dimension of the indexed vectors (0 while empty)
    #[inline]
    pub fn dimension(&self) -> usize {
        self.read_index().dimension
    }

    /// Return the `k` nearest chunks to `vector` by cosine similarity,
    /// ordered by similarity descending with ties broken by insertion
    /// order. Returns fewer than `k` results when the index holds fewer
    /// entries; `k = 0` yields an empty set.
    #[inline]
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let index = self.read_index();

        if k == 0 || index.entries.is_empty() {
            return Ok(Vec::new());
        }

        if vector.len() != index.dimension {
            return Err(HolosError::Index(format!(
                "Query vector dimension {} does not match index dimension {}",
                vector.len(),
                index.dimension
            )));
        }

        let mut scored: Vec<(&IndexEntry, f32)> = index
            .entries
            .iter()
            .map(|entry| (entry, cosine_similarity(vector, &entry.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
        scored.truncate(k);

        let results = scored
            .into_iter()
            .map(|(entry, score)| ScoredChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect::<Vec<_>>();

        debug!("Query returned {} of {} requested results", results.len(), k);
        Ok(results)
    }

    /// Re-split and re-embed `documents` into a fresh index, atomically
    /// replace the on-disk snapshot, then swap the in-memory index.
    ///
    /// All splitting and embedding happens before any lock is taken or any
    /// byte is written; an embedding failure therefore leaves the previous
    /// index fully intact on disk and in memory.
    #[inline]
    pub fn rebuild<P>(
        &self,
        documents: &[SourceDocument],
        retrieval: &RetrievalConfig,
        provider: &P,
    ) -> Result<RebuildStats>
    where
        P: EmbeddingProvider + ?Sized,
    {
        info!(
            "Rebuilding vector index at {} from {} documents",
            self.dir.display(),
            documents.len()
        );

        let mut chunks: Vec<DocumentChunk> = Vec::new();
        for document in documents {
            chunks.extend(split_document(document, retrieval));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = provider
            .embed_batch(&texts)
            .map_err(|e| HolosError::Provider(format!("Failed to embed documents: {e:#}")))?;

        if embeddings.len() != chunks.len() {
            return Err(HolosError::Index(format!(
                "Provider returned {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimension = embeddings.first().map_or(0, Vec::len);
        if embeddings.iter().any(|v| v.len() != dimension) {
            return Err(HolosError::Index(
                "Provider returned embeddings of inconsistent dimensions".to_string(),
            ));
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(id, (chunk, vector))| IndexEntry {
                id: id as u64,
                vector,
                chunk,
            })
            .collect();

        let snapshot = IndexSnapshot {
            version: SNAPSHOT_VERSION,
            embed_model: provider.model().to_string(),
            dimension,
            entries,
        };

        let stats = RebuildStats {
            documents: documents.len(),
            chunks: snapshot.entries.len(),
            dimension,
        };

        persist_snapshot(&self.dir, &snapshot)?;

        let mut guard = self
            .index
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = VectorIndex::from_snapshot(snapshot);
        drop(guard);

        info!(
            "Rebuilt vector index: {} chunks from {} documents ({} dimensions)",
            stats.chunks, stats.documents, stats.dimension
        );
        Ok(stats)
    }

    fn read_index(&self) -> std::sync::RwLockReadGuard<'_, VectorIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_snapshot(dir: &Path) -> Result<VectorIndex> {
    let path = IndexStore::snapshot_path(dir);

    if !path.exists() {
        return Err(HolosError::IndexMissing(path));
    }

    let content = fs::read_to_string(&path)?;

    let snapshot: IndexSnapshot = serde_json::from_str(&content).map_err(|e| {
        HolosError::IndexCorrupt(format!("{}: {}", path.display(), e))
    })?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(HolosError::IndexCorrupt(format!(
            "{}: unsupported snapshot version {}",
            path.display(),
            snapshot.version
        )));
    }

    if let Some(entry) = snapshot
        .entries
        .iter()
        .find(|entry| entry.vector.len() != snapshot.dimension)
    {
        return Err(HolosError::IndexCorrupt(format!(
            "{}: entry {} has dimension {} but the index declares {}",
            path.display(),
            entry.id,
            entry.vector.len(),
            snapshot.dimension
        )));
    }

    Ok(VectorIndex::from_snapshot(snapshot))
}

/// Write the snapshot to a uniquely-named temporary file and rename it over
/// the previous one, so the directory never holds a partially written index
fn persist_snapshot(dir: &Path, snapshot: &IndexSnapshot) -> Result<()> {
    fs::create_dir_all(dir)?;

    let final_path = IndexStore::snapshot_path(dir);
    let tmp_path = dir.join(format!("{}.tmp-{}", SNAPSHOT_FILE, Uuid::new_v4()));

    let content = serde_json::to_vec(snapshot)
        .map_err(|e| HolosError::Index(format!("Failed to serialize index snapshot: {}", e)))?;

    if let Err(e) = fs::write(&tmp_path, &content) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&tmp_path, &final_path) {
        warn!(
            "Failed to move index snapshot into place at {}: {}",
            final_path.display(),
            e
        );
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    debug!(
        "Persisted index snapshot ({} entries) to {}",
        snapshot.entries.len(),
        final_path.display()
    );
    Ok(())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = a.iter().zip(b).fold(0.0f32, |acc, (x, y)| x.mul_add(*y, acc));
    let norm_a = a.iter().fold(0.0f32, |acc, x| x.mul_add(*x, acc)).sqrt();
    let norm_b = b.iter().fold(0.0f32, |acc, x| x.mul_add(*x, acc)).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
