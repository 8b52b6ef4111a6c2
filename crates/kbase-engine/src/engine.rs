use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

use kbase_core::layout::{read_json, IndexLayout};
use kbase_core::traits::{Embedder, EmbedderLoader};
use kbase_core::types::{Chunk, IndexStats, SearchMode, SearchResult, SourceKind};
use kbase_text::LexicalSearchEngine;
use kbase_vector::{read_meta, VectorSearchEngine};

const FALLBACK_SCORE: f32 = 1.0;

enum LoadedIndex {
    Lexical(LexicalSearchEngine),
    Vector(VectorSearchEngine),
    /// Nothing searchable; queries scan whatever chunks could be read.
    Unavailable { chunks: Vec<Chunk> },
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub mode: SearchMode,
    pub ready: bool,
    pub loaded: bool,
    pub total_chunks: usize,
    pub categories: Vec<String>,
    /// The build's `stats.json`, when it could be read.
    pub index: Option<IndexStats>,
}

pub struct RetrievalEngine {
    layout: IndexLayout,
    loader: Box<dyn EmbedderLoader>,
    mode: SearchMode,
    /// Embedder instantiated during mode detection, handed to the vector engine on load.
    embedder: Option<Box<dyn Embedder>>,
    loaded: Option<LoadedIndex>,
}

impl RetrievalEngine {
    /// Detect the published mode under `index_dir`. Nothing is read into memory yet.
    pub fn new(index_dir: impl AsRef<Path>, loader: Box<dyn EmbedderLoader>) -> Self {
        let layout = IndexLayout::new(index_dir.as_ref());
        let (mode, embedder) = detect_mode(&layout, loader.as_ref());
        tracing::info!(index = %layout.root().display(), %mode, "detected search mode");
        Self { layout, loader, mode, embedder, loaded: None }
    }

    /// `new` followed by `load`; a failed load is logged and leaves the fallback scan active.
    pub fn open(index_dir: impl AsRef<Path>, loader: Box<dyn EmbedderLoader>) -> Self {
        let mut engine = Self::new(index_dir, loader);
        if let Err(e) = engine.load() {
            tracing::error!(error = %format!("{:#}", e), "failed to load index; falling back to substring search");
        }
        engine
    }

    pub fn mode(&self) -> SearchMode { self.mode }

    pub fn is_loaded(&self) -> bool { self.loaded.is_some() }

    /// Whether the files the detected mode needs are on disk.
    pub fn is_ready(&self) -> bool {
        let layout = &self.layout;
        match self.mode {
            SearchMode::Lexical => [layout.lexical_marker(), layout.chunks(), layout.words(), layout.phrases(), layout.categories()]
                .iter()
                .all(|p| p.is_file()),
            SearchMode::Vector => layout.vector_marker().is_file() && layout.chunks().is_file() && layout.vectors_dir().is_dir(),
            SearchMode::Unavailable => false,
        }
    }

    /// Read the detected index into memory. On failure the engine drops to
    /// `Unavailable` and stays loaded in fallback form over whatever chunk
    /// collection could be read.
    pub fn load(&mut self) -> Result<()> {
        let result = match self.mode {
            SearchMode::Lexical => LexicalSearchEngine::open(&self.layout)
                .map(LoadedIndex::Lexical)
                .context("loading lexical index"),
            SearchMode::Vector => self.load_vector().map(LoadedIndex::Vector).context("loading vector index"),
            SearchMode::Unavailable => Ok(LoadedIndex::Unavailable { chunks: self.read_chunks_lossy() }),
        };
        match result {
            Ok(loaded) => {
                let total = match &loaded {
                    LoadedIndex::Lexical(engine) => engine.chunks().len(),
                    LoadedIndex::Vector(engine) => engine.len(),
                    LoadedIndex::Unavailable { chunks } => chunks.len(),
                };
                tracing::info!(mode = %self.mode, chunks = total, "index loaded");
                self.loaded = Some(loaded);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(detected = %self.mode, "index unusable; search mode is now unavailable");
                self.mode = SearchMode::Unavailable;
                self.loaded = Some(LoadedIndex::Unavailable { chunks: self.read_chunks_lossy() });
                Err(e)
            }
        }
    }

    fn load_vector(&mut self) -> Result<VectorSearchEngine> {
        let chunks: Vec<Chunk> = read_json(&self.layout.chunks())?;
        let embedder = match self.embedder.take() {
            Some(embedder) => embedder,
            None => {
                let meta = read_meta(&self.layout.vectors_dir())?.ok_or_else(|| anyhow!("vector index has no model metadata"))?;
                self.loader.load(&meta.model)?
            }
        };
        VectorSearchEngine::open(&self.layout.vectors_dir(), chunks, embedder)
    }

    fn read_chunks_lossy(&self) -> Vec<Chunk> {
        match read_json(&self.layout.chunks()) {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(error = %e, "no readable chunk collection");
                Vec::new()
            }
        }
    }

    /// Ranked results for `query`, best first. With `category`, results from
    /// the top `k` that are in another category are dropped, so fewer than `k`
    /// may come back.
    pub fn search(&self, query: &str, k: usize, category: Option<&str>) -> Vec<SearchResult> {
        if query.trim().is_empty() || k == 0 {
            return Vec::new();
        }
        let Some(loaded) = &self.loaded else {
            tracing::warn!("search called before the index was loaded");
            return Vec::new();
        };
        let mut results = match loaded {
            LoadedIndex::Lexical(engine) => engine.search(query, k),
            LoadedIndex::Vector(engine) => match engine.search(query, k) {
                Ok(results) => results,
                Err(e) => {
                    tracing::error!(error = %format!("{:#}", e), "vector search failed");
                    Vec::new()
                }
            },
            LoadedIndex::Unavailable { chunks } => substring_scan(chunks, query, k),
        };
        if let Some(category) = category {
            results.retain(|r| r.chunk.category == category);
        }
        tracing::debug!(query, k, hits = results.len(), "search complete");
        results
    }

    pub fn get_categories(&self) -> Vec<String> {
        match &self.loaded {
            Some(LoadedIndex::Lexical(engine)) => engine.categories(),
            _ => {
                let names: BTreeSet<&str> = self.chunks().iter().map(|c| c.category.as_str()).collect();
                names.into_iter().map(str::to_string).collect()
            }
        }
    }

    pub fn get_chunk(&self, id: &str) -> Option<&Chunk> {
        match &self.loaded {
            Some(LoadedIndex::Lexical(engine)) => engine.get_chunk(id),
            _ => self.chunks().iter().find(|c| c.id == id),
        }
    }

    pub fn chunks_in_category(&self, category: &str) -> Vec<&Chunk> {
        match &self.loaded {
            Some(LoadedIndex::Lexical(engine)) => engine.chunks_in_category(category),
            _ => self.chunks().iter().filter(|c| c.category == category).collect(),
        }
    }

    pub fn get_stats(&self) -> EngineStats {
        let index = match read_json::<IndexStats>(&self.layout.stats()) {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::debug!(error = %e, "no build statistics");
                None
            }
        };
        EngineStats {
            mode: self.mode,
            ready: self.is_ready(),
            loaded: self.is_loaded(),
            total_chunks: self.chunks().len(),
            categories: self.get_categories(),
            index,
        }
    }

    fn chunks(&self) -> &[Chunk] {
        match &self.loaded {
            Some(LoadedIndex::Lexical(engine)) => engine.chunks(),
            Some(LoadedIndex::Vector(engine)) => engine.chunks(),
            Some(LoadedIndex::Unavailable { chunks }) => chunks,
            None => &[],
        }
    }
}

/// Lexical marker wins; vector mode additionally needs its files, readable
/// model metadata and a working embedding backend.
fn detect_mode(layout: &IndexLayout, loader: &dyn EmbedderLoader) -> (SearchMode, Option<Box<dyn Embedder>>) {
    if layout.lexical_marker().is_file() {
        return (SearchMode::Lexical, None);
    }
    if !(layout.vector_marker().is_file() && layout.vectors_dir().is_dir() && layout.chunks().is_file()) {
        return (SearchMode::Unavailable, None);
    }
    let meta = match read_meta(&layout.vectors_dir()) {
        Ok(Some(meta)) => meta,
        Ok(None) => {
            tracing::warn!("vector index has no model metadata");
            return (SearchMode::Unavailable, None);
        }
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "unreadable vector index metadata");
            return (SearchMode::Unavailable, None);
        }
    };
    match loader.load(&meta.model) {
        Ok(embedder) => (SearchMode::Vector, Some(embedder)),
        Err(e) => {
            tracing::warn!(model = %meta.model, error = %format!("{:#}", e), "embedding backend unavailable");
            (SearchMode::Unavailable, None)
        }
    }
}

/// Case-insensitive literal scan in collection order.
fn substring_scan(chunks: &[Chunk], query: &str, k: usize) -> Vec<SearchResult> {
    let needle = query.to_lowercase();
    chunks
        .iter()
        .filter(|c| c.text.to_lowercase().contains(&needle))
        .take(k)
        .map(|c| SearchResult { chunk: c.clone(), search_score: FALLBACK_SCORE, source: SourceKind::Fallback })
        .collect()
}
