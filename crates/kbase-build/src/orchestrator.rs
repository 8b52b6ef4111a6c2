//! Strategy ladder: streaming vector build, checkpointed vector build, then
//! lexical-only. The first strategy that completes publishes the index.

use anyhow::{anyhow, bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeSet;

use kbase_core::chunker::Chunker;
use kbase_core::config::{BuildStrategy, Settings};
use kbase_core::layout::{remove_dir_if_exists, remove_file_if_exists, replace_dir, write_json_atomic, write_marker, IndexLayout};
use kbase_core::traits::{DocumentSource, Embedder, EmbedderLoader};
use kbase_core::types::{Chunk, Document, DocumentSummary, IndexStats, SearchMode, SourceFile};
use kbase_text::LexicalIndexer;
use kbase_vector::{IndexMeta, VectorIndexWriter};

use crate::checkpoint::{Checkpoint, CheckpointRef};
use crate::error::{BuildError, StrategyFailure};

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub strategy: BuildStrategy,
    pub mode: SearchMode,
    pub documents: usize,
    pub chunks: usize,
    pub categories: Vec<String>,
    pub skipped_files: usize,
    pub resumed_files: usize,
}

enum Outcome {
    Done(BuildReport),
    Paused { processed: usize, remaining: usize },
}

/// Everything accumulated while walking the source files.
#[derive(Default)]
struct Collected {
    processed: BTreeSet<String>,
    chunks: Vec<Chunk>,
    documents: Vec<DocumentSummary>,
    skipped: Vec<String>,
}

impl From<Checkpoint> for Collected {
    fn from(cp: Checkpoint) -> Self {
        Self { processed: cp.processed, chunks: cp.chunks, documents: cp.documents, skipped: cp.skipped }
    }
}

impl Collected {
    fn checkpoint<'c>(&'c self, embedder_id: &'c str) -> CheckpointRef<'c> {
        CheckpointRef {
            embedder_id,
            processed: &self.processed,
            chunks: &self.chunks,
            documents: &self.documents,
            skipped: &self.skipped,
        }
    }
}

pub struct Builder<'a> {
    settings: &'a Settings,
    source: &'a dyn DocumentSource,
    loader: &'a dyn EmbedderLoader,
    layout: IndexLayout,
    chunker: Chunker,
    file_limit: Option<usize>,
    show_progress: bool,
}

impl<'a> Builder<'a> {
    pub fn new(settings: &'a Settings, source: &'a dyn DocumentSource, loader: &'a dyn EmbedderLoader) -> Self {
        Self {
            settings,
            source,
            loader,
            layout: IndexLayout::new(&settings.data.index_dir),
            chunker: Chunker::new(settings.chunking),
            file_limit: None,
            show_progress: false,
        }
    }

    /// Process at most `limit` new files in this run, then flush a checkpoint
    /// and return [`BuildError::Paused`]. Only the checkpointed strategy honours it.
    pub fn with_file_limit(mut self, limit: usize) -> Self {
        self.file_limit = Some(limit.max(1));
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn layout(&self) -> &IndexLayout { &self.layout }

    pub fn run(&self) -> Result<BuildReport, BuildError> {
        let files = self.source.list().map_err(BuildError::Source)?;
        if files.is_empty() {
            return Err(BuildError::NoDocuments(self.settings.data.source_dir.display().to_string()));
        }
        tracing::info!(files = files.len(), index = %self.layout.root().display(), "starting knowledge base build");

        let strategies = &self.settings.build.strategies;
        let resumable = strategies.contains(&BuildStrategy::Checkpointed);
        let resuming = Checkpoint::exists(&self.layout);
        let mut attempts = Vec::new();
        for &strategy in strategies {
            if strategy == BuildStrategy::Streaming && resumable && (resuming || self.file_limit.is_some()) {
                tracing::info!("resumable build requested; skipping streaming strategy");
                continue;
            }
            tracing::info!(%strategy, "attempting build strategy");
            match self.run_strategy(strategy, &files) {
                Ok(Outcome::Done(report)) => {
                    tracing::info!(
                        %strategy,
                        documents = report.documents,
                        chunks = report.chunks,
                        categories = report.categories.len(),
                        "knowledge base build complete"
                    );
                    return Ok(report);
                }
                Ok(Outcome::Paused { processed, remaining }) => {
                    tracing::info!(processed, remaining, "file limit reached; build paused");
                    return Err(BuildError::Paused { processed, remaining });
                }
                Err(e) => {
                    tracing::error!(%strategy, error = %format!("{:#}", e), "build strategy failed");
                    attempts.push(StrategyFailure { strategy, reason: format!("{:#}", e) });
                }
            }
        }
        Err(BuildError::AllStrategiesFailed { attempts })
    }

    fn run_strategy(&self, strategy: BuildStrategy, files: &[SourceFile]) -> Result<Outcome> {
        match strategy {
            BuildStrategy::Streaming => {
                let model = self.settings.embedding.small_model.clone();
                self.vector_build(strategy, &model, self.settings.build.streaming_batch_size, files, false)
            }
            BuildStrategy::Checkpointed => {
                let model = self.settings.embedding.standard_model.clone();
                self.vector_build(strategy, &model, self.settings.build.checkpoint_batch_size, files, true)
            }
            BuildStrategy::Lexical => self.lexical_build(files).map(Outcome::Done),
        }
    }

    fn vector_build(
        &self,
        strategy: BuildStrategy,
        model: &str,
        batch_size: usize,
        files: &[SourceFile],
        checkpointed: bool,
    ) -> Result<Outcome> {
        let embedder = self.loader.load(model).with_context(|| format!("embedding backend unavailable for {}", model))?;
        let meta = IndexMeta { model: model.to_string(), embedder_id: embedder.model_id().to_string(), dim: embedder.dim() };

        let resumed = if checkpointed { self.resume_state(&meta)? } else { None };
        let (mut collected, mut writer) = match resumed {
            Some(collected) => {
                let mut writer = VectorIndexWriter::open(&self.layout.staging_vectors_dir(), meta.clone())?;
                if writer.len() < collected.chunks.len() {
                    tracing::warn!(
                        rows = writer.len(),
                        chunks = collected.chunks.len(),
                        "staged vector index is behind the checkpoint; starting over"
                    );
                    drop(writer);
                    (Collected::default(), self.fresh_writer(&meta)?)
                } else {
                    // rows appended after the last checkpoint flush belong to files that will be redone
                    writer.truncate(collected.chunks.len())?;
                    (collected, writer)
                }
            }
            None => (Collected::default(), self.fresh_writer(&meta)?),
        };
        let resumed_files = collected.processed.len();

        let pending: Vec<&SourceFile> = files.iter().filter(|f| !collected.processed.contains(&f.id)).collect();
        let progress = self.progress_bar(pending.len());
        let checkpoint_every = self.settings.build.checkpoint_every;
        let mut embed_failures = 0usize;
        let mut done_this_run = 0usize;

        for file in &pending {
            if checkpointed {
                if let Some(limit) = self.file_limit {
                    if done_this_run >= limit {
                        collected.checkpoint(&meta.embedder_id).save(&self.layout)?;
                        progress.finish_and_clear();
                        return Ok(Outcome::Paused { processed: collected.processed.len(), remaining: files.len() - collected.processed.len() });
                    }
                }
            }
            progress.set_message(file.id.clone());
            if let Some(document) = self.load_document(file) {
                let chunks = self.chunker.chunk(&document);
                let summary = document.summary();
                drop(document);
                let start = writer.len();
                match embed_into(embedder.as_ref(), &mut writer, &chunks, batch_size) {
                    Ok(()) => {
                        collected.chunks.extend(chunks);
                        collected.documents.push(summary);
                    }
                    Err(e) => {
                        embed_failures += 1;
                        tracing::warn!(file = %file.id, error = %format!("{:#}", e), "embedding failed; skipping file");
                        writer.truncate(start)?;
                        collected.skipped.push(file.id.clone());
                    }
                }
            } else {
                collected.skipped.push(file.id.clone());
            }
            collected.processed.insert(file.id.clone());
            done_this_run += 1;
            progress.inc(1);

            if checkpointed && done_this_run % checkpoint_every == 0 {
                collected.checkpoint(&meta.embedder_id).save(&self.layout)?;
            }
        }
        progress.finish_and_clear();

        if collected.chunks.is_empty() {
            if embed_failures > 0 {
                bail!("embedding failed for every document");
            }
            bail!("no source document produced any text");
        }
        if writer.len() != collected.chunks.len() {
            bail!("vector rows ({}) out of step with chunks ({})", writer.len(), collected.chunks.len());
        }
        drop(writer);
        drop(embedder);

        self.publish_vector(&collected, &meta)?;
        Ok(Outcome::Done(report(strategy, SearchMode::Vector, &collected, resumed_files)))
    }

    /// Discard any staged state and open an empty staging index.
    fn fresh_writer(&self, meta: &IndexMeta) -> Result<VectorIndexWriter> {
        remove_dir_if_exists(&self.layout.staging_dir())?;
        VectorIndexWriter::open(&self.layout.staging_vectors_dir(), meta.clone())
    }

    /// Load a checkpoint matching `meta`, discarding one left by another model.
    fn resume_state(&self, meta: &IndexMeta) -> Result<Option<Collected>> {
        if !Checkpoint::exists(&self.layout) {
            return Ok(None);
        }
        let checkpoint = match Checkpoint::load(&self.layout) {
            Ok(cp) => cp,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable checkpoint; starting over");
                return Ok(None);
            }
        };
        if checkpoint.embedder_id != meta.embedder_id {
            tracing::warn!(
                checkpoint = %checkpoint.embedder_id,
                current = %meta.embedder_id,
                "checkpoint was written by a different model; starting over"
            );
            return Ok(None);
        }
        tracing::info!(files = checkpoint.processed.len(), chunks = checkpoint.chunks.len(), "resuming from checkpoint");
        Ok(Some(checkpoint.into()))
    }

    fn lexical_build(&self, files: &[SourceFile]) -> Result<BuildReport> {
        let mut collected = Collected::default();
        let progress = self.progress_bar(files.len());
        for file in files {
            progress.set_message(file.id.clone());
            match self.load_document(file) {
                Some(document) => {
                    collected.chunks.extend(self.chunker.chunk(&document));
                    collected.documents.push(document.summary());
                }
                None => collected.skipped.push(file.id.clone()),
            }
            collected.processed.insert(file.id.clone());
            progress.inc(1);
        }
        progress.finish_and_clear();
        if collected.chunks.is_empty() {
            bail!("no source document produced any text");
        }

        let index = LexicalIndexer::new().index(&collected.chunks);
        let layout = &self.layout;
        layout.clear_markers()?;
        write_json_atomic(&layout.chunks(), &collected.chunks)?;
        index.save(layout)?;
        remove_dir_if_exists(&layout.vectors_dir())?;

        let mut stats = IndexStats::from_documents(SearchMode::Lexical, &collected.documents, collected.chunks.len());
        stats.unique_keywords = Some(index.unique_keywords());
        stats.unique_phrases = Some(index.unique_phrases());
        write_json_atomic(&layout.stats(), &stats)?;

        remove_dir_if_exists(&layout.staging_dir())?;
        write_marker(&layout.lexical_marker(), "lexical")?;
        Ok(report(BuildStrategy::Lexical, SearchMode::Lexical, &collected, 0))
    }

    fn publish_vector(&self, collected: &Collected, meta: &IndexMeta) -> Result<()> {
        let layout = &self.layout;
        layout.clear_markers()?;
        write_json_atomic(&layout.chunks(), &collected.chunks)?;
        replace_dir(&layout.staging_vectors_dir(), &layout.vectors_dir())?;
        remove_dir_if_exists(&layout.lexical_dir())?;

        let mut stats = IndexStats::from_documents(SearchMode::Vector, &collected.documents, collected.chunks.len());
        stats.vector_count = Some(collected.chunks.len());
        stats.embedder_id = Some(meta.embedder_id.clone());
        stats.dim = Some(meta.dim);
        write_json_atomic(&layout.stats(), &stats)?;

        remove_file_if_exists(&layout.checkpoint())?;
        remove_dir_if_exists(&layout.staging_dir())?;
        write_marker(&layout.vector_marker(), &meta.embedder_id)?;
        Ok(())
    }

    /// Extract one file; failures and empty text are logged and yield `None`.
    fn load_document(&self, file: &SourceFile) -> Option<Document> {
        match self.source.extract(file) {
            Ok(extracted) if extracted.text.trim().is_empty() => {
                tracing::warn!(file = %file.id, "no text extracted; skipping");
                None
            }
            Ok(extracted) => Some(Document::from_extracted(extracted)),
            Err(e) => {
                tracing::warn!(file = %file.id, error = %format!("{:#}", e), "extraction failed; skipping");
                None
            }
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb
    }
}

/// Embed `chunks` in micro-batches and append each batch as soon as it is ready.
fn embed_into(embedder: &dyn Embedder, writer: &mut VectorIndexWriter, chunks: &[Chunk], batch_size: usize) -> Result<()> {
    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts)?;
        if embeddings.len() != batch.len() {
            return Err(anyhow!("embedder returned {} vectors for {} texts", embeddings.len(), batch.len()));
        }
        writer.append(batch, embeddings)?;
    }
    Ok(())
}

fn report(strategy: BuildStrategy, mode: SearchMode, collected: &Collected, resumed_files: usize) -> BuildReport {
    let categories: BTreeSet<String> = collected.documents.iter().map(|d| d.category.clone()).collect();
    BuildReport {
        strategy,
        mode,
        documents: collected.documents.len(),
        chunks: collected.chunks.len(),
        categories: categories.into_iter().collect(),
        skipped_files: collected.skipped.len(),
        resumed_files,
    }
}
