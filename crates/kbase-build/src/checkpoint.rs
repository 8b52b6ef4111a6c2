use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use kbase_core::error::Result;
use kbase_core::layout::{read_json, write_json_atomic, IndexLayout};
use kbase_core::types::{Chunk, DocumentSummary};

/// Partial build state. `chunks` is exactly the set of rows in the staged
/// vector index at the time of the flush.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub embedder_id: String,
    pub processed: BTreeSet<String>,
    pub chunks: Vec<Chunk>,
    pub documents: Vec<DocumentSummary>,
    pub skipped: Vec<String>,
}

impl Checkpoint {
    pub fn new(embedder_id: &str) -> Self {
        Self { embedder_id: embedder_id.to_string(), ..Self::default() }
    }

    pub fn exists(layout: &IndexLayout) -> bool { layout.checkpoint().exists() }

    pub fn load(layout: &IndexLayout) -> Result<Self> { read_json(&layout.checkpoint()) }

    pub fn save(&self, layout: &IndexLayout) -> Result<()> {
        CheckpointRef {
            embedder_id: &self.embedder_id,
            processed: &self.processed,
            chunks: &self.chunks,
            documents: &self.documents,
            skipped: &self.skipped,
        }
        .save(layout)
    }
}

/// Serializes to the same document as [`Checkpoint`] straight from the
/// builder's running state.
#[derive(Debug, Serialize)]
pub(crate) struct CheckpointRef<'a> {
    pub embedder_id: &'a str,
    pub processed: &'a BTreeSet<String>,
    pub chunks: &'a [Chunk],
    pub documents: &'a [DocumentSummary],
    pub skipped: &'a [String],
}

impl CheckpointRef<'_> {
    pub fn save(&self, layout: &IndexLayout) -> Result<()> {
        write_json_atomic(&layout.checkpoint(), self)?;
        tracing::debug!(files = self.processed.len(), chunks = self.chunks.len(), "checkpoint flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let layout = IndexLayout::new(tmp.path());
        assert!(!Checkpoint::exists(&layout));
        let mut cp = Checkpoint::new("fake:m:d8");
        cp.processed.insert("a.txt".into());
        cp.skipped.push("b.txt".into());
        cp.save(&layout).unwrap();
        assert!(Checkpoint::exists(&layout));
        assert_eq!(Checkpoint::load(&layout).unwrap(), cp);
    }

    #[test]
    fn borrowed_state_loads_back_as_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let layout = IndexLayout::new(tmp.path());
        let processed: BTreeSet<String> = ["a.txt".to_string(), "b/c.md".to_string()].into_iter().collect();
        let skipped = vec!["broken.docx".to_string()];
        CheckpointRef { embedder_id: "fake:m:d8", processed: &processed, chunks: &[], documents: &[], skipped: &skipped }
            .save(&layout)
            .unwrap();

        let loaded = Checkpoint::load(&layout).unwrap();
        assert_eq!(loaded.embedder_id, "fake:m:d8");
        assert_eq!(loaded.processed, processed);
        assert_eq!(loaded.skipped, skipped);
        assert!(loaded.chunks.is_empty());
    }
}
