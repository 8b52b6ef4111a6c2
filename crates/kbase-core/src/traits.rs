use crate::types::{ExtractedDocument, SourceFile};

/// Sentence-embedding backend. Implementations return one vector of length
/// `dim()` per input text.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `minilm:all-MiniLM-L6-v2:d384`).
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Instantiates an embedder by model name. A failure here means the
/// embedding backend is unavailable.
pub trait EmbedderLoader {
    fn load(&self, model: &str) -> anyhow::Result<Box<dyn Embedder>>;
}

/// The document-extraction collaborator: lists source files and pulls
/// `(text, metadata)` out of each one.
pub trait DocumentSource {
    fn list(&self) -> anyhow::Result<Vec<SourceFile>>;
    fn extract(&self, file: &SourceFile) -> anyhow::Result<ExtractedDocument>;
}
