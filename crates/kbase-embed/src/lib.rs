//! kbase-embed
//!
//! Sentence-embedding backends behind `kbase_core::traits::Embedder`: candle
//! BERT encoders for the MiniLM family and a deterministic fake for tests.

use anyhow::Result;
use std::path::PathBuf;

use kbase_core::config::EmbeddingSettings;
use kbase_core::traits::{Embedder, EmbedderLoader};

pub mod device;
pub mod fake;
pub mod model;
pub mod pool;
pub mod tokenize;

pub use fake::FakeEmbedder;
pub use model::SentenceEmbedder;
pub use pool::masked_mean_l2;

/// `APP_USE_FAKE_EMBEDDINGS=1|true` forces the fake embedder regardless of config.
pub fn fake_embeddings_forced() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Loads models by name from `<model_dir>/<name>/`.
#[derive(Debug, Clone)]
pub struct LocalEmbedderLoader {
    pub model_dir: PathBuf,
    pub max_len: usize,
    pub use_fake: bool,
    pub fake_dim: usize,
}

impl LocalEmbedderLoader {
    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        Self {
            model_dir: settings.model_dir.clone(),
            max_len: settings.max_len,
            use_fake: settings.use_fake || fake_embeddings_forced(),
            fake_dim: settings.fake_dim,
        }
    }

    pub fn fake(dim: usize) -> Self {
        Self { model_dir: PathBuf::new(), max_len: usize::MAX, use_fake: true, fake_dim: dim }
    }
}

impl EmbedderLoader for LocalEmbedderLoader {
    fn load(&self, model: &str) -> Result<Box<dyn Embedder>> {
        if self.use_fake {
            tracing::info!(model, dim = self.fake_dim, "using fake embedder");
            return Ok(Box::new(FakeEmbedder::new(model, self.fake_dim)));
        }
        let embedder = SentenceEmbedder::load(&self.model_dir.join(model), model, self.max_len)?;
        Ok(Box::new(embedder))
    }
}
