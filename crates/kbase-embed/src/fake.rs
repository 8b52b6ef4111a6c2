use anyhow::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use kbase_core::traits::Embedder;

/// Deterministic token-hashing embedder. Needs no model files; texts sharing
/// tokens get similar vectors, which is enough for tests and offline demos.
pub struct FakeEmbedder {
    dim: usize,
    model_id: String,
}

impl FakeEmbedder {
    pub fn new(name: &str, dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, model_id: format!("fake:{}:d{}", name, dim) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.to_lowercase().split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.5 + val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

    #[test]
    fn shapes_norm_and_determinism() {
        let e = FakeEmbedder::new("test", 64);
        let embs = e.embed_batch(&["hello world".to_string(), "hello world".to_string()]).unwrap();
        assert_eq!(embs[0].len(), 64);
        let norm = dot(&embs[0], &embs[0]).sqrt();
        assert!((norm - 1.0).abs() <= 1e-3, "norm={}", norm);
        assert_eq!(embs[0], embs[1]);
        assert_eq!(e.model_id(), "fake:test:d64");
    }

    #[test]
    fn shared_tokens_score_higher_than_disjoint_text() {
        let e = FakeEmbedder::new("test", 256);
        let q = e.embed_text("hotel booking");
        let related = e.embed_text("hotel booking confirmation");
        let unrelated = e.embed_text("quarterly finance report");
        assert!(dot(&q, &related) > dot(&q, &unrelated));
    }

    #[test]
    fn empty_text_is_the_zero_vector() {
        let e = FakeEmbedder::new("test", 8);
        assert!(e.embed_text("").iter().all(|x| *x == 0.0));
    }
}
