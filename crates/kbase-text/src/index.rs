use std::collections::{BTreeMap, BTreeSet};

use kbase_core::error::Result;
use kbase_core::layout::{read_json, write_json_atomic, IndexLayout};
use kbase_core::types::{Chunk, ChunkId};

use crate::normalize::Normalizer;

/// Inverted indices over chunk ids. Rebuilt wholesale on every build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexicalIndex {
	pub words: BTreeMap<String, BTreeSet<ChunkId>>,
	pub phrases: BTreeMap<String, BTreeSet<ChunkId>>,
	/// Category -> chunk ids in insertion order.
	pub categories: BTreeMap<String, Vec<ChunkId>>,
}

impl LexicalIndex {
	pub fn unique_keywords(&self) -> usize { self.words.len() }
	pub fn unique_phrases(&self) -> usize { self.phrases.len() }
	pub fn category_names(&self) -> Vec<String> { self.categories.keys().cloned().collect() }

	/// Every chunk id referenced by any of the three indices.
	pub fn referenced_ids(&self) -> impl Iterator<Item = &ChunkId> {
		self.words
			.values()
			.flatten()
			.chain(self.phrases.values().flatten())
			.chain(self.categories.values().flatten())
	}

	pub fn save(&self, layout: &IndexLayout) -> Result<()> {
		write_json_atomic(&layout.words(), &self.words)?;
		write_json_atomic(&layout.phrases(), &self.phrases)?;
		write_json_atomic(&layout.categories(), &self.categories)?;
		tracing::debug!(dir = %layout.lexical_dir().display(), keywords = self.words.len(), phrases = self.phrases.len(), "saved lexical index");
		Ok(())
	}

	pub fn load(layout: &IndexLayout) -> Result<Self> {
		Ok(Self {
			words: read_json(&layout.words())?,
			phrases: read_json(&layout.phrases())?,
			categories: read_json(&layout.categories())?,
		})
	}
}

#[derive(Default)]
pub struct LexicalIndexer {
	normalizer: Normalizer,
}

impl LexicalIndexer {
	pub fn new() -> Self { Self::default() }

	pub fn normalizer(&self) -> &Normalizer { &self.normalizer }

	pub fn index(&self, chunks: &[Chunk]) -> LexicalIndex {
		let mut index = LexicalIndex::default();
		for chunk in chunks {
			self.add_chunk(&mut index, chunk);
		}
		tracing::info!(
			chunks = chunks.len(),
			keywords = index.unique_keywords(),
			phrases = index.unique_phrases(),
			categories = index.categories.len(),
			"built lexical index"
		);
		index
	}

	pub fn add_chunk(&self, index: &mut LexicalIndex, chunk: &Chunk) {
		let cleaned = self.normalizer.clean_text(&chunk.text);
		for keyword in self.normalizer.keywords(&cleaned) {
			index.words.entry(keyword).or_default().insert(chunk.id.clone());
		}
		for phrase in self.normalizer.phrases(&cleaned) {
			index.phrases.entry(phrase).or_default().insert(chunk.id.clone());
		}
		index.categories.entry(chunk.category.clone()).or_default().push(chunk.id.clone());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn chunk(id: &str, category: &str, text: &str) -> Chunk {
		Chunk {
			id: id.to_string(),
			doc_id: "doc".to_string(),
			chunk_index: 0,
			text: text.to_string(),
			char_count: text.chars().count(),
			word_count: text.split_whitespace().count(),
			title: "t".to_string(),
			category: category.to_string(),
			filename: "t.txt".to_string(),
			relative_path: "t.txt".to_string(),
			is_fragment: false,
		}
	}

	#[test]
	fn keyword_resolves_to_exactly_the_chunks_containing_it() {
		let chunks = vec![
			chunk("c0", "General", "This is a test of the index."),
			chunk("c1", "General", "Nothing to see here, move along."),
			chunk("c2", "FAQ", "Another test: with punctuation!"),
		];
		let index = LexicalIndexer::new().index(&chunks);
		let ids: Vec<&str> = index.words["test"].iter().map(|s| s.as_str()).collect();
		assert_eq!(ids, vec!["c0", "c2"]);
		assert!(!index.words.contains_key("the"));
	}

	#[test]
	fn categories_keep_insertion_order() {
		let chunks = vec![chunk("z", "FAQ", "x"), chunk("a", "FAQ", "y"), chunk("m", "General", "z")];
		let index = LexicalIndexer::new().index(&chunks);
		assert_eq!(index.categories["FAQ"], vec!["z".to_string(), "a".to_string()]);
		assert_eq!(index.category_names(), vec!["FAQ".to_string(), "General".to_string()]);
	}

	#[test]
	fn save_and_load_preserve_the_index() {
		let tmp = TempDir::new().unwrap();
		let layout = IndexLayout::new(tmp.path());
		let index = LexicalIndexer::new().index(&[chunk("c0", "General", "Hotel booking confirmation for the guest.")]);
		index.save(&layout).unwrap();
		assert_eq!(LexicalIndex::load(&layout).unwrap(), index);
	}
}
