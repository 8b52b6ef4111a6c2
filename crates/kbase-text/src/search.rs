use std::collections::HashMap;

use kbase_core::error::{Error, Result};
use kbase_core::layout::{read_json, IndexLayout};
use kbase_core::types::{Chunk, ChunkId, SearchResult, SourceKind};

use crate::index::LexicalIndex;
use crate::normalize::Normalizer;

const WORD_HIT: f32 = 1.0;
const PHRASE_HIT: f32 = 2.0;
const SUBSTRING_HIT: f32 = 0.5;

pub struct LexicalSearchEngine {
	chunks: Vec<Chunk>,
	positions: HashMap<ChunkId, usize>,
	/// Lower-cased normalized text per chunk, parallel to `chunks`.
	haystacks: Vec<String>,
	index: LexicalIndex,
}

impl LexicalSearchEngine {
	/// Validates that every id the index references exists in `chunks`.
	pub fn new(chunks: Vec<Chunk>, index: LexicalIndex) -> Result<Self> {
		let positions: HashMap<ChunkId, usize> = chunks.iter().enumerate().map(|(i, c)| (c.id.clone(), i)).collect();
		if let Some(missing) = index.referenced_ids().find(|id| !positions.contains_key(*id)) {
			return Err(Error::corrupt("lexical", format!("index references unknown chunk id {}", missing)));
		}
		let normalizer = Normalizer::new();
		let haystacks = chunks.iter().map(|c| normalizer.clean_text(&c.text).to_lowercase()).collect();
		Ok(Self { chunks, positions, haystacks, index })
	}

	pub fn open(layout: &IndexLayout) -> Result<Self> {
		let chunks: Vec<Chunk> = read_json(&layout.chunks())?;
		let index = LexicalIndex::load(layout)?;
		Self::new(chunks, index)
	}

	/// Additive scoring: +1 per query word found in the keyword index, +2 per
	/// indexed phrase contained in (or containing) the query, +0.5 when the
	/// query occurs literally in the chunk. Ties keep chunk collection order.
	pub fn search(&self, query: &str, k: usize) -> Vec<SearchResult> {
		if query.trim().is_empty() || k == 0 {
			return Vec::new();
		}
		let query_lower = query.to_lowercase();
		let mut scores: HashMap<usize, f32> = HashMap::new();

		for word in query_lower.split_whitespace() {
			if let Some(ids) = self.index.words.get(word) {
				for id in ids {
					*scores.entry(self.positions[id]).or_insert(0.0) += WORD_HIT;
				}
			}
		}

		for (phrase, ids) in &self.index.phrases {
			if phrase.contains(query_lower.as_str()) || query_lower.contains(phrase.as_str()) {
				for id in ids {
					*scores.entry(self.positions[id]).or_insert(0.0) += PHRASE_HIT;
				}
			}
		}

		for (position, haystack) in self.haystacks.iter().enumerate() {
			if haystack.contains(query_lower.as_str()) {
				*scores.entry(position).or_insert(0.0) += SUBSTRING_HIT;
			}
		}

		let mut ranked: Vec<(usize, f32)> = scores.into_iter().collect();
		ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
		ranked
			.into_iter()
			.take(k)
			.map(|(position, score)| SearchResult {
				chunk: self.chunks[position].clone(),
				search_score: score,
				source: SourceKind::Lexical,
			})
			.collect()
	}

	pub fn categories(&self) -> Vec<String> { self.index.category_names() }

	pub fn chunks_in_category(&self, category: &str) -> Vec<&Chunk> {
		self.index
			.categories
			.get(category)
			.map(|ids| ids.iter().filter_map(|id| self.get_chunk(id)).collect())
			.unwrap_or_default()
	}

	pub fn get_chunk(&self, id: &str) -> Option<&Chunk> {
		self.positions.get(id).map(|&i| &self.chunks[i])
	}

	pub fn chunks(&self) -> &[Chunk] { &self.chunks }

	pub fn index(&self) -> &LexicalIndex { &self.index }
}
