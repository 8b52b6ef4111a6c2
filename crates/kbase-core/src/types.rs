//! Domain types shared by the lexical and vector engines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::Hasher;
use std::path::PathBuf;
use twox_hash::XxHash64;

pub type ChunkId = String;

pub const DEFAULT_CATEGORY: &str = "General";

/// A file the document source can extract. `id` is the relative path with
/// `/` separators and doubles as the processed-file identifier in checkpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub id: String,
    pub path: PathBuf,
}

/// Structural metadata reported by the document extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub filename: String,
    pub relative_path: String,
    pub category: String,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
    pub extension: String,
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub text: String,
    pub metadata: SourceMetadata,
}

/// A unit of ingested content before chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub title: String,
    pub category: String,
    pub filename: String,
    pub relative_path: String,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
    pub char_count: usize,
    pub word_count: usize,
}

impl Document {
    pub fn from_extracted(extracted: ExtractedDocument) -> Self {
        let ExtractedDocument { text, metadata } = extracted;
        let title = std::path::Path::new(&metadata.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| metadata.filename.clone());
        let category = if metadata.category.trim().is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            metadata.category
        };
        Self {
            id: document_id(&metadata.relative_path),
            char_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
            text,
            title,
            category,
            filename: metadata.filename,
            relative_path: metadata.relative_path,
            size_bytes: metadata.size_bytes,
            modified: metadata.modified,
        }
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            category: self.category.clone(),
            char_count: self.char_count,
            word_count: self.word_count,
        }
    }
}

/// Per-document totals kept after the full text has been dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub category: String,
    pub char_count: usize,
    pub word_count: usize,
}

/// Stable document id derived from the relative path, so that a resumed build
/// assigns the same ids as a build from scratch.
pub fn document_id(relative_path: &str) -> String {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(relative_path.as_bytes());
    format!("doc_{:016x}", hasher.finish())
}

/// A fragment of a document, the atomic unit of both indices.
///
/// - `id`: `{doc_id}_chunk_{chunk_index}`
/// - `is_fragment`: false only when the whole document fit in one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub char_count: usize,
    pub word_count: usize,
    pub title: String,
    pub category: String,
    pub filename: String,
    pub relative_path: String,
    pub is_fragment: bool,
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Vector,
    Lexical,
    Fallback,
}

/// A ranked hit: the chunk fields plus the engine-specific score.
/// Higher is always better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub search_score: f32,
    pub source: SourceKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Lexical,
    Vector,
    Unavailable,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMode::Lexical => f.write_str("lexical"),
            SearchMode::Vector => f.write_str("vector"),
            SearchMode::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Contents of `stats.json`, written by the builder on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub search_mode: SearchMode,
    pub total_documents: usize,
    pub total_chunks: usize,
    pub total_words: usize,
    pub total_characters: usize,
    pub categories: Vec<String>,
    pub documents_by_category: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_keywords: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_phrases: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dim: Option<usize>,
    pub built_at: DateTime<Utc>,
}

impl IndexStats {
    /// Corpus totals for `mode`; mode-specific counts start empty.
    pub fn from_documents(mode: SearchMode, documents: &[DocumentSummary], total_chunks: usize) -> Self {
        let mut documents_by_category: BTreeMap<String, usize> = BTreeMap::new();
        for doc in documents {
            *documents_by_category.entry(doc.category.clone()).or_default() += 1;
        }
        Self {
            search_mode: mode,
            total_documents: documents.len(),
            total_chunks,
            total_words: documents.iter().map(|d| d.word_count).sum(),
            total_characters: documents.iter().map(|d| d.char_count).sum(),
            categories: documents_by_category.keys().cloned().collect(),
            documents_by_category,
            unique_keywords: None,
            unique_phrases: None,
            vector_count: None,
            embedder_id: None,
            dim: None,
            built_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extracted(filename: &str, relative_path: &str, category: &str, text: &str) -> ExtractedDocument {
        ExtractedDocument {
            text: text.to_string(),
            metadata: SourceMetadata {
                filename: filename.to_string(),
                relative_path: relative_path.to_string(),
                category: category.to_string(),
                size_bytes: text.len() as u64,
                modified: None,
                extension: "txt".to_string(),
            },
        }
    }

    #[test]
    fn document_ids_are_stable_per_path() {
        assert_eq!(document_id("a/b.txt"), document_id("a/b.txt"));
        assert_ne!(document_id("a/b.txt"), document_id("a/c.txt"));
        assert!(document_id("x").starts_with("doc_"));
    }

    #[test]
    fn from_extracted_counts_chars_not_bytes() {
        let doc = Document::from_extracted(extracted("заказ.txt", "Меню/заказ.txt", "Orders", "привет мир"));
        assert_eq!(doc.char_count, 10);
        assert_eq!(doc.word_count, 2);
        assert_eq!(doc.title, "заказ");
        assert_eq!(doc.category, "Orders");
    }

    #[test]
    fn blank_category_defaults_to_general() {
        let doc = Document::from_extracted(extracted("a.txt", "a.txt", "  ", "text"));
        assert_eq!(doc.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn stats_aggregate_per_category() {
        let docs = vec![
            DocumentSummary { id: "a".into(), category: "FAQ".into(), char_count: 10, word_count: 2 },
            DocumentSummary { id: "b".into(), category: "General".into(), char_count: 5, word_count: 1 },
            DocumentSummary { id: "c".into(), category: "FAQ".into(), char_count: 1, word_count: 1 },
        ];
        let stats = IndexStats::from_documents(SearchMode::Lexical, &docs, 7);
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.total_chunks, 7);
        assert_eq!(stats.total_words, 4);
        assert_eq!(stats.total_characters, 16);
        assert_eq!(stats.categories, vec!["FAQ".to_string(), "General".to_string()]);
        assert_eq!(stats.documents_by_category["FAQ"], 2);
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json.get("vector_count").is_none());
        assert_eq!(json["search_mode"], "lexical");
    }
}
