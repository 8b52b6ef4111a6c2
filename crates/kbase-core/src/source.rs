//! Filesystem document source: walks the knowledge directory and extracts
//! plain text, Word documents and ticket exports.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::CategoryRule;
use crate::extract::{csv_tickets, docx_text, jsonl_tickets};
use crate::traits::DocumentSource;
use crate::types::{ExtractedDocument, SourceFile, SourceMetadata, DEFAULT_CATEGORY};

const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];
const WORD_EXTENSION: &str = "docx";
const TICKET_EXTENSIONS: &[&str] = &["jsonl", "csv"];

pub struct FsDocumentSource {
    root: PathBuf,
    rules: Vec<CategoryRule>,
}

impl FsDocumentSource {
    pub fn new(root: impl Into<PathBuf>, rules: Vec<CategoryRule>) -> Self {
        Self { root: root.into(), rules }
    }

    pub fn root(&self) -> &Path { &self.root }

    /// First rule whose pattern occurs in a parent directory segment and
    /// whose `within` section, if any, is also on the path.
    pub fn category_for(&self, relative_path: &Path) -> String {
        let segments: Vec<String> = relative_path
            .parent()
            .map(|p| p.iter().map(|s| s.to_string_lossy().to_string()).collect())
            .unwrap_or_default();
        let on_path = |needle: &str| segments.iter().any(|seg| seg.contains(needle));
        self.rules
            .iter()
            .find(|rule| on_path(&rule.pattern) && rule.within.as_deref().map_or(true, |parent| on_path(parent)))
            .map(|rule| rule.category.clone())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
    }

    fn is_supported(path: &Path) -> bool {
        match path.extension().and_then(|s| s.to_str()).map(|s| s.to_ascii_lowercase()) {
            Some(ext) => {
                TEXT_EXTENSIONS.contains(&ext.as_str()) || ext == WORD_EXTENSION || TICKET_EXTENSIONS.contains(&ext.as_str())
            }
            None => false,
        }
    }

    fn is_skipped_name(name: &str) -> bool {
        // `~$` prefixes are office lock files
        name.starts_with("~$") || name.starts_with('.')
    }
}

impl DocumentSource for FsDocumentSource {
    fn list(&self) -> Result<Vec<SourceFile>> {
        if !self.root.is_dir() {
            anyhow::bail!("source directory {} does not exist", self.root.display());
        }
        let mut files = Vec::new();
        let walker = walkdir::WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !Self::is_skipped_name(&e.file_name().to_string_lossy()));
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !Self::is_supported(entry.path()) {
                continue;
            }
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            let id = relative.iter().map(|s| s.to_string_lossy()).collect::<Vec<_>>().join("/");
            files.push(SourceFile { id, path: entry.path().to_path_buf() });
        }
        files.sort_by(|a, b| a.id.cmp(&b.id));
        tracing::debug!(count = files.len(), root = %self.root.display(), "listed source files");
        Ok(files)
    }

    fn extract(&self, file: &SourceFile) -> Result<ExtractedDocument> {
        let bytes = fs::read(&file.path).with_context(|| format!("reading {}", file.path.display()))?;
        let extension = file
            .path
            .extension()
            .map(|s| s.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let text = match extension.as_str() {
            WORD_EXTENSION => docx_text(&bytes).with_context(|| format!("extracting {}", file.id))?,
            "csv" => csv_tickets(&bytes, &file.id).with_context(|| format!("extracting {}", file.id))?,
            "jsonl" => jsonl_tickets(&String::from_utf8_lossy(&bytes), &file.id),
            _ => String::from_utf8_lossy(&bytes).into_owned(),
        };

        let meta = fs::metadata(&file.path).with_context(|| format!("stat {}", file.path.display()))?;
        let modified = meta.modified().ok().map(DateTime::<Utc>::from);
        let relative = Path::new(&file.id);
        let filename = file
            .path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file.id.clone());

        Ok(ExtractedDocument {
            text,
            metadata: SourceMetadata {
                filename,
                relative_path: file.id.clone(),
                category: self.category_for(relative),
                size_bytes: meta.len(),
                modified,
                extension,
            },
        })
    }
}
