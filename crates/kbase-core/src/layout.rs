//! On-disk layout of a built index and the atomic file helpers used to publish it.
//!
//! ```text
//! <index_dir>/
//!   chunks.json            chunk collection, position i == vector row i
//!   stats.json
//!   lexical.marker | vector.marker
//!   lexical/{words,phrases,categories}.json
//!   vectors/               LanceDB database
//!   staging/{checkpoint.json, vectors/}
//! ```

use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct IndexLayout {
    root: PathBuf,
}

impl IndexLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }
    pub fn chunks(&self) -> PathBuf { self.root.join("chunks.json") }
    pub fn stats(&self) -> PathBuf { self.root.join("stats.json") }
    pub fn lexical_marker(&self) -> PathBuf { self.root.join("lexical.marker") }
    pub fn vector_marker(&self) -> PathBuf { self.root.join("vector.marker") }
    pub fn lexical_dir(&self) -> PathBuf { self.root.join("lexical") }
    pub fn words(&self) -> PathBuf { self.lexical_dir().join("words.json") }
    pub fn phrases(&self) -> PathBuf { self.lexical_dir().join("phrases.json") }
    pub fn categories(&self) -> PathBuf { self.lexical_dir().join("categories.json") }
    pub fn vectors_dir(&self) -> PathBuf { self.root.join("vectors") }
    pub fn staging_dir(&self) -> PathBuf { self.root.join("staging") }
    pub fn checkpoint(&self) -> PathBuf { self.staging_dir().join("checkpoint.json") }
    pub fn staging_vectors_dir(&self) -> PathBuf { self.staging_dir().join("vectors") }

    /// Remove both mode markers so a half-published index is never "ready".
    pub fn clear_markers(&self) -> Result<()> {
        remove_file_if_exists(&self.lexical_marker())?;
        remove_file_if_exists(&self.vector_marker())
    }
}

/// Serialize `value` next to `path` and rename it into place.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    let tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer(&mut writer, value).map_err(|e| Error::serde(path, e))?;
        writer.flush().map_err(|e| Error::io(path, e))?;
    }
    tmp.as_file().sync_all().map_err(|e| Error::io(path, e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.display().to_string())
        } else {
            Error::io(path, e)
        }
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::corrupt(path, e.to_string()))
}

/// Markers carry a short human-readable payload; only their existence matters.
pub fn write_marker(path: &Path, contents: &str) -> Result<()> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    tmp.write_all(contents.as_bytes()).map_err(|e| Error::io(path, e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Move directory `from` to `to`, replacing whatever was at `to`.
pub fn replace_dir(from: &Path, to: &Path) -> Result<()> {
    remove_dir_if_exists(to)?;
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::rename(from, to).map_err(|e| Error::io(to, e))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn json_write_is_readable_and_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let layout = IndexLayout::new(tmp.path());
        let mut map = BTreeMap::new();
        map.insert("hotel".to_string(), vec!["c1".to_string()]);
        write_json_atomic(&layout.words(), &map).unwrap();
        let back: BTreeMap<String, Vec<String>> = read_json(&layout.words()).unwrap();
        assert_eq!(back, map);
        let entries: Vec<_> = fs::read_dir(layout.lexical_dir()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn read_json_distinguishes_missing_from_corrupt() {
        let tmp = TempDir::new().unwrap();
        let layout = IndexLayout::new(tmp.path());
        assert!(matches!(read_json::<Vec<String>>(&layout.chunks()), Err(Error::NotFound(_))));
        fs::write(layout.chunks(), "{not json").unwrap();
        assert!(matches!(read_json::<Vec<String>>(&layout.chunks()), Err(Error::Corrupt { .. })));
    }

    #[test]
    fn markers_are_cleared_together() {
        let tmp = TempDir::new().unwrap();
        let layout = IndexLayout::new(tmp.path());
        write_marker(&layout.lexical_marker(), "lexical").unwrap();
        write_marker(&layout.vector_marker(), "vector").unwrap();
        layout.clear_markers().unwrap();
        assert!(!layout.lexical_marker().exists());
        assert!(!layout.vector_marker().exists());
        layout.clear_markers().unwrap();
    }

    #[test]
    fn replace_dir_swaps_contents() {
        let tmp = TempDir::new().unwrap();
        let layout = IndexLayout::new(tmp.path());
        fs::create_dir_all(layout.vectors_dir()).unwrap();
        fs::write(layout.vectors_dir().join("old"), "x").unwrap();
        fs::create_dir_all(layout.staging_vectors_dir()).unwrap();
        fs::write(layout.staging_vectors_dir().join("new"), "y").unwrap();
        replace_dir(&layout.staging_vectors_dir(), &layout.vectors_dir()).unwrap();
        assert!(layout.vectors_dir().join("new").exists());
        assert!(!layout.vectors_dir().join("old").exists());
        assert!(!layout.staging_vectors_dir().exists());
    }
}
