use std::fs;
use tempfile::TempDir;

use kbase_core::chunker::Chunker;
use kbase_core::config::{CategoryRule, ChunkingConfig};
use kbase_core::source::FsDocumentSource;
use kbase_core::traits::DocumentSource;
use kbase_core::types::Document;

#[test]
fn source_to_chunks_example_corpus() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("F.A.Q")).unwrap();
    fs::write(dir.join("F.A.Q/a.txt"), "a".repeat(500)).unwrap();
    fs::write(dir.join("b.txt"), "b".repeat(50)).unwrap();
    fs::write(dir.join("c.txt"), "c".repeat(1200)).unwrap();

    let source = FsDocumentSource::new(dir, vec![CategoryRule::new("F.A.Q", "FAQ")]);
    let chunker = Chunker::new(ChunkingConfig { chunk_size: 256, overlap: 32 });

    let mut per_doc = Vec::new();
    for file in source.list().expect("list") {
        let doc = Document::from_extracted(source.extract(&file).expect("extract"));
        per_doc.push((doc.relative_path.clone(), doc.category.clone(), chunker.chunk(&doc).len()));
    }

    assert_eq!(
        per_doc,
        vec![
            ("F.A.Q/a.txt".to_string(), "FAQ".to_string(), 3),
            ("b.txt".to_string(), "General".to_string(), 1),
            ("c.txt".to_string(), "General".to_string(), 6),
        ]
    );
}

#[test]
fn chunk_ids_are_stable_across_runs() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("doc.txt"), "hotel booking confirmation ".repeat(50)).unwrap();
    let source = FsDocumentSource::new(tmp.path(), vec![]);
    let chunker = Chunker::new(ChunkingConfig { chunk_size: 100, overlap: 10 });

    let run = || {
        let file = source.list().unwrap().remove(0);
        let doc = Document::from_extracted(source.extract(&file).unwrap());
        chunker.chunk(&doc).into_iter().map(|c| c.id).collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}
