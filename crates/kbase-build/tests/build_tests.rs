use std::fs;
use std::path::Path;
use tempfile::TempDir;

use kbase_build::{BuildError, Builder};
use kbase_core::config::{BuildStrategy, CategoryRule, Settings};
use kbase_core::layout::{read_json, IndexLayout};
use kbase_core::source::FsDocumentSource;
use kbase_core::traits::{Embedder, EmbedderLoader};
use kbase_core::types::{Chunk, IndexStats, SearchMode};
use kbase_embed::{FakeEmbedder, LocalEmbedderLoader};
use kbase_vector::{read_meta, IndexMeta, VectorIndexWriter, VectorSearchEngine};

const DIM: usize = 16;

struct NoBackend;

impl EmbedderLoader for NoBackend {
    fn load(&self, model: &str) -> anyhow::Result<Box<dyn Embedder>> {
        anyhow::bail!("no embedding runtime for {}", model)
    }
}

fn write_corpus(dir: &Path) {
    fs::create_dir_all(dir.join("F.A.Q")).unwrap();
    fs::create_dir_all(dir.join("Pricing")).unwrap();
    fs::write(dir.join("F.A.Q/booking.txt"), "How do I cancel a hotel booking? Open the reservation and press cancel.").unwrap();
    fs::write(dir.join("F.A.Q/payments.md"), "Payment gateway setup requires merchant credentials and a callback url.").unwrap();
    fs::write(dir.join("Pricing/markup.txt"), "Markup rules apply per contract. ".repeat(40)).unwrap();
    fs::write(dir.join("gds.txt"), "GDS configuration: enter the office id and the pseudo city code.").unwrap();
    fs::write(dir.join("notes.txt"), "Weekly notes about supplier onboarding and hotel content mapping.").unwrap();
}

fn settings(source: &Path, index: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.data.source_dir = source.to_path_buf();
    settings.data.index_dir = index.to_path_buf();
    settings.chunking.chunk_size = 200;
    settings.chunking.overlap = 20;
    settings.build.checkpoint_every = 1;
    settings.embedding.fake_dim = DIM;
    settings.categories = vec![
        CategoryRule::new("F.A.Q", "FAQ"),
        CategoryRule::new("Pricing", "Pricing"),
    ];
    settings
}

fn source_for(settings: &Settings) -> FsDocumentSource {
    FsDocumentSource::new(&settings.data.source_dir, settings.categories.clone())
}

fn load_chunks(layout: &IndexLayout) -> Vec<Chunk> {
    read_json(&layout.chunks()).expect("chunks.json")
}

#[test]
fn streaming_build_publishes_vector_index() {
    let tmp = TempDir::new().unwrap();
    let (src, idx) = (tmp.path().join("kb"), tmp.path().join("index"));
    write_corpus(&src);
    let settings = settings(&src, &idx);
    let source = source_for(&settings);
    let loader = LocalEmbedderLoader::fake(DIM);

    let report = Builder::new(&settings, &source, &loader).run().expect("build");
    assert_eq!(report.strategy, BuildStrategy::Streaming);
    assert_eq!(report.mode, SearchMode::Vector);
    assert_eq!(report.documents, 5);
    assert_eq!(report.categories, vec!["FAQ".to_string(), "General".to_string(), "Pricing".to_string()]);

    let layout = IndexLayout::new(&idx);
    assert!(layout.vector_marker().exists());
    assert!(!layout.lexical_marker().exists());
    assert!(!layout.staging_dir().exists());

    let chunks = load_chunks(&layout);
    assert_eq!(chunks.len(), report.chunks);
    let meta = read_meta(&layout.vectors_dir()).unwrap().expect("meta");
    assert_eq!(meta.model, settings.embedding.small_model);

    let stats: IndexStats = read_json(&layout.stats()).unwrap();
    assert_eq!(stats.search_mode, SearchMode::Vector);
    assert_eq!(stats.vector_count, Some(chunks.len()));
    assert_eq!(stats.dim, Some(DIM));

    let embedder = loader.load(&meta.model).unwrap();
    let engine = VectorSearchEngine::open(&layout.vectors_dir(), chunks, embedder).expect("row counts align");
    assert_eq!(engine.len(), report.chunks);
}

#[test]
fn missing_embedding_backend_falls_back_to_lexical() {
    let tmp = TempDir::new().unwrap();
    let (src, idx) = (tmp.path().join("kb"), tmp.path().join("index"));
    write_corpus(&src);
    let settings = settings(&src, &idx);
    let source = source_for(&settings);

    let report = Builder::new(&settings, &source, &NoBackend).run().expect("build");
    assert_eq!(report.strategy, BuildStrategy::Lexical);
    assert_eq!(report.mode, SearchMode::Lexical);

    let layout = IndexLayout::new(&idx);
    assert!(layout.lexical_marker().exists());
    assert!(!layout.vector_marker().exists());
    assert!(layout.words().exists());
    assert!(layout.phrases().exists());
    assert!(layout.categories().exists());
    let stats: IndexStats = read_json(&layout.stats()).unwrap();
    assert!(stats.unique_keywords.unwrap_or(0) > 0);
}

#[test]
fn all_strategies_failing_leaves_no_marker() {
    let tmp = TempDir::new().unwrap();
    let (src, idx) = (tmp.path().join("kb"), tmp.path().join("index"));
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("empty.txt"), "   \n").unwrap();
    let mut settings = settings(&src, &idx);
    settings.build.strategies = vec![BuildStrategy::Streaming, BuildStrategy::Lexical];
    let source = source_for(&settings);

    match Builder::new(&settings, &source, &NoBackend).run() {
        Err(BuildError::AllStrategiesFailed { attempts }) => {
            assert_eq!(attempts.len(), 2);
            assert_eq!(attempts[0].strategy, BuildStrategy::Streaming);
            assert_eq!(attempts[1].strategy, BuildStrategy::Lexical);
        }
        other => panic!("expected AllStrategiesFailed, got {:?}", other.map(|r| r.strategy)),
    }
    let layout = IndexLayout::new(&idx);
    assert!(!layout.lexical_marker().exists());
    assert!(!layout.vector_marker().exists());
}

#[test]
fn empty_source_reports_no_documents() {
    let tmp = TempDir::new().unwrap();
    let (src, idx) = (tmp.path().join("kb"), tmp.path().join("index"));
    fs::create_dir_all(&src).unwrap();
    let settings = settings(&src, &idx);
    let source = source_for(&settings);
    let loader = LocalEmbedderLoader::fake(DIM);
    assert!(matches!(Builder::new(&settings, &source, &loader).run(), Err(BuildError::NoDocuments(_))));
}

#[test]
fn unreadable_files_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let (src, idx) = (tmp.path().join("kb"), tmp.path().join("index"));
    write_corpus(&src);
    fs::write(src.join("blank.md"), "").unwrap();
    let settings = settings(&src, &idx);
    let source = source_for(&settings);
    let loader = LocalEmbedderLoader::fake(DIM);

    let report = Builder::new(&settings, &source, &loader).run().expect("build");
    assert_eq!(report.documents, 5);
    assert_eq!(report.skipped_files, 1);
}

#[test]
fn paused_build_resumes_to_same_index_as_fresh_build() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("kb");
    write_corpus(&src);
    let loader = LocalEmbedderLoader::fake(DIM);

    let resumed_idx = tmp.path().join("resumed");
    let settings_a = settings(&src, &resumed_idx);
    let source = source_for(&settings_a);

    match Builder::new(&settings_a, &source, &loader).with_file_limit(2).run() {
        Err(BuildError::Paused { processed, remaining }) => assert_eq!((processed, remaining), (2, 3)),
        other => panic!("expected pause, got {:?}", other.map(|r| r.strategy)),
    }
    let layout = IndexLayout::new(&resumed_idx);
    assert!(layout.checkpoint().exists());
    assert!(!layout.vector_marker().exists());

    match Builder::new(&settings_a, &source, &loader).with_file_limit(2).run() {
        Err(BuildError::Paused { processed, remaining }) => assert_eq!((processed, remaining), (4, 1)),
        other => panic!("expected pause, got {:?}", other.map(|r| r.strategy)),
    }

    let report = Builder::new(&settings_a, &source, &loader).run().expect("resume");
    assert_eq!(report.strategy, BuildStrategy::Checkpointed);
    assert_eq!(report.resumed_files, 4);
    assert_eq!(report.documents, 5);
    assert!(!layout.checkpoint().exists());
    assert!(layout.vector_marker().exists());

    let fresh_idx = tmp.path().join("fresh");
    let mut settings_b = settings(&src, &fresh_idx);
    settings_b.build.strategies = vec![BuildStrategy::Checkpointed];
    let fresh = Builder::new(&settings_b, &source, &loader).run().expect("fresh");
    assert_eq!(fresh.chunks, report.chunks);

    let resumed_chunks = load_chunks(&layout);
    let fresh_chunks = load_chunks(&IndexLayout::new(&fresh_idx));
    assert_eq!(resumed_chunks, fresh_chunks);

    let embedder = loader.load(&settings_a.embedding.standard_model).unwrap();
    VectorSearchEngine::open(&layout.vectors_dir(), resumed_chunks, embedder).expect("rows align after resume");
}

#[test]
fn rows_staged_after_last_checkpoint_are_discarded_on_resume() {
    let tmp = TempDir::new().unwrap();
    let (src, idx) = (tmp.path().join("kb"), tmp.path().join("index"));
    write_corpus(&src);
    let settings = settings(&src, &idx);
    let source = source_for(&settings);
    let loader = LocalEmbedderLoader::fake(DIM);

    assert!(matches!(
        Builder::new(&settings, &source, &loader).with_file_limit(3).run(),
        Err(BuildError::Paused { .. })
    ));

    // simulate a crash between an append and the next checkpoint flush
    let layout = IndexLayout::new(&idx);
    let model = settings.embedding.standard_model.clone();
    let embedder = FakeEmbedder::new(&model, DIM);
    let meta = IndexMeta { model: model.clone(), embedder_id: embedder.model_id().to_string(), dim: DIM };
    let mut writer = VectorIndexWriter::open(&layout.staging_vectors_dir(), meta).unwrap();
    let stray = load_stray_chunk();
    writer.append(&[stray.clone()], embedder.embed_batch(&[stray.text.clone()]).unwrap()).unwrap();
    drop(writer);

    let report = Builder::new(&settings, &source, &loader).run().expect("resume");
    let chunks = load_chunks(&layout);
    assert_eq!(chunks.len(), report.chunks);
    VectorSearchEngine::open(&layout.vectors_dir(), chunks, Box::new(embedder)).expect("stray row was truncated");
}

fn load_stray_chunk() -> Chunk {
    Chunk {
        id: "doc_stray_chunk_0".into(),
        doc_id: "doc_stray".into(),
        chunk_index: 0,
        text: "half written".into(),
        char_count: 12,
        word_count: 2,
        title: "stray".into(),
        category: "General".into(),
        filename: "stray.txt".into(),
        relative_path: "stray.txt".into(),
        is_fragment: false,
    }
}

#[test]
fn rebuild_switches_mode_markers() {
    let tmp = TempDir::new().unwrap();
    let (src, idx) = (tmp.path().join("kb"), tmp.path().join("index"));
    write_corpus(&src);
    let settings = settings(&src, &idx);
    let source = source_for(&settings);
    let layout = IndexLayout::new(&idx);

    Builder::new(&settings, &source, &NoBackend).run().expect("lexical build");
    assert!(layout.lexical_marker().exists());

    let loader = LocalEmbedderLoader::fake(DIM);
    Builder::new(&settings, &source, &loader).run().expect("vector build");
    assert!(layout.vector_marker().exists());
    assert!(!layout.lexical_marker().exists());
    assert!(!layout.lexical_dir().exists());

    Builder::new(&settings, &source, &NoBackend).run().expect("lexical rebuild");
    assert!(layout.lexical_marker().exists());
    assert!(!layout.vector_marker().exists());
    assert!(!layout.vectors_dir().exists());
}
