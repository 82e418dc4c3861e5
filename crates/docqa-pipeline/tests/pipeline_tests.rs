use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use docqa_core::config::{FailureMode, Settings};
use docqa_core::loader::LoaderRegistry;
use docqa_core::traits::{Embedder, Generator, VectorIndex};
use docqa_core::types::{IngestRequest, Metadata};
use docqa_core::Error;
use docqa_embed::HashEmbedder;
use docqa_pipeline::{assemble_context, document_key, RagContext, APOLOGY};
use docqa_vector::InMemoryIndex;

const DIM: usize = 64;

/// Returns the context it was given, or fails when told to.
#[derive(Default)]
struct ScriptedGenerator {
    fail: bool,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, question: &str, context: &str) -> anyhow::Result<String> {
        if self.fail {
            anyhow::bail!("generation endpoint unavailable");
        }
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(context.to_string());
        }
        Ok(format!("answer to '{question}'"))
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn dim(&self) -> usize { DIM }
    async fn embed_documents(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding service down")
    }
}

struct SlowEmbedder;

#[async_trait]
impl Embedder for SlowEmbedder {
    fn dim(&self) -> usize { DIM }
    async fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(texts.iter().map(|_| vec![0.0; DIM]).collect())
    }
}

/// Claims the configured dimension but returns shorter vectors.
struct LyingEmbedder;

#[async_trait]
impl Embedder for LyingEmbedder {
    fn dim(&self) -> usize { DIM }
    async fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.5; DIM / 2]).collect())
    }
}

fn settings() -> Settings {
    let mut s = Settings::default();
    s.index.name = "test-index".into();
    s.index.dimension = DIM;
    s.chunking.chunk_size = 120;
    s.chunking.chunk_overlap = 20;
    s
}

struct Harness {
    _tmp: TempDir,
    dir: PathBuf,
    index: Arc<InMemoryIndex>,
    generator: Arc<ScriptedGenerator>,
    rag: RagContext,
}

fn harness_with(settings: Settings, embedder: Arc<dyn Embedder>, generator: ScriptedGenerator) -> Harness {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().to_path_buf();
    let index = Arc::new(InMemoryIndex::new());
    let generator = Arc::new(generator);
    let rag = RagContext::new(
        settings,
        LoaderRegistry::with_defaults(),
        embedder,
        index.clone() as Arc<dyn VectorIndex>,
        generator.clone() as Arc<dyn Generator>,
    )
    .expect("rag context");
    Harness { _tmp: tmp, dir, index, generator, rag }
}

fn harness() -> Harness {
    harness_with(settings(), Arc::new(HashEmbedder::new(DIM)), ScriptedGenerator::default())
}

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write fixture");
    path
}

const HANDBOOK: &str = "Wood stoves need their chimney swept every autumn before the first fire.\n\n\
Rainwater barrels should be covered with mesh so mosquitoes cannot breed in them.\n\n\
Seed potatoes are planted in early spring once the soil can be worked. \
Hill the rows as the plants grow so the tubers stay covered and do not turn green.\n\n\
Chickens need fresh water daily and a dry coop with good ventilation through the winter months.";

#[tokio::test]
async fn caller_metadata_reaches_every_record() {
    let h = harness();
    let path = write(&h.dir, "handbook.txt", HANDBOOK);
    let mut meta = Metadata::new();
    meta.insert("owner".into(), json!("alice"));

    let result = h.rag.ingestion().ingest(IngestRequest::new(&path).with_metadata(meta)).await.expect("ingest");
    assert!(result.chunk_count > 1);
    assert_eq!(h.index.len("test-index"), result.chunk_count);

    let all = h.rag.retrieval().retrieve("anything at all", Some(1000)).await.expect("retrieve");
    assert_eq!(all.len(), result.chunk_count);
    let mut seqs: Vec<u64> = Vec::new();
    for m in &all {
        assert_eq!(m.metadata.get("owner"), Some(&json!("alice")));
        assert_eq!(m.metadata.get("source"), Some(&json!(path.display().to_string())));
        assert_eq!(m.metadata.get("chunk_id"), Some(&json!(m.id)));
        assert!(m.id.starts_with(&result.document_key));
        seqs.push(m.metadata["sequence_index"].as_u64().expect("sequence_index"));
    }
    seqs.sort_unstable();
    assert_eq!(seqs, (0..result.chunk_count as u64).collect::<Vec<_>>());
}

#[tokio::test]
async fn caller_doc_id_drives_ids_and_wins_over_loader_fields() {
    let h = harness();
    let path = write(&h.dir, "notes.md", "Short note about goats.");
    let mut meta = Metadata::new();
    meta.insert("doc_id".into(), json!("goat-notes"));
    meta.insert("source".into(), json!("field-journal"));

    let result = h.rag.ingestion().ingest(IngestRequest::new(&path).with_metadata(meta)).await.expect("ingest");
    assert_eq!(result.chunk_count, 1);
    assert_eq!(result.document_key, document_key("goat-notes"));

    let hits = h.rag.retrieval().retrieve("goats", Some(1)).await.expect("retrieve");
    assert_eq!(hits[0].id, format!("{}:0", result.document_key));
    assert_eq!(hits[0].metadata.get("source"), Some(&json!("field-journal")));
}

#[tokio::test]
async fn reingest_overwrites_instead_of_duplicating() {
    let h = harness();
    let path = write(&h.dir, "handbook.txt", HANDBOOK);
    let first = h.rag.ingestion().ingest(IngestRequest::new(&path)).await.expect("first");
    let second = h.rag.ingestion().ingest(IngestRequest::new(&path)).await.expect("second");
    assert_eq!(first, second);
    assert_eq!(h.index.len("test-index"), first.chunk_count);
}

#[tokio::test]
async fn empty_document_indexes_nothing() {
    let h = harness();
    let path = write(&h.dir, "empty.txt", "");
    let result = h.rag.ingestion().ingest(IngestRequest::new(&path)).await.expect("ingest");
    assert_eq!(result.chunk_count, 0);
    assert!(h.index.is_empty("test-index"));
}

#[tokio::test]
async fn unsupported_format_is_rejected() {
    let h = harness();
    let path = write(&h.dir, "table.xyz", "a,b,c");
    let err = h.rag.ingestion().ingest(IngestRequest::new(&path)).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));
}

#[tokio::test]
async fn extraction_failure_leaves_index_untouched() {
    let h = harness();
    let path = write(&h.dir, "broken.pdf", "this is not a pdf");
    let err = h.rag.ingestion().ingest(IngestRequest::new(&path)).await.unwrap_err();
    assert!(matches!(err, Error::Extraction { .. }));
    assert!(h.index.is_empty("test-index"));
}

#[tokio::test]
async fn embedding_failure_leaves_index_untouched() {
    let h = harness_with(settings(), Arc::new(FailingEmbedder), ScriptedGenerator::default());
    let path = write(&h.dir, "handbook.txt", HANDBOOK);
    let err = h.rag.ingestion().ingest(IngestRequest::new(&path)).await.unwrap_err();
    assert!(matches!(err, Error::Embedding(_)));
    assert!(h.index.is_empty("test-index"));
}

#[tokio::test]
async fn cancelled_ingestion_writes_nothing() {
    let h = harness_with(settings(), Arc::new(SlowEmbedder), ScriptedGenerator::default());
    let path = write(&h.dir, "handbook.txt", HANDBOOK);
    let pipeline = h.rag.ingestion();
    let outcome = tokio::time::timeout(Duration::from_millis(50), pipeline.ingest(IngestRequest::new(&path))).await;
    assert!(outcome.is_err(), "ingestion should still be waiting on the embedder");
    assert!(h.index.is_empty("test-index"));
}

#[tokio::test]
async fn wrong_vector_length_is_a_dimension_mismatch() {
    let h = harness_with(settings(), Arc::new(LyingEmbedder), ScriptedGenerator::default());
    let path = write(&h.dir, "handbook.txt", HANDBOOK);
    let err = h.rag.ingestion().ingest(IngestRequest::new(&path)).await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: DIM, actual: 32 }));
    assert!(h.index.is_empty("test-index"));

    // propagates from queries even in degraded mode
    h.rag.prepare().await.expect("prepare");
    let err = h.rag.retrieval().answer("chimney?", None).await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { .. }));
}

#[tokio::test]
async fn embedder_dimension_is_checked_at_wiring() {
    let err = RagContext::new(
        settings(),
        LoaderRegistry::with_defaults(),
        Arc::new(HashEmbedder::new(DIM * 2)),
        Arc::new(InMemoryIndex::new()),
        Arc::new(ScriptedGenerator::default()),
    )
    .err()
    .expect("mismatch");
    assert!(matches!(err, Error::DimensionMismatch { expected: DIM, actual: 128 }));
}

#[tokio::test]
async fn answer_returns_sources_and_generated_text() {
    let h = harness();
    let path = write(&h.dir, "handbook.txt", HANDBOOK);
    h.rag.ingestion().ingest(IngestRequest::new(&path)).await.expect("ingest");

    let result = h.rag.retrieval().answer("When should the chimney be swept?", None).await.expect("answer");
    assert_eq!(result.answer, "answer to 'When should the chimney be swept?'");
    assert!(!result.sources.is_empty() && result.sources.len() <= 3);
    assert!(result.sources.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(result.sources.iter().any(|m| m.text.contains("chimney")));

    let seen = h.generator.seen.lock().expect("lock");
    assert!(seen[0].starts_with(&result.sources[0].text));
}

#[tokio::test]
async fn context_drops_lowest_ranked_matches_when_too_long() {
    let mut s = settings();
    s.retrieval.max_context_chars = 150;
    let h = harness_with(s, Arc::new(HashEmbedder::new(DIM)), ScriptedGenerator::default());
    let path = write(&h.dir, "handbook.txt", HANDBOOK);
    h.rag.ingestion().ingest(IngestRequest::new(&path)).await.expect("ingest");

    let result = h.rag.retrieval().answer("chimney fire", Some(4)).await.expect("answer");
    assert_eq!(result.sources.len(), 4);
    let seen = h.generator.seen.lock().expect("lock");
    let context = &seen[0];
    assert!(context.chars().count() <= 150);
    assert_eq!(context, &assemble_context(&result.sources, 150));
    let everything = result.sources.iter().map(|m| m.text.as_str()).collect::<Vec<_>>().join("\n\n");
    assert!(everything.chars().count() > 150);
    assert!(context.len() < everything.len());
}

#[tokio::test]
async fn generation_failure_degrades_to_apology() {
    let h = harness_with(settings(), Arc::new(HashEmbedder::new(DIM)), ScriptedGenerator { fail: true, ..Default::default() });
    let path = write(&h.dir, "handbook.txt", HANDBOOK);
    h.rag.ingestion().ingest(IngestRequest::new(&path)).await.expect("ingest");

    let result = h.rag.retrieval().answer("chickens?", None).await.expect("degraded answer");
    assert_eq!(result.answer, APOLOGY);
    assert!(result.sources.is_empty());
}

#[tokio::test]
async fn strict_mode_propagates_failures() {
    let h = harness_with(settings(), Arc::new(HashEmbedder::new(DIM)), ScriptedGenerator { fail: true, ..Default::default() });
    let path = write(&h.dir, "handbook.txt", HANDBOOK);
    h.rag.ingestion().ingest(IngestRequest::new(&path)).await.expect("ingest");

    let strict = h.rag.retrieval().with_failure_mode(FailureMode::Strict);
    let err = strict.answer("chickens?", None).await.unwrap_err();
    assert!(matches!(err, Error::Generation(_)));

    let mut s = settings();
    s.retrieval.failure_mode = FailureMode::Strict;
    let h = harness_with(s, Arc::new(FailingEmbedder), ScriptedGenerator::default());
    let err = h.rag.retrieval().answer("chickens?", None).await.unwrap_err();
    assert!(matches!(err, Error::Retrieval(_)));
}

#[tokio::test]
async fn query_before_any_ingest_degrades() {
    let h = harness();
    let result = h.rag.retrieval().answer("anything?", None).await.expect("degraded");
    assert_eq!(result.answer, APOLOGY);
}

#[tokio::test]
async fn describe_index_after_prepare() {
    let h = harness();
    assert!(matches!(h.rag.describe_index().await.unwrap_err(), Error::NotFound(_)));
    h.rag.prepare().await.expect("prepare");
    let d = h.rag.describe_index().await.expect("describe");
    assert_eq!((d.name.as_str(), d.dimension, d.count), ("test-index", DIM, 0));
}

#[tokio::test]
async fn shortened_document_leaves_no_stale_chunks() {
    let mut s = settings();
    s.chunking.chunk_size = 20;
    s.chunking.chunk_overlap = 0;
    let h = harness_with(s, Arc::new(HashEmbedder::new(DIM)), ScriptedGenerator::default());
    let path = write(&h.dir, "greek.txt", "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi");
    let first = h.rag.ingestion().ingest(IngestRequest::new(&path)).await.expect("first");
    assert!(first.chunk_count > 1);

    write(&h.dir, "greek.txt", "alpha beta");
    let second = h.rag.ingestion().ingest(IngestRequest::new(&path)).await.expect("second");
    assert_eq!(second.chunk_count, 1);
    assert_eq!(h.index.len("test-index"), second.chunk_count);

    let hits = h.rag.retrieval().retrieve("kappa lambda", Some(10)).await.expect("retrieve");
    assert_eq!(hits.len(), 1);
    assert!(hits.iter().all(|m| !m.text.contains("kappa")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ingests_and_answers_do_not_interfere() {
    let h = harness();
    h.rag.prepare().await.expect("prepare");
    let seed = write(&h.dir, "handbook.txt", HANDBOOK);
    let seeded = h.rag.ingestion().ingest(IngestRequest::new(&seed)).await.expect("seed");

    let paragraphs: Vec<&str> = HANDBOOK.split("\n\n").collect();
    let mut ingests = Vec::new();
    for (i, body) in paragraphs.iter().enumerate() {
        let path = write(&h.dir, &format!("part-{i}.txt"), body);
        let rag = h.rag.clone();
        ingests.push(tokio::spawn(async move { rag.ingestion().ingest(IngestRequest::new(&path)).await }));
    }
    let questions = ["chimney?", "mosquitoes?", "potatoes?", "chickens?"];
    let answers = futures::future::join_all(questions.iter().copied().map(|q| {
        let rag = h.rag.clone();
        tokio::spawn(async move { rag.retrieval().answer(q, None).await })
    }))
    .await;

    let mut total = seeded.chunk_count;
    for handle in ingests {
        total += handle.await.expect("join").expect("ingest").chunk_count;
    }
    assert_eq!(h.index.len("test-index"), total);
    for answer in answers {
        let answer = answer.expect("join").expect("answer");
        assert_ne!(answer.answer, APOLOGY);
        assert!(!answer.sources.is_empty());
    }
}
