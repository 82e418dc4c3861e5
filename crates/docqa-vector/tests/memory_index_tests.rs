use docqa_core::traits::VectorIndex;
use docqa_core::types::{IndexSpec, Metadata, Metric, VectorRecord};
use docqa_core::Error;
use docqa_vector::InMemoryIndex;

fn spec(dim: usize, metric: Metric) -> IndexSpec {
    IndexSpec { name: "docs".into(), dimension: dim, metric }
}

fn record(id: &str, vector: Vec<f32>) -> VectorRecord {
    VectorRecord { id: id.into(), vector, text: format!("text of {id}"), metadata: Metadata::new() }
}

#[tokio::test]
async fn equal_scores_prefer_latest_insert() {
    let index = InMemoryIndex::new();
    index.ensure_index(&spec(2, Metric::Cosine)).await.expect("ensure");
    index.upsert("docs", vec![record("id1", vec![1.0, 0.0])]).await.expect("upsert 1");
    index.upsert("docs", vec![record("id2", vec![1.0, 1.0])]).await.expect("upsert 2");
    index.upsert("docs", vec![record("id3", vec![2.0, 0.0])]).await.expect("upsert 3");

    let hits = index.search("docs", &[1.0, 0.0], 3).await.expect("search");
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["id3", "id1", "id2"]);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn upsert_replaces_by_id() {
    let index = InMemoryIndex::new();
    index.ensure_index(&spec(2, Metric::Dot)).await.expect("ensure");
    index.upsert("docs", vec![record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0])]).await.expect("upsert");
    index.upsert("docs", vec![record("a", vec![0.0, 3.0])]).await.expect("re-upsert");

    assert_eq!(index.len("docs"), 2);
    let hits = index.search("docs", &[0.0, 1.0], 1).await.expect("search");
    assert_eq!(hits[0].id, "a");
    assert!((hits[0].score - 3.0).abs() < 1e-6);
}

#[tokio::test]
async fn ensure_index_is_idempotent_and_detects_mismatch() {
    let index = InMemoryIndex::new();
    index.ensure_index(&spec(4, Metric::Cosine)).await.expect("first");
    index.ensure_index(&spec(4, Metric::Cosine)).await.expect("second");

    let err = index.ensure_index(&spec(8, Metric::Cosine)).await.unwrap_err();
    assert!(matches!(err, Error::IndexConfigMismatch { expected_dim: 8, actual_dim: 4, .. }));

    let err = index.ensure_index(&spec(4, Metric::Euclidean)).await.unwrap_err();
    assert!(matches!(err, Error::IndexConfigMismatch { actual_metric: Metric::Cosine, .. }));
}

#[tokio::test]
async fn wrong_dimension_rejects_whole_batch() {
    let index = InMemoryIndex::new();
    index.ensure_index(&spec(3, Metric::Cosine)).await.expect("ensure");
    let batch = vec![record("ok", vec![1.0, 0.0, 0.0]), record("bad", vec![1.0, 0.0])];
    assert!(index.upsert("docs", batch).await.is_err());
    assert!(index.is_empty("docs"));
}

#[tokio::test]
async fn missing_index_errors_and_describe_returns_none() {
    let index = InMemoryIndex::new();
    assert!(index.upsert("nope", vec![record("a", vec![1.0])]).await.is_err());
    assert!(index.search("nope", &[1.0], 3).await.is_err());
    assert!(index.describe_index("nope").await.expect("describe").is_none());
}

#[tokio::test]
async fn describe_reports_count_and_settings() {
    let index = InMemoryIndex::new();
    index.ensure_index(&spec(2, Metric::Euclidean)).await.expect("ensure");
    index.upsert("docs", vec![record("a", vec![0.0, 0.0]), record("b", vec![3.0, 4.0])]).await.expect("upsert");

    let d = index.describe_index("docs").await.expect("describe").expect("present");
    assert_eq!((d.dimension, d.metric, d.count), (2, Metric::Euclidean, 2));

    let hits = index.search("docs", &[0.0, 0.0], 2).await.expect("search");
    assert_eq!(hits[0].id, "a");
    assert!((hits[1].score - 1.0 / 26.0).abs() < 1e-6);
}

#[tokio::test]
async fn replace_document_drops_stale_chunks_of_that_document_only() {
    let index = InMemoryIndex::new();
    index.ensure_index(&spec(2, Metric::Cosine)).await.expect("ensure");
    index
        .upsert("docs", vec![
            record("k1:0", vec![1.0, 0.0]),
            record("k1:1", vec![1.0, 0.1]),
            record("k1:2", vec![1.0, 0.2]),
            record("k10:0", vec![0.0, 1.0]),
            record("k2:0", vec![0.5, 0.5]),
        ])
        .await
        .expect("upsert");

    index.replace_document("docs", "k1", vec![record("k1:0", vec![0.0, 2.0])]).await.expect("replace");

    assert_eq!(index.len("docs"), 3);
    let hits = index.search("docs", &[1.0, 0.0], 5).await.expect("search");
    let mut ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["k1:0", "k10:0", "k2:0"]);

    // a rejected batch leaves the old chunks in place
    let bad = vec![record("k2:0", vec![1.0, 0.0, 0.0])];
    assert!(index.replace_document("docs", "k2", bad).await.is_err());
    assert_eq!(index.len("docs"), 3);
}
