use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tempfile::TempDir;

use super::*;
use crate::embedding::{EmbeddingError, MockEmbedder};
use crate::error::ErrorKind;
use crate::payload::{
    ClinicalPearls, Interpretation, Pearl, ResponsePayload, Urgency,
};
use crate::storage::SnapshotFile;

const DIM: usize = 8;

fn basis(i: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[i % DIM] = 1.0;
    v
}

fn pearls(title: &str) -> ResponsePayload {
    ResponsePayload::ClinicalPearls(ClinicalPearls {
        pearls: vec![Pearl {
            title: title.to_string(),
            content: "content".to_string(),
            category: "general".to_string(),
        }],
    })
}

fn interpretation(summary: &str) -> ResponsePayload {
    ResponsePayload::Interpretation(Interpretation {
        summary: summary.to_string(),
        findings: vec![],
        recommendations: vec![],
        urgency: Urgency::Routine,
    })
}

fn raw_entry(
    category: Category,
    confidence: f64,
    usage_count: u64,
    age_days: i64,
    embedding: Vec<f32>,
) -> KnowledgeEntry {
    let response = match category.payload_kind() {
        crate::payload::PayloadKind::ClinicalPearls => pearls("p"),
        _ => interpretation("s"),
    };
    KnowledgeEntry {
        id: EntryId::new(),
        category,
        topic: "topic".to_string(),
        query_text: format!("seeded {}", confidence),
        response,
        embedding,
        confidence,
        usage_count,
        created_at: Utc::now() - TimeDelta::days(age_days),
        last_used_at: None,
    }
}

fn embedder() -> Arc<MockEmbedder> {
    let e = MockEmbedder::new(DIM);
    e.set_vector("Na 130", basis(0));
    e.set_vector("sodium one thirty", basis(0));
    e.set_vector("K 6.1", basis(1));
    e.set_vector("anemia pearls", basis(2));
    Arc::new(e)
}

async fn memory_store(embedder: Arc<MockEmbedder>) -> KnowledgeStore<MemoryBackend> {
    KnowledgeStore::open(MemoryBackend::new(), embedder, StoreConfig::default())
        .await
        .unwrap()
}

async fn sqlite_store(
    embedder: Arc<MockEmbedder>,
    dir: &TempDir,
) -> KnowledgeStore<SqliteBackend> {
    let url = format!("sqlite://{}", dir.path().join("knowledge.db").display());
    let backend = SqliteBackend::connect(&url, 4).await.unwrap();
    KnowledgeStore::open(backend, embedder, StoreConfig::default())
        .await
        .unwrap()
}

async fn check_store_then_exact_search<B: KnowledgeBackend>(store: KnowledgeStore<B>) {
    let id = store
        .store(
            Category::LabInterpretation,
            "sodium",
            "Na 130",
            interpretation("low sodium"),
            0.8,
        )
        .await
        .unwrap();

    let results = store
        .search("Na 130", Category::LabInterpretation, 0.85, 3)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].entry.id, id);
    assert!((results[0].similarity - 1.0).abs() < 1e-6);
    assert_eq!(results[0].entry.usage_count, 0);
    assert_eq!(results[0].entry.response, interpretation("low sodium"));
}

#[tokio::test]
async fn test_store_then_exact_search_memory() {
    check_store_then_exact_search(memory_store(embedder()).await).await;
}

#[tokio::test]
async fn test_store_then_exact_search_sqlite() {
    let dir = TempDir::new().unwrap();
    check_store_then_exact_search(sqlite_store(embedder(), &dir).await).await;
}

async fn check_search_is_category_scoped<B: KnowledgeBackend>(store: KnowledgeStore<B>) {
    store
        .store(Category::LabInterpretation, "sodium", "Na 130", interpretation("x"), 0.8)
        .await
        .unwrap();

    let other = store
        .search("Na 130", Category::ImagingInterpretation, 0.85, 3)
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn test_search_is_category_scoped_memory() {
    check_search_is_category_scoped(memory_store(embedder()).await).await;
}

#[tokio::test]
async fn test_search_is_category_scoped_sqlite() {
    let dir = TempDir::new().unwrap();
    check_search_is_category_scoped(sqlite_store(embedder(), &dir).await).await;
}

async fn check_increment_usage<B: KnowledgeBackend>(store: KnowledgeStore<B>) {
    let id = store
        .store(Category::TeachingPearls, "anemia", "anemia pearls", pearls("iron"), 0.8)
        .await
        .unwrap();

    assert_eq!(store.increment_usage(id).await.unwrap(), Some(1));
    assert_eq!(store.increment_usage(id).await.unwrap(), Some(2));

    let entry = store.get(id).await.unwrap().unwrap();
    assert_eq!(entry.usage_count, 2);
    assert!(entry.last_used_at.is_some());

    assert_eq!(store.increment_usage(EntryId::new()).await.unwrap(), None);
}

#[tokio::test]
async fn test_increment_usage_memory() {
    check_increment_usage(memory_store(embedder()).await).await;
}

#[tokio::test]
async fn test_increment_usage_sqlite() {
    let dir = TempDir::new().unwrap();
    check_increment_usage(sqlite_store(embedder(), &dir).await).await;
}

async fn check_confidence_ema<B: KnowledgeBackend>(store: KnowledgeStore<B>) {
    let id = store
        .store(Category::LabInterpretation, "sodium", "Na 130", interpretation("x"), 0.8)
        .await
        .unwrap();

    let updated = store.update_confidence(id, 1.0).await.unwrap().unwrap();
    assert!((updated - 0.86).abs() < 1e-9);

    let entry = store.get(id).await.unwrap().unwrap();
    assert!((entry.confidence - 0.86).abs() < 1e-9);

    let lowered = store.update_confidence(id, 0.0).await.unwrap().unwrap();
    assert!((lowered - 0.602).abs() < 1e-9);

    assert_eq!(store.update_confidence(EntryId::new(), 0.5).await.unwrap(), None);
}

#[tokio::test]
async fn test_confidence_ema_memory() {
    check_confidence_ema(memory_store(embedder()).await).await;
}

#[tokio::test]
async fn test_confidence_ema_sqlite() {
    let dir = TempDir::new().unwrap();
    check_confidence_ema(sqlite_store(embedder(), &dir).await).await;
}

async fn check_cleanup_or_semantics<B: KnowledgeBackend>(store: KnowledgeStore<B>) {
    let a = raw_entry(Category::LabInterpretation, 0.2, 5, 1, basis(3));
    let b = raw_entry(Category::LabInterpretation, 0.9, 0, 100, basis(4));
    let c = raw_entry(Category::LabInterpretation, 0.9, 0, 10, basis(5));
    let d = raw_entry(Category::LabInterpretation, 0.9, 3, 400, basis(6));
    let (a_id, b_id, c_id, d_id) = (a.id, b.id, c.id, d.id);

    for entry in [a, b, c, d] {
        store.backend().insert(entry).await.unwrap();
    }

    let deleted = store.cleanup(0.3, 90).await.unwrap();
    assert_eq!(deleted, 2);

    assert!(store.get(a_id).await.unwrap().is_none());
    assert!(store.get(b_id).await.unwrap().is_none());
    assert!(store.get(c_id).await.unwrap().is_some());
    assert!(store.get(d_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_cleanup_or_semantics_memory() {
    check_cleanup_or_semantics(memory_store(embedder()).await).await;
}

#[tokio::test]
async fn test_cleanup_or_semantics_sqlite() {
    let dir = TempDir::new().unwrap();
    check_cleanup_or_semantics(sqlite_store(embedder(), &dir).await).await;
}

async fn check_stats<B: KnowledgeBackend>(store: KnowledgeStore<B>) {
    let empty = store.stats().await.unwrap();
    assert_eq!(empty.total_entries, 0);
    assert_eq!(empty.average_confidence, 0.0);
    assert_eq!(empty.by_category.len(), Category::ALL.len());

    let popular = raw_entry(Category::LabInterpretation, 0.6, 10, 0, basis(0));
    let quiet = raw_entry(Category::TeachingPearls, 1.0, 2, 0, basis(1));
    let popular_id = popular.id;
    store.backend().insert(popular).await.unwrap();
    store.backend().insert(quiet).await.unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.total_usage, 12);
    assert!((stats.average_confidence - 0.8).abs() < 1e-9);
    assert_eq!(stats.by_category[&Category::LabInterpretation], 1);
    assert_eq!(stats.by_category[&Category::TeachingPearls], 1);
    assert_eq!(stats.by_category[&Category::TeachingQuestions], 0);
    assert_eq!(stats.top_entries[0].id, popular_id);
}

#[tokio::test]
async fn test_stats_memory() {
    check_stats(memory_store(embedder()).await).await;
}

#[tokio::test]
async fn test_stats_sqlite() {
    let dir = TempDir::new().unwrap();
    check_stats(sqlite_store(embedder(), &dir).await).await;
}

async fn check_full_text_search<B: KnowledgeBackend>(store: KnowledgeStore<B>) {
    let mut sodium = raw_entry(Category::LabInterpretation, 0.8, 1, 0, basis(0));
    sodium.query_text = "Serum Sodium 130 in elderly".to_string();
    sodium.topic = "sodium".to_string();
    let mut potassium = raw_entry(Category::LabInterpretation, 0.8, 9, 0, basis(1));
    potassium.query_text = "Potassium 6.1 with peaked T waves".to_string();
    potassium.topic = "potassium".to_string();
    let sodium_id = sodium.id;

    store.backend().insert(sodium).await.unwrap();
    store.backend().insert(potassium).await.unwrap();

    let hits = store.full_text_search("SODIUM elderly", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, sodium_id);

    let none = store.full_text_search("sodium peaked", 10).await.unwrap();
    assert!(none.is_empty());

    let by_topic = store.full_text_search("potassium", 10).await.unwrap();
    assert_eq!(by_topic.len(), 1);

    let err = store.full_text_search("   ", 10).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
}

#[tokio::test]
async fn test_full_text_search_memory() {
    check_full_text_search(memory_store(embedder()).await).await;
}

#[tokio::test]
async fn test_full_text_search_sqlite() {
    let dir = TempDir::new().unwrap();
    check_full_text_search(sqlite_store(embedder(), &dir).await).await;
}

#[tokio::test]
async fn test_candidate_window_limits_scored_entries() {
    let store = KnowledgeStore::open(
        MemoryBackend::new(),
        embedder(),
        StoreConfig::default().candidate_window(2),
    )
    .await
    .unwrap();

    let weak_exact = raw_entry(Category::LabInterpretation, 0.1, 0, 0, basis(0));
    store.backend().insert(weak_exact).await.unwrap();
    for i in 1..=2 {
        let strong = raw_entry(Category::LabInterpretation, 0.9, 0, 0, basis(i));
        store.backend().insert(strong).await.unwrap();
    }

    let results = store
        .search("Na 130", Category::LabInterpretation, 0.85, 3)
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_store_rejects_out_of_range_confidence() {
    let store = memory_store(embedder()).await;
    for bad in [-0.1, 1.5, f64::NAN] {
        let err = store
            .store(Category::LabInterpretation, "t", "Na 130", interpretation("x"), bad)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    }
}

#[tokio::test]
async fn test_store_rejects_payload_for_wrong_category() {
    let store = memory_store(embedder()).await;
    let err = store
        .store(Category::TeachingQuestions, "t", "Na 130", pearls("x"), 0.8)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
}

#[tokio::test]
async fn test_update_confidence_rejects_out_of_range_feedback() {
    let store = memory_store(embedder()).await;
    let err = store.update_confidence(EntryId::new(), 1.2).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidFeedback { .. }));
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
}

#[tokio::test]
async fn test_dimension_mismatch_is_validation_failure() {
    let embedder = embedder();
    embedder.set_vector("wide", vec![1.0; DIM + 1]);
    let store = memory_store(embedder).await;

    let store_err = store
        .store(Category::LabInterpretation, "t", "wide", interpretation("x"), 0.8)
        .await
        .unwrap_err();
    assert!(matches!(
        store_err,
        StoreError::DimensionMismatch {
            expected: DIM,
            actual
        } if actual == DIM + 1
    ));
    assert_eq!(store_err.kind(), ErrorKind::ValidationFailure);

    let search_err = store
        .search("wide", Category::LabInterpretation, 0.85, 3)
        .await
        .unwrap_err();
    assert_eq!(search_err.kind(), ErrorKind::ValidationFailure);
}

#[tokio::test]
async fn test_embedding_failure_leaves_no_entry() {
    let embedder = embedder();
    let store = memory_store(embedder.clone()).await;
    embedder.set_failing(true);

    let err = store
        .store(Category::LabInterpretation, "t", "Na 130", interpretation("x"), 0.8)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmbeddingFailure);
    assert_eq!(store.stats().await.unwrap().total_entries, 0);
}

#[tokio::test]
async fn test_embedding_timeout_surfaces_as_embedding_failure() {
    let embedder = embedder();
    embedder.set_delay(Some(Duration::from_millis(300)));
    let store = KnowledgeStore::open(
        MemoryBackend::new(),
        embedder,
        StoreConfig::default().embed_timeout(Duration::from_millis(20)),
    )
    .await
    .unwrap();

    let err = store
        .search("Na 130", Category::LabInterpretation, 0.85, 3)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Embedding {
            source: EmbeddingError::Timeout { .. }
        }
    ));
}

#[tokio::test]
async fn test_open_rejects_configured_dim_that_contradicts_data() {
    let backend = MemoryBackend::new();
    backend
        .insert(raw_entry(Category::LabInterpretation, 0.8, 0, 0, basis(0)))
        .await
        .unwrap();

    let err = KnowledgeStore::open(backend, embedder(), StoreConfig::default().embedding_dim(4))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::DimensionMismatch {
            expected: 4,
            actual: DIM
        }
    ));
}

#[tokio::test]
async fn test_concurrent_increments_memory() {
    let store = memory_store(embedder()).await;
    let id = store
        .store(Category::LabInterpretation, "t", "Na 130", interpretation("x"), 0.8)
        .await
        .unwrap();

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.increment_usage(id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.get(id).await.unwrap().unwrap().usage_count, 50);
}

#[tokio::test]
async fn test_memory_snapshot_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let snapshot = SnapshotFile::in_dir(dir.path());

    let id = {
        let backend = MemoryBackend::open(snapshot.clone()).unwrap();
        let store = KnowledgeStore::open(backend, embedder(), StoreConfig::default())
            .await
            .unwrap();
        let id = store
            .store(Category::LabInterpretation, "sodium", "Na 130", interpretation("x"), 0.8)
            .await
            .unwrap();
        store.increment_usage(id).await.unwrap();
        assert!(store.backend().is_dirty());
        store.flush().await.unwrap();
        assert!(!store.backend().is_dirty());
        id
    };

    let backend = MemoryBackend::open(snapshot).unwrap();
    assert_eq!(backend.len(), 1);
    let store = KnowledgeStore::open(backend, embedder(), StoreConfig::default())
        .await
        .unwrap();
    assert_eq!(store.embedding_dim(), Some(DIM));

    let entry = store.get(id).await.unwrap().unwrap();
    assert_eq!(entry.usage_count, 1);
    assert_eq!(entry.topic, "sodium");
    assert_eq!(entry.embedding, basis(0));
}

async fn insert_raw_row(
    backend: &SqliteBackend,
    id: &str,
    payload_json: &str,
    embedding: Vec<u8>,
    confidence: f64,
) {
    sqlx::query(
        "INSERT INTO knowledge_entries (id, category, topic, query_text, response_payload, \
         embedding, confidence, usage_count, created_at, last_used_at) \
         VALUES (?, 'lab-interpretation', 'sodium', 'Na 130', ?, ?, ?, 0, ?, NULL)",
    )
    .bind(id)
    .bind(payload_json)
    .bind(embedding)
    .bind(confidence)
    .bind(Utc::now().timestamp_millis())
    .execute(backend.pool())
    .await
    .unwrap();
}

#[tokio::test]
async fn test_sqlite_search_skips_undecodable_candidates() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(embedder(), &dir).await;
    let good = store
        .store(Category::LabInterpretation, "sodium", "Na 130", interpretation("low sodium"), 0.8)
        .await
        .unwrap();

    let payload = serde_json::to_string(&interpretation("x")).unwrap();
    insert_raw_row(store.backend(), "not-a-uuid", &payload, vec![0u8], 0.99).await;
    insert_raw_row(store.backend(), &EntryId::new().to_string(), &payload, vec![7u8], 0.98).await;
    insert_raw_row(store.backend(), &EntryId::new().to_string(), "{not json", vec![0u8; DIM * 4], 0.97).await;

    let results = store
        .search("Na 130", Category::LabInterpretation, 0.85, 3)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].entry.id, good);
}

async fn check_full_text_search_folds_ascii_only<B: KnowledgeBackend>(store: KnowledgeStore<B>) {
    let mut edema = raw_entry(Category::ImagingInterpretation, 0.8, 0, 0, basis(3));
    edema.query_text = "Ödem der Beine".to_string();
    edema.topic = "imaging".to_string();
    let id = edema.id;
    store.backend().insert(edema).await.unwrap();

    let exact = store.full_text_search("Ödem", 10).await.unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].id, id);

    let ascii_folded = store.full_text_search("BEINE", 10).await.unwrap();
    assert_eq!(ascii_folded.len(), 1);

    assert!(store.full_text_search("ödem", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_full_text_search_folds_ascii_only_memory() {
    check_full_text_search_folds_ascii_only(memory_store(embedder()).await).await;
}

#[tokio::test]
async fn test_full_text_search_folds_ascii_only_sqlite() {
    let dir = TempDir::new().unwrap();
    check_full_text_search_folds_ascii_only(sqlite_store(embedder(), &dir).await).await;
}
