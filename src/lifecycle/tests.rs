use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tempfile::TempDir;

use super::*;
use crate::embedding::MockEmbedder;
use crate::knowledge::{
    Category, EntryId, KnowledgeBackend, KnowledgeEntry, KnowledgeStore, MemoryBackend,
    StoreConfig,
};
use crate::payload::{ClinicalPearls, Pearl, ResponsePayload};
use crate::responder::{ResponderConfig, SmartResponder};
use crate::storage::SnapshotFile;
use crate::upstream::MockUpstream;

const DIM: usize = 4;

fn entry(confidence: f64) -> KnowledgeEntry {
    KnowledgeEntry {
        id: EntryId::new(),
        category: Category::TeachingPearls,
        topic: "hematology".to_string(),
        query_text: format!("pearls {}", confidence),
        response: ResponsePayload::ClinicalPearls(ClinicalPearls {
            pearls: vec![Pearl {
                title: "t".to_string(),
                content: "c".to_string(),
                category: "general".to_string(),
            }],
        }),
        embedding: vec![1.0, 0.0, 0.0, 0.0],
        confidence,
        usage_count: 1,
        created_at: Utc::now() - TimeDelta::days(1),
        last_used_at: None,
    }
}

async fn responder(backend: MemoryBackend) -> SmartResponder<MemoryBackend> {
    let store = KnowledgeStore::open(
        backend,
        Arc::new(MockEmbedder::new(DIM)),
        StoreConfig::default(),
    )
    .await
    .unwrap();
    SmartResponder::new(store, Arc::new(MockUpstream::new()), ResponderConfig::default()).unwrap()
}

#[test]
fn test_config_defaults_and_validation() {
    let config = MaintenanceConfig::default();
    assert_eq!(
        config.interval,
        Duration::from_secs(DEFAULT_MAINTENANCE_INTERVAL_SECS)
    );
    assert!(config.enabled);
    assert!(!config.run_on_start);
    assert!(config.validate().is_ok());

    assert!(MaintenanceConfig::default().interval(Duration::ZERO).validate().is_err());
    assert!(
        MaintenanceConfig::default()
            .interval(Duration::ZERO)
            .enabled(false)
            .validate()
            .is_ok()
    );
}

#[tokio::test]
async fn test_run_once_cleans_and_records_report() {
    let responder = responder(MemoryBackend::new()).await;
    let backend = responder.knowledge().backend();
    backend.insert(entry(0.1)).await.unwrap();
    backend.insert(entry(0.9)).await.unwrap();

    let scheduler = MaintenanceScheduler::new(responder, MaintenanceConfig::default()).unwrap();
    let report = scheduler.run_once().await;

    assert_eq!(report.deleted_entries, 1);
    assert_eq!(report.remaining_entries, 1);
    assert_eq!(scheduler.passes(), 1);
    assert_eq!(scheduler.last_report().await, Some(report));
}

#[tokio::test]
async fn test_background_task_runs_and_stops() {
    let responder = responder(MemoryBackend::new()).await;
    responder.knowledge().backend().insert(entry(0.1)).await.unwrap();

    let scheduler = MaintenanceScheduler::new(
        responder,
        MaintenanceConfig::for_testing(Duration::from_millis(20)),
    )
    .unwrap();

    let handle = scheduler.start();
    assert!(scheduler.is_running());

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(scheduler.passes() >= 2);
    assert_eq!(scheduler.last_report().await.unwrap().remaining_entries, 0);

    scheduler.shutdown().await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(!scheduler.is_running());
    assert!(scheduler.is_shutdown_initiated());
}

#[tokio::test]
async fn test_start_twice_spawns_one_task() {
    let responder = responder(MemoryBackend::new()).await;
    let scheduler = MaintenanceScheduler::new(
        responder,
        MaintenanceConfig::default().interval(Duration::from_secs(3600)),
    )
    .unwrap();

    let first = scheduler.start();
    let second = scheduler.start();
    second.await.unwrap();
    assert!(scheduler.is_running());

    scheduler.shutdown().await.unwrap();
    first.await.unwrap();
    assert_eq!(scheduler.passes(), 0);
}

#[tokio::test]
async fn test_disabled_scheduler_does_nothing() {
    let responder = responder(MemoryBackend::new()).await;
    let scheduler = MaintenanceScheduler::new(
        responder,
        MaintenanceConfig::for_testing(Duration::from_millis(10)).enabled(false),
    )
    .unwrap();

    scheduler.start().await.unwrap();
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.passes(), 0);
}

#[tokio::test]
async fn test_shutdown_flushes_snapshot_once() {
    let dir = TempDir::new().unwrap();
    let file = SnapshotFile::in_dir(dir.path());
    let responder = responder(MemoryBackend::open(file.clone()).unwrap()).await;
    let kept = entry(0.9);
    let kept_id = kept.id;
    responder.knowledge().backend().insert(kept).await.unwrap();

    let scheduler = MaintenanceScheduler::new(responder, MaintenanceConfig::default()).unwrap();
    scheduler.shutdown().await.unwrap();
    scheduler.shutdown().await.unwrap();
    assert!(file.exists());

    let reopened = MemoryBackend::open(file).unwrap();
    assert!(reopened.get(kept_id).await.unwrap().is_some());
}
