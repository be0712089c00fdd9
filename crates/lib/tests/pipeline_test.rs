//! # Pipeline Tests
//!
//! End-to-end runs of the process stage over an in-memory object store with a
//! mock enrichment provider.

mod common;

use async_trait::async_trait;
use common::{
    acme_job, enricher_with, numbered_jobs, put_raw_batch, setup_tracing, MockAiProvider,
};
use jobflow::assemble::BatchAssembler;
use jobflow::load::read_processed_csv;
use jobflow::pipeline::{Pipeline, RunOutcome, RunReport};
use jobflow::processor::{JobProcessor, ParseFailurePolicy, ProcessorOptions};
use jobflow::storage::{MemoryObjectStore, ObjectMeta, ObjectStore, StoreError};
use jobflow::PipelineError;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn pipeline(
    store: Arc<dyn ObjectStore>,
    provider: MockAiProvider,
    options: ProcessorOptions,
    chunk_size: usize,
    archive_input: bool,
) -> Pipeline {
    Pipeline::new(
        store,
        JobProcessor::new(enricher_with(provider), options),
        BatchAssembler::new(chunk_size),
        archive_input,
    )
}

async fn run_completed(pipeline: &Pipeline) -> RunReport {
    match pipeline.run().await.expect("run failed") {
        RunOutcome::Completed(report) => report,
        RunOutcome::NothingToDo => panic!("expected a completed run"),
    }
}

#[tokio::test]
async fn test_single_job_end_to_end() {
    setup_tracing();
    let store = MemoryObjectStore::new();
    put_raw_batch(&store, "raw_data/jobs_20240105_000000.json", vec![acme_job()]).await;
    let p = pipeline(
        Arc::new(store.clone()),
        MockAiProvider::new(vec![]),
        ProcessorOptions::default(),
        1000,
        false,
    );

    let report = run_completed(&p).await;

    assert!(report.is_success());
    assert_eq!(report.total_jobs, 1);
    assert_eq!(report.processed_jobs, 1);
    assert_eq!(report.chunks.len(), 1);
    assert_eq!(report.chunks[0].key, "processed_data/jobs_20240105_000000_1.csv");

    let body = store.get(&report.chunks[0].key).await.unwrap();
    let rows = read_processed_csv(&report.chunks[0].key, &body).unwrap();
    assert_eq!(rows.len(), 1);
    let job = &rows[0];
    assert_eq!(job.job_salary, Some(120000.0));
    assert_eq!(job.job_application_link, "https://acme.co/apply");
    assert!(job.date_posted.is_some());
    assert_eq!(job.job_hash.len(), 64);
    assert!(job.job_hash.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(job.job_description, "Build and operate batch data pipelines.");
    assert_eq!(job.job_highlights.as_deref(), Some("• SQL\n• Python"));
    assert_eq!(job.job_responsibilities.as_deref(), Some("• Own the ETL\n• Review code"));
    assert_eq!(job.job_benefits.as_deref(), Some("• Health insurance"));
    // The input stays in place unless archiving is enabled.
    assert!(store.keys().contains(&"raw_data/jobs_20240105_000000.json".to_string()));
}

#[tokio::test]
async fn test_non_list_data_aborts_without_output() {
    setup_tracing();
    let store = MemoryObjectStore::new();
    let body = serde_json::to_vec(&json!({ "data": { "job_title": "Data Engineer" } })).unwrap();
    store.put("raw_data/jobs.json", body).await.unwrap();
    let provider = MockAiProvider::new(vec![]);
    let p = pipeline(
        Arc::new(store.clone()),
        provider.clone(),
        ProcessorOptions::default(),
        1000,
        true,
    );

    let err = p.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::InvalidInput { ref reason, .. } if reason.contains("an object")));
    assert_eq!(provider.calls(), 0);
    assert_eq!(store.keys(), vec!["raw_data/jobs.json".to_string()]);
}

#[tokio::test]
async fn test_missing_input_is_nothing_to_do() {
    setup_tracing();
    let store = MemoryObjectStore::new();
    store.put("processed_data/old_1.csv", b"x".to_vec()).await.unwrap();
    let p = pipeline(
        Arc::new(store),
        MockAiProvider::new(vec![]),
        ProcessorOptions::default(),
        1000,
        false,
    );

    assert_eq!(p.run().await.unwrap(), RunOutcome::NothingToDo);
}

#[tokio::test]
async fn test_newest_input_is_processed() {
    setup_tracing();
    let store = MemoryObjectStore::new();
    put_raw_batch(&store, "raw_data/jobs_b.json", numbered_jobs(1)).await;
    put_raw_batch(&store, "raw_data/jobs_a.json", numbered_jobs(2)).await;
    let p = pipeline(
        Arc::new(store),
        MockAiProvider::new(vec![]),
        ProcessorOptions::default(),
        1000,
        false,
    );

    let report = run_completed(&p).await;
    assert_eq!(report.input_key, "raw_data/jobs_a.json");
    assert_eq!(report.total_jobs, 2);
}

#[tokio::test]
async fn test_large_batch_is_chunked() {
    setup_tracing();
    let store = MemoryObjectStore::new();
    put_raw_batch(&store, "raw_data/jobs_big.json", numbered_jobs(2500)).await;
    let p = pipeline(
        Arc::new(store.clone()),
        MockAiProvider::new(vec![]),
        ProcessorOptions::default(),
        1000,
        true,
    );

    let report = run_completed(&p).await;

    let sizes: Vec<usize> = report.chunks.iter().map(|c| c.rows).collect();
    assert_eq!(sizes, vec![1000, 1000, 500]);
    let keys: Vec<&str> = report.chunks.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "processed_data/jobs_big_1000.csv",
            "processed_data/jobs_big_2000.csv",
            "processed_data/jobs_big_2500.csv",
        ]
    );
    assert_eq!(report.processed_jobs, 2500);
    assert_eq!(report.archived.as_deref(), Some("archive/jobs_big.json"));
    assert!(!store.keys().contains(&"raw_data/jobs_big.json".to_string()));
}

#[tokio::test]
async fn test_in_flight_calls_are_capped() {
    setup_tracing();
    let store = MemoryObjectStore::new();
    put_raw_batch(&store, "raw_data/jobs.json", numbered_jobs(30)).await;
    let provider = MockAiProvider::new(vec![]).with_delay(Duration::from_millis(20));
    let options = ProcessorOptions {
        max_concurrency: 5,
        ..ProcessorOptions::default()
    };
    let p = pipeline(Arc::new(store), provider.clone(), options, 1000, false);

    let report = run_completed(&p).await;

    assert_eq!(report.processed_jobs, 30);
    assert_eq!(provider.calls(), 30);
    assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_job_level_failures_do_not_abort() {
    setup_tracing();
    let store = MemoryObjectStore::new();
    let mut jobs = numbered_jobs(2);
    jobs.push(json!("not a job"));
    jobs.push(json!(42));
    put_raw_batch(&store, "raw_data/jobs.json", jobs).await;
    let p = pipeline(
        Arc::new(store),
        MockAiProvider::failing(),
        ProcessorOptions::default(),
        1000,
        false,
    );

    let report = run_completed(&p).await;

    assert_eq!(report.total_jobs, 4);
    assert_eq!(report.processed_jobs, 2);
    assert_eq!(report.dropped_jobs, 2);
    assert_eq!(report.enrichment.fallbacks, 2);
    assert!(report.is_success());
}

#[tokio::test]
async fn test_parse_failure_policy() {
    setup_tracing();
    let not_json = || MockAiProvider::new(vec![]).with_default("no json here");

    for (policy, expected) in [
        (ParseFailurePolicy::KeepPartial, 1),
        (ParseFailurePolicy::Skip, 0),
    ] {
        let store = MemoryObjectStore::new();
        put_raw_batch(&store, "raw_data/jobs.json", vec![acme_job()]).await;
        let options = ProcessorOptions {
            on_parse_failure: policy,
            ..ProcessorOptions::default()
        };
        let p = pipeline(Arc::new(store), not_json(), options, 1000, false);

        let report = run_completed(&p).await;
        assert_eq!(report.processed_jobs, expected, "{policy:?}");
        assert_eq!(report.enrichment.parse_failures, 1);
    }
}

#[tokio::test]
async fn test_duplicate_jobs_share_a_hash() {
    setup_tracing();
    let store = MemoryObjectStore::new();
    let mut twin = acme_job();
    twin["job_title"] = json!("  DATA ENGINEER ");
    twin["job_description"] = json!("A different description");
    put_raw_batch(&store, "raw_data/jobs.json", vec![acme_job(), twin]).await;
    let p = pipeline(
        Arc::new(store.clone()),
        MockAiProvider::new(vec![]),
        ProcessorOptions::default(),
        1000,
        false,
    );

    let report = run_completed(&p).await;
    let body = store.get(&report.chunks[0].key).await.unwrap();
    let rows = read_processed_csv(&report.chunks[0].key, &body).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].job_hash, rows[1].job_hash);
}

// --- Chunk failures ---

/// Wraps a memory store and rejects writes to one key.
#[derive(Debug, Clone)]
struct RejectingStore {
    inner: MemoryObjectStore,
    reject: String,
}

#[async_trait]
impl ObjectStore for RejectingStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        self.inner.list(prefix).await
    }
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.get(key).await
    }
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        if key == self.reject {
            return Err(StoreError::Io {
                key: key.to_string(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.put(key, body).await
    }
    async fn copy(&self, from: &str, to: &str) -> Result<(), StoreError> {
        self.inner.copy(from, to).await
    }
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }
}

#[tokio::test]
async fn test_failed_chunk_is_reported_and_input_kept() {
    setup_tracing();
    let inner = MemoryObjectStore::new();
    put_raw_batch(&inner, "raw_data/jobs.json", numbered_jobs(5)).await;
    let store = RejectingStore {
        inner: inner.clone(),
        reject: "processed_data/jobs_4.csv".to_string(),
    };
    let p = pipeline(
        Arc::new(store),
        MockAiProvider::new(vec![]),
        ProcessorOptions::default(),
        2,
        true,
    );

    let report = run_completed(&p).await;

    assert!(!report.is_success());
    let persisted: Vec<bool> = report.chunks.iter().map(|c| c.is_persisted()).collect();
    assert_eq!(persisted, vec![true, false, true]);
    assert!(report.chunks[1].error.as_deref().unwrap().contains("disk full"));
    assert_eq!(report.archived, None);
    assert!(inner.keys().contains(&"raw_data/jobs.json".to_string()));
    assert!(inner.keys().contains(&"processed_data/jobs_5.csv".to_string()));
}
