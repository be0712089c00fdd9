//! # Fetch Stage Tests
//!
//! Runs `JobSearchClient` against a wiremock job-search API.

mod common;

use common::setup_tracing;
use jobflow::fetch::{fetch_to_store, FetchError, JobSearchClient, SearchParams, SearchSettings};
use jobflow::storage::{MemoryObjectStore, ObjectStore};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> JobSearchClient {
    JobSearchClient::new(SearchSettings {
        api_url: format!("{}/search", server.uri()),
        api_key: Some("rapid-key".to_string()),
        min_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
        ..SearchSettings::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_fetch_sends_defaults_and_stores_response() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(header("X-RapidAPI-Key", "rapid-key"))
        .and(header("X-RapidAPI-Host", "jsearch.p.rapidapi.com"))
        .and(query_param("query", "Data Engineer"))
        .and(query_param("location", "USA"))
        .and(query_param("num_pages", "2"))
        .and(query_param("date_posted", "all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "data": [{"job_title": "Data Engineer"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let store = MemoryObjectStore::new();

    let key = fetch_to_store(&client_for(&server), &SearchParams::default(), &store)
        .await
        .unwrap();

    assert!(key.starts_with("raw_data/jobs_"));
    assert!(key.ends_with(".json"));
    assert_eq!(key.len(), "raw_data/jobs_20240105_120000.json".len());
    let stored: Value = serde_json::from_slice(&store.get(&key).await.unwrap()).unwrap();
    assert_eq!(stored["data"][0]["job_title"], "Data Engineer");
}

#[tokio::test]
async fn test_fetch_retries_server_errors() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server)
        .fetch_jobs(&SearchParams::default())
        .await
        .unwrap();
    assert_eq!(response, json!({ "data": [] }));
}

#[tokio::test]
async fn test_fetch_gives_up_after_three_attempts() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch_jobs(&SearchParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 429, .. }));
}

#[tokio::test]
async fn test_client_errors_and_bad_bodies_are_not_retried() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "forbidden"))
        .respond_with(ResponseTemplate::new(403).set_body_string("no access"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server);
    let params = |query: &str| SearchParams {
        query: query.to_string(),
        ..SearchParams::default()
    };

    assert!(matches!(
        client.fetch_jobs(&params("forbidden")).await,
        Err(FetchError::Status { status: 403, .. })
    ));
    assert!(matches!(
        client.fetch_jobs(&params("garbled")).await,
        Err(FetchError::InvalidResponse(_))
    ));
}

#[test]
fn test_missing_api_key() {
    let result = JobSearchClient::new(SearchSettings {
        api_key: Some("  ".to_string()),
        ..SearchSettings::default()
    });
    assert!(matches!(result, Err(FetchError::MissingApiKey)));
}
