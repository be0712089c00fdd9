//! # Object Storage
//!
//! The pipeline reads raw batches from, and writes CSV chunks to, a flat
//! key/value object store with S3-like semantics. Keys are `/`-separated and
//! grouped by prefix (`raw_data/`, `processed_data/`, `archive/`).

pub mod local;
pub mod memory;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Listing entry for a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync + Debug {
    /// Lists every object whose key starts with `prefix`, ordered by key.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Creates or replaces an object.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError>;

    async fn copy(&self, from: &str, to: &str) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Returns the most recently modified object under `prefix`.
pub async fn latest_object(
    store: &dyn ObjectStore,
    prefix: &str,
) -> Result<Option<ObjectMeta>, StoreError> {
    let objects = store.list(prefix).await?;
    Ok(objects
        .into_iter()
        .max_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| a.key.cmp(&b.key))
        }))
}

/// Moves `key` from `from_prefix` to `to_prefix` (copy, then delete).
/// Returns the archive key.
pub async fn archive_object(
    store: &dyn ObjectStore,
    key: &str,
    from_prefix: &str,
    to_prefix: &str,
) -> Result<String, StoreError> {
    let archive_key = match key.strip_prefix(from_prefix) {
        Some(rest) => format!("{to_prefix}{rest}"),
        None => format!("{to_prefix}{key}"),
    };
    store.copy(key, &archive_key).await?;
    store.delete(key).await?;
    info!(key, archive_key = %archive_key, "Archived object");
    Ok(archive_key)
}
