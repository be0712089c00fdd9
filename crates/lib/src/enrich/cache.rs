//! Bounded cache of raw enrichment responses.

use crate::providers::ai::GenerationParams;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Raw service responses keyed by a digest of the request.
///
/// Holds at most `capacity` entries. When full, an arbitrary entry is evicted
/// to admit a new one. Responses are stored unparsed so that parser changes
/// take effect on cache hits.
#[derive(Debug)]
pub struct ResponseCache {
    capacity: usize,
    entries: Mutex<HashMap<String, String>>,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Digest of the prompt template, the input text and the generation parameters.
    pub fn key(template: &str, text: &str, params: &GenerationParams) -> String {
        let mut hasher = Sha256::new();
        for part in [template, text] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hasher.update(
            format!(
                "{{max_tokens={}, temperature={}, model={}}}",
                params.max_tokens, params.temperature, params.model
            )
            .as_bytes(),
        );
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Stores a response, evicting one existing entry if the cache is full.
    pub fn insert(&self, key: String, response: String) {
        let mut entries = self.lock();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            if let Some(victim) = entries.keys().next().cloned() {
                debug!(key = %victim, "Evicting cached enrichment response");
                entries.remove(&victim);
            }
        }
        entries.insert(key, response);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_never_exceeded() {
        let cache = ResponseCache::new(2);
        cache.insert("a".into(), "1".into());
        cache.insert("b".into(), "2".into());
        cache.insert("c".into(), "3".into());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("c").as_deref(), Some("3"));

        // Overwriting an existing key does not evict.
        cache.insert("c".into(), "4".into());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("c").as_deref(), Some("4"));
    }

    #[test]
    fn test_key_depends_on_every_input() {
        let params = GenerationParams::default();
        let base = ResponseCache::key("t", "x", &params);
        assert_eq!(base, ResponseCache::key("t", "x", &params));
        assert_ne!(base, ResponseCache::key("u", "x", &params));
        assert_ne!(base, ResponseCache::key("t", "y", &params));
        let hotter = GenerationParams {
            temperature: 0.9,
            ..GenerationParams::default()
        };
        assert_ne!(base, ResponseCache::key("t", "x", &hotter));
    }

    #[test]
    fn test_key_keeps_template_and_text_apart() {
        let params = GenerationParams::default();
        assert_ne!(
            ResponseCache::key("ab", "c", &params),
            ResponseCache::key("a", "bc", &params)
        );
        assert_ne!(
            ResponseCache::key("", "abc", &params),
            ResponseCache::key("abc", "", &params)
        );
    }
}
