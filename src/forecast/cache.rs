//! In-memory read-through cache for trained forecast models
//!
//! Unbounded and eviction-free: entries equal the number of trained
//! products, which stays operationally small. `get_or_load` is single-flight
//! per key — concurrent misses for the same product share one disk load and
//! the mapping can never end up torn.

use crate::error::{Error, Result};
use crate::forecast::model::ForecastModel;
use crate::forecast::storage::ModelStorage;
use moka::future::Cache;
use std::sync::Arc;
use tracing::info;

/// Internal loader outcome; must be cloneable because moka hands the same
/// error to every waiting caller
#[derive(Debug, Clone, thiserror::Error)]
enum LoadError {
    #[error("no persisted model")]
    Absent,
    #[error("{0}")]
    Corrupt(String),
    #[error("{0}")]
    Storage(String),
}

/// Read-through model cache over durable storage
#[derive(Clone)]
pub struct ModelCache {
    models: Cache<String, Arc<ForecastModel>>,
    storage: Arc<dyn ModelStorage>,
}

impl ModelCache {
    /// Create an empty cache over the given durable storage
    pub fn new(storage: Arc<dyn ModelStorage>) -> Self {
        ModelCache {
            models: Cache::builder().build(),
            storage,
        }
    }

    /// Return the cached model for a product, loading it from durable
    /// storage on a miss.
    ///
    /// `Ok(None)` means no artifact exists (not trained yet) — absence is
    /// never cached, so a later training run becomes visible immediately.
    /// A persisted artifact that fails to decode is `StorageCorruption`,
    /// surfaced loudly rather than treated as a miss.
    pub async fn get_or_load(&self, product_id: &str) -> Result<Option<Arc<ForecastModel>>> {
        let storage = self.storage.clone();
        let key = product_id.to_string();

        let result = self
            .models
            .try_get_with(key.clone(), async move {
                let bytes = storage.load(&key).await.map_err(|e| match e {
                    Error::StorageCorruption(msg) => LoadError::Corrupt(msg),
                    other => LoadError::Storage(other.to_string()),
                })?;

                let Some(bytes) = bytes else {
                    return Err(LoadError::Absent);
                };

                info!("Loading persisted model for product '{}'", key);
                let model: ForecastModel = serde_json::from_slice(&bytes).map_err(|e| {
                    LoadError::Corrupt(format!("model artifact for '{}': {}", key, e))
                })?;

                Ok(Arc::new(model))
            })
            .await;

        match result {
            Ok(model) => Ok(Some(model)),
            Err(shared) => match shared.as_ref() {
                LoadError::Absent => Ok(None),
                LoadError::Corrupt(msg) => Err(Error::StorageCorruption(msg.clone())),
                LoadError::Storage(msg) => Err(Error::Internal(msg.clone())),
            },
        }
    }

    /// Insert a freshly trained model, replacing any cached predecessor
    pub async fn insert(&self, product_id: &str, model: Arc<ForecastModel>) {
        self.models.insert(product_id.to_string(), model).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory storage that counts load calls, so cache behaviour is
    /// observable through an I/O counter
    #[derive(Default)]
    struct CountingStorage {
        artifacts: Mutex<HashMap<String, Vec<u8>>>,
        loads: AtomicUsize,
    }

    impl CountingStorage {
        fn load_count(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelStorage for CountingStorage {
        async fn save(&self, key: &str, artifact: &[u8]) -> Result<()> {
            self.artifacts
                .lock()
                .unwrap()
                .insert(key.to_string(), artifact.to_vec());
            Ok(())
        }

        async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.artifacts.lock().unwrap().get(key).cloned())
        }
    }

    fn fitted_model() -> ForecastModel {
        let series: Vec<(NaiveDate, i32)> = (1..=20)
            .map(|d| (NaiveDate::from_ymd_opt(2024, 3, d).unwrap(), 5))
            .collect();
        ForecastModel::fit("p1", &series).unwrap()
    }

    #[tokio::test]
    async fn test_miss_returns_none_and_is_not_cached() {
        let storage = Arc::new(CountingStorage::default());
        let cache = ModelCache::new(storage.clone());

        assert!(cache.get_or_load("p1").await.unwrap().is_none());

        // A later save must become visible: absence was not cached
        storage
            .save("p1", &serde_json::to_vec(&fitted_model()).unwrap())
            .await
            .unwrap();
        assert!(cache.get_or_load("p1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_lookup_hits_memory_without_storage_io() {
        let storage = Arc::new(CountingStorage::default());
        storage
            .save("p1", &serde_json::to_vec(&fitted_model()).unwrap())
            .await
            .unwrap();

        let cache = ModelCache::new(storage.clone());

        let first = cache.get_or_load("p1").await.unwrap().unwrap();
        assert_eq!(storage.load_count(), 1);

        let second = cache.get_or_load("p1").await.unwrap().unwrap();
        assert_eq!(storage.load_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_load() {
        let storage = Arc::new(CountingStorage::default());
        storage
            .save("p1", &serde_json::to_vec(&fitted_model()).unwrap())
            .await
            .unwrap();

        let cache = ModelCache::new(storage.clone());

        let (a, b) = tokio::join!(cache.get_or_load("p1"), cache.get_or_load("p1"));
        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
        assert_eq!(storage.load_count(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_artifact_is_loud_not_a_miss() {
        let storage = Arc::new(CountingStorage::default());
        storage.save("p1", b"not json at all").await.unwrap();

        let cache = ModelCache::new(storage.clone());

        let err = cache.get_or_load("p1").await.unwrap_err();
        assert!(matches!(err, Error::StorageCorruption(_)));

        // Errors are not cached either: a repaired artifact loads fine
        storage
            .save("p1", &serde_json::to_vec(&fitted_model()).unwrap())
            .await
            .unwrap();
        assert!(cache.get_or_load("p1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insert_replaces_cached_model() {
        let storage = Arc::new(CountingStorage::default());
        let cache = ModelCache::new(storage.clone());

        let model = Arc::new(fitted_model());
        cache.insert("p1", model.clone()).await;

        let cached = cache.get_or_load("p1").await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&model, &cached));
        // Served straight from memory: the loader never ran
        assert_eq!(storage.load_count(), 0);
    }
}
