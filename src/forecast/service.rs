//! Forecast orchestration: train, predict, batch train
//!
//! Training is an explicit operation — `predict` never trains implicitly.
//! Models flow train → persist → cache; prediction flows cache → disk →
//! NotTrained. Training failures leave any previously persisted model and
//! its cache entry untouched.

use crate::error::{Error, Result};
use crate::forecast::cache::ModelCache;
use crate::forecast::model::{ForecastModel, ForecastPoint};
use crate::forecast::storage::ModelStorage;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Source of historical sales series
#[async_trait]
pub trait SalesSource: Send + Sync {
    /// Full series for one product, ordered by date
    async fn read_series(&self, product_id: &str) -> Result<Vec<(NaiveDate, i32)>>;

    /// Every product id present in the history
    async fn list_product_ids(&self) -> Result<Vec<String>>;
}

/// Result of training one product
#[derive(Debug, Clone, Serialize)]
pub struct TrainSummary {
    pub product_id: String,
    /// Distinct dates the model was fitted on
    pub distinct_points: usize,
}

/// A product skipped during batch training, with the reason
#[derive(Debug, Serialize)]
pub struct SkippedProduct {
    pub product_id: String,
    pub reason: String,
}

/// Aggregate outcome of a whole-catalog training run
#[derive(Debug, Default, Serialize)]
pub struct BatchTrainReport {
    pub trained: Vec<String>,
    pub skipped: Vec<SkippedProduct>,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Trains, persists, and serves per-product demand models
pub struct ForecastService {
    sales: Arc<dyn SalesSource>,
    storage: Arc<dyn ModelStorage>,
    cache: ModelCache,
}

impl ForecastService {
    /// Create a new forecast service; the model cache starts empty and fills
    /// from durable storage on demand
    pub fn new(sales: Arc<dyn SalesSource>, storage: Arc<dyn ModelStorage>) -> Self {
        ForecastService {
            cache: ModelCache::new(storage.clone()),
            sales,
            storage,
        }
    }

    /// Train a product's model from its full sales history and persist it,
    /// replacing any prior artifact for that product.
    ///
    /// `InsufficientData` (fewer than the minimum distinct dates) leaves the
    /// prior artifact and cache entry exactly as they were.
    pub async fn train(&self, product_id: &str) -> Result<TrainSummary> {
        let series = self.sales.read_series(product_id).await?;
        let model = ForecastModel::fit(product_id, &series)?;

        let artifact = serde_json::to_vec(&model)?;
        self.storage.save(product_id, &artifact).await?;

        let distinct_points = model.distinct_points();
        self.cache.insert(product_id, Arc::new(model)).await;

        info!(
            "Trained model for product '{}' on {} distinct dates",
            product_id, distinct_points
        );

        Ok(TrainSummary {
            product_id: product_id.to_string(),
            distinct_points,
        })
    }

    /// Predict demand for the `horizon_days` days following the last known
    /// date of the fitted series.
    ///
    /// Quantities are rounded to 2 decimal places — the only output encoding
    /// the predict surface uses. Requires a trained model; returns
    /// `NotTrained` otherwise.
    pub async fn predict(&self, product_id: &str, horizon_days: u32) -> Result<Vec<ForecastPoint>> {
        if horizon_days == 0 {
            return Err(Error::Validation("horizon must be at least 1 day".into()));
        }

        let model = self
            .cache
            .get_or_load(product_id)
            .await?
            .ok_or_else(|| Error::NotTrained(product_id.to_string()))?;

        Ok(model
            .predict(horizon_days)
            .into_iter()
            .map(|p| ForecastPoint {
                date: p.date,
                quantity: round2(p.quantity),
            })
            .collect())
    }

    /// Train every product discovered in the sales history.
    ///
    /// Per-product failures are caught, logged, and reported; they never
    /// abort the rest of the batch.
    pub async fn train_all(&self) -> Result<BatchTrainReport> {
        let product_ids = self.sales.list_product_ids().await?;
        info!("Batch training {} products", product_ids.len());

        let mut report = BatchTrainReport::default();
        for product_id in product_ids {
            match self.train(&product_id).await {
                Ok(_) => report.trained.push(product_id),
                Err(e) => {
                    warn!("Training failed for product '{}': {}", product_id, e);
                    report.skipped.push(SkippedProduct {
                        product_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Batch training finished: {} trained, {} skipped",
            report.trained.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubSales {
        series: Mutex<HashMap<String, Vec<(NaiveDate, i32)>>>,
    }

    impl StubSales {
        fn new() -> Self {
            StubSales {
                series: Mutex::new(HashMap::new()),
            }
        }

        fn set(&self, product_id: &str, series: Vec<(NaiveDate, i32)>) {
            self.series
                .lock()
                .unwrap()
                .insert(product_id.to_string(), series);
        }
    }

    #[async_trait]
    impl SalesSource for StubSales {
        async fn read_series(&self, product_id: &str) -> Result<Vec<(NaiveDate, i32)>> {
            Ok(self
                .series
                .lock()
                .unwrap()
                .get(product_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn list_product_ids(&self) -> Result<Vec<String>> {
            let mut ids: Vec<String> = self.series.lock().unwrap().keys().cloned().collect();
            ids.sort();
            Ok(ids)
        }
    }

    #[derive(Default)]
    struct MemoryStorage {
        artifacts: Mutex<HashMap<String, Vec<u8>>>,
        loads: AtomicUsize,
    }

    impl MemoryStorage {
        fn artifact(&self, key: &str) -> Option<Vec<u8>> {
            self.artifacts.lock().unwrap().get(key).cloned()
        }

        fn load_count(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelStorage for MemoryStorage {
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

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn daily_series(days: u32, quantity: i32) -> Vec<(NaiveDate, i32)> {
        (1..=days).map(|d| (date(d), quantity)).collect()
    }

    fn service_with(
        sales: Arc<StubSales>,
        storage: Arc<MemoryStorage>,
    ) -> ForecastService {
        ForecastService::new(sales, storage)
    }

    #[tokio::test]
    async fn test_short_history_gives_insufficient_data_then_not_trained() {
        let sales = Arc::new(StubSales::new());
        sales.set("p1", daily_series(10, 4));
        let service = service_with(sales, Arc::new(MemoryStorage::default()));

        let err = service.train("p1").await.unwrap_err();
        assert!(matches!(err, Error::InsufficientData { points: 10, .. }));

        let err = service.predict("p1", 7).await.unwrap_err();
        assert!(matches!(err, Error::NotTrained(_)));
    }

    #[tokio::test]
    async fn test_train_then_predict_full_horizon() {
        let sales = Arc::new(StubSales::new());
        sales.set("p2", daily_series(20, 6));
        let service = service_with(sales, Arc::new(MemoryStorage::default()));

        let summary = service.train("p2").await.unwrap();
        assert_eq!(summary.distinct_points, 20);

        let points = service.predict("p2", 7).await.unwrap();
        assert_eq!(points.len(), 7);
        assert_eq!(points[0].date, date(21));
        for pair in points.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
    }

    #[tokio::test]
    async fn test_failed_retrain_leaves_prior_artifact_untouched() {
        let sales = Arc::new(StubSales::new());
        let storage = Arc::new(MemoryStorage::default());
        sales.set("p1", daily_series(20, 6));
        let service = service_with(sales.clone(), storage.clone());

        service.train("p1").await.unwrap();
        let before = storage.artifact("p1").unwrap();

        // History shrinks below the minimum; retraining must fail without
        // touching the persisted model
        sales.set("p1", daily_series(5, 6));
        assert!(service.train("p1").await.is_err());

        assert_eq!(storage.artifact("p1").unwrap(), before);
        // And predictions still work off the prior model
        assert_eq!(service.predict("p1", 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_retrain_overwrites_in_place() {
        let sales = Arc::new(StubSales::new());
        let storage = Arc::new(MemoryStorage::default());
        sales.set("p1", daily_series(20, 6));
        let service = service_with(sales.clone(), storage.clone());

        service.train("p1").await.unwrap();
        let before = storage.artifact("p1").unwrap();

        sales.set("p1", daily_series(30, 9));
        service.train("p1").await.unwrap();

        assert_ne!(storage.artifact("p1").unwrap(), before);
        let points = service.predict("p1", 1).await.unwrap();
        assert_eq!(points[0].date, date(31));
    }

    #[tokio::test]
    async fn test_predict_quantities_rounded_to_two_decimals() {
        let sales = Arc::new(StubSales::new());
        // Mild upward trend produces fractional fitted values
        let series: Vec<(NaiveDate, i32)> = (1..=20).map(|d| (date(d), d as i32 / 3)).collect();
        sales.set("p1", series);
        let service = service_with(sales, Arc::new(MemoryStorage::default()));

        service.train("p1").await.unwrap();
        for point in service.predict("p1", 7).await.unwrap() {
            let scaled = point.quantity * 100.0;
            assert!((scaled - scaled.round()).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_predict_rejects_zero_horizon() {
        let sales = Arc::new(StubSales::new());
        let service = service_with(sales, Arc::new(MemoryStorage::default()));

        let err = service.predict("p1", 0).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_predict_after_train_never_reads_storage() {
        let sales = Arc::new(StubSales::new());
        let storage = Arc::new(MemoryStorage::default());
        sales.set("p1", daily_series(20, 6));
        let service = service_with(sales, storage.clone());

        service.train("p1").await.unwrap();
        service.predict("p1", 7).await.unwrap();
        service.predict("p1", 7).await.unwrap();

        // Both predictions were served from the in-memory cache
        assert_eq!(storage.load_count(), 0);
    }

    #[tokio::test]
    async fn test_fresh_process_loads_persisted_model_once() {
        let sales = Arc::new(StubSales::new());
        let storage = Arc::new(MemoryStorage::default());
        sales.set("p1", daily_series(20, 6));

        let trainer = service_with(sales.clone(), storage.clone());
        trainer.train("p1").await.unwrap();

        // A new service over the same storage simulates a process restart
        let server = service_with(sales, storage.clone());
        server.predict("p1", 7).await.unwrap();
        server.predict("p1", 7).await.unwrap();
        assert_eq!(storage.load_count(), 1);
    }

    #[tokio::test]
    async fn test_batch_training_isolates_failures() {
        let sales = Arc::new(StubSales::new());
        sales.set("long", daily_series(20, 6));
        sales.set("short", daily_series(3, 2));
        let service = service_with(sales, Arc::new(MemoryStorage::default()));

        let report = service.train_all().await.unwrap();
        assert_eq!(report.trained, vec!["long".to_string()]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].product_id, "short");
        assert!(report.skipped[0].reason.contains("Insufficient"));
    }
}
