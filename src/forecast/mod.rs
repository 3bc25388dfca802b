//! Forecast module - per-product demand models
//!
//! Orchestrates training (fit, persist, cache), prediction through a
//! single-flight read-through model cache, and whole-catalog batch training.

mod cache;
mod model;
mod service;
mod storage;

pub use cache::ModelCache;
pub use model::{ForecastModel, ForecastPoint, MIN_TRAINING_POINTS};
pub use service::{BatchTrainReport, ForecastService, SalesSource, SkippedProduct, TrainSummary};
pub use storage::{FsModelStorage, ModelStorage};
