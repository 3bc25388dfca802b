//! # Storemind
//!
//! Retail knowledge retrieval and demand forecasting backend built with Rust.
//!
//! ## Features
//!
//! - **Hybrid Search:** pgvector semantic distance fused with lexical
//!   title/category boosts into one ranking score
//! - **QA Abstention:** question answering that refuses to answer past a
//!   configurable distance threshold instead of surfacing near-misses
//! - **Local Embeddings:** multilingual sentence embeddings generated
//!   in-process, loaded once at startup
//! - **Forecast Model Cache:** per-product sales models trained on demand,
//!   persisted to disk, and served through a single-flight in-memory cache

pub mod config;
pub mod database;
pub mod embedding;
pub mod error;
pub mod forecast;
pub mod search;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
