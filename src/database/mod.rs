//! Database module - PostgreSQL + pgvector
//!
//! Provides storage for:
//! - Knowledge documents with embedding vectors (pgvector distance search)
//! - The tag/category controlled vocabulary and its usage counters
//! - Historical per-product sales records

mod documents;
mod postgres;
mod registry;
mod sales;

pub use documents::{Candidate, Document, DocumentStore, FeedbackKind, NewDocument};
pub use postgres::{init_pool, migrations, PostgresPool};
pub use registry::{RegistryStore, TagRow};
pub use sales::{SalesRecord, SalesStore};
