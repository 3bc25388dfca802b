//! PostgreSQL database connection and operations

use crate::config::DatabaseConfig;
use crate::embedding::EMBEDDING_DIM;
use crate::error::{Error, Result};
use secrecy::ExposeSecret;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// PostgreSQL connection pool type alias
pub type PostgresPool = PgPool;

/// Initialize the PostgreSQL connection pool
pub async fn init_pool(config: &DatabaseConfig) -> Result<PostgresPool> {
    info!("Initializing PostgreSQL connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(config.url.expose_secret())
        .await?;

    verify_database(&pool).await?;

    info!("PostgreSQL connection pool initialized successfully");
    Ok(pool)
}

/// Verify database connection and check for required extensions
async fn verify_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| Error::Database(sqlx::Error::from(e)))?;

    // Semantic search depends on pgvector; refuse to start without it
    let result: Option<(String,)> =
        sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
            .fetch_optional(pool)
            .await?;

    if result.is_none() {
        return Err(Error::Database(sqlx::Error::Configuration(
            "pgvector extension is not installed. Run: CREATE EXTENSION vector;".into(),
        )));
    }

    Ok(())
}

/// Database migrations
pub mod migrations {
    use super::*;
    use tracing::warn;

    /// Run all migrations
    pub async fn run(pool: &PgPool) -> Result<()> {
        info!("Running database migrations");

        // Try to create pgvector extension (requires superuser or extension already available)
        match sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(pool)
            .await
        {
            Ok(_) => info!("pgvector extension enabled"),
            Err(e) => {
                warn!("Could not create pgvector extension: {}. Vector features may not work.", e);
                warn!("If you need vector support, run as superuser: CREATE EXTENSION vector;");
            }
        }

        // Knowledge documents. BIGSERIAL ids double as a recency order:
        // exact-mode search sorts id-descending for newest-first results.
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id BIGSERIAL PRIMARY KEY,
                title TEXT NOT NULL,
                category TEXT NOT NULL,
                outline TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL,
                embedding vector({EMBEDDING_DIM}),
                helpful_count INTEGER NOT NULL DEFAULT 0 CHECK (helpful_count >= 0),
                unhelpful_count INTEGER NOT NULL DEFAULT 0 CHECK (unhelpful_count >= 0),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#
        ))
        .execute(pool)
        .await?;

        // Tag vocabulary. usage_count is a lifetime attach counter, not a
        // live reference count; it is never decremented.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tags (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                usage_count INTEGER NOT NULL DEFAULT 0 CHECK (usage_count >= 0)
            )
        "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS document_tags (
                document_id BIGINT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                tag_id BIGINT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (document_id, tag_id)
            )
        "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )
        "#,
        )
        .execute(pool)
        .await?;

        // Historical sales. Same-date rows for one product are additive
        // observations, so there is no uniqueness constraint on
        // (product_id, transaction_date).
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sales_data (
                id BIGSERIAL PRIMARY KEY,
                product_id TEXT NOT NULL,
                transaction_date DATE NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity >= 0)
            )
        "#,
        )
        .execute(pool)
        .await?;

        // Create indexes (each must be a separate query for SQLx)
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_category ON documents(LOWER(category))")
            .execute(pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_document_tags_tag_id ON document_tags(tag_id)")
            .execute(pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sales_product_date ON sales_data(product_id, transaction_date)",
        )
        .execute(pool)
        .await?;

        // Vector similarity search index (using IVFFlat for better performance)
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_documents_embedding ON documents
            USING ivfflat (embedding vector_l2_ops) WITH (lists = 100)
        "#,
        )
        .execute(pool)
        .await
        .ok(); // Ignore if not enough data or vector type not available

        info!("Database migrations completed");
        Ok(())
    }
}
