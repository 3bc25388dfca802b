//! Historical sales storage
//!
//! Source data for forecast training. Ingestion is batch-oriented: a reload
//! truncates and reinserts the whole table, mirroring the upstream export
//! job. Same-date rows for one product are additive observations.

use crate::error::{Error, Result};
use crate::forecast::SalesSource;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::postgres::PgPool;

/// One observed sale
#[derive(Debug, Clone, Deserialize)]
pub struct SalesRecord {
    pub product_id: String,
    pub transaction_date: NaiveDate,
    pub quantity: i32,
}

/// Validate a batch before any write happens
fn validate_batch(records: &[SalesRecord]) -> Result<()> {
    for (i, record) in records.iter().enumerate() {
        if record.product_id.trim().is_empty() {
            return Err(Error::Validation(format!(
                "record {}: product_id must not be empty",
                i
            )));
        }
        if record.quantity < 0 {
            return Err(Error::Validation(format!(
                "record {}: quantity must be >= 0, got {}",
                i, record.quantity
            )));
        }
    }
    Ok(())
}

/// Sales history store backed by PostgreSQL
#[derive(Clone)]
pub struct SalesStore {
    pool: PgPool,
}

impl SalesStore {
    /// Create a new sales store
    pub fn new(pool: PgPool) -> Self {
        SalesStore { pool }
    }

    /// Replace the entire sales history in one transaction.
    ///
    /// The whole batch is validated up front; a bad record rejects the batch
    /// before anything is written.
    pub async fn reload(&self, records: &[SalesRecord]) -> Result<usize> {
        validate_batch(records)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("TRUNCATE TABLE sales_data RESTART IDENTITY")
            .execute(tx.as_mut())
            .await?;

        for record in records {
            sqlx::query(
                "INSERT INTO sales_data (product_id, transaction_date, quantity) VALUES ($1, $2, $3)",
            )
            .bind(&record.product_id)
            .bind(record.transaction_date)
            .bind(record.quantity)
            .execute(tx.as_mut())
            .await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }

    /// Append a batch without truncating
    pub async fn append(&self, records: &[SalesRecord]) -> Result<usize> {
        validate_batch(records)?;

        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                "INSERT INTO sales_data (product_id, transaction_date, quantity) VALUES ($1, $2, $3)",
            )
            .bind(&record.product_id)
            .bind(record.transaction_date)
            .bind(record.quantity)
            .execute(tx.as_mut())
            .await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }
}

#[async_trait]
impl SalesSource for SalesStore {
    /// Full ordered series for one product
    async fn read_series(&self, product_id: &str) -> Result<Vec<(NaiveDate, i32)>> {
        let rows: Vec<(NaiveDate, i32)> = sqlx::query_as(
            r#"
            SELECT transaction_date, quantity
            FROM sales_data
            WHERE product_id = $1
            ORDER BY transaction_date
        "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Every product id present in the history
    async fn list_product_ids(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT product_id FROM sales_data ORDER BY product_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(product_id: &str, quantity: i32) -> SalesRecord {
        SalesRecord {
            product_id: product_id.into(),
            transaction_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            quantity,
        }
    }

    #[test]
    fn test_batch_validation_rejects_before_write() {
        assert!(validate_batch(&[record("p1", 5), record("p2", 0)]).is_ok());

        let err = validate_batch(&[record("p1", 5), record("", 3)]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = validate_batch(&[record("p1", -1)]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
