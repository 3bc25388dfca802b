//! Knowledge document storage and candidate retrieval

use crate::database::registry;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use sqlx::FromRow;

/// A knowledge document with its aggregated tag names
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    /// Unique document ID (monotonically increasing; newest documents sort last)
    pub id: i64,
    /// Document title
    pub title: String,
    /// Single category label from the controlled vocabulary
    pub category: String,
    /// Short outline shown in search previews
    pub outline: String,
    /// Full markdown content
    pub content: String,
    /// Associated tag names (empty, never null, when untagged)
    pub tags: Vec<String>,
    /// Times readers marked this document helpful
    pub helpful_count: i32,
    /// Times readers marked this document unhelpful
    pub unhelpful_count: i32,
    /// When the document was created
    pub created_at: DateTime<Utc>,
    /// When the document was last updated
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating or updating a document
#[derive(Debug, Clone, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub outline: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewDocument {
    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("document title must not be empty".into()));
        }
        if self.category.trim().is_empty() {
            return Err(Error::Validation("document category must not be empty".into()));
        }
        if self.content.trim().is_empty() {
            return Err(Error::Validation("document content must not be empty".into()));
        }
        Ok(())
    }
}

/// Reader feedback kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Helpful,
    Unhelpful,
}

/// A search candidate: document fields plus its raw vector distance to the
/// query. Scoring happens in the ranking engine, not here.
#[derive(Debug, Clone, FromRow)]
pub struct Candidate {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub outline: String,
    pub content: String,
    pub tags: Vec<String>,
    pub helpful_count: i32,
    pub unhelpful_count: i32,
    /// Euclidean distance between the query vector and the document embedding
    pub distance: f64,
}

/// Escape LIKE wildcards so user input is matched literally
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

const TAGS_JOIN: &str = r#"
    LEFT JOIN (
        SELECT dt.document_id, array_agg(tg.name ORDER BY tg.name) AS tags
        FROM document_tags dt
        JOIN tags tg ON tg.id = dt.tag_id
        GROUP BY dt.document_id
    ) t ON t.document_id = d.id
"#;

/// Document store backed by PostgreSQL + pgvector
#[derive(Clone)]
pub struct DocumentStore {
    pool: PgPool,
}

impl DocumentStore {
    /// Create a new document store
    pub fn new(pool: PgPool) -> Self {
        DocumentStore { pool }
    }

    /// Insert a document and its tag associations in one transaction
    pub async fn insert(&self, doc: &NewDocument, embedding: Vec<f32>) -> Result<Document> {
        doc.validate()?;

        let mut tx = self.pool.begin().await?;

        let (id, created_at, updated_at): (i64, DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO documents (title, category, outline, content, embedding)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, created_at, updated_at
        "#,
        )
        .bind(&doc.title)
        .bind(&doc.category)
        .bind(&doc.outline)
        .bind(&doc.content)
        .bind(Vector::from(embedding))
        .fetch_one(tx.as_mut())
        .await?;

        for tag in &doc.tags {
            registry::attach_tag(tx.as_mut(), id, tag).await?;
        }

        tx.commit().await?;

        Ok(Document {
            id,
            title: doc.title.clone(),
            category: doc.category.clone(),
            outline: doc.outline.clone(),
            content: doc.content.clone(),
            tags: doc.tags.clone(),
            helpful_count: 0,
            unhelpful_count: 0,
            created_at,
            updated_at,
        })
    }

    /// Update a document's fields, embedding, and tag set in one transaction
    pub async fn update(&self, id: i64, doc: &NewDocument, embedding: Vec<f32>) -> Result<Document> {
        doc.validate()?;

        let mut tx = self.pool.begin().await?;

        let row: Option<(DateTime<Utc>, DateTime<Utc>, i32, i32)> = sqlx::query_as(
            r#"
            UPDATE documents
            SET title = $2, category = $3, outline = $4, content = $5,
                embedding = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING created_at, updated_at, helpful_count, unhelpful_count
        "#,
        )
        .bind(id)
        .bind(&doc.title)
        .bind(&doc.category)
        .bind(&doc.outline)
        .bind(&doc.content)
        .bind(Vector::from(embedding))
        .fetch_optional(tx.as_mut())
        .await?;

        let Some((created_at, updated_at, helpful_count, unhelpful_count)) = row else {
            return Err(Error::NotFound(format!("document {}", id)));
        };

        registry::replace_tags(tx.as_mut(), id, &doc.tags).await?;

        tx.commit().await?;

        Ok(Document {
            id,
            title: doc.title.clone(),
            category: doc.category.clone(),
            outline: doc.outline.clone(),
            content: doc.content.clone(),
            tags: doc.tags.clone(),
            helpful_count,
            unhelpful_count,
            created_at,
            updated_at,
        })
    }

    /// Delete a document (tag associations cascade)
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("document {}", id)));
        }
        Ok(())
    }

    /// List all documents, newest first
    pub async fn list(&self) -> Result<Vec<Document>> {
        let sql = format!(
            r#"
            SELECT d.id, d.title, d.category, d.outline, d.content,
                   COALESCE(t.tags, ARRAY[]::TEXT[]) AS tags,
                   d.helpful_count, d.unhelpful_count, d.created_at, d.updated_at
            FROM documents d
            {TAGS_JOIN}
            ORDER BY d.id DESC
        "#
        );
        let docs: Vec<Document> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(docs)
    }

    /// Increment one of the feedback counters
    pub async fn record_feedback(&self, id: i64, kind: FeedbackKind) -> Result<()> {
        let sql = match kind {
            FeedbackKind::Helpful => {
                "UPDATE documents SET helpful_count = helpful_count + 1 WHERE id = $1"
            }
            FeedbackKind::Unhelpful => {
                "UPDATE documents SET unhelpful_count = unhelpful_count + 1 WHERE id = $1"
            }
        };

        let result = sqlx::query(sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("document {}", id)));
        }
        Ok(())
    }

    /// Fetch the nearest candidates to a query vector, closest first.
    ///
    /// Documents without an embedding cannot participate in semantic search
    /// and are excluded. The optional category filter is applied in SQL with
    /// bound parameters before any scoring happens.
    pub async fn semantic_candidates(
        &self,
        query_vec: Vec<f32>,
        category_filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let sql = format!(
            r#"
            SELECT d.id, d.title, d.category, d.outline, d.content,
                   COALESCE(t.tags, ARRAY[]::TEXT[]) AS tags,
                   d.helpful_count, d.unhelpful_count,
                   (d.embedding <-> $1)::FLOAT8 AS distance
            FROM documents d
            {TAGS_JOIN}
            WHERE d.embedding IS NOT NULL
              AND ($2::TEXT IS NULL OR LOWER(d.category) = LOWER($2))
            ORDER BY d.embedding <-> $1
            LIMIT $3
        "#
        );

        let candidates: Vec<Candidate> = sqlx::query_as(&sql)
            .bind(Vector::from(query_vec))
            .bind(category_filter)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(candidates)
    }

    /// Fetch documents whose title contains the query, newest first.
    ///
    /// Used by exact-mode search: id-descending is a deliberate recency
    /// tie-break independent of relevance.
    pub async fn title_candidates(
        &self,
        query: &str,
        category_filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let pattern = format!("%{}%", escape_like(query));

        let sql = format!(
            r#"
            SELECT d.id, d.title, d.category, d.outline, d.content,
                   COALESCE(t.tags, ARRAY[]::TEXT[]) AS tags,
                   d.helpful_count, d.unhelpful_count, d.created_at, d.updated_at
            FROM documents d
            {TAGS_JOIN}
            WHERE d.title ILIKE $1
              AND ($2::TEXT IS NULL OR LOWER(d.category) = LOWER($2))
            ORDER BY d.id DESC
            LIMIT $3
        "#
        );

        let docs: Vec<Document> = sqlx::query_as(&sql)
            .bind(&pattern)
            .bind(category_filter)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("運費"), "運費");
    }

    #[test]
    fn test_new_document_validation() {
        let doc = NewDocument {
            title: "Shipping policy".into(),
            category: "Operations".into(),
            outline: String::new(),
            content: "Free shipping over 1000.".into(),
            tags: vec![],
        };
        assert!(doc.validate().is_ok());

        let blank_title = NewDocument {
            title: "   ".into(),
            ..doc.clone()
        };
        assert!(blank_title.validate().is_err());

        let blank_content = NewDocument {
            content: String::new(),
            ..doc
        };
        assert!(blank_content.validate().is_err());
    }
}
