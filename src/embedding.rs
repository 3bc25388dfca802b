//! Local embedding generation via fastembed
//!
//! Uses the multilingual-e5-small model (384 dimensions), which handles
//! mixed CJK/Latin retail text well. Model auto-downloads on first use.
//! The handle is loaded exactly once at process start and is immutable
//! afterwards; every encode call reuses it.

use crate::error::{Error, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;

/// Output dimensionality of the embedding model. Document vectors in the
/// store must match this exactly.
pub const EMBEDDING_DIM: usize = 384;

/// Compose the text a document is embedded under
pub fn document_embed_text(title: &str, content: &str) -> String {
    format!("{}\n{}", title, content)
}

/// L2-normalize a vector so store-side Euclidean distances stay in a fixed
/// metric space regardless of model output scale
fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Local embedding service wrapping fastembed
#[derive(Clone)]
pub struct EmbeddingService {
    model: Arc<TextEmbedding>,
}

impl EmbeddingService {
    /// Load the embedding model. Called once at startup; clones share the
    /// same underlying handle.
    pub fn new() -> Result<Self> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::MultilingualE5Small)
                .with_show_download_progress(true),
        )
        .map_err(|e| Error::Upstream(format!("Failed to init embedding model: {}", e)))?;

        Ok(EmbeddingService {
            model: Arc::new(model),
        })
    }

    /// Generate a unit-normalized embedding for a single text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model.clone();
        let text = text.to_string();

        let embedding = tokio::task::spawn_blocking(move || {
            let embeddings = model
                .embed(vec![text], None)
                .map_err(|e| Error::Upstream(format!("Embedding error: {}", e)))?;
            embeddings
                .into_iter()
                .next()
                .ok_or_else(|| Error::Upstream("No embedding returned".into()))
        })
        .await
        .map_err(|e| Error::Internal(format!("Embedding task join error: {}", e)))??;

        Ok(l2_normalize(embedding))
    }

    /// Get the embedding dimensions
    pub fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize_unit_length() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        assert_eq!(l2_normalize(vec![0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_document_embed_text_includes_title_and_content() {
        let text = document_embed_text("運費說明", "全館消費滿 1000 元免運費");
        assert!(text.starts_with("運費說明\n"));
        assert!(text.contains("免運費"));
    }
}
