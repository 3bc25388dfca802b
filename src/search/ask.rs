//! Question answering with distance-based abstention
//!
//! Retrieves the single nearest document for a question. If the raw vector
//! distance exceeds the configured threshold, the engine abstains: the
//! near-miss content is exposed only as debug context, never as the answer.

use crate::error::Result;
use serde::Serialize;
use tracing::debug;

use super::ranking::RankingEngine;

/// Outcome of a question-answering lookup
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AskOutcome {
    /// The knowledge base is empty or nothing matched at all
    NoKnowledge,
    /// The nearest document was too far away to trust
    Abstained {
        /// Near-miss content, surfaced for debugging only
        debug_content: String,
        distance: f64,
    },
    /// A relevant document was found
    Answer { content: String, distance: f64 },
}

/// Turn the nearest hit (if any) into an answer decision.
///
/// The threshold comparison is strict: a hit exactly at the threshold still
/// answers.
pub(crate) fn resolve_answer(nearest: Option<(String, f64)>, threshold: f64) -> AskOutcome {
    match nearest {
        None => AskOutcome::NoKnowledge,
        Some((content, distance)) if distance > threshold => AskOutcome::Abstained {
            debug_content: content,
            distance,
        },
        Some((content, distance)) => AskOutcome::Answer { content, distance },
    }
}

impl RankingEngine {
    /// Answer a free-text question from the knowledge base, abstaining when
    /// nothing is close enough
    pub async fn ask(&self, question: &str) -> Result<AskOutcome> {
        if question.trim().is_empty() {
            return Err(crate::Error::Validation("question must not be empty".into()));
        }

        let query_vec = self.embedding().embed(question).await?;
        let nearest = self
            .store()
            .semantic_candidates(query_vec, None, 1)
            .await?
            .into_iter()
            .next()
            .map(|c| (c.content, c.distance));

        if let Some((_, distance)) = &nearest {
            debug!("Nearest knowledge for question at distance {:.4}", distance);
        }

        Ok(resolve_answer(nearest, self.config().abstention_threshold))
    }
}
