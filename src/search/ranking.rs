//! Hybrid retrieval ranking engine
//!
//! Two modes:
//! - `exact`: case-insensitive title substring match, constant score,
//!   newest-first ordering (id descending)
//! - `smart`: semantic distance turned into a base similarity, fused with
//!   category and title boosts, clamped into [0, 1]
//!
//! Scores are per-request ranking artifacts: smart and exact scores are not
//! comparable with each other and must never be persisted as confidence
//! values.

use crate::config::SearchConfig;
use crate::database::{Candidate, Document, DocumentStore};
use crate::embedding::EmbeddingService;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Every exact-mode match gets this fixed score
pub const EXACT_MATCH_SCORE: f64 = 1.0;

/// Search mode selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Title substring lookup
    Exact,
    /// Semantic similarity with lexical boosts
    Smart,
}

/// A ranked search hit
#[derive(Debug, Clone, Serialize)]
pub struct ScoredResult {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub outline: String,
    pub content: String,
    pub tags: Vec<String>,
    pub helpful_count: i32,
    pub unhelpful_count: i32,
    /// Fused relevance in [0, 1] for smart mode; always 1.0 for exact mode
    pub score: f64,
}

/// Fuse a raw vector distance with lexical boost flags into one score.
///
/// base = 1 - distance; unit vectors keep distance within [0, 2], so base
/// lands in [-1, 1] before boosts. The result is clamped into [0, 1].
pub(crate) fn fuse_score(
    distance: f64,
    category_matches: bool,
    title_matches: bool,
    config: &SearchConfig,
) -> f64 {
    let mut score = 1.0 - distance;
    if category_matches {
        score += config.category_boost;
    }
    if title_matches {
        score += config.title_boost;
    }
    score.clamp(0.0, 1.0)
}

/// Score and order smart-mode candidates, best first.
///
/// Ties break on id descending so equal-scoring documents keep the
/// newest-first convention.
fn rank_smart(candidates: Vec<Candidate>, query: &str, config: &SearchConfig) -> Vec<ScoredResult> {
    let query_lower = query.to_lowercase();

    let mut results: Vec<ScoredResult> = candidates
        .into_iter()
        .map(|c| {
            let category_matches = c.category.to_lowercase() == query_lower;
            let title_matches = c.title.to_lowercase().contains(&query_lower);
            let score = fuse_score(c.distance, category_matches, title_matches, config);
            ScoredResult {
                id: c.id,
                title: c.title,
                category: c.category,
                outline: c.outline,
                content: c.content,
                tags: c.tags,
                helpful_count: c.helpful_count,
                unhelpful_count: c.unhelpful_count,
                score,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(b.id.cmp(&a.id))
    });

    results
}

fn exact_result(doc: Document) -> ScoredResult {
    ScoredResult {
        id: doc.id,
        title: doc.title,
        category: doc.category,
        outline: doc.outline,
        content: doc.content,
        tags: doc.tags,
        helpful_count: doc.helpful_count,
        unhelpful_count: doc.unhelpful_count,
        score: EXACT_MATCH_SCORE,
    }
}

/// Orchestrates hybrid search across the document store and the embedding
/// service. Read-only; an empty result list is a valid outcome.
#[derive(Clone)]
pub struct RankingEngine {
    store: DocumentStore,
    embedding: EmbeddingService,
    config: SearchConfig,
}

impl RankingEngine {
    /// Create a new ranking engine
    pub fn new(store: DocumentStore, embedding: EmbeddingService, config: SearchConfig) -> Self {
        RankingEngine {
            store,
            embedding,
            config,
        }
    }

    pub(crate) fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub(crate) fn embedding(&self) -> &EmbeddingService {
        &self.embedding
    }

    pub(crate) fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run a search and return at most `top_k` ranked results
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        mode: SearchMode,
        category_filter: Option<&str>,
    ) -> Result<Vec<ScoredResult>> {
        if query.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }
        if top_k == 0 {
            return Err(Error::Validation("top_k must be at least 1".into()));
        }

        match mode {
            SearchMode::Exact => {
                let docs = self
                    .store
                    .title_candidates(query, category_filter, top_k)
                    .await?;
                debug!("Exact search for '{}' matched {} documents", query, docs.len());
                Ok(docs.into_iter().map(exact_result).collect())
            }
            SearchMode::Smart => {
                let query_vec = self.embedding.embed(query).await?;
                let candidates = self
                    .store
                    .semantic_candidates(query_vec, category_filter, self.config.candidate_pool)
                    .await?;
                debug!(
                    "Smart search for '{}' pulled {} candidates",
                    query,
                    candidates.len()
                );

                let mut results = rank_smart(candidates, query, &self.config);
                results.truncate(top_k);
                Ok(results)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, title: &str, category: &str, distance: f64) -> Candidate {
        Candidate {
            id,
            title: title.into(),
            category: category.into(),
            outline: String::new(),
            content: format!("content of {}", title),
            tags: vec![],
            helpful_count: 0,
            unhelpful_count: 0,
            distance,
        }
    }

    #[test]
    fn test_exact_results_carry_fixed_score() {
        let doc = Document {
            id: 3,
            title: "Shipping policy".into(),
            category: "Operations".into(),
            outline: String::new(),
            content: "Free shipping over 1000.".into(),
            tags: vec!["shipping".into()],
            helpful_count: 2,
            unhelpful_count: 0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let result = exact_result(doc);
        assert_eq!(result.score, EXACT_MATCH_SCORE);
        assert_eq!(result.tags, vec!["shipping".to_string()]);
    }

    #[test]
    fn test_fuse_score_base_only() {
        let cfg = SearchConfig::default();
        let score = fuse_score(0.4, false, false, &cfg);
        assert!((score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_fuse_score_category_boost() {
        // base 0.5 + category boost 0.3 = 0.8
        let cfg = SearchConfig::default();
        let score = fuse_score(0.5, true, false, &cfg);
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_fuse_score_clamps_both_ends() {
        let cfg = SearchConfig::default();
        // near-identical vectors plus both boosts would exceed 1.0
        assert_eq!(fuse_score(0.0, true, true, &cfg), 1.0);
        // antipodal vectors: base goes to -1, clamp to 0
        assert_eq!(fuse_score(2.0, false, false, &cfg), 0.0);
    }

    #[test]
    fn test_rank_smart_orders_by_fused_score() {
        let cfg = SearchConfig::default();
        // Second candidate is farther but its category equals the query,
        // so the boost promotes it past the first.
        let candidates = vec![
            candidate(1, "POS troubleshooting", "Operations", 0.3),
            candidate(2, "Refund steps", "faq", 0.45),
        ];

        let results = rank_smart(candidates, "faq", &cfg);
        assert_eq!(results[0].id, 2);
        assert!((results[0].score - 0.85).abs() < 1e-9);
        assert_eq!(results[1].id, 1);
        assert!((results[1].score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_rank_smart_title_boost_is_case_insensitive() {
        let cfg = SearchConfig::default();
        let candidates = vec![candidate(7, "Shipping FAQ", "Operations", 0.5)];

        let results = rank_smart(candidates, "shipping faq", &cfg);
        assert!((results[0].score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_rank_smart_scores_stay_in_unit_interval() {
        let cfg = SearchConfig::default();
        let candidates = vec![
            candidate(1, "a", "c", 0.0),
            candidate(2, "b", "c", 1.0),
            candidate(3, "c", "c", 2.0),
        ];

        for result in rank_smart(candidates, "c", &cfg) {
            assert!((0.0..=1.0).contains(&result.score));
        }
    }

    #[test]
    fn test_rank_smart_equal_scores_break_newest_first() {
        let cfg = SearchConfig::default();
        let candidates = vec![
            candidate(3, "x", "c1", 0.5),
            candidate(9, "y", "c1", 0.5),
        ];

        let results = rank_smart(candidates, "unrelated", &cfg);
        assert_eq!(results[0].id, 9);
        assert_eq!(results[1].id, 3);
    }
}
