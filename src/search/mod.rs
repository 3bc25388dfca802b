//! Search module - hybrid ranking and question answering
//!
//! Fuses pgvector semantic distance with lexical title/category boosts into
//! one ranking score, and answers free-text questions with a distance-based
//! abstention policy.

mod ask;
mod ranking;

pub use ask::AskOutcome;
pub use ranking::{RankingEngine, ScoredResult, SearchMode, EXACT_MATCH_SCORE};
