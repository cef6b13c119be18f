//! Tantivy-backed rewrite memory: incremental index, suggestion engine,
//! candidate mining, promotion, and rule application (Components G-K).

#![forbid(unsafe_code)]

pub mod error;
pub mod index;
pub mod mining;
pub mod promote;
pub mod rules;
pub mod suggest;

pub use error::{RewriteMemoryError, RewriteMemoryResult};
pub use index::{IndexBuilder, IndexMode, IndexState};
pub use mining::{candidate_gate, score_to_confidence, CandidateMiner, MinedCandidate};
pub use promote::{compute_priority, normalize_style_mode, PromotionReport, PromotionService};
pub use rules::{HitBuffer, RewriteRule, RuleEngine};
pub use suggest::{get_suggestions, Suggestion};
