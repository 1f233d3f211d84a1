//! Instant-win lottery: eligibility filtering, dynamic multi-factor win
//! probabilities, and a single weighted draw per request.

pub mod catalog;
pub mod eligibility;
pub mod engine;
pub mod history;
pub mod probability;
pub mod rng;
pub mod types;

pub use catalog::{InMemoryPrizeCatalog, PrizeCatalog};
pub use engine::LotteryEngine;
pub use history::{HistoryStore, InMemoryHistoryStore, LotteryStats};
pub use probability::ProbabilityCalculator;
pub use rng::{RandomSource, ThreadRandom};
pub use types::{LotteryRequest, LotteryResult, PrizeSummary};
