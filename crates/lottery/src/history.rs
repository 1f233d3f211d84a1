//! Lottery history: the append-only attempt log consulted for fraud and
//! daily-limit counts.
//!
//! Production: back `HistoryStore` with the attempts table. The in-memory
//! store implements the same contract for development and testing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use instantwin_core::error::InstantWinResult;
use instantwin_core::types::{LotteryAttempt, PrizeId, TemplateId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

pub trait HistoryStore: Send + Sync {
    /// Number of winning attempts by `user_id` for `template_id` executed at
    /// or after `since`.
    fn count_wins_since(
        &self,
        user_id: &str,
        template_id: TemplateId,
        since: DateTime<Utc>,
    ) -> InstantWinResult<u32>;

    /// Appends an attempt. Attempts are never updated afterwards.
    fn record_attempt(&self, attempt: &LotteryAttempt) -> InstantWinResult<()>;
}

/// Aggregate draw statistics for one template.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LotteryStats {
    #[schema(value_type = i64)]
    pub template_id: TemplateId,
    pub total_attempts: u64,
    pub wins: u64,
    pub losses: u64,
    pub failures: u64,
    pub win_rate: f64,
    #[schema(value_type = HashMap<i64, u64>)]
    pub wins_by_prize: HashMap<PrizeId, u64>,
}

#[derive(Default)]
pub struct InMemoryHistoryStore {
    attempts: RwLock<Vec<LotteryAttempt>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> Vec<LotteryAttempt> {
        self.attempts.read().clone()
    }

    pub fn len(&self) -> usize {
        self.attempts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.read().is_empty()
    }

    pub fn stats(&self, template_id: TemplateId) -> LotteryStats {
        let mut stats = LotteryStats {
            template_id,
            ..LotteryStats::default()
        };

        for attempt in self.attempts.read().iter() {
            if attempt.template_id != template_id {
                continue;
            }
            stats.total_attempts += 1;
            if attempt.error.is_some() {
                stats.failures += 1;
            }
            match (attempt.is_winner, attempt.prize_id) {
                (true, Some(prize_id)) => {
                    stats.wins += 1;
                    *stats.wins_by_prize.entry(prize_id).or_insert(0) += 1;
                }
                (true, None) => stats.wins += 1,
                (false, _) => stats.losses += 1,
            }
        }

        stats.win_rate = if stats.total_attempts > 0 {
            stats.wins as f64 / stats.total_attempts as f64
        } else {
            0.0
        };
        stats
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn count_wins_since(
        &self,
        user_id: &str,
        template_id: TemplateId,
        since: DateTime<Utc>,
    ) -> InstantWinResult<u32> {
        let count = self
            .attempts
            .read()
            .iter()
            .filter(|a| {
                a.is_winner
                    && a.user_id == user_id
                    && a.template_id == template_id
                    && a.executed_at >= since
            })
            .count();
        Ok(count as u32)
    }

    fn record_attempt(&self, attempt: &LotteryAttempt) -> InstantWinResult<()> {
        debug!(
            lottery_id = %attempt.id,
            user_id = %attempt.user_id,
            is_winner = attempt.is_winner,
            "Recording lottery attempt"
        );
        self.attempts.write().push(attempt.clone());
        Ok(())
    }
}
