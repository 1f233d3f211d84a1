//! Per-key draw serialization.
//!
//! The lottery engine counts a user's wins before drawing, so two in-flight
//! draws for the same `(user_id, template_id)` could both pass the daily
//! limit. Every draw runs while holding its key's guard.

use std::sync::Arc;

use dashmap::DashMap;
use instantwin_core::types::TemplateId;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct DrawLocks {
    locks: DashMap<(String, TemplateId), Arc<Mutex<()>>>,
}

impl DrawLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the lock of `(user_id, template_id)` without blocking the
    /// executor. The key stays locked until the guard is dropped.
    pub async fn acquire(&self, user_id: &str, template_id: TemplateId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry((user_id.to_string(), template_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drops locks nobody is holding or waiting on.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - self.locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use instantwin_core::config::LotteryConfig;
    use instantwin_core::types::{Conversation, Prize};
    use instantwin_lottery::{
        HistoryStore, InMemoryHistoryStore, InMemoryPrizeCatalog, LotteryEngine, LotteryRequest,
    };
    use std::time::Duration;

    #[tokio::test]
    async fn test_prune_releases_idle_keys() {
        let locks = DrawLocks::new();
        drop(locks.acquire("alice", 1).await);
        let held = locks.acquire("bob", 1).await;
        assert_eq!(locks.len(), 2);
        assert_eq!(locks.prune(), 1);
        assert_eq!(locks.len(), 1);

        drop(held);
        assert_eq!(locks.prune(), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_waiting_on_a_held_key_does_not_block_the_runtime() {
        let locks = Arc::new(DrawLocks::new());
        let held = locks.acquire("alice", 1).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("alice", 1).await;
            })
        };

        // Current-thread runtime: other keys still make progress while the
        // waiter is parked.
        tokio::time::timeout(Duration::from_secs(1), locks.acquire("bob", 1))
            .await
            .unwrap();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_serialized_draws_respect_daily_limit() {
        let catalog = Arc::new(InMemoryPrizeCatalog::new());
        catalog.add_conversation(Conversation {
            id: 1,
            user_id: "alice".to_string(),
            template_id: 1,
            started_at: chrono::Utc::now(),
        });
        catalog.upsert_prize(Prize {
            id: 1,
            template_id: 1,
            name: "Sure Thing".to_string(),
            description: None,
            base_win_probability: 1.0,
            value: None,
            stock_quantity: None,
            daily_limit: Some(1),
            custom_weight: None,
            winner_count: 100,
            send_winner_count: 0,
            is_active: true,
        });
        let history = Arc::new(InMemoryHistoryStore::new());
        let engine = Arc::new(LotteryEngine::new(
            &LotteryConfig::default(),
            catalog,
            history.clone(),
        ));
        let locks = Arc::new(DrawLocks::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let locks = locks.clone();
                tokio::spawn(async move {
                    let _guard = locks.acquire("alice", 1).await;
                    tokio::task::spawn_blocking(move || {
                        engine
                            .execute_lottery(&LotteryRequest::new("alice", 1))
                            .unwrap()
                    })
                    .await
                    .unwrap()
                })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().is_winner {
                wins += 1;
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(history.len(), 8);
        let since = chrono::Utc::now() - chrono::Duration::days(1);
        assert_eq!(history.count_wins_since("alice", 1, since).unwrap(), 1);
    }
}
