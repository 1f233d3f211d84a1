//! Prize and conversation read access, plus inventory updates after a win.

use chrono::Utc;
use dashmap::DashMap;
use instantwin_core::error::{InstantWinError, InstantWinResult};
use instantwin_core::types::{Conversation, ConversationId, Prize, PrizeId, TemplateId};
use tracing::info;

pub trait PrizeCatalog: Send + Sync {
    fn find_conversation(&self, id: ConversationId) -> InstantWinResult<Option<Conversation>>;

    /// Active prizes configured for a template, in any order.
    fn active_prizes(&self, template_id: TemplateId) -> InstantWinResult<Vec<Prize>>;

    /// Claims one winner slot and one unit of tracked stock. The check and the
    /// increment are a single atomic step, so concurrent winners of the last
    /// unit cannot both succeed.
    fn award(&self, prize_id: PrizeId) -> InstantWinResult<()>;

    /// Returns a slot claimed by `award` whose win could not be recorded.
    fn release(&self, prize_id: PrizeId) -> InstantWinResult<()>;
}

#[derive(Default)]
pub struct InMemoryPrizeCatalog {
    conversations: DashMap<ConversationId, Conversation>,
    prizes: DashMap<PrizeId, Prize>,
}

impl InMemoryPrizeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_conversation(&self, conversation: Conversation) {
        self.conversations.insert(conversation.id, conversation);
    }

    pub fn upsert_prize(&self, prize: Prize) {
        self.prizes.insert(prize.id, prize);
    }

    pub fn get_prize(&self, id: PrizeId) -> Option<Prize> {
        self.prizes.get(&id).map(|r| r.value().clone())
    }

    /// Seeds the prize table for the demo template and two conversations.
    pub fn seed_demo_prizes(&self) {
        info!("Seeding demo prizes");

        let prizes = [
            (1, "Free Coffee", 0.30, Some(5.0), Some(500), 3, 1000),
            (2, "Movie Tickets", 0.10, Some(30.0), Some(100), 1, 200),
            (3, "Wireless Earbuds", 0.02, Some(150.0), Some(8), 1, 20),
        ];
        for (id, name, probability, value, stock, daily_limit, winner_count) in prizes {
            self.upsert_prize(Prize {
                id,
                template_id: 1,
                name: name.to_string(),
                description: None,
                base_win_probability: probability,
                value,
                stock_quantity: stock,
                daily_limit: Some(daily_limit),
                custom_weight: None,
                winner_count,
                send_winner_count: 0,
                is_active: true,
            });
        }

        for (id, user_id) in [(1, "demo-user-1"), (2, "demo-user-2")] {
            self.add_conversation(Conversation {
                id,
                user_id: user_id.to_string(),
                template_id: 1,
                started_at: Utc::now(),
            });
        }

        info!("Seeded 3 demo prizes");
    }
}

impl PrizeCatalog for InMemoryPrizeCatalog {
    fn find_conversation(&self, id: ConversationId) -> InstantWinResult<Option<Conversation>> {
        Ok(self.conversations.get(&id).map(|r| r.value().clone()))
    }

    fn active_prizes(&self, template_id: TemplateId) -> InstantWinResult<Vec<Prize>> {
        Ok(self
            .prizes
            .iter()
            .filter(|r| r.value().template_id == template_id && r.value().is_active)
            .map(|r| r.value().clone())
            .collect())
    }

    fn award(&self, prize_id: PrizeId) -> InstantWinResult<()> {
        let mut prize = self
            .prizes
            .get_mut(&prize_id)
            .ok_or_else(|| InstantWinError::Catalog(format!("prize {} not found", prize_id)))?;
        if prize.is_exhausted() {
            return Err(InstantWinError::Catalog(format!(
                "prize {} has no winners left",
                prize_id
            )));
        }
        if prize.stock_quantity.is_some_and(|stock| stock <= 0) {
            return Err(InstantWinError::Catalog(format!(
                "prize {} is out of stock",
                prize_id
            )));
        }
        prize.send_winner_count += 1;
        if let Some(stock) = prize.stock_quantity.as_mut() {
            *stock -= 1;
        }
        Ok(())
    }

    fn release(&self, prize_id: PrizeId) -> InstantWinResult<()> {
        let mut prize = self
            .prizes
            .get_mut(&prize_id)
            .ok_or_else(|| InstantWinError::Catalog(format!("prize {} not found", prize_id)))?;
        prize.send_winner_count = prize.send_winner_count.saturating_sub(1);
        if let Some(stock) = prize.stock_quantity.as_mut() {
            *stock += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_award_updates_inventory() {
        let catalog = InMemoryPrizeCatalog::new();
        catalog.seed_demo_prizes();

        catalog.award(3).unwrap();
        let prize = catalog.get_prize(3).unwrap();
        assert_eq!(prize.send_winner_count, 1);
        assert_eq!(prize.stock_quantity, Some(7));
    }

    #[test]
    fn test_award_refuses_exhausted_prize() {
        let catalog = InMemoryPrizeCatalog::new();
        catalog.seed_demo_prizes();
        let mut prize = catalog.get_prize(2).unwrap();
        prize.send_winner_count = prize.winner_count;
        catalog.upsert_prize(prize);

        assert!(matches!(catalog.award(2), Err(InstantWinError::Catalog(_))));
        assert!(catalog.award(99).is_err());
    }

    #[test]
    fn test_award_refuses_empty_stock() {
        let catalog = InMemoryPrizeCatalog::new();
        catalog.seed_demo_prizes();
        let mut prize = catalog.get_prize(3).unwrap();
        prize.stock_quantity = Some(0);
        catalog.upsert_prize(prize);

        assert!(catalog.award(3).is_err());
        assert_eq!(catalog.get_prize(3).unwrap().send_winner_count, 0);
    }

    #[test]
    fn test_release_returns_awarded_unit() {
        let catalog = InMemoryPrizeCatalog::new();
        catalog.seed_demo_prizes();

        catalog.award(3).unwrap();
        catalog.release(3).unwrap();
        let prize = catalog.get_prize(3).unwrap();
        assert_eq!(prize.send_winner_count, 0);
        assert_eq!(prize.stock_quantity, Some(8));
    }

    #[test]
    fn test_concurrent_awards_respect_winner_cap() {
        let catalog = std::sync::Arc::new(InMemoryPrizeCatalog::new());
        catalog.seed_demo_prizes();
        let mut prize = catalog.get_prize(2).unwrap();
        prize.winner_count = 5;
        catalog.upsert_prize(prize);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let catalog = catalog.clone();
                std::thread::spawn(move || catalog.award(2).is_ok())
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(granted, 5);
        assert_eq!(catalog.get_prize(2).unwrap().send_winner_count, 5);
    }

    #[test]
    fn test_active_prizes_by_template() {
        let catalog = InMemoryPrizeCatalog::new();
        catalog.seed_demo_prizes();
        let mut prize = catalog.get_prize(1).unwrap();
        prize.is_active = false;
        catalog.upsert_prize(prize);

        assert_eq!(catalog.active_prizes(1).unwrap().len(), 2);
        assert!(catalog.active_prizes(7).unwrap().is_empty());
        assert_eq!(catalog.find_conversation(2).unwrap().unwrap().template_id, 1);
        assert!(catalog.find_conversation(42).unwrap().is_none());
    }
}
