//! Eligible prize set: what survives the active, exclusion, and winner-cap
//! filters before any probability is computed.

use instantwin_core::types::{Prize, PrizeId};

/// Filters out inactive, excluded, and exhausted prizes and orders the rest by
/// id so repeated draws against the same set use the same interval layout.
pub fn eligible_prizes(prizes: Vec<Prize>, exclude: &[PrizeId]) -> Vec<Prize> {
    let mut eligible: Vec<Prize> = prizes
        .into_iter()
        .filter(|p| p.is_active && !p.is_exhausted() && !exclude.contains(&p.id))
        .collect();
    eligible.sort_by_key(|p| p.id);
    eligible
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prize(id: PrizeId) -> Prize {
        Prize {
            id,
            template_id: 1,
            name: format!("prize-{}", id),
            description: None,
            base_win_probability: 0.1,
            value: None,
            stock_quantity: None,
            daily_limit: None,
            custom_weight: None,
            winner_count: 10,
            send_winner_count: 0,
            is_active: true,
        }
    }

    #[test]
    fn test_filters_and_orders() {
        let mut exhausted = prize(2);
        exhausted.send_winner_count = 10;
        let mut inactive = prize(4);
        inactive.is_active = false;

        let result = eligible_prizes(
            vec![prize(5), exhausted, prize(3), inactive, prize(1)],
            &[3],
        );
        let ids: Vec<PrizeId> = result.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 5]);
    }

    #[test]
    fn test_empty_input() {
        assert!(eligible_prizes(Vec::new(), &[]).is_empty());
    }
}
