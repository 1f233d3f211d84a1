//! Per-prize win probability from independent multiplicative factors.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Timelike, Utc};
use instantwin_core::config::LotteryConfig;
use instantwin_core::error::{InstantWinError, InstantWinResult};
use instantwin_core::types::{Prize, PrizeId, TemplateId};
use tracing::debug;

use crate::history::HistoryStore;
use crate::types::{PrizeProbability, ProbabilityTable};

/// Computes probabilities for an eligible prize set. Reads win counts from the
/// history store on every call; nothing is cached between draws.
pub struct ProbabilityCalculator {
    config: LotteryConfig,
    history: Arc<dyn HistoryStore>,
}

impl ProbabilityCalculator {
    pub fn new(config: &LotteryConfig, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            config: config.clone(),
            history,
        }
    }

    pub fn compute_probabilities(
        &self,
        prizes: &[Prize],
        user_id: &str,
        template_id: TemplateId,
        custom_weights: &HashMap<PrizeId, f64>,
    ) -> InstantWinResult<ProbabilityTable> {
        self.compute_probabilities_at(prizes, user_id, template_id, custom_weights, Local::now())
    }

    /// Same as `compute_probabilities` with an explicit processing time; the
    /// daily window starts at local midnight of `now`.
    pub fn compute_probabilities_at(
        &self,
        prizes: &[Prize],
        user_id: &str,
        template_id: TemplateId,
        custom_weights: &HashMap<PrizeId, f64>,
        now: DateTime<Local>,
    ) -> InstantWinResult<ProbabilityTable> {
        let window_start = Duration::try_hours(self.config.fraud_window_hours)
            .and_then(|window| now.with_timezone(&Utc).checked_sub_signed(window))
            .ok_or_else(|| {
                InstantWinError::Config(format!(
                    "fraud_window_hours {} is out of range",
                    self.config.fraud_window_hours
                ))
            })?;
        let recent_wins = self
            .history
            .count_wins_since(user_id, template_id, window_start)?;
        let wins_today = self
            .history
            .count_wins_since(user_id, template_id, start_of_day(now))?;

        let entries = prizes
            .iter()
            .map(|prize| {
                let weight = custom_weights
                    .get(&prize.id)
                    .copied()
                    .or(prize.custom_weight);
                let probability = self.prize_probability(prize, weight, recent_wins, wins_today);
                debug!(
                    prize_id = prize.id,
                    base = prize.base_win_probability,
                    probability,
                    "Computed prize probability"
                );
                PrizeProbability {
                    prize_id: prize.id,
                    probability,
                }
            })
            .collect();

        Ok(ProbabilityTable {
            entries,
            recent_wins,
            wins_today,
        })
    }

    /// Applies every factor in turn, clamping after each so the value stays in
    /// `[0, 1]`.
    pub fn prize_probability(
        &self,
        prize: &Prize,
        weight: Option<f64>,
        recent_wins: u32,
        wins_today: u32,
    ) -> f64 {
        let mut p = clamp_unit(prize.base_win_probability);

        if let Some(weight) = weight {
            p = clamp_unit(p * weight);
        }

        if let Some(value) = prize.value.filter(|v| *v > 0.0) {
            let dampening = (1.0 / (1.0 + value / self.config.value_scale)).max(self.config.value_floor);
            p = clamp_unit(p * dampening);
        }

        if let Some(stock) = prize.stock_quantity {
            if stock <= 0 {
                return 0.0;
            }
            if stock < self.config.low_stock_threshold {
                p = clamp_unit(p * self.config.low_stock_factor);
            }
        }

        if recent_wins >= self.config.fraud_heavy_threshold {
            p = clamp_unit(p * self.config.fraud_heavy_factor);
        } else if recent_wins > 0 {
            p = clamp_unit(p * self.config.fraud_light_factor);
        }

        let daily_limit = prize.daily_limit.unwrap_or(self.config.default_daily_limit);
        if wins_today >= daily_limit {
            return 0.0;
        }

        p
    }
}

fn clamp_unit(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Local midnight of `now`'s calendar day, in UTC.
fn start_of_day(now: DateTime<Local>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .unwrap_or_else(|| now - Duration::seconds(i64::from(now.num_seconds_from_midnight())))
        .with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::InMemoryHistoryStore;
    use instantwin_core::types::LotteryAttempt;
    use uuid::Uuid;

    fn prize(id: PrizeId, base: f64) -> Prize {
        Prize {
            id,
            template_id: 1,
            name: format!("prize-{}", id),
            description: None,
            base_win_probability: base,
            value: None,
            stock_quantity: None,
            daily_limit: Some(5),
            custom_weight: None,
            winner_count: 100,
            send_winner_count: 0,
            is_active: true,
        }
    }

    fn calculator() -> ProbabilityCalculator {
        ProbabilityCalculator::new(
            &LotteryConfig::default(),
            Arc::new(InMemoryHistoryStore::new()),
        )
    }

    fn win(user: &str, executed_at: DateTime<Utc>) -> LotteryAttempt {
        LotteryAttempt {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            conversation_id: 1,
            template_id: 1,
            prize_id: Some(1),
            is_winner: true,
            probability_used: 0.5,
            random_value: 0.1,
            executed_at,
            error: None,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_base_probability_untouched() {
        let calc = calculator();
        assert!(approx(calc.prize_probability(&prize(1, 0.25), None, 0, 0), 0.25));
    }

    #[test]
    fn test_custom_weight_multiplies_and_clamps() {
        let calc = calculator();
        assert!(approx(calc.prize_probability(&prize(1, 0.2), Some(2.0), 0, 0), 0.4));
        assert!(approx(calc.prize_probability(&prize(1, 0.2), Some(10.0), 0, 0), 1.0));
        assert!(approx(calc.prize_probability(&prize(1, 0.2), Some(0.0), 0, 0), 0.0));
    }

    #[test]
    fn test_value_dampening_with_floor() {
        let calc = calculator();
        let mut p = prize(1, 0.5);
        p.value = Some(1000.0);
        assert!(approx(calc.prize_probability(&p, None, 0, 0), 0.25));

        p.value = Some(1_000_000.0);
        assert!(approx(calc.prize_probability(&p, None, 0, 0), 0.05));

        p.value = Some(0.0);
        assert!(approx(calc.prize_probability(&p, None, 0, 0), 0.5));
    }

    #[test]
    fn test_inventory_factor() {
        let calc = calculator();
        let mut p = prize(1, 0.8);
        p.stock_quantity = Some(0);
        assert_eq!(calc.prize_probability(&p, Some(10.0), 0, 0), 0.0);

        p.stock_quantity = Some(-3);
        assert_eq!(calc.prize_probability(&p, None, 0, 0), 0.0);

        p.stock_quantity = Some(9);
        assert!(approx(calc.prize_probability(&p, None, 0, 0), 0.4));

        p.stock_quantity = Some(10);
        assert!(approx(calc.prize_probability(&p, None, 0, 0), 0.8));
    }

    #[test]
    fn test_recency_factor() {
        let calc = calculator();
        let p = prize(1, 0.8);
        assert!(approx(calc.prize_probability(&p, None, 1, 0), 0.4));
        assert!(approx(calc.prize_probability(&p, None, 2, 0), 0.4));
        assert!(approx(calc.prize_probability(&p, None, 3, 0), 0.08));
        assert!(approx(calc.prize_probability(&p, None, 7, 0), 0.08));
    }

    #[test]
    fn test_daily_limit_zeroes_probability() {
        let calc = calculator();
        let mut p = prize(1, 1.0);
        p.daily_limit = None;
        assert_eq!(calc.prize_probability(&p, None, 1, 1), 0.0);

        p.daily_limit = Some(2);
        assert!(calc.prize_probability(&p, None, 1, 1) > 0.0);
        assert_eq!(calc.prize_probability(&p, None, 2, 2), 0.0);
    }

    #[test]
    fn test_out_of_range_base_is_clamped() {
        let calc = calculator();
        assert_eq!(calc.prize_probability(&prize(1, 1.7), None, 0, 0), 1.0);
        assert_eq!(calc.prize_probability(&prize(1, -0.2), None, 0, 0), 0.0);
        assert_eq!(calc.prize_probability(&prize(1, f64::NAN), None, 0, 0), 0.0);
    }

    #[test]
    fn test_compute_reads_history_counts() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let now = Local::now();
        let now_utc = now.with_timezone(&Utc);
        history.record_attempt(&win("alice", now_utc)).unwrap();
        history.record_attempt(&win("alice", now_utc)).unwrap();
        history
            .record_attempt(&win("alice", now_utc - Duration::hours(30)))
            .unwrap();
        let calc = ProbabilityCalculator::new(&LotteryConfig::default(), history.clone());

        let prizes = vec![prize(1, 0.4), prize(2, 0.2)];
        let mut weights = HashMap::new();
        weights.insert(2, 2.0);

        let table = calc
            .compute_probabilities_at(&prizes, "alice", 1, &weights, now)
            .unwrap();
        assert_eq!(table.recent_wins, 2);
        assert_eq!(table.wins_today, 2);
        assert!(approx(table.get(1).unwrap(), 0.2));
        assert!(approx(table.get(2).unwrap(), 0.2));
        assert_eq!(table.entries[0].prize_id, 1);

        let fresh = calc
            .compute_probabilities_at(&prizes, "bob", 1, &weights, now)
            .unwrap();
        assert!(approx(fresh.get(1).unwrap(), 0.4));
        assert!(approx(fresh.get(2).unwrap(), 0.4));
        assert!(approx(fresh.total(), 0.8));
    }

    #[test]
    fn test_daily_window_starts_at_local_midnight() {
        let now = Local::now()
            .date_naive()
            .and_hms_opt(0, 30, 0)
            .and_then(|t| t.and_local_timezone(Local).earliest())
            .unwrap();
        let history = Arc::new(InMemoryHistoryStore::new());
        let late_yesterday = now.with_timezone(&Utc) - Duration::minutes(90);
        history.record_attempt(&win("alice", late_yesterday)).unwrap();
        let calc = ProbabilityCalculator::new(&LotteryConfig::default(), history);

        let mut capped = prize(1, 0.6);
        capped.daily_limit = Some(1);
        let table = calc
            .compute_probabilities_at(&[capped], "alice", 1, &HashMap::new(), now)
            .unwrap();

        assert_eq!(table.recent_wins, 1);
        assert_eq!(table.wins_today, 0);
        let by_prize = table.as_map();
        assert_eq!(by_prize.len(), 1);
        assert!(approx(by_prize[&1], 0.3));
        assert_eq!(start_of_day(now), now.with_timezone(&Utc) - Duration::minutes(30));
    }

    #[test]
    fn test_extreme_fraud_window_is_a_config_error() {
        let config = LotteryConfig {
            fraud_window_hours: i64::MAX,
            ..LotteryConfig::default()
        };
        let calc = ProbabilityCalculator::new(&config, Arc::new(InMemoryHistoryStore::new()));
        let err = calc
            .compute_probabilities(&[prize(1, 0.5)], "alice", 1, &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, InstantWinError::Config(_)));
    }

    #[test]
    fn test_request_weight_overrides_prize_weight() {
        let calc = calculator();
        let mut p = prize(1, 0.1);
        p.custom_weight = Some(3.0);
        let table = calc
            .compute_probabilities(&[p.clone()], "u", 1, &HashMap::new())
            .unwrap();
        assert!(approx(table.get(1).unwrap(), 0.3));

        let mut weights = HashMap::new();
        weights.insert(1, 5.0);
        let table = calc.compute_probabilities(&[p], "u", 1, &weights).unwrap();
        assert!(approx(table.get(1).unwrap(), 0.5));
    }

    #[test]
    fn test_start_of_day_is_not_after_now() {
        let now = Local::now();
        let midnight = start_of_day(now);
        assert!(midnight <= now.with_timezone(&Utc));
        assert!(now.with_timezone(&Utc) - midnight <= Duration::hours(25));
    }
}
