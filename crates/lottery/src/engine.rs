use std::sync::Arc;

use chrono::Utc;
use instantwin_core::config::LotteryConfig;
use instantwin_core::error::{InstantWinError, InstantWinResult};
use instantwin_core::event_bus::{make_event, EventSink};
use instantwin_core::types::{EventType, LotteryAttempt, Prize, PrizeId, TemplateId};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::PrizeCatalog;
use crate::eligibility::eligible_prizes;
use crate::history::HistoryStore;
use crate::probability::ProbabilityCalculator;
use crate::rng::{RandomSource, ThreadRandom};
use crate::types::{DrawStage, LotteryRequest, LotteryResult, PrizeSummary, ProbabilityTable};

const WIN_MESSAGE: &str = "Congratulations, you won";
const LOSS_MESSAGE: &str = "Sorry, no prize this time";
const NO_PRIZES_MESSAGE: &str = "No prizes are currently available";
const FAILED_MESSAGE: &str = "The draw could not be completed";

/// Where a single random value landed on the cumulative prize partition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub prize_id: Option<PrizeId>,
    /// The winner's own probability, or the total mass on a loss.
    pub probability: f64,
    pub total_mass: f64,
}

/// Maps `r` onto half-open intervals laid out in table order. When the total
/// mass exceeds 1 every interval is scaled so the union is exactly `[0, 1)`.
pub fn select_prize(table: &ProbabilityTable, r: f64) -> Selection {
    let total_mass = table.total();
    let scale = if total_mass > 1.0 { total_mass } else { 1.0 };

    let mut running = 0.0;
    for entry in &table.entries {
        let lower = running / scale;
        running += entry.probability;
        let upper = running / scale;
        if r >= lower && r < upper {
            return Selection {
                prize_id: Some(entry.prize_id),
                probability: entry.probability,
                total_mass,
            };
        }
    }

    Selection {
        prize_id: None,
        probability: total_mass,
        total_mass,
    }
}

/// A completed draw, not yet recorded.
struct Draw {
    attempt: LotteryAttempt,
    prize: Option<Prize>,
    message: String,
}

/// Lottery selection engine. Holds no mutable state of its own; every call
/// reads the catalog and history afresh.
///
/// Callers must serialize draws per `(user_id, template_id)`. Two concurrent
/// draws for the same key can both observe a daily count below the limit.
/// The prize cap needs no such guard: a win only stands once the catalog
/// has granted the winner slot.
pub struct LotteryEngine {
    config: LotteryConfig,
    catalog: Arc<dyn PrizeCatalog>,
    history: Arc<dyn HistoryStore>,
    calculator: ProbabilityCalculator,
    rng: Arc<dyn RandomSource>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for LotteryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LotteryEngine")
            .field("config", &self.config)
            .finish()
    }
}

impl LotteryEngine {
    pub fn new(
        config: &LotteryConfig,
        catalog: Arc<dyn PrizeCatalog>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        info!(
            fraud_window_hours = config.fraud_window_hours,
            default_daily_limit = config.default_daily_limit,
            "Lottery engine initialized"
        );
        Self {
            config: config.clone(),
            calculator: ProbabilityCalculator::new(config, history.clone()),
            catalog,
            history,
            rng: Arc::new(ThreadRandom),
            event_sink: instantwin_core::event_bus::noop_sink(),
        }
    }

    /// Replace the random source, e.g. with a seeded or scripted one in tests.
    pub fn with_random_source(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Runs one draw.
    ///
    /// Returns `Err` only for invalid requests and unknown conversations.
    /// Every other failure is recorded as a failed attempt and reported as a
    /// loss.
    pub fn execute_lottery(&self, request: &LotteryRequest) -> InstantWinResult<LotteryResult> {
        request.validate(self.config.max_custom_weight)?;

        let mut stage = DrawStage::ResolvingTemplate;
        let template_id = self.resolve_template(request)?;
        let lottery_id = Uuid::new_v4();
        stage = stage.next();

        let draw = match self.draw(lottery_id, request, template_id, &mut stage) {
            Ok(draw) => draw,
            Err(e) => return Ok(self.fail(lottery_id, request, template_id, stage, 0.0, e)),
        };

        stage = DrawStage::Awarding;
        if let Some(prize_id) = draw.attempt.prize_id {
            if let Err(e) = self.catalog.award(prize_id) {
                return Ok(self.fail(
                    lottery_id,
                    request,
                    template_id,
                    stage,
                    draw.attempt.random_value,
                    e,
                ));
            }
        }

        stage = stage.next();
        if let Err(e) = self.history.record_attempt(&draw.attempt) {
            if let Some(prize_id) = draw.attempt.prize_id {
                if let Err(release_err) = self.catalog.release(prize_id) {
                    warn!(error = %release_err, prize_id, lottery_id = %lottery_id, "Failed to release unrecorded award");
                }
            }
            return Ok(self.fail(
                lottery_id,
                request,
                template_id,
                stage,
                draw.attempt.random_value,
                e,
            ));
        }

        self.finish(draw)
    }

    /// Template explicitly requested, else the one the conversation belongs to.
    pub fn resolve_template(&self, request: &LotteryRequest) -> InstantWinResult<TemplateId> {
        if let Some(template_id) = request.template_id {
            return Ok(template_id);
        }
        self.catalog
            .find_conversation(request.conversation_id)?
            .map(|c| c.template_id)
            .ok_or(InstantWinError::ConversationNotFound(request.conversation_id))
    }

    fn draw(
        &self,
        lottery_id: Uuid,
        request: &LotteryRequest,
        template_id: TemplateId,
        stage: &mut DrawStage,
    ) -> InstantWinResult<Draw> {
        let prizes = eligible_prizes(
            self.catalog.active_prizes(template_id)?,
            &request.exclude_prize_ids,
        );

        if prizes.is_empty() {
            info!(
                user_id = %request.user_id,
                template_id,
                "No eligible prizes, returning loss without drawing"
            );
            return Ok(Draw {
                attempt: self.attempt(lottery_id, request, template_id, None, 0.0, 0.0),
                prize: None,
                message: NO_PRIZES_MESSAGE.to_string(),
            });
        }

        *stage = stage.next();
        let table = self.calculator.compute_probabilities(
            &prizes,
            &request.user_id,
            template_id,
            &request.custom_weights,
        )?;

        *stage = stage.next();
        let random_value = self.rng.next_f64();
        let selection = select_prize(&table, random_value);

        info!(
            user_id = %request.user_id,
            template_id,
            candidates = prizes.len(),
            total_mass = selection.total_mass,
            random_value,
            prize_id = ?selection.prize_id,
            "Lottery drawn"
        );

        let prize = selection
            .prize_id
            .and_then(|id| prizes.into_iter().find(|p| p.id == id));
        let message = match &prize {
            Some(p) => format!("{}: {}", WIN_MESSAGE, p.name),
            None => LOSS_MESSAGE.to_string(),
        };

        Ok(Draw {
            attempt: self.attempt(
                lottery_id,
                request,
                template_id,
                prize.as_ref().map(|p| p.id),
                selection.probability,
                random_value,
            ),
            prize,
            message,
        })
    }

    fn attempt(
        &self,
        lottery_id: Uuid,
        request: &LotteryRequest,
        template_id: TemplateId,
        prize_id: Option<PrizeId>,
        probability_used: f64,
        random_value: f64,
    ) -> LotteryAttempt {
        LotteryAttempt {
            id: lottery_id,
            user_id: request.user_id.clone(),
            conversation_id: request.conversation_id,
            template_id,
            prize_id,
            is_winner: prize_id.is_some(),
            probability_used,
            random_value,
            executed_at: Utc::now(),
            error: None,
        }
    }

    fn finish(&self, draw: Draw) -> InstantWinResult<LotteryResult> {
        let attempt = draw.attempt;
        metrics::counter!("lottery.draws").increment(1);
        self.event_sink.emit(make_event(
            EventType::LotteryDrawn,
            Some(attempt.user_id.clone()),
            Some(attempt.template_id),
            attempt.prize_id,
        ));
        if attempt.is_winner {
            metrics::counter!("lottery.wins").increment(1);
            self.event_sink.emit(make_event(
                EventType::LotteryWon,
                Some(attempt.user_id.clone()),
                Some(attempt.template_id),
                attempt.prize_id,
            ));
        } else {
            metrics::counter!("lottery.losses").increment(1);
        }

        Ok(LotteryResult {
            is_winner: attempt.is_winner,
            prize_id: attempt.prize_id,
            prize_summary: draw.prize.as_ref().map(PrizeSummary::from),
            lottery_id: attempt.id,
            probability_used: attempt.probability_used,
            random_value: attempt.random_value,
            message: draw.message,
        })
    }

    /// Records a failed attempt and shapes a loss. A failure to record the
    /// failure itself is logged; the caller still gets a well-formed result.
    fn fail(
        &self,
        lottery_id: Uuid,
        request: &LotteryRequest,
        template_id: TemplateId,
        stage: DrawStage,
        random_value: f64,
        cause: InstantWinError,
    ) -> LotteryResult {
        error!(
            error = %cause,
            stage = stage.as_str(),
            user_id = %request.user_id,
            template_id,
            lottery_id = %lottery_id,
            "Lottery draw failed"
        );
        metrics::counter!("lottery.failures").increment(1);

        let mut attempt = self.attempt(lottery_id, request, template_id, None, 0.0, random_value);
        attempt.error = Some(format!("{} failed: {}", stage.as_str(), cause));
        if let Err(e) = self.history.record_attempt(&attempt) {
            error!(error = %e, lottery_id = %lottery_id, "Failed to record failed lottery attempt");
        }

        self.event_sink.emit(make_event(
            EventType::LotteryFailed,
            Some(request.user_id.clone()),
            Some(template_id),
            None,
        ));

        LotteryResult {
            is_winner: false,
            prize_id: None,
            prize_summary: None,
            lottery_id,
            probability_used: 0.0,
            random_value,
            message: FAILED_MESSAGE.to_string(),
        }
    }
}
