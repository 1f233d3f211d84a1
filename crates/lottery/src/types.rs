use std::collections::HashMap;

use instantwin_core::error::{InstantWinError, InstantWinResult};
use instantwin_core::types::{ConversationId, Prize, PrizeId, TemplateId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Input to a single draw.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LotteryRequest {
    pub user_id: String,
    #[schema(value_type = i64)]
    pub conversation_id: ConversationId,
    /// Resolved from the conversation when absent.
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub template_id: Option<TemplateId>,
    #[serde(default)]
    #[schema(value_type = Vec<i64>)]
    pub exclude_prize_ids: Vec<PrizeId>,
    /// Per-prize probability multipliers, each within `0..=max_custom_weight`.
    #[serde(default)]
    #[schema(value_type = HashMap<i64, f64>)]
    pub custom_weights: HashMap<PrizeId, f64>,
}

impl LotteryRequest {
    pub fn new(user_id: impl Into<String>, conversation_id: ConversationId) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id,
            template_id: None,
            exclude_prize_ids: Vec::new(),
            custom_weights: HashMap::new(),
        }
    }

    pub fn with_template(mut self, template_id: TemplateId) -> Self {
        self.template_id = Some(template_id);
        self
    }

    pub fn validate(&self, max_custom_weight: f64) -> InstantWinResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(InstantWinError::Validation(
                "user_id must not be empty".to_string(),
            ));
        }
        for (prize_id, weight) in &self.custom_weights {
            if !weight.is_finite() || *weight < 0.0 || *weight > max_custom_weight {
                return Err(InstantWinError::Validation(format!(
                    "custom weight {} for prize {} is outside 0..={}",
                    weight, prize_id, max_custom_weight
                )));
            }
        }
        Ok(())
    }
}

/// Prize details returned to the end-user on a win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PrizeSummary {
    #[schema(value_type = i64)]
    pub id: PrizeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl From<&Prize> for PrizeSummary {
    fn from(prize: &Prize) -> Self {
        Self {
            id: prize.id,
            name: prize.name.clone(),
            description: prize.description.clone(),
            value: prize.value,
        }
    }
}

/// Outcome of one draw. Always well-formed, including for failed draws.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LotteryResult {
    pub is_winner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<i64>)]
    pub prize_id: Option<PrizeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prize_summary: Option<PrizeSummary>,
    /// Id of the recorded attempt.
    pub lottery_id: Uuid,
    pub probability_used: f64,
    pub random_value: f64,
    pub message: String,
}

/// Computed win probability for one eligible prize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrizeProbability {
    pub prize_id: PrizeId,
    pub probability: f64,
}

/// Per-prize probabilities in draw order, plus the history counts they were
/// derived from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbabilityTable {
    pub entries: Vec<PrizeProbability>,
    pub recent_wins: u32,
    pub wins_today: u32,
}

impl ProbabilityTable {
    pub fn get(&self, prize_id: PrizeId) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.prize_id == prize_id)
            .map(|e| e.probability)
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.probability).sum()
    }

    pub fn as_map(&self) -> HashMap<PrizeId, f64> {
        self.entries
            .iter()
            .map(|e| (e.prize_id, e.probability))
            .collect()
    }
}

/// Stages one draw moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawStage {
    ResolvingTemplate,
    ComputingEligibility,
    ComputingProbabilities,
    Drawing,
    Awarding,
    Recording,
    Done,
}

impl DrawStage {
    pub fn next(self) -> Self {
        match self {
            Self::ResolvingTemplate => Self::ComputingEligibility,
            Self::ComputingEligibility => Self::ComputingProbabilities,
            Self::ComputingProbabilities => Self::Drawing,
            Self::Drawing => Self::Awarding,
            Self::Awarding => Self::Recording,
            Self::Recording | Self::Done => Self::Done,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResolvingTemplate => "resolving_template",
            Self::ComputingEligibility => "computing_eligibility",
            Self::ComputingProbabilities => "computing_probabilities",
            Self::Drawing => "drawing",
            Self::Awarding => "awarding",
            Self::Recording => "recording",
            Self::Done => "done",
        }
    }
}
