use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub type NodeId = i64;
pub type EdgeId = i64;
pub type PrizeId = i64;
pub type TemplateId = i64;
pub type ConversationId = i64;

/// Step kind within a conversation flow. Fixed for the lifetime of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Start,
    Message,
    Tree,
    LotteryGroup,
    End,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Message => "MESSAGE",
            Self::Tree => "TREE",
            Self::LotteryGroup => "LOTTERY_GROUP",
            Self::End => "END",
        }
    }
}

/// A single step of a flow, owned by one template and one prize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Node {
    #[schema(value_type = i64)]
    pub id: NodeId,
    #[schema(value_type = i64)]
    pub template_id: TemplateId,
    #[schema(value_type = i64)]
    pub prize_id: PrizeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Node {
    pub fn new(id: NodeId, template_id: TemplateId, prize_id: PrizeId, node_type: NodeType) -> Self {
        Self {
            id,
            template_id,
            prize_id,
            node_type,
            label: None,
        }
    }
}

/// Directed transition between two nodes of the same template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Edge {
    #[schema(value_type = i64)]
    pub id: EdgeId,
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub template_id: Option<TemplateId>,
    #[schema(value_type = i64)]
    pub prize_id: PrizeId,
    #[schema(value_type = i64)]
    pub source_node_id: NodeId,
    #[schema(value_type = i64)]
    pub target_node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Edge {
    pub fn new(id: EdgeId, prize_id: PrizeId, source: NodeId, target: NodeId) -> Self {
        Self {
            id,
            template_id: None,
            prize_id,
            source_node_id: source,
            target_node_id: target,
            condition: None,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source_node_id == self.target_node_id
    }
}

/// Campaign template grouping a set of prizes and their flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A chat conversation between an end-user and a template's flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: String,
    pub template_id: TemplateId,
    pub started_at: DateTime<Utc>,
}

/// A prize that can be won through a template's lottery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prize {
    pub id: PrizeId,
    pub template_id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub base_win_probability: f64,
    /// Monetary value; higher values dampen the win probability.
    #[serde(default)]
    pub value: Option<f64>,
    /// Remaining inventory. `None` means inventory is not tracked.
    #[serde(default)]
    pub stock_quantity: Option<i64>,
    /// Wins allowed per user per day for this template. Defaults to 1.
    #[serde(default)]
    pub daily_limit: Option<u32>,
    #[serde(default)]
    pub custom_weight: Option<f64>,
    /// Cap on total winners ever.
    pub winner_count: u32,
    /// Winners already awarded.
    #[serde(default)]
    pub send_winner_count: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Prize {
    pub fn is_exhausted(&self) -> bool {
        self.send_winner_count >= self.winner_count
    }
}

/// Immutable record of one lottery draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryAttempt {
    pub id: Uuid,
    pub user_id: String,
    pub conversation_id: ConversationId,
    pub template_id: TemplateId,
    pub prize_id: Option<PrizeId>,
    pub is_winner: bool,
    pub probability_used: f64,
    pub random_value: f64,
    pub executed_at: DateTime<Utc>,
    /// Set when the draw failed and was recorded as a loss.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Domain event emitted by the core components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub user_id: Option<String>,
    pub template_id: Option<TemplateId>,
    pub prize_id: Option<PrizeId>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    FlowValidated,
    LotteryDrawn,
    LotteryWon,
    LotteryFailed,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_wire_format() {
        let json = serde_json::to_string(&NodeType::LotteryGroup).unwrap();
        assert_eq!(json, "\"LOTTERY_GROUP\"");
        let parsed: NodeType = serde_json::from_str("\"START\"").unwrap();
        assert_eq!(parsed, NodeType::Start);
    }

    #[test]
    fn test_node_deserializes_type_field() {
        let node: Node = serde_json::from_str(
            r#"{"id": 7, "template_id": 1, "prize_id": 2, "type": "END"}"#,
        )
        .unwrap();
        assert_eq!(node.node_type, NodeType::End);
        assert!(node.label.is_none());
    }

    #[test]
    fn test_prize_exhaustion() {
        let mut prize: Prize = serde_json::from_str(
            r#"{"id": 1, "template_id": 1, "name": "Mug", "base_win_probability": 0.2, "winner_count": 2}"#,
        )
        .unwrap();
        assert!(prize.is_active);
        assert!(!prize.is_exhausted());
        prize.send_winner_count = 2;
        assert!(prize.is_exhausted());
    }
}
