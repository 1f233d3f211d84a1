use instantwin_core::types::{Edge, EdgeId, Node, NodeId, TemplateId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The full node/edge collections of one template, loaded fresh for each
/// validation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FlowSnapshot {
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub template_id: Option<TemplateId>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Kind of structural problem found in a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    // Errors
    MissingStartNode,
    MissingEndNode,
    OrphanedNode,
    UnreachableNode,
    CircularReference,
    // Warnings
    MultipleStartNodes,
    MultipleEndNodes,
    ComplexPath,
    UnusedNode,
    DanglingEdge,
}

impl IssueKind {
    /// Whether this kind invalidates the flow.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::MissingStartNode
                | Self::MissingEndNode
                | Self::OrphanedNode
                | Self::UnreachableNode
                | Self::CircularReference
        )
    }
}

/// A single error or warning, rendered to the flow designer as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<i64>)]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<i64>)]
    pub edge_id: Option<EdgeId>,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            node_id: None,
            edge_id: None,
        }
    }

    pub fn for_node(kind: IssueKind, node_id: NodeId, message: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id),
            ..Self::new(kind, message)
        }
    }

    pub fn for_edge(kind: IssueKind, edge_id: EdgeId, message: impl Into<String>) -> Self {
        Self {
            edge_id: Some(edge_id),
            ..Self::new(kind, message)
        }
    }
}

/// Node counts and path metrics. Path metrics are bounded approximations
/// on cyclic or very large graphs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FlowStatistics {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub start_nodes: usize,
    pub end_nodes: usize,
    pub message_nodes: usize,
    pub tree_nodes: usize,
    pub lottery_group_nodes: usize,
    pub max_path_depth: usize,
    pub total_paths: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub statistics: FlowStatistics,
}

impl ValidationResult {
    pub fn has_error(&self, kind: IssueKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn has_warning(&self, kind: IssueKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }

    /// Errors of the given kind, in the order they were found.
    pub fn errors_of(&self, kind: IssueKind) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }
}
