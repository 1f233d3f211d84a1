//! Flow graph analysis for instant-win conversation flows: adjacency
//! snapshots, structural validation, and path statistics.

pub mod graph;
pub mod loader;
pub mod types;
pub mod validator;

pub use graph::FlowGraph;
pub use loader::{FlowSource, InMemoryFlowStore};
pub use types::{FlowSnapshot, FlowStatistics, IssueKind, ValidationIssue, ValidationResult};
pub use validator::FlowValidator;
