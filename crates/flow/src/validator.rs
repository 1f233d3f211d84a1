use std::collections::HashSet;
use std::sync::Arc;

use instantwin_core::config::FlowConfig;
use instantwin_core::event_bus::{make_event, EventSink};
use instantwin_core::types::{Edge, EventType, Node, NodeType};
use tracing::{debug, info};

use crate::graph::FlowGraph;
use crate::types::{FlowSnapshot, FlowStatistics, IssueKind, ValidationIssue, ValidationResult};

/// Static analyzer for flow graphs. Stateless across calls; every call builds
/// its own adjacency from the supplied snapshot.
#[derive(Clone)]
pub struct FlowValidator {
    config: FlowConfig,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for FlowValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowValidator")
            .field("config", &self.config)
            .finish()
    }
}

impl FlowValidator {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            config: config.clone(),
            event_sink: instantwin_core::event_bus::noop_sink(),
        }
    }

    /// Attach an event sink for emitting validation events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn validate_snapshot(&self, snapshot: &FlowSnapshot) -> ValidationResult {
        let result = self.validate(&snapshot.nodes, &snapshot.edges);
        self.event_sink.emit(make_event(
            EventType::FlowValidated,
            None,
            snapshot.template_id,
            None,
        ));
        result
    }

    /// Validates a flow. Errors and warnings are collected exhaustively,
    /// except cycle detection which reports only the first cycle found.
    pub fn validate(&self, nodes: &[Node], edges: &[Edge]) -> ValidationResult {
        let graph = FlowGraph::build(nodes, edges);
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let starts = graph.nodes_of_type(NodeType::Start);
        let ends = graph.nodes_of_type(NodeType::End);

        self.check_terminals(&starts, &ends, &mut errors, &mut warnings);

        for edge in graph.dangling_edges() {
            warnings.push(ValidationIssue::for_edge(
                IssueKind::DanglingEdge,
                edge.id,
                format!(
                    "Edge {} connects {} -> {}, which is not a node of this flow",
                    edge.id, edge.source_node_id, edge.target_node_id
                ),
            ));
        }

        self.check_connectivity(&graph, &mut errors, &mut warnings);
        self.check_reachability(&graph, &starts, &mut errors);

        if let Some(idx) = graph.find_cycle() {
            let node = graph.node(idx);
            errors.push(ValidationIssue::for_node(
                IssueKind::CircularReference,
                node.id,
                format!("Circular reference detected at node {}", node.id),
            ));
        }

        let statistics = self.compute_statistics(&graph, edges.len(), &starts);
        let is_valid = errors.is_empty();

        metrics::counter!("flow.validations").increment(1);
        if !is_valid {
            metrics::counter!("flow.invalid").increment(1);
        }

        debug!(
            nodes = statistics.total_nodes,
            edges = statistics.total_edges,
            errors = errors.len(),
            warnings = warnings.len(),
            max_path_depth = statistics.max_path_depth,
            total_paths = statistics.total_paths,
            "Flow validated"
        );

        ValidationResult {
            is_valid,
            errors,
            warnings,
            statistics,
        }
    }

    fn check_terminals(
        &self,
        starts: &[usize],
        ends: &[usize],
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) {
        match starts.len() {
            0 => errors.push(ValidationIssue::new(
                IssueKind::MissingStartNode,
                "Flow has no START node",
            )),
            1 => {}
            n => warnings.push(ValidationIssue::new(
                IssueKind::MultipleStartNodes,
                format!("Flow has {} START nodes", n),
            )),
        }

        match ends.len() {
            0 => errors.push(ValidationIssue::new(
                IssueKind::MissingEndNode,
                "Flow has no END node",
            )),
            1 => {}
            n => warnings.push(ValidationIssue::new(
                IssueKind::MultipleEndNodes,
                format!("Flow has {} END nodes", n),
            )),
        }
    }

    /// Classifies every node by whether it has incoming and outgoing edges.
    /// START and END nodes are exempt from needing both.
    fn check_connectivity(
        &self,
        graph: &FlowGraph<'_>,
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) {
        for idx in 0..graph.len() {
            let node = graph.node(idx);
            let has_in = !graph.incoming(idx).is_empty();
            let has_out = !graph.outgoing(idx).is_empty();
            let is_start = node.node_type == NodeType::Start;
            let is_end = node.node_type == NodeType::End;

            match (has_in, has_out) {
                (false, false) if !is_start && !is_end => {
                    errors.push(ValidationIssue::for_node(
                        IssueKind::OrphanedNode,
                        node.id,
                        format!(
                            "{} node {} has no incoming or outgoing edges",
                            node.node_type.as_str(),
                            node.id
                        ),
                    ));
                }
                (true, false) if !is_end => {
                    warnings.push(ValidationIssue::for_node(
                        IssueKind::UnusedNode,
                        node.id,
                        format!(
                            "{} node {} has incoming edges but leads nowhere",
                            node.node_type.as_str(),
                            node.id
                        ),
                    ));
                }
                _ => {}
            }

            if is_start && has_in {
                warnings.push(ValidationIssue::for_node(
                    IssueKind::ComplexPath,
                    node.id,
                    format!("START node {} has incoming edges", node.id),
                ));
            }
            if is_end && has_out {
                warnings.push(ValidationIssue::for_node(
                    IssueKind::ComplexPath,
                    node.id,
                    format!("END node {} has outgoing edges", node.id),
                ));
            }
        }
    }

    fn check_reachability(
        &self,
        graph: &FlowGraph<'_>,
        starts: &[usize],
        errors: &mut Vec<ValidationIssue>,
    ) {
        let visited = graph.reachable_from(starts);
        for idx in 0..graph.len() {
            let node = graph.node(idx);
            if node.node_type == NodeType::Start || visited.contains(&idx) {
                continue;
            }
            errors.push(ValidationIssue::for_node(
                IssueKind::UnreachableNode,
                node.id,
                format!(
                    "{} node {} cannot be reached from any START node",
                    node.node_type.as_str(),
                    node.id
                ),
            ));
        }
    }

    fn compute_statistics(
        &self,
        graph: &FlowGraph<'_>,
        total_edges: usize,
        starts: &[usize],
    ) -> FlowStatistics {
        let mut stats = FlowStatistics {
            total_nodes: graph.len(),
            total_edges,
            ..FlowStatistics::default()
        };
        for idx in 0..graph.len() {
            match graph.node(idx).node_type {
                NodeType::Start => stats.start_nodes += 1,
                NodeType::End => stats.end_nodes += 1,
                NodeType::Message => stats.message_nodes += 1,
                NodeType::Tree => stats.tree_nodes += 1,
                NodeType::LotteryGroup => stats.lottery_group_nodes += 1,
            }
        }

        let mut walker = PathWalker::new(graph, &self.config);
        for &start in starts {
            walker.walk(start, 0, &HashSet::new());
        }
        if walker.truncated {
            info!(
                max_path_depth = walker.max_depth,
                total_paths = walker.total_paths,
                steps = walker.steps,
                "Path statistics truncated at traversal bounds"
            );
        }
        stats.max_path_depth = walker.max_depth;
        stats.total_paths = walker.total_paths;
        stats
    }
}

/// Bounded DFS counting terminated paths and the deepest depth seen.
///
/// A path ends at an END node or at a node with no outgoing edges. Revisiting
/// a node already on the current path abandons that branch without counting
/// it. Each branch gets its own copy of the visited set.
struct PathWalker<'g, 'a> {
    graph: &'g FlowGraph<'a>,
    max_path_depth: usize,
    max_total_paths: usize,
    max_steps: usize,
    max_depth: usize,
    total_paths: usize,
    steps: usize,
    truncated: bool,
}

impl<'g, 'a> PathWalker<'g, 'a> {
    fn new(graph: &'g FlowGraph<'a>, config: &FlowConfig) -> Self {
        Self {
            graph,
            max_path_depth: config.max_path_depth,
            max_total_paths: config.max_total_paths,
            max_steps: config.max_traversal_steps,
            max_depth: 0,
            total_paths: 0,
            steps: 0,
            truncated: false,
        }
    }

    fn walk(&mut self, idx: usize, depth: usize, visited: &HashSet<usize>) {
        if self.total_paths >= self.max_total_paths
            || depth > self.max_path_depth
            || self.steps >= self.max_steps
        {
            self.truncated = true;
            return;
        }
        if visited.contains(&idx) {
            return;
        }
        self.steps += 1;

        let mut path = visited.clone();
        path.insert(idx);
        self.max_depth = self.max_depth.max(depth);

        let outgoing = self.graph.outgoing(idx);
        if self.graph.node(idx).node_type == NodeType::End || outgoing.is_empty() {
            self.total_paths += 1;
            return;
        }
        for &next in outgoing {
            self.walk(next, depth + 1, &path);
        }
    }
}
