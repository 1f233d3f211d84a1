//! Graph model loading: resolves a template id to its node and edge rows.
//!
//! Production: back `FlowSource` with the relational store holding the
//! template/node/edge tables. The in-memory store provides the same contract
//! for development and testing.

use dashmap::DashMap;
use instantwin_core::error::{InstantWinError, InstantWinResult};
use instantwin_core::types::{Edge, Node, NodeId, NodeType, PrizeId, Template, TemplateId};
use tracing::info;

use crate::types::FlowSnapshot;

pub trait FlowSource: Send + Sync {
    /// Loads every node and edge of a template. Fails with `TemplateNotFound`
    /// for an unknown template and `EmptyTemplate` when it has no nodes.
    fn load_flow(&self, template_id: TemplateId) -> InstantWinResult<FlowSnapshot>;

    /// Loads only the nodes and edges belonging to one prize's flow.
    fn load_prize_flow(
        &self,
        template_id: TemplateId,
        prize_id: PrizeId,
    ) -> InstantWinResult<FlowSnapshot> {
        let mut snapshot = self.load_flow(template_id)?;
        snapshot.nodes.retain(|n| n.prize_id == prize_id);
        snapshot.edges.retain(|e| e.prize_id == prize_id);
        if snapshot.nodes.is_empty() {
            return Err(InstantWinError::EmptyTemplate(template_id));
        }
        Ok(snapshot)
    }
}

/// Thread-safe in-memory store of templates and their flow rows.
#[derive(Default)]
pub struct InMemoryFlowStore {
    templates: DashMap<TemplateId, Template>,
    nodes: DashMap<TemplateId, Vec<Node>>,
    edges: DashMap<TemplateId, Vec<Edge>>,
}

impl InMemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_template(&self, template: Template) {
        self.templates.insert(template.id, template);
    }

    pub fn get_template(&self, id: TemplateId) -> Option<Template> {
        self.templates.get(&id).map(|r| r.value().clone())
    }

    /// Adds a node. Node ids are unique per template and a node's type can
    /// only be set here.
    pub fn add_node(&self, node: Node) -> InstantWinResult<()> {
        if !self.templates.contains_key(&node.template_id) {
            return Err(InstantWinError::TemplateNotFound(node.template_id));
        }
        let mut nodes = self.nodes.entry(node.template_id).or_default();
        if nodes.iter().any(|n| n.id == node.id) {
            return Err(InstantWinError::Validation(format!(
                "node {} already exists in template {}",
                node.id, node.template_id
            )));
        }
        nodes.push(node);
        Ok(())
    }

    /// Adds an edge between two existing nodes of the template. Self-loops are
    /// rejected.
    pub fn add_edge(&self, template_id: TemplateId, mut edge: Edge) -> InstantWinResult<()> {
        if edge.is_self_loop() {
            return Err(InstantWinError::Validation(format!(
                "edge {} connects node {} to itself",
                edge.id, edge.source_node_id
            )));
        }
        {
            let nodes = self
                .nodes
                .get(&template_id)
                .ok_or(InstantWinError::TemplateNotFound(template_id))?;
            for endpoint in [edge.source_node_id, edge.target_node_id] {
                if !nodes.iter().any(|n| n.id == endpoint) {
                    return Err(InstantWinError::Validation(format!(
                        "node {} is not part of template {}",
                        endpoint, template_id
                    )));
                }
            }
        }
        edge.template_id = Some(template_id);
        self.edges.entry(template_id).or_default().push(edge);
        Ok(())
    }

    /// Removes a node together with every edge touching it.
    pub fn remove_node(&self, template_id: TemplateId, node_id: NodeId) -> InstantWinResult<()> {
        let mut nodes = self
            .nodes
            .get_mut(&template_id)
            .ok_or(InstantWinError::TemplateNotFound(template_id))?;
        let before = nodes.len();
        nodes.retain(|n| n.id != node_id);
        if nodes.len() == before {
            return Err(InstantWinError::Validation(format!(
                "node {} is not part of template {}",
                node_id, template_id
            )));
        }
        drop(nodes);
        if let Some(mut edges) = self.edges.get_mut(&template_id) {
            edges.retain(|e| e.source_node_id != node_id && e.target_node_id != node_id);
        }
        Ok(())
    }

    /// Seeds two demo flows: a valid welcome flow and a broken draft.
    pub fn seed_demo_flows(&self) -> InstantWinResult<()> {
        info!("Seeding demo flows");

        self.upsert_template(Template {
            id: 1,
            name: "Summer Instant Win".to_string(),
            is_active: true,
        });
        let welcome = [
            (1, NodeType::Start),
            (2, NodeType::Message),
            (3, NodeType::Tree),
            (4, NodeType::LotteryGroup),
            (5, NodeType::Message),
            (6, NodeType::End),
        ];
        for (id, node_type) in welcome {
            self.add_node(Node::new(id, 1, 1, node_type))?;
        }
        for (id, source, target, condition) in [
            (1, 1, 2, None),
            (2, 2, 3, None),
            (3, 3, 4, Some("answer == 'yes'")),
            (4, 3, 5, Some("answer == 'no'")),
            (5, 4, 6, None),
            (6, 5, 6, None),
        ] {
            let mut edge = Edge::new(id, 1, source, target);
            edge.condition = condition.map(str::to_string);
            self.add_edge(1, edge)?;
        }

        self.upsert_template(Template {
            id: 2,
            name: "Draft Quiz".to_string(),
            is_active: false,
        });
        for (id, node_type) in [
            (11, NodeType::Start),
            (12, NodeType::Message),
            (13, NodeType::Tree),
            (14, NodeType::Message),
        ] {
            self.add_node(Node::new(id, 2, 2, node_type))?;
        }
        for (id, source, target) in [(11, 11, 12), (12, 12, 13), (13, 13, 12)] {
            self.add_edge(2, Edge::new(id, 2, source, target))?;
        }

        info!("Seeded 2 demo flows");
        Ok(())
    }
}

impl FlowSource for InMemoryFlowStore {
    fn load_flow(&self, template_id: TemplateId) -> InstantWinResult<FlowSnapshot> {
        if !self.templates.contains_key(&template_id) {
            return Err(InstantWinError::TemplateNotFound(template_id));
        }
        let nodes = self
            .nodes
            .get(&template_id)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        if nodes.is_empty() {
            return Err(InstantWinError::EmptyTemplate(template_id));
        }
        let edges = self
            .edges
            .get(&template_id)
            .map(|r| r.value().clone())
            .unwrap_or_default();

        Ok(FlowSnapshot {
            template_id: Some(template_id),
            nodes,
            edges,
        })
    }
}
