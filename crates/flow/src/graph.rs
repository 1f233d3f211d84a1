//! Index-based adjacency over a flow's nodes and edges.
//!
//! Nodes are addressed by their position in the input slice; edges are
//! resolved to index pairs once at construction. Nothing here is cached
//! across calls since flows are edited between validations.

use std::collections::{HashMap, HashSet, VecDeque};

use instantwin_core::types::{Edge, Node, NodeId, NodeType};

#[derive(Debug)]
pub struct FlowGraph<'a> {
    nodes: &'a [Node],
    index: HashMap<NodeId, usize>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    dangling: Vec<&'a Edge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

impl<'a> FlowGraph<'a> {
    /// Builds adjacency in O(N + E). Edges pointing at unknown node ids are
    /// kept aside as dangling and take no part in traversal.
    pub fn build(nodes: &'a [Node], edges: &'a [Edge]) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            index.entry(node.id).or_insert(i);
        }

        let mut outgoing = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];
        let mut dangling = Vec::new();

        for edge in edges {
            match (
                index.get(&edge.source_node_id),
                index.get(&edge.target_node_id),
            ) {
                (Some(&src), Some(&dst)) => {
                    outgoing[src].push(dst);
                    incoming[dst].push(src);
                }
                _ => dangling.push(edge),
            }
        }

        Self {
            nodes,
            index,
            outgoing,
            incoming,
            dangling,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &'a Node {
        &self.nodes[idx]
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn outgoing(&self, idx: usize) -> &[usize] {
        &self.outgoing[idx]
    }

    pub fn incoming(&self, idx: usize) -> &[usize] {
        &self.incoming[idx]
    }

    pub fn dangling_edges(&self) -> &[&'a Edge] {
        &self.dangling
    }

    /// Indices of all nodes of the given type, in input order.
    pub fn nodes_of_type(&self, node_type: NodeType) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].node_type == node_type)
            .collect()
    }

    /// Multi-source BFS over outgoing edges. Sources are marked visited.
    pub fn reachable_from(&self, sources: &[usize]) -> HashSet<usize> {
        let mut visited: HashSet<usize> = sources.iter().copied().collect();
        let mut queue: VecDeque<usize> = sources.iter().copied().collect();

        while let Some(current) = queue.pop_front() {
            for &next in &self.outgoing[current] {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        visited
    }

    /// Returns the node closing the first directed cycle found, or `None` for
    /// an acyclic graph. Iterative DFS with white/gray/black colouring; stops
    /// at the first back-edge.
    pub fn find_cycle(&self) -> Option<usize> {
        let mut color = vec![Color::White; self.nodes.len()];

        for root in 0..self.nodes.len() {
            if color[root] != Color::White {
                continue;
            }
            color[root] = Color::Gray;
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

            while let Some(frame) = stack.last_mut() {
                let (current, cursor) = *frame;
                match self.outgoing[current].get(cursor) {
                    Some(&child) => {
                        frame.1 += 1;
                        match color[child] {
                            Color::Gray => return Some(child),
                            Color::White => {
                                color[child] = Color::Gray;
                                stack.push((child, 0));
                            }
                            Color::Black => {}
                        }
                    }
                    None => {
                        color[current] = Color::Black;
                        stack.pop();
                    }
                }
            }
        }
        None
    }
}
