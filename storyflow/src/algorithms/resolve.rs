//! Read-only queries over a graph: ownership, neighbours, orphans and where
//! new content lands in the tree. Nothing here looks at the tree itself.

use crate::graph::{EdgeKind, Graph, GraphEdge, GraphNode};
use crate::model::{GraphNodeId, NodeId};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

/// Where a node connected behind some source belongs in the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InsertPosition {
    pub label_name: String,
    /// Insert right after this statement; `None` means the start of the body.
    pub after_node_id: Option<NodeId>,
    /// The source's current successor. The new statement must end up before it.
    pub before_node_id: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub struct Successor<'a> {
    pub port: Option<&'a str>,
    pub kind: EdgeKind,
    pub node: &'a GraphNode,
}

pub struct Resolver<'a> {
    graph: &'a Graph,
    incoming: HashMap<&'a GraphNodeId, Vec<&'a GraphEdge>>,
    outgoing: HashMap<&'a GraphNodeId, Vec<&'a GraphEdge>>,
}

impl<'a> Resolver<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        let mut incoming: HashMap<&GraphNodeId, Vec<&GraphEdge>> = HashMap::new();
        let mut outgoing: HashMap<&GraphNodeId, Vec<&GraphEdge>> = HashMap::new();
        for e in &graph.edges {
            outgoing.entry(&e.source).or_default().push(e);
            if let Some(t) = e.target.node() {
                incoming.entry(t).or_default().push(e);
            }
        }
        Resolver { graph, incoming, outgoing }
    }

    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    fn incoming_sequential(&self, id: &GraphNodeId) -> impl Iterator<Item = &'a GraphEdge> + '_ {
        self.incoming
            .get(id)
            .into_iter()
            .flatten()
            .copied()
            .filter(|e| e.kind == EdgeKind::Sequential)
    }

    fn outgoing_edges(&self, id: &GraphNodeId) -> impl Iterator<Item = &'a GraphEdge> + '_ {
        self.outgoing.get(id).into_iter().flatten().copied()
    }

    /// Name of the entry point owning `id`, found by walking sequential flow
    /// backwards. `None` for orphans and unknown ids.
    pub fn resolve_node_label(&self, id: &GraphNodeId) -> Option<String> {
        let mut seen: HashSet<&GraphNodeId> = HashSet::new();
        let mut queue: VecDeque<&GraphNodeId> = VecDeque::new();
        let start = self.graph.node(id)?;
        queue.push_back(&start.id);
        while let Some(cur) = queue.pop_front() {
            if !seen.insert(cur) {
                continue;
            }
            if let Some(name) = self.graph.node(cur).and_then(|n| n.entry_name()) {
                return Some(name.to_string());
            }
            for e in self.incoming_sequential(cur) {
                queue.push_back(&e.source);
            }
        }
        None
    }

    pub fn predecessor(&self, id: &GraphNodeId) -> Option<&'a GraphNode> {
        self.incoming_sequential(id).find_map(|e| self.graph.node(&e.source))
    }

    /// The unported sequential successor. For branching nodes this is the
    /// continuation after the menu/conditional; per-port successors come
    /// from [`Resolver::all_successors`].
    pub fn successor(&self, id: &GraphNodeId) -> Option<&'a GraphNode> {
        self.outgoing_edges(id)
            .filter(|e| e.kind == EdgeKind::Sequential && e.source_port.is_none())
            .find_map(|e| e.target.node().and_then(|t| self.graph.node(t)))
    }

    pub fn all_successors(&self, id: &GraphNodeId) -> Vec<Successor<'a>> {
        self.outgoing_edges(id)
            .filter_map(|e| {
                let node = e.target.node().and_then(|t| self.graph.node(t))?;
                Some(Successor { port: e.source_port.as_deref(), kind: e.kind, node })
            })
            .collect()
    }

    pub fn is_connected_to_scene(&self, id: &GraphNodeId) -> bool {
        self.resolve_node_label(id).is_some()
    }

    pub fn orphan_nodes(&self) -> Vec<&'a GraphNode> {
        self.graph
            .nodes
            .iter()
            .filter(|n| !n.is_entry_point() && self.resolve_node_label(&n.id).is_none())
            .collect()
    }

    /// Tree position for `new_node` connected behind `source`. `None` when
    /// the source has no owning entry point or no statement to anchor on.
    pub fn determine_insert_position(
        &self,
        source: &GraphNodeId,
        new_node: &GraphNodeId,
    ) -> Option<InsertPosition> {
        let src = self.graph.node(source)?;
        let label_name = self.resolve_node_label(source)?;
        let after_node_id = if src.is_entry_point() {
            None
        } else {
            Some(src.anchor()?.clone())
        };
        let before_node_id = self
            .outgoing_edges(source)
            .filter(|e| e.kind == EdgeKind::Sequential && e.source_port.is_none())
            .filter_map(|e| e.target.node())
            .filter(|t| *t != new_node)
            .filter_map(|t| self.graph.node(t))
            .find_map(|n| n.statements.first().cloned());
        Some(InsertPosition { label_name, after_node_id, before_node_id })
    }

    /// Reachability over every resolved edge. `a == b` is trivially true.
    pub fn has_path(&self, a: &GraphNodeId, b: &GraphNodeId) -> bool {
        if a == b {
            return true;
        }
        let mut seen: HashSet<&GraphNodeId> = HashSet::new();
        let mut stack: Vec<&GraphNodeId> = vec![a];
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            for e in self.outgoing_edges(cur) {
                if let Some(t) = e.target.node() {
                    if t == b {
                        return true;
                    }
                    stack.push(t);
                }
            }
        }
        false
    }
}
