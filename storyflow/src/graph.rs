use crate::error::SyncError;
use crate::model::{EdgeId, GraphNodeId, NodeId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Position { x, y }
    }
}

/// How control leaves an entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitType {
    Return,
    Jump,
    Menu,
    FallThrough,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineContent {
    Dialogue {
        speaker: Option<String>,
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attributes: Vec<String>,
    },
    Scene {
        image: Option<String>,
    },
    Show {
        image: String,
    },
    Hide {
        image: String,
    },
    With {
        transition: String,
    },
}

/// One statement inside a merged block. `statement` is unset on lines of a
/// pending block that has not reached the tree yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockLine {
    pub statement: Option<NodeId>,
    #[serde(flatten)]
    pub content: LineContent,
}

impl BlockLine {
    pub fn dialogue(speaker: Option<&str>, text: &str) -> Self {
        BlockLine {
            statement: None,
            content: LineContent::Dialogue {
                speaker: speaker.map(str::to_string),
                text: text.to_string(),
                attributes: Vec::new(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub label: String,
}

impl Port {
    pub fn choice(index: usize, label: &str) -> Self {
        Port { id: format!("choice-{}", index), label: label.to_string() }
    }

    pub fn branch(index: usize, condition: Option<&str>) -> Self {
        Port {
            id: format!("branch-{}", index),
            label: condition.unwrap_or("else").to_string(),
        }
    }
}

/// Type-specific payload of a graph node. The variant is the node type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeData {
    EntryPoint {
        name: String,
        #[serde(default)]
        preview: String,
        #[serde(default = "fall_through")]
        exit: ExitType,
    },
    Block {
        lines: Vec<BlockLine>,
    },
    Menu {
        #[serde(default)]
        prompt: Option<String>,
        ports: Vec<Port>,
    },
    Conditional {
        ports: Vec<Port>,
    },
    Jump {
        target: String,
    },
    Call {
        target: String,
    },
    Return,
}

fn fall_through() -> ExitType {
    ExitType::FallThrough
}

/// Node type tag, for dispatch tables that do not need the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    EntryPoint,
    Block,
    Menu,
    Conditional,
    Jump,
    Call,
    Return,
}

impl NodeData {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeData::EntryPoint { .. } => NodeType::EntryPoint,
            NodeData::Block { .. } => NodeType::Block,
            NodeData::Menu { .. } => NodeType::Menu,
            NodeData::Conditional { .. } => NodeType::Conditional,
            NodeData::Jump { .. } => NodeType::Jump,
            NodeData::Call { .. } => NodeType::Call,
            NodeData::Return => NodeType::Return,
        }
    }

    pub fn ports(&self) -> &[Port] {
        match self {
            NodeData::Menu { ports, .. } | NodeData::Conditional { ports } => ports,
            _ => &[],
        }
    }

    pub fn port_index(&self, port_id: &str) -> Option<usize> {
        self.ports().iter().position(|p| p.id == port_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: GraphNodeId,
    pub position: Position,
    /// Constituent statements, in document order.
    #[serde(default)]
    pub statements: Vec<NodeId>,
    pub data: NodeData,
}

impl GraphNode {
    pub fn new(id: GraphNodeId, data: NodeData, position: Position) -> Self {
        GraphNode { id, position, statements: Vec::new(), data }
    }

    pub fn node_type(&self) -> NodeType {
        self.data.node_type()
    }

    pub fn is_entry_point(&self) -> bool {
        matches!(self.data, NodeData::EntryPoint { .. })
    }

    pub fn entry_name(&self) -> Option<&str> {
        match &self.data {
            NodeData::EntryPoint { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Statement new content is placed after when inserted behind this node.
    /// Entry points have none: their successors go to the start of the body.
    pub fn anchor(&self) -> Option<&NodeId> {
        match self.data {
            NodeData::EntryPoint { .. } => None,
            NodeData::Block { .. } => self.statements.last(),
            _ => self.statements.first(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Sequential,
    Jump,
    Call,
    ReturnFlow,
}

/// Where an edge points. Unknown and missing jump targets are explicit
/// states rather than sentinel node ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum EdgeTarget {
    Resolved(GraphNodeId),
    /// Names an entry point that does not exist (yet).
    Unresolved(String),
    Absent,
}

impl EdgeTarget {
    pub fn node(&self) -> Option<&GraphNodeId> {
        match self {
            EdgeTarget::Resolved(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: GraphNodeId,
    pub target: EdgeTarget,
    #[serde(default)]
    pub source_port: Option<String>,
    pub kind: EdgeKind,
    pub valid: bool,
}

impl GraphEdge {
    pub fn new(
        source: &GraphNodeId,
        port: Option<&str>,
        target: EdgeTarget,
        kind: EdgeKind,
    ) -> Self {
        let to = match &target {
            EdgeTarget::Resolved(id) => id.to_string(),
            EdgeTarget::Unresolved(name) => format!("?{}", name),
            EdgeTarget::Absent => "_".to_string(),
        };
        let from = match port {
            Some(p) => format!("{}[{}]", source, p),
            None => source.to_string(),
        };
        let kind_tag = match kind {
            EdgeKind::Sequential => "seq",
            EdgeKind::Jump => "jump",
            EdgeKind::Call => "call",
            EdgeKind::ReturnFlow => "ret",
        };
        GraphEdge {
            id: EdgeId(format!("{}->{}#{}", from, to, kind_tag)),
            source: source.clone(),
            valid: matches!(target, EdgeTarget::Resolved(_)),
            target,
            source_port: port.map(str::to_string),
            kind,
        }
    }

    pub fn touches(&self, node: &GraphNodeId) -> bool {
        &self.source == node || self.target.node() == Some(node)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &GraphNodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn node_mut(&mut self, id: &GraphNodeId) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| &n.id == id)
    }

    pub fn contains(&self, id: &GraphNodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| &e.id == id)
    }

    pub fn entry_point(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.entry_name() == Some(name))
    }

    pub fn edges_from<'a>(&'a self, id: &'a GraphNodeId) -> impl Iterator<Item = &'a GraphEdge> {
        self.edges.iter().filter(move |e| &e.source == id)
    }

    pub fn edges_to<'a>(&'a self, id: &'a GraphNodeId) -> impl Iterator<Item = &'a GraphEdge> {
        self.edges.iter().filter(move |e| e.target.node() == Some(id))
    }

    /// Graph node claiming the statement.
    pub fn owner_of(&self, statement: &NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.statements.contains(statement))
    }

    pub fn add_node(&mut self, node: GraphNode) {
        self.nodes.push(node);
    }

    /// Adds the edge unless one with the same id is already present.
    pub fn add_edge(&mut self, edge: GraphEdge) -> bool {
        if self.edge(&edge.id).is_some() {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Removes the node and every edge touching it.
    pub fn remove_node(&mut self, id: &GraphNodeId) -> Option<(GraphNode, Vec<EdgeId>)> {
        let idx = self.nodes.iter().position(|n| &n.id == id)?;
        let node = self.nodes.remove(idx);
        let mut removed = Vec::new();
        self.edges.retain(|e| {
            if e.touches(id) {
                removed.push(e.id.clone());
                false
            } else {
                true
            }
        });
        Some((node, removed))
    }

    pub fn remove_edge(&mut self, id: &EdgeId) -> Option<GraphEdge> {
        let idx = self.edges.iter().position(|e| &e.id == id)?;
        Some(self.edges.remove(idx))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// One `invalid_target` per jump/call edge whose target entry point is
    /// missing. Reported, never enforced.
    pub fn diagnostics(&self) -> Vec<SyncError> {
        self.edges
            .iter()
            .filter(|e| !e.valid && matches!(e.kind, EdgeKind::Jump | EdgeKind::Call))
            .map(|e| SyncError::InvalidTarget {
                edge: e.id.clone(),
                target: match &e.target {
                    EdgeTarget::Unresolved(name) => name.clone(),
                    _ => String::new(),
                },
            })
            .collect()
    }
}
