//! Tree → Graph projection.
//!
//! Runs of dialogue and visual statements collapse into one block node;
//! branching and flow statements get nodes of their own. Node and edge ids
//! are derived from statement ids, so rebuilding an unchanged region of the
//! tree yields the same ids.

use crate::graph::{
    BlockLine, EdgeKind, EdgeTarget, ExitType, Graph, GraphEdge, GraphNode, LineContent,
    NodeData, Port, Position,
};
use crate::model::{FlowKind, GraphNodeId, Statement, StatementKind, Tree};
use crate::walk;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug)]
pub struct BuildOptions {
    /// Body statements summarized in an entry point's preview.
    pub preview_lines: usize,
    /// Characters per preview line before truncation.
    pub preview_width: usize,
    pub column_width: f32,
    pub row_height: f32,
    pub port_offset: f32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            preview_lines: 3,
            preview_width: 40,
            column_width: 360.0,
            row_height: 140.0,
            port_offset: 240.0,
        }
    }
}

pub fn entry_point_id(name: &str) -> GraphNodeId {
    GraphNodeId(format!("label:{}", name))
}

pub fn build_graph(tree: &Tree) -> Graph {
    build_graph_with(tree, &BuildOptions::default())
}

pub fn build_graph_with(tree: &Tree, opts: &BuildOptions) -> Graph {
    let labels: HashSet<&str> = tree.label_names().into_iter().collect();
    let mut b = Builder {
        opts,
        labels,
        graph: Graph::new(),
        current: String::new(),
        returns: HashMap::new(),
        calls: Vec::new(),
    };

    for (col, stmt) in tree.labels().enumerate() {
        let StatementKind::Label { name, body, .. } = &stmt.kind else {
            continue;
        };
        let id = entry_point_id(name);
        let origin = Position::new(col as f32 * opts.column_width, 0.0);
        let mut node = GraphNode::new(
            id.clone(),
            NodeData::EntryPoint {
                name: name.clone(),
                preview: preview(body, opts),
                exit: exit_type(body),
            },
            origin,
        );
        node.statements.push(stmt.id.clone());
        b.graph.add_node(node);
        b.current = name.clone();
        b.chain(body, Some((id, None)), origin);
    }

    // Returns hand control back to every resolved call site of their entry point.
    let calls = std::mem::take(&mut b.calls);
    for (call_node, target) in calls {
        let Some(returns) = b.returns.get(&target) else {
            continue;
        };
        for ret in returns.clone() {
            b.graph.add_edge(GraphEdge::new(
                &ret,
                None,
                EdgeTarget::Resolved(call_node.clone()),
                EdgeKind::ReturnFlow,
            ));
        }
    }
    b.graph
}

enum Segment<'a> {
    Block(Vec<&'a Statement>),
    Single(&'a Statement),
}

/// Merge pass over one body list.
fn segment(body: &[Statement]) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut block: Vec<&Statement> = Vec::new();
    for s in body {
        match &s.kind {
            StatementKind::Scene { .. } => {
                if !block.is_empty() {
                    out.push(Segment::Block(std::mem::take(&mut block)));
                }
                block.push(s);
            }
            StatementKind::Dialogue { .. }
            | StatementKind::Show { .. }
            | StatementKind::Hide { .. }
            | StatementKind::With { .. } => block.push(s),
            StatementKind::Menu { .. }
            | StatementKind::Conditional { .. }
            | StatementKind::Jump { .. }
            | StatementKind::Call { .. }
            | StatementKind::Return { .. } => {
                if !block.is_empty() {
                    out.push(Segment::Block(std::mem::take(&mut block)));
                }
                out.push(Segment::Single(s));
            }
            // Not part of the visual flow; stays in the tree untouched.
            StatementKind::Pass | StatementKind::Other { .. } | StatementKind::Label { .. } => {}
        }
    }
    if !block.is_empty() {
        out.push(Segment::Block(block));
    }
    out
}

struct Builder<'a> {
    opts: &'a BuildOptions,
    labels: HashSet<&'a str>,
    graph: Graph,
    current: String,
    returns: HashMap<String, Vec<GraphNodeId>>,
    calls: Vec<(GraphNodeId, String)>,
}

impl Builder<'_> {
    /// Linearize `body` below `origin`, hanging the first node off `attach`.
    fn chain(
        &mut self,
        body: &[Statement],
        attach: Option<(GraphNodeId, Option<String>)>,
        origin: Position,
    ) {
        let mut prev = attach;
        let mut y = origin.y;
        for seg in segment(body) {
            y += self.opts.row_height;
            let pos = Position::new(origin.x, y);
            let id = match seg {
                Segment::Block(stmts) => self.block_node(&stmts, pos),
                Segment::Single(stmt) => self.single_node(stmt, pos),
            };
            if let Some((from, port)) = prev.take() {
                self.graph.add_edge(GraphEdge::new(
                    &from,
                    port.as_deref(),
                    EdgeTarget::Resolved(id.clone()),
                    EdgeKind::Sequential,
                ));
            }
            prev = Some((id, None));
        }
    }

    fn block_node(&mut self, stmts: &[&Statement], pos: Position) -> GraphNodeId {
        let id = GraphNodeId(format!("block:{}", stmts[0].id));
        let lines = stmts
            .iter()
            .filter_map(|s| {
                line_content(&s.kind)
                    .map(|content| BlockLine { statement: Some(s.id.clone()), content })
            })
            .collect();
        let mut node = GraphNode::new(id.clone(), NodeData::Block { lines }, pos);
        node.statements = stmts.iter().map(|s| s.id.clone()).collect();
        self.graph.add_node(node);
        id
    }

    fn single_node(&mut self, stmt: &Statement, pos: Position) -> GraphNodeId {
        match &stmt.kind {
            StatementKind::Jump { target } => {
                let id = GraphNodeId(format!("jump:{}", stmt.id));
                self.leaf(&id, stmt, NodeData::Jump { target: target.clone() }, pos);
                self.flow_edge(&id, None, FlowKind::Jump, target);
                id
            }
            StatementKind::Call { target } => {
                let id = GraphNodeId(format!("call:{}", stmt.id));
                self.leaf(&id, stmt, NodeData::Call { target: target.clone() }, pos);
                self.flow_edge(&id, None, FlowKind::Call, target);
                id
            }
            StatementKind::Return { .. } => {
                let id = GraphNodeId(format!("return:{}", stmt.id));
                self.leaf(&id, stmt, NodeData::Return, pos);
                self.returns.entry(self.current.clone()).or_default().push(id.clone());
                id
            }
            StatementKind::Menu { prompt, choices } => {
                let id = GraphNodeId(format!("menu:{}", stmt.id));
                let ports: Vec<Port> = choices
                    .iter()
                    .enumerate()
                    .map(|(i, c)| Port::choice(i, &c.text))
                    .collect();
                let data = NodeData::Menu { prompt: prompt.clone(), ports: ports.clone() };
                let bodies: Vec<&[Statement]> = choices.iter().map(|c| c.body.as_slice()).collect();
                self.branching(id, stmt, data, &ports, &bodies, pos)
            }
            StatementKind::Conditional { branches } => {
                let id = GraphNodeId(format!("if:{}", stmt.id));
                let ports: Vec<Port> = branches
                    .iter()
                    .enumerate()
                    .map(|(i, b)| Port::branch(i, b.condition.as_deref()))
                    .collect();
                let data = NodeData::Conditional { ports: ports.clone() };
                let bodies: Vec<&[Statement]> = branches.iter().map(|b| b.body.as_slice()).collect();
                self.branching(id, stmt, data, &ports, &bodies, pos)
            }
            // segment() never hands these out as singles
            StatementKind::Label { .. }
            | StatementKind::Dialogue { .. }
            | StatementKind::Scene { .. }
            | StatementKind::Show { .. }
            | StatementKind::Hide { .. }
            | StatementKind::With { .. }
            | StatementKind::Pass
            | StatementKind::Other { .. } => {
                let stmts = [stmt];
                self.block_node(&stmts, pos)
            }
        }
    }

    fn leaf(&mut self, id: &GraphNodeId, stmt: &Statement, data: NodeData, pos: Position) {
        let mut node = GraphNode::new(id.clone(), data, pos);
        node.statements.push(stmt.id.clone());
        self.graph.add_node(node);
    }

    /// Menu and conditional nodes: one port per choice/branch. A body that
    /// opens with a jump or call is drawn as a direct port edge; everything
    /// else becomes a nested chain under the port.
    fn branching(
        &mut self,
        id: GraphNodeId,
        stmt: &Statement,
        data: NodeData,
        ports: &[Port],
        bodies: &[&[Statement]],
        pos: Position,
    ) -> GraphNodeId {
        let mut node = GraphNode::new(id.clone(), data, pos);
        node.statements.push(stmt.id.clone());

        let mut direct: Vec<(usize, FlowKind, String)> = Vec::new();
        let mut nested: Vec<(usize, &[Statement])> = Vec::new();
        for (i, body) in bodies.iter().enumerate() {
            let lead = body.iter().position(|s| !s.kind.is_inert());
            match lead.and_then(|idx| body[idx].kind.flow().map(|f| (idx, f))) {
                Some((idx, (kind, target))) => {
                    node.statements.push(body[idx].id.clone());
                    direct.push((i, kind, target.to_string()));
                    nested.push((i, &body[idx + 1..]));
                }
                None => nested.push((i, body)),
            }
        }
        self.graph.add_node(node);

        for (i, kind, target) in direct {
            self.flow_edge(&id, Some(&ports[i].id), kind, &target);
        }
        for (i, body) in nested {
            let origin = Position::new(pos.x + i as f32 * self.opts.port_offset, pos.y);
            self.chain(body, Some((id.clone(), Some(ports[i].id.clone()))), origin);
        }
        id
    }

    fn flow_edge(&mut self, from: &GraphNodeId, port: Option<&str>, kind: FlowKind, target: &str) {
        let target = if target.trim().is_empty() {
            EdgeTarget::Absent
        } else if self.labels.contains(target) {
            EdgeTarget::Resolved(entry_point_id(target))
        } else {
            EdgeTarget::Unresolved(target.to_string())
        };
        let edge_kind = match kind {
            FlowKind::Jump => EdgeKind::Jump,
            FlowKind::Call => EdgeKind::Call,
        };
        // Port calls have no call node for the return to land on.
        if kind == FlowKind::Call && port.is_none() {
            if let Some(name) = self.label_of(&target) {
                self.calls.push((from.clone(), name));
            }
        }
        self.graph.add_edge(GraphEdge::new(from, port, target, edge_kind));
    }

    fn label_of(&self, target: &EdgeTarget) -> Option<String> {
        target
            .node()
            .and_then(|id| id.as_str().strip_prefix("label:"))
            .map(str::to_string)
    }
}

pub(crate) fn line_content(kind: &StatementKind) -> Option<LineContent> {
    match kind {
        StatementKind::Dialogue { speaker, text, attributes } => Some(LineContent::Dialogue {
            speaker: speaker.clone(),
            text: text.clone(),
            attributes: attributes.clone(),
        }),
        StatementKind::Scene { image } => Some(LineContent::Scene { image: image.clone() }),
        StatementKind::Show { image } => Some(LineContent::Show { image: image.clone() }),
        StatementKind::Hide { image } => Some(LineContent::Hide { image: image.clone() }),
        StatementKind::With { transition } => {
            Some(LineContent::With { transition: transition.clone() })
        }
        _ => None,
    }
}

pub(crate) fn summarize(kind: &StatementKind) -> String {
    match kind {
        StatementKind::Label { name, .. } => format!("label {}", name),
        StatementKind::Dialogue { speaker: Some(who), text, .. } => format!("{}: {}", who, text),
        StatementKind::Dialogue { speaker: None, text, .. } => text.clone(),
        StatementKind::Menu { prompt: Some(p), .. } => format!("menu: {}", p),
        StatementKind::Menu { prompt: None, choices } => format!("menu ({} choices)", choices.len()),
        StatementKind::Conditional { branches } => match branches.first() {
            Some(b) => format!("if {}", b.condition.as_deref().unwrap_or("")),
            None => "if".to_string(),
        },
        StatementKind::Jump { target } => format!("jump {}", target),
        StatementKind::Call { target } => format!("call {}", target),
        StatementKind::Return { .. } => "return".to_string(),
        StatementKind::Scene { image: Some(img) } => format!("scene {}", img),
        StatementKind::Scene { image: None } => "scene".to_string(),
        StatementKind::Show { image } => format!("show {}", image),
        StatementKind::Hide { image } => format!("hide {}", image),
        StatementKind::With { transition } => format!("with {}", transition),
        StatementKind::Pass => "pass".to_string(),
        StatementKind::Other { text } => text.clone(),
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn preview(body: &[Statement], opts: &BuildOptions) -> String {
    body.iter()
        .filter(|s| !s.kind.is_inert())
        .take(opts.preview_lines)
        .map(|s| truncate(&summarize(&s.kind), opts.preview_width))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn exit_type(body: &[Statement]) -> ExitType {
    match body.iter().rev().find(|s| !s.kind.is_inert()).map(|s| &s.kind) {
        Some(StatementKind::Return { .. }) => return ExitType::Return,
        Some(StatementKind::Jump { .. }) => return ExitType::Jump,
        Some(StatementKind::Menu { .. }) => return ExitType::Menu,
        _ => {}
    }
    let mut has_jump = false;
    let mut has_menu = false;
    walk::visit(body, &mut |s| match s.kind {
        StatementKind::Jump { .. } => has_jump = true,
        StatementKind::Menu { .. } => has_menu = true,
        _ => {}
    });
    if has_jump {
        ExitType::Jump
    } else if has_menu {
        ExitType::Menu
    } else {
        ExitType::FallThrough
    }
}
