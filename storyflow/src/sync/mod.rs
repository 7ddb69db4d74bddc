//! Writes graph edits back into the tree.
//!
//! Mutating entry points take a `&mut Tree` the caller owns, or clone and
//! return a new tree (`sync_to_ast`, `delete_node`). None of them panic;
//! refusals are `None`, `false` or a [`SyncError`].

mod edit;
mod insert;
mod remove;
mod trivia;

pub use trivia::{MergeOutcome, ModifiedSet};

use crate::algorithms::resolve::Resolver;
use crate::error::{Result, SyncError};
use crate::graph::{Graph, LineContent, NodeData};
use crate::limits;
use crate::model::{
    Branch, Choice, EdgeId, GraphNodeId, NodeId, Statement, StatementKind, Tree,
};
use crate::pending::{PendingPool, PendingStatus, SyncRecord};
use crate::walk;
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DialogueSpec {
    pub speaker: Option<String>,
    pub text: String,
    pub attributes: Vec<String>,
}

impl DialogueSpec {
    pub fn new(speaker: Option<&str>, text: &str) -> Self {
        DialogueSpec {
            speaker: speaker.map(str::to_string),
            text: text.to_string(),
            attributes: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MenuSpec {
    pub prompt: Option<String>,
    pub choices: Vec<String>,
}

/// Where [`AstSynchronizer::insert_statement`] puts a new statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertTarget {
    /// After `after` (anywhere inside the label), or at body start.
    Label { label: String, after: Option<NodeId> },
    /// Start of a menu choice body.
    Choice { menu: NodeId, index: usize },
    /// Start of a conditional branch body.
    Branch { conditional: NodeId, index: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteOutcome {
    pub tree: Tree,
    /// Graph rebuilt from `tree`.
    pub graph: Graph,
    pub removed_edges: Vec<EdgeId>,
    pub removed_statements: Vec<NodeId>,
}

/// Result of a best-effort pass over the pending pool.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncReport {
    pub tree: Tree,
    pub synced: Vec<(GraphNodeId, SyncRecord)>,
    /// Connected nodes whose source never reached the tree.
    pub unresolved: Vec<GraphNodeId>,
    /// One `sync_failed` per node that could not be written.
    pub failures: Vec<SyncError>,
}

/// Stateless; construct one and pass it where it is needed.
#[derive(Clone, Copy, Debug, Default)]
pub struct AstSynchronizer;

impl AstSynchronizer {
    pub fn new() -> Self {
        AstSynchronizer
    }

    /// Structural copy. The caller's tree is never touched.
    pub fn clone_ast(&self, tree: &Tree) -> Tree {
        tree.clone()
    }

    /// Checks `name` against `[a-z_][a-z0-9_]*`.
    pub fn validate_label_name(&self, name: &str) -> Result<()> {
        let invalid = |reason| Err(SyncError::InvalidName { name: name.to_string(), reason });
        if name.trim().is_empty() {
            return invalid("name is blank");
        }
        if !limits::name_within_bounds(name) {
            return invalid("name is too long");
        }
        let mut chars = name.chars();
        let first = chars.next().unwrap_or('_');
        if first.is_ascii_digit() {
            return invalid("name starts with a digit");
        }
        if !(first.is_ascii_lowercase() || first == '_') {
            return invalid("name must start with a lowercase letter or '_'");
        }
        if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return invalid("only lowercase letters, digits and '_' are allowed");
        }
        Ok(())
    }

    /// Materializes every connected pending node it can place, in dependency
    /// order, against a clone of `tree`. Each node is written to a scratch
    /// copy first; a node that fails is reported and skipped, the rest go on.
    pub fn sync_to_ast(&self, graph: &Graph, pool: &PendingPool, tree: &Tree) -> SyncReport {
        let resolver = Resolver::new(graph);
        let mut work = tree.clone();
        let mut report = SyncReport::default();
        // pending id -> (first, last) statement written for it
        let mut placed: HashMap<GraphNodeId, (NodeId, NodeId)> = HashMap::new();
        for p in pool.get_all() {
            if let Some(rec) = &p.synced {
                placed.insert(p.id().clone(), (rec.statement.clone(), rec.statement.clone()));
            }
        }

        let mut todo: Vec<GraphNodeId> = pool
            .with_status(PendingStatus::Connected)
            .into_iter()
            .filter(|p| !p.node.is_entry_point())
            .map(|p| p.id().clone())
            .collect();

        loop {
            let mut progressed = false;
            let mut waiting = Vec::new();
            for id in todo {
                let Some(p) = pool.get(&id) else { continue };
                let Some(from) = p.connected_from.as_ref() else {
                    report.unresolved.push(id);
                    continue;
                };
                let target = if let Some(source) = pool.get(from) {
                    let Some((first, last)) = placed.get(from) else {
                        waiting.push(id);
                        continue;
                    };
                    match behind_placed(&source.node.data, p.connected_port.as_deref(), first, last, &work) {
                        Some(t) => t,
                        None => {
                            report.unresolved.push(id);
                            continue;
                        }
                    }
                } else {
                    match self.target_behind(&resolver, from, p.connected_port.as_deref(), &id) {
                        Some(t) => t,
                        None => {
                            report.unresolved.push(id);
                            continue;
                        }
                    }
                };

                let mut scratch = work.clone();
                match self.materialize(&p.node.data, &target, &mut scratch) {
                    Ok((first, last)) => {
                        let label = owning_label(&scratch, &first).unwrap_or_default();
                        log::debug!("synced pending {} as {} in '{}'", id, first, label);
                        work = scratch;
                        placed.insert(id.clone(), (first.clone(), last));
                        report.synced.push((id, SyncRecord { statement: first, label }));
                        progressed = true;
                    }
                    Err(e) => {
                        log::warn!("sync of pending {} failed: {}", id, e);
                        report.failures.push(SyncError::SyncFailed {
                            node: id,
                            reason: e.to_string(),
                        });
                    }
                }
            }
            if !progressed || waiting.is_empty() {
                report.unresolved.extend(waiting);
                break;
            }
            todo = waiting;
        }
        report.tree = work;
        report
    }

    /// Insert target for a node hanging off `source` (a node already in the
    /// tree), optionally through one of its ports.
    pub fn target_behind(
        &self,
        resolver: &Resolver<'_>,
        source: &GraphNodeId,
        port: Option<&str>,
        new_node: &GraphNodeId,
    ) -> Option<InsertTarget> {
        let src = resolver.graph().node(source)?;
        if let Some(port) = port {
            let index = src.data.port_index(port)?;
            let owner = src.statements.first()?.clone();
            return match src.data {
                NodeData::Menu { .. } => Some(InsertTarget::Choice { menu: owner, index }),
                NodeData::Conditional { .. } => {
                    Some(InsertTarget::Branch { conditional: owner, index })
                }
                _ => None,
            };
        }
        let pos = resolver.determine_insert_position(source, new_node)?;
        Some(InsertTarget::Label { label: pos.label_name, after: pos.after_node_id })
    }

    /// Writes the statements a pending node stands for. Returns the first and
    /// last statement written; the tree is left as-is on error.
    pub fn materialize(
        &self,
        data: &NodeData,
        target: &InsertTarget,
        tree: &mut Tree,
    ) -> Result<(NodeId, NodeId)> {
        match data {
            NodeData::EntryPoint { .. } => Err(SyncError::connection(
                "entry points become labels, they are not inserted into bodies",
            )),
            NodeData::Block { lines } => {
                let mut kinds = lines.iter().map(|l| line_kind(&l.content));
                let first_kind = kinds
                    .next()
                    .ok_or_else(|| SyncError::connection("block has no lines"))?;
                let first = self.insert_statement(target, first_kind, tree)?;
                let mut last = first.clone();
                for kind in kinds {
                    last = self.insert_after(&last, kind, tree)?;
                }
                Ok((first, last))
            }
            NodeData::Menu { prompt, ports } => {
                let spec = MenuSpec {
                    prompt: prompt.clone(),
                    choices: ports.iter().map(|p| p.label.clone()).collect(),
                };
                let kind = self.menu_kind(&spec, tree);
                let id = self.insert_statement(target, kind, tree)?;
                Ok((id.clone(), id))
            }
            NodeData::Conditional { ports } => {
                let last = ports.len().saturating_sub(1);
                let branches = ports
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        let condition = if i == last && p.label == "else" && i > 0 {
                            None
                        } else {
                            Some(p.label.clone())
                        };
                        Branch { condition, body: vec![Statement::new(tree.mint_id(), StatementKind::Pass)] }
                    })
                    .collect();
                let id = self.insert_statement(target, StatementKind::Conditional { branches }, tree)?;
                Ok((id.clone(), id))
            }
            NodeData::Jump { target: label } => {
                let id = self.insert_statement(target, StatementKind::Jump { target: label.clone() }, tree)?;
                Ok((id.clone(), id))
            }
            NodeData::Call { target: label } => {
                let id = self.insert_statement(target, StatementKind::Call { target: label.clone() }, tree)?;
                Ok((id.clone(), id))
            }
            NodeData::Return => {
                let id = self.insert_statement(target, StatementKind::Return { value: None }, tree)?;
                Ok((id.clone(), id))
            }
        }
    }

    pub(crate) fn menu_kind(&self, spec: &MenuSpec, tree: &mut Tree) -> StatementKind {
        let choices = spec
            .choices
            .iter()
            .map(|text| Choice {
                text: text.clone(),
                condition: None,
                body: vec![Statement::new(tree.mint_id(), StatementKind::Pass)],
            })
            .collect();
        StatementKind::Menu { prompt: spec.prompt.clone(), choices }
    }
}

pub(crate) fn line_kind(content: &LineContent) -> StatementKind {
    match content {
        LineContent::Dialogue { speaker, text, attributes } => StatementKind::Dialogue {
            speaker: speaker.clone(),
            text: text.clone(),
            attributes: attributes.clone(),
        },
        LineContent::Scene { image } => StatementKind::Scene { image: image.clone() },
        LineContent::Show { image } => StatementKind::Show { image: image.clone() },
        LineContent::Hide { image } => StatementKind::Hide { image: image.clone() },
        LineContent::With { transition } => StatementKind::With { transition: transition.clone() },
    }
}

/// Name of the top-level label whose subtree holds `id`.
// Insert target behind a pending node written earlier in the same pass.
// Through a port the new node goes into that choice or branch of the
// statement written first; otherwise it follows the last one.
fn behind_placed(
    source: &NodeData,
    port: Option<&str>,
    first: &NodeId,
    last: &NodeId,
    tree: &Tree,
) -> Option<InsertTarget> {
    match port {
        Some(port) => {
            let index = source.port_index(port)?;
            match source {
                NodeData::Menu { .. } => Some(InsertTarget::Choice { menu: first.clone(), index }),
                NodeData::Conditional { .. } => {
                    Some(InsertTarget::Branch { conditional: first.clone(), index })
                }
                _ => None,
            }
        }
        None => {
            let label = owning_label(tree, last)?;
            Some(InsertTarget::Label { label, after: Some(last.clone()) })
        }
    }
}

pub fn owning_label(tree: &Tree, id: &NodeId) -> Option<String> {
    tree.labels().find_map(|l| {
        let name = l.label_name()?;
        if &l.id == id {
            return Some(name.to_string());
        }
        walk::find(l.label_body()?, id).map(|_| name.to_string())
    })
}

/// Gives every empty menu choice and conditional branch a `pass`, which is
/// what an empty block has to contain to stay valid script.
pub(crate) fn pad_empty_bodies(tree: &mut Tree) -> usize {
    let mut needed = 0;
    walk::visit(&tree.statements, &mut |s| {
        if s.kind.is_branching() {
            needed += s.kind.bodies().iter().filter(|b| b.is_empty()).count();
        }
    });
    if needed == 0 {
        return 0;
    }
    let mut ids: Vec<NodeId> = (0..needed).map(|_| tree.mint_id()).collect();
    walk::visit_mut(&mut tree.statements, &mut |s| {
        if !s.kind.is_branching() {
            return;
        }
        for body in s.kind.bodies_mut() {
            if body.is_empty() {
                if let Some(id) = ids.pop() {
                    body.push(Statement::new(id, StatementKind::Pass));
                }
            }
        }
    });
    needed
}

/// Drops `pass` placeholders from a body that holds nothing else.
pub(crate) fn strip_placeholders(body: &mut Vec<Statement>) {
    if body.iter().all(|s| matches!(s.kind, StatementKind::Pass)) {
        body.clear();
    }
}
