use super::insert::{kind_name, slot_body, Slot};
use super::{pad_empty_bodies, AstSynchronizer, DeleteOutcome};
use crate::algorithms::build::build_graph;
use crate::graph::Graph;
use crate::model::{EdgeId, FlowKind, GraphNodeId, NodeId, Statement, StatementKind, Tree};
use crate::walk;
use std::collections::HashSet;

/// Drops every jump/call, at any depth, that targets `name`.
fn cascade(tree: &mut Tree, name: &str) -> Vec<NodeId> {
    walk::retain_deep(&mut tree.statements, &mut |s| {
        !matches!(s.kind.flow(), Some((_, t)) if t == name)
    })
}

impl AstSynchronizer {
    /// Removes what graph node `node` stands for from a clone of `tree`.
    ///
    /// Entry points take their whole label with them, plus every jump/call
    /// to that name anywhere in the tree. `removed_edges` is every edge of
    /// `graph` that the rebuilt graph no longer has. `None` if `node` is not
    /// in `graph`.
    pub fn delete_node(&self, node: &GraphNodeId, graph: &Graph, tree: &Tree) -> Option<DeleteOutcome> {
        let target = graph.node(node)?;
        let mut out = tree.clone();
        let mut removed = Vec::new();
        if let Some(name) = target.entry_name() {
            removed.extend(cascade(&mut out, name));
        }
        let owned: HashSet<&NodeId> = target.statements.iter().collect();
        removed.extend(walk::retain_deep(&mut out.statements, &mut |s| !owned.contains(&s.id)));
        pad_empty_bodies(&mut out);

        let rebuilt = build_graph(&out);
        let kept: HashSet<&EdgeId> = rebuilt.edges.iter().map(|e| &e.id).collect();
        let removed_edges: Vec<EdgeId> = graph
            .edges
            .iter()
            .filter(|e| !kept.contains(&e.id))
            .map(|e| e.id.clone())
            .collect();
        log::debug!(
            "deleted {}: {} statements, {} edges",
            node,
            removed.len(),
            removed_edges.len()
        );
        Some(DeleteOutcome { tree: out, graph: rebuilt, removed_edges, removed_statements: removed })
    }

    /// Removes the label and every jump/call targeting it.
    pub fn remove_label(&self, name: &str, tree: &mut Tree) -> bool {
        let Some(label_id) = tree.find_label(name).map(|l| l.id.clone()) else {
            return false;
        };
        let flows = cascade(tree, name);
        walk::retain_deep(&mut tree.statements, &mut |s| s.id != label_id);
        pad_empty_bodies(tree);
        log::debug!("removed entry point '{}' and {} references", name, flows.len());
        true
    }

    /// Removes statement `id` and everything nested in it.
    pub fn remove_statement(&self, id: &NodeId, tree: &mut Tree) -> Vec<NodeId> {
        let removed = walk::retain_deep(&mut tree.statements, &mut |s| &s.id != id);
        if !removed.is_empty() {
            pad_empty_bodies(tree);
            log::debug!("removed {} ({} statements)", id, removed.len());
        }
        removed
    }

    /// Removes a jump/call to `target` from the label: the last direct one
    /// in the body, otherwise the first nested one.
    pub fn remove_flow_statement(&self, label: &str, target: &str, tree: &mut Tree, kind: FlowKind) -> bool {
        let Some(body) = tree.find_label_mut(label).and_then(|l| l.label_body_mut()) else {
            return false;
        };
        let hit = |s: &Statement| s.kind.flow() == Some((kind, target));
        let removed = match body.iter().rposition(|s| hit(s)) {
            Some(idx) => {
                body.remove(idx);
                true
            }
            None => {
                let mut done = false;
                let gone = walk::retain_deep(body, &mut |s| {
                    if !done && hit(s) {
                        done = true;
                        return false;
                    }
                    true
                });
                !gone.is_empty()
            }
        };
        if removed {
            pad_empty_bodies(tree);
            log::debug!("removed {} '{}' from '{}'", kind_name(kind), target, label);
        }
        removed
    }

    fn remove_slot_flow(&self, owner: &NodeId, slot: &Slot, index: usize, kind: FlowKind, tree: &mut Tree) -> bool {
        let Ok(body) = slot_body(tree, owner, slot, index) else {
            return false;
        };
        let Some(idx) = body.iter().position(|s| matches!(s.kind.flow(), Some((k, _)) if k == kind)) else {
            return false;
        };
        body.remove(idx);
        let emptied = body.is_empty();
        if emptied {
            let pass = Statement::new(tree.mint_id(), StatementKind::Pass);
            if let Ok(body) = slot_body(tree, owner, slot, index) {
                body.push(pass);
            }
        }
        log::debug!("removed {} from {} {} of {}", kind_name(kind), slot.what(), index, owner);
        true
    }

    pub fn remove_flow_from_choice(&self, menu: &NodeId, index: usize, kind: FlowKind, tree: &mut Tree) -> bool {
        self.remove_slot_flow(menu, &Slot::Choice, index, kind, tree)
    }

    pub fn remove_flow_from_branch(&self, conditional: &NodeId, index: usize, kind: FlowKind, tree: &mut Tree) -> bool {
        self.remove_slot_flow(conditional, &Slot::Branch, index, kind, tree)
    }

    pub fn remove_jump_from_choice(&self, menu: &NodeId, index: usize, tree: &mut Tree) -> bool {
        self.remove_flow_from_choice(menu, index, FlowKind::Jump, tree)
    }

    pub fn remove_jump_from_condition_branch(&self, conditional: &NodeId, index: usize, tree: &mut Tree) -> bool {
        self.remove_flow_from_branch(conditional, index, FlowKind::Jump, tree)
    }
}
