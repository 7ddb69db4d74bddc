//! One traversal for every recursive algorithm over the tree.
//!
//! [`StatementKind::bodies`] and [`StatementKind::bodies_mut`] are the only
//! places that know which statement kinds nest. Lookup, locate-for-insert,
//! deep retain, trivia restoration and diffing all go through them.

use crate::model::{NodeId, Statement, StatementKind};

impl StatementKind {
    /// Nested statement lists owned by this statement, in document order.
    pub fn bodies(&self) -> Vec<&Vec<Statement>> {
        match self {
            StatementKind::Label { body, .. } => vec![body],
            StatementKind::Menu { choices, .. } => choices.iter().map(|c| &c.body).collect(),
            StatementKind::Conditional { branches } => {
                branches.iter().map(|b| &b.body).collect()
            }
            StatementKind::Dialogue { .. }
            | StatementKind::Jump { .. }
            | StatementKind::Call { .. }
            | StatementKind::Return { .. }
            | StatementKind::Scene { .. }
            | StatementKind::Show { .. }
            | StatementKind::Hide { .. }
            | StatementKind::With { .. }
            | StatementKind::Pass
            | StatementKind::Other { .. } => Vec::new(),
        }
    }

    pub fn bodies_mut(&mut self) -> Vec<&mut Vec<Statement>> {
        match self {
            StatementKind::Label { body, .. } => vec![body],
            StatementKind::Menu { choices, .. } => {
                choices.iter_mut().map(|c| &mut c.body).collect()
            }
            StatementKind::Conditional { branches } => {
                branches.iter_mut().map(|b| &mut b.body).collect()
            }
            StatementKind::Dialogue { .. }
            | StatementKind::Jump { .. }
            | StatementKind::Call { .. }
            | StatementKind::Return { .. }
            | StatementKind::Scene { .. }
            | StatementKind::Show { .. }
            | StatementKind::Hide { .. }
            | StatementKind::With { .. }
            | StatementKind::Pass
            | StatementKind::Other { .. } => Vec::new(),
        }
    }
}

/// Pre-order visit of every statement at every depth.
pub fn visit<'a, F>(stmts: &'a [Statement], f: &mut F)
where
    F: FnMut(&'a Statement),
{
    for s in stmts {
        f(s);
        for body in s.kind.bodies() {
            visit(body, &mut *f);
        }
    }
}

pub fn visit_mut<F>(stmts: &mut [Statement], f: &mut F)
where
    F: FnMut(&mut Statement),
{
    for s in stmts.iter_mut() {
        f(s);
        for body in s.kind.bodies_mut() {
            visit_mut(body, &mut *f);
        }
    }
}

/// Every statement id in pre-order.
pub fn collect_ids(stmts: &[Statement]) -> Vec<NodeId> {
    let mut ids = Vec::new();
    visit(stmts, &mut |s| ids.push(s.id.clone()));
    ids
}

pub fn find<'a>(stmts: &'a [Statement], id: &NodeId) -> Option<&'a Statement> {
    for s in stmts {
        if &s.id == id {
            return Some(s);
        }
        for body in s.kind.bodies() {
            if let Some(found) = find(body, id) {
                return Some(found);
            }
        }
    }
    None
}

pub fn find_mut<'a>(stmts: &'a mut [Statement], id: &NodeId) -> Option<&'a mut Statement> {
    for s in stmts.iter_mut() {
        if &s.id == id {
            return Some(s);
        }
        for body in s.kind.bodies_mut() {
            if let Some(found) = find_mut(body, id) {
                return Some(found);
            }
        }
    }
    None
}

/// The list holding `id` and its index there.
pub fn locate_mut<'a>(
    body: &'a mut Vec<Statement>,
    id: &NodeId,
) -> Option<(&'a mut Vec<Statement>, usize)> {
    if let Some(idx) = body.iter().position(|s| &s.id == id) {
        return Some((body, idx));
    }
    for s in body.iter_mut() {
        for child in s.kind.bodies_mut() {
            if let Some(found) = locate_mut(child, id) {
                return Some(found);
            }
        }
    }
    None
}

/// Drop every statement, at any depth, for which `keep` is false.
/// Returns the ids of the dropped statements and of everything nested in them.
pub fn retain_deep<F>(stmts: &mut Vec<Statement>, keep: &mut F) -> Vec<NodeId>
where
    F: FnMut(&Statement) -> bool,
{
    let mut removed = Vec::new();
    let mut i = 0;
    while i < stmts.len() {
        if keep(&stmts[i]) {
            for body in stmts[i].kind.bodies_mut() {
                removed.extend(retain_deep(body, &mut *keep));
            }
            i += 1;
        } else {
            let gone = stmts.remove(i);
            removed.extend(collect_ids(std::slice::from_ref(&gone)));
        }
    }
    removed
}

/// Nesting depth of the deepest statement (top level is 1).
pub fn depth(stmts: &[Statement]) -> usize {
    stmts
        .iter()
        .map(|s| 1 + s.kind.bodies().into_iter().map(|b| depth(b)).max().unwrap_or(0))
        .max()
        .unwrap_or(0)
}
