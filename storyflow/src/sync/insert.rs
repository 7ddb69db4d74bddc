use super::{strip_placeholders, AstSynchronizer, DialogueSpec, InsertTarget, MenuSpec};
use crate::error::{Result, SyncError};
use crate::model::{FlowKind, NodeId, Statement, StatementKind, Tree};
use crate::walk;
use std::collections::HashSet;

pub(super) enum Slot {
    Choice,
    Branch,
}

impl Slot {
    pub(super) fn what(&self) -> &'static str {
        match self {
            Slot::Choice => "choice",
            Slot::Branch => "branch",
        }
    }
}

/// Body list of choice/branch `index` inside statement `owner`.
pub(super) fn slot_body<'a>(
    tree: &'a mut Tree,
    owner: &NodeId,
    slot: &Slot,
    index: usize,
) -> Result<&'a mut Vec<Statement>> {
    let stmt = tree.find_mut(owner).ok_or_else(|| SyncError::missing(owner))?;
    let len = match (&stmt.kind, slot) {
        (StatementKind::Menu { choices, .. }, Slot::Choice) => choices.len(),
        (StatementKind::Conditional { branches }, Slot::Branch) => branches.len(),
        _ => return Err(SyncError::missing(owner)),
    };
    if index >= len {
        return Err(SyncError::OutOfRange { what: slot.what(), index, len });
    }
    stmt.kind
        .bodies_mut()
        .into_iter()
        .nth(index)
        .ok_or(SyncError::OutOfRange { what: slot.what(), index, len })
}

pub(super) fn flow_kind(kind: FlowKind, target: &str) -> StatementKind {
    match kind {
        FlowKind::Jump => StatementKind::Jump { target: target.to_string() },
        FlowKind::Call => StatementKind::Call { target: target.to_string() },
    }
}

impl AstSynchronizer {
    /// Places `kind` at `target` under a freshly minted id. Choice and
    /// branch bodies that only hold `pass` placeholders lose them.
    pub fn insert_statement(
        &self,
        target: &InsertTarget,
        kind: StatementKind,
        tree: &mut Tree,
    ) -> Result<NodeId> {
        match target {
            InsertTarget::Label { label, after } => {
                self.insert_in_label(label, kind, tree, after.as_ref(), false)
            }
            InsertTarget::Choice { menu, index } => {
                self.insert_in_slot(menu, &Slot::Choice, *index, kind, tree)
            }
            InsertTarget::Branch { conditional, index } => {
                self.insert_in_slot(conditional, &Slot::Branch, *index, kind, tree)
            }
        }
    }

    /// Inserts right after `anchor`, wherever it sits.
    pub fn insert_after(&self, anchor: &NodeId, kind: StatementKind, tree: &mut Tree) -> Result<NodeId> {
        if !tree.contains(anchor) {
            return Err(SyncError::missing(anchor));
        }
        let id = tree.mint_id();
        let (list, idx) =
            walk::locate_mut(&mut tree.statements, anchor).ok_or_else(|| SyncError::missing(anchor))?;
        list.insert(idx + 1, Statement::new(id.clone(), kind));
        log::debug!("inserted {} after {}", id, anchor);
        Ok(id)
    }

    /// Inserts right before `anchor`, wherever it sits.
    pub fn insert_before(&self, anchor: &NodeId, kind: StatementKind, tree: &mut Tree) -> Result<NodeId> {
        if !tree.contains(anchor) {
            return Err(SyncError::missing(anchor));
        }
        let id = tree.mint_id();
        let (list, idx) =
            walk::locate_mut(&mut tree.statements, anchor).ok_or_else(|| SyncError::missing(anchor))?;
        list.insert(idx, Statement::new(id.clone(), kind));
        log::debug!("inserted {} before {}", id, anchor);
        Ok(id)
    }

    fn insert_in_label(
        &self,
        label: &str,
        kind: StatementKind,
        tree: &mut Tree,
        after: Option<&NodeId>,
        append: bool,
    ) -> Result<NodeId> {
        let body = tree
            .find_label(label)
            .and_then(|l| l.label_body())
            .ok_or_else(|| SyncError::MissingLabel { label: label.to_string() })?;
        if let Some(anchor) = after {
            if walk::find(body, anchor).is_none() {
                return Err(SyncError::missing(anchor));
            }
        }
        let id = tree.mint_id();
        let stmt = Statement::new(id.clone(), kind);
        let body = tree
            .find_label_mut(label)
            .and_then(|l| l.label_body_mut())
            .ok_or_else(|| SyncError::MissingLabel { label: label.to_string() })?;
        match after {
            Some(anchor) => {
                let (list, idx) =
                    walk::locate_mut(body, anchor).ok_or_else(|| SyncError::missing(anchor))?;
                list.insert(idx + 1, stmt);
            }
            None if append => body.push(stmt),
            None => body.insert(0, stmt),
        }
        log::debug!("inserted {} into '{}'", id, label);
        Ok(id)
    }

    fn insert_in_slot(
        &self,
        owner: &NodeId,
        slot: &Slot,
        index: usize,
        kind: StatementKind,
        tree: &mut Tree,
    ) -> Result<NodeId> {
        // validate before minting
        slot_body(tree, owner, slot, index)?;
        let id = tree.mint_id();
        let body = slot_body(tree, owner, slot, index)?;
        strip_placeholders(body);
        body.insert(0, Statement::new(id.clone(), kind));
        log::debug!("inserted {} into {} {} of {}", id, slot.what(), index, owner);
        Ok(id)
    }

    /// Sets the jump/call of a choice or branch body: retargets the first
    /// direct one of that kind in place, else appends a new one.
    fn set_slot_flow(
        &self,
        owner: &NodeId,
        slot: &Slot,
        index: usize,
        kind: FlowKind,
        target: &str,
        tree: &mut Tree,
    ) -> Result<NodeId> {
        let existing = slot_body(tree, owner, slot, index)?
            .iter()
            .find(|s| matches!(s.kind.flow(), Some((k, _)) if k == kind))
            .map(|s| s.id.clone());
        if let Some(id) = existing {
            self.update_flow_target(&id, target, tree);
            return Ok(id);
        }
        let id = tree.mint_id();
        let body = slot_body(tree, owner, slot, index)?;
        strip_placeholders(body);
        body.push(Statement::new(id.clone(), flow_kind(kind, target)));
        log::debug!("{} {} -> '{}' set on {} {} of {}", kind_name(kind), id, target, slot.what(), index, owner);
        Ok(id)
    }

    /// `None` when the label or `after` does not exist. Without an anchor
    /// the line goes to the start of the body.
    pub fn insert_dialogue(
        &self,
        label: &str,
        spec: DialogueSpec,
        tree: &mut Tree,
        after: Option<&NodeId>,
    ) -> Option<NodeId> {
        let kind = StatementKind::Dialogue {
            speaker: spec.speaker,
            text: spec.text,
            attributes: spec.attributes,
        };
        self.insert_in_label(label, kind, tree, after, false)
            .map_err(|e| log::warn!("insert_dialogue: {}", e))
            .ok()
    }

    pub fn insert_menu(
        &self,
        label: &str,
        spec: MenuSpec,
        tree: &mut Tree,
        after: Option<&NodeId>,
    ) -> Option<NodeId> {
        if !tree.has_label(label) {
            log::warn!("insert_menu: entry point '{}' does not exist", label);
            return None;
        }
        let kind = self.menu_kind(&spec, tree);
        self.insert_in_label(label, kind, tree, after, false)
            .map_err(|e| log::warn!("insert_menu: {}", e))
            .ok()
    }

    /// Appends `jump target` to the label body unless it already ends with
    /// exactly that jump, in which case the existing id comes back.
    pub fn insert_jump_into_label(
        &self,
        label: &str,
        target: &str,
        tree: &mut Tree,
        after: Option<&NodeId>,
    ) -> Option<NodeId> {
        self.insert_flow_into_label(label, FlowKind::Jump, target, tree, after)
    }

    pub fn insert_call_into_label(
        &self,
        label: &str,
        target: &str,
        tree: &mut Tree,
        after: Option<&NodeId>,
    ) -> Option<NodeId> {
        self.insert_flow_into_label(label, FlowKind::Call, target, tree, after)
    }

    fn insert_flow_into_label(
        &self,
        label: &str,
        kind: FlowKind,
        target: &str,
        tree: &mut Tree,
        after: Option<&NodeId>,
    ) -> Option<NodeId> {
        if after.is_none() {
            let trailing = tree
                .find_label(label)?
                .label_body()?
                .iter()
                .rev()
                .find(|s| !s.kind.is_inert())
                .filter(|s| s.kind.flow() == Some((kind, target)))
                .map(|s| s.id.clone());
            if trailing.is_some() {
                return trailing;
            }
        }
        self.insert_in_label(label, flow_kind(kind, target), tree, after, true)
            .map_err(|e| log::warn!("insert {} into '{}': {}", kind_name(kind), label, e))
            .ok()
    }

    pub fn insert_jump_into_choice(
        &self,
        menu: &NodeId,
        index: usize,
        target: &str,
        tree: &mut Tree,
    ) -> Result<NodeId> {
        self.set_slot_flow(menu, &Slot::Choice, index, FlowKind::Jump, target, tree)
    }

    pub fn insert_call_into_choice(
        &self,
        menu: &NodeId,
        index: usize,
        target: &str,
        tree: &mut Tree,
    ) -> Result<NodeId> {
        self.set_slot_flow(menu, &Slot::Choice, index, FlowKind::Call, target, tree)
    }

    pub fn insert_jump_into_condition_branch(
        &self,
        conditional: &NodeId,
        index: usize,
        target: &str,
        tree: &mut Tree,
    ) -> Result<NodeId> {
        self.set_slot_flow(conditional, &Slot::Branch, index, FlowKind::Jump, target, tree)
    }

    /// Appends a new top-level entry point. Statements in `body` whose ids
    /// already occur in the tree are re-keyed.
    pub fn add_label(&self, name: &str, tree: &mut Tree, body: Option<Vec<Statement>>) -> Result<NodeId> {
        self.validate_label_name(name)?;
        if let Some(existing) = tree.find_label(name) {
            return Err(SyncError::DuplicateLabel { name: name.to_string(), existing: existing.id.clone() });
        }
        let mut body = body.unwrap_or_default();
        let mut taken: HashSet<NodeId> = walk::collect_ids(&tree.statements).into_iter().collect();
        walk::visit_mut(&mut body, &mut |s| {
            if !taken.insert(s.id.clone()) {
                let mut id = tree.mint_id();
                while taken.contains(&id) {
                    id = tree.mint_id();
                }
                taken.insert(id.clone());
                s.id = id;
            }
        });
        let mut id = tree.mint_id();
        while taken.contains(&id) {
            id = tree.mint_id();
        }
        tree.statements.push(Statement::label(id.clone(), name, body));
        log::debug!("added entry point '{}' ({})", name, id);
        Ok(id)
    }
}

pub(crate) fn kind_name(kind: FlowKind) -> &'static str {
    match kind {
        FlowKind::Jump => "jump",
        FlowKind::Call => "call",
    }
}
