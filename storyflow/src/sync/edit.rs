use super::insert::{slot_body, Slot};
use super::{AstSynchronizer, DialogueSpec};
use crate::error::{Result, SyncError};
use crate::model::{NodeId, StatementKind, Tree};
use crate::walk;

// In-place edits. A statement whose content changes loses its raw text so
// the serializer renders it from the structured fields.

impl AstSynchronizer {
    pub fn update_dialogue(&self, id: &NodeId, spec: DialogueSpec, tree: &mut Tree) -> bool {
        let Some(stmt) = tree.find_mut(id) else {
            return false;
        };
        let StatementKind::Dialogue { speaker, text, attributes } = &mut stmt.kind else {
            return false;
        };
        if *speaker == spec.speaker && *text == spec.text && *attributes == spec.attributes {
            return true;
        }
        *speaker = spec.speaker;
        *text = spec.text;
        *attributes = spec.attributes;
        stmt.raw = None;
        true
    }

    /// Retargets a jump or call statement.
    pub fn update_flow_target(&self, id: &NodeId, target: &str, tree: &mut Tree) -> bool {
        let Some(stmt) = tree.find_mut(id) else {
            return false;
        };
        match &mut stmt.kind {
            StatementKind::Jump { target: t } | StatementKind::Call { target: t } => {
                if *t != target {
                    *t = target.to_string();
                    stmt.raw = None;
                    log::debug!("retargeted {} to '{}'", id, target);
                }
                true
            }
            _ => false,
        }
    }

    pub fn update_choice_text(&self, menu: &NodeId, index: usize, text: &str, tree: &mut Tree) -> Result<()> {
        // range check first
        slot_body(tree, menu, &Slot::Choice, index)?;
        let stmt = tree.find_mut(menu).ok_or_else(|| SyncError::missing(menu))?;
        if let StatementKind::Menu { choices, .. } = &mut stmt.kind {
            if let Some(choice) = choices.get_mut(index) {
                if choice.text != text {
                    choice.text = text.to_string();
                    stmt.raw = None;
                }
            }
        }
        Ok(())
    }

    pub fn update_menu_prompt(&self, menu: &NodeId, prompt: Option<&str>, tree: &mut Tree) -> bool {
        let Some(stmt) = tree.find_mut(menu) else {
            return false;
        };
        let StatementKind::Menu { prompt: current, .. } = &mut stmt.kind else {
            return false;
        };
        if current.as_deref() != prompt {
            *current = prompt.map(str::to_string);
            stmt.raw = None;
        }
        true
    }

    /// `None` turns the branch into `else`, which only the last branch may be.
    pub fn update_branch_condition(
        &self,
        conditional: &NodeId,
        index: usize,
        condition: Option<&str>,
        tree: &mut Tree,
    ) -> Result<()> {
        slot_body(tree, conditional, &Slot::Branch, index)?;
        let stmt = tree.find_mut(conditional).ok_or_else(|| SyncError::missing(conditional))?;
        if let StatementKind::Conditional { branches } = &mut stmt.kind {
            if condition.is_none() && index + 1 != branches.len() {
                return Err(SyncError::InvalidDocument(format!(
                    "branch {} of {} cannot be else: only the last branch can",
                    index, conditional
                )));
            }
            let branch = &mut branches[index];
            if branch.condition.as_deref() != condition {
                branch.condition = condition.map(str::to_string);
                stmt.raw = None;
            }
        }
        Ok(())
    }

    /// Renames an entry point and retargets every jump/call naming it.
    pub fn rename_label(&self, old: &str, new: &str, tree: &mut Tree) -> Result<()> {
        self.validate_label_name(new)?;
        if !tree.has_label(old) {
            return Err(SyncError::MissingLabel { label: old.to_string() });
        }
        if old == new {
            return Ok(());
        }
        if let Some(existing) = tree.find_label(new) {
            return Err(SyncError::DuplicateLabel { name: new.to_string(), existing: existing.id.clone() });
        }
        if let Some(label) = tree.find_label_mut(old) {
            if let StatementKind::Label { name, .. } = &mut label.kind {
                *name = new.to_string();
            }
            label.raw = None;
        }
        let mut retargeted = 0;
        walk::visit_mut(&mut tree.statements, &mut |s| match &mut s.kind {
            StatementKind::Jump { target } | StatementKind::Call { target } if *target == old => {
                *target = new.to_string();
                s.raw = None;
                retargeted += 1;
            }
            _ => {}
        });
        log::debug!("renamed '{}' to '{}', {} references updated", old, new, retargeted);
        Ok(())
    }
}
