use super::AstSynchronizer;
use crate::model::{NodeId, Statement, Tree};
use crate::walk;
use std::collections::{HashMap, HashSet};

/// Statement ids that differ between two trees.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModifiedSet {
    pub added: HashSet<NodeId>,
    pub removed: HashSet<NodeId>,
    /// Present in both with different content (children excluded).
    pub changed: HashSet<NodeId>,
}

impl ModifiedSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MergeOutcome {
    pub tree: Tree,
    pub modified: ModifiedSet,
}

fn index(tree: &Tree) -> HashMap<&NodeId, &Statement> {
    let mut map = HashMap::new();
    walk::visit(&tree.statements, &mut |s| {
        map.insert(&s.id, s);
    });
    map
}

impl AstSynchronizer {
    /// Copies `raw`/`line` from `original` onto statements of `modified`
    /// that lack them and whose own content is unchanged. Returns how many
    /// statements got their raw text back.
    pub fn preserve_raw_content(&self, original: &Tree, modified: &mut Tree) -> usize {
        let before = index(original);
        let mut restored = 0;
        walk::visit_mut(&mut modified.statements, &mut |s| {
            let Some(orig) = before.get(&s.id) else {
                return;
            };
            if !orig.kind.shallow_eq(&s.kind) {
                return;
            }
            if s.raw.is_none() && orig.raw.is_some() {
                s.raw = orig.raw.clone();
                restored += 1;
            }
            if s.line.is_none() {
                s.line = orig.line;
            }
        });
        restored
    }

    pub fn get_modified_node_ids(&self, original: &Tree, modified: &Tree) -> ModifiedSet {
        let before = index(original);
        let after = index(modified);
        let mut set = ModifiedSet::default();
        for (id, stmt) in &after {
            match before.get(id) {
                None => {
                    set.added.insert((*id).clone());
                }
                Some(orig) if !orig.kind.shallow_eq(&stmt.kind) => {
                    set.changed.insert((*id).clone());
                }
                Some(_) => {}
            }
        }
        for id in before.keys() {
            if !after.contains_key(id) {
                set.removed.insert((*id).clone());
            }
        }
        set
    }

    /// Takes the structure of `rebuilt` and the trivia of `original`:
    /// unchanged statements keep their original line and raw text, changed
    /// ones are re-rendered, added ones come in as they are.
    pub fn merge_ast_changes(&self, original: &Tree, rebuilt: &Tree) -> MergeOutcome {
        let modified = self.get_modified_node_ids(original, rebuilt);
        let before = index(original);
        let mut tree = rebuilt.clone();
        tree.id_seq = original.id_seq.max(rebuilt.id_seq);
        walk::visit_mut(&mut tree.statements, &mut |s| {
            if modified.changed.contains(&s.id) {
                s.raw = None;
            } else if let Some(orig) = before.get(&s.id) {
                s.line = orig.line;
                s.raw = orig.raw.clone();
            }
        });
        log::debug!(
            "merged tree: {} added, {} removed, {} changed",
            modified.added.len(),
            modified.removed.len(),
            modified.changed.len()
        );
        MergeOutcome { tree, modified }
    }
}
