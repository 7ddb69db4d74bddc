use crate::error::{Result, SyncError};
use crate::graph::Graph;
use crate::limits;
use crate::model::{NodeId, Statement, StatementKind, Tree};
use crate::walk;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

pub const FORMAT_VERSION: u32 = 1;

pub fn tree_to_json_impl(tree: &Tree) -> Value {
    json!({
        "version": FORMAT_VERSION,
        "statements": serde_json::to_value(&tree.statements).unwrap_or_default(),
    })
}

pub fn graph_to_json_impl(graph: &Graph) -> Value {
    serde_json::to_value(graph).unwrap_or_default()
}

/// Accepts `{version?, statements}` or a bare statement array. Checks the
/// ingestion caps, id uniqueness and entry-point uniqueness before handing
/// the tree out.
pub fn tree_from_json_impl_strict(v: Value) -> Result<Tree> {
    #[derive(Deserialize)]
    struct DocDe {
        version: Option<u32>,
        statements: Vec<Statement>,
    }
    let doc: DocDe = if v.is_array() {
        DocDe {
            version: None,
            statements: serde_json::from_value(v)
                .map_err(|e| SyncError::InvalidDocument(format!("{}", e)))?,
        }
    } else {
        serde_json::from_value(v).map_err(|e| SyncError::InvalidDocument(format!("{}", e)))?
    };
    if let Some(ver) = doc.version {
        if ver > FORMAT_VERSION {
            return Err(SyncError::InvalidDocument(format!("unsupported version {}", ver)));
        }
    }

    let depth = walk::depth(&doc.statements);
    if depth > limits::MAX_DEPTH {
        return Err(SyncError::CapsExceeded(format!("depth>{}", limits::MAX_DEPTH)));
    }
    let mut count = 0usize;
    let mut seen: HashSet<&NodeId> = HashSet::new();
    let mut problem: Option<SyncError> = None;
    walk::visit(&doc.statements, &mut |s| {
        if problem.is_some() {
            return;
        }
        count += 1;
        if !seen.insert(&s.id) {
            problem = Some(SyncError::InvalidDocument(format!("duplicate statement id {}", s.id)));
            return;
        }
        problem = check_statement(s);
    });
    if count > limits::MAX_STATEMENTS {
        return Err(SyncError::CapsExceeded(format!("statements>{}", limits::MAX_STATEMENTS)));
    }
    if let Some(e) = problem {
        return Err(e);
    }

    let mut labels: HashMap<&str, &NodeId> = HashMap::new();
    for s in &doc.statements {
        if let Some(name) = s.label_name() {
            if let Some(existing) = labels.insert(name, &s.id) {
                return Err(SyncError::DuplicateLabel {
                    name: name.to_string(),
                    existing: existing.clone(),
                });
            }
        }
    }
    if labels.len() > limits::MAX_LABELS {
        return Err(SyncError::CapsExceeded(format!("labels>{}", limits::MAX_LABELS)));
    }
    Ok(Tree::new(doc.statements))
}

fn check_statement(s: &Statement) -> Option<SyncError> {
    let too_long = |what: &str| Some(SyncError::CapsExceeded(format!("{} of {} > {} bytes", what, s.id, limits::MAX_TEXT_LEN)));
    match &s.kind {
        StatementKind::Label { name, .. } => {
            if !limits::name_within_bounds(name) {
                return Some(SyncError::InvalidDocument(format!("label name of {} is empty or too long", s.id)));
            }
        }
        StatementKind::Dialogue { text, .. } if !limits::text_within_bounds(text) => {
            return too_long("dialogue text");
        }
        StatementKind::Other { text } if !limits::text_within_bounds(text) => {
            return too_long("text");
        }
        StatementKind::Menu { choices, .. } => {
            if choices.len() > limits::MAX_CHOICES_PER_MENU {
                return Some(SyncError::CapsExceeded(format!(
                    "choices>{} in {}",
                    limits::MAX_CHOICES_PER_MENU,
                    s.id
                )));
            }
            if choices.iter().any(|c| !limits::text_within_bounds(&c.text)) {
                return too_long("choice text");
            }
        }
        _ => {}
    }
    if s.raw.as_deref().is_some_and(|r| !limits::text_within_bounds(r)) {
        return too_long("raw text");
    }
    None
}
