use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }
    };
}

string_id!(
    /// Stable identifier of a statement in the [`Tree`].
    NodeId
);
string_id!(
    /// Identifier of a node in the derived graph. Distinct from [`NodeId`]:
    /// one graph node may stand for zero, one or several statements.
    GraphNodeId
);
string_id!(EdgeId);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// `None` is the trailing `else` branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatementKind {
    Label {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parameters: Option<String>,
        #[serde(default)]
        body: Vec<Statement>,
    },
    Dialogue {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speaker: Option<String>,
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attributes: Vec<String>,
    },
    Menu {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
        #[serde(default)]
        choices: Vec<Choice>,
    },
    Conditional {
        #[serde(default)]
        branches: Vec<Branch>,
    },
    Jump {
        target: String,
    },
    Call {
        target: String,
    },
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    /// Backdrop change. Always opens a new merged block in the graph view.
    Scene {
        #[serde(default, skip_serializing_if = "Option::is_none")]
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
    Pass,
    /// Anything the parser did not classify. Kept verbatim, never shown.
    Other {
        text: String,
    },
}

/// Jump-like statements that address an entry point by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Jump,
    Call,
}

impl StatementKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            StatementKind::Label { .. } => "label",
            StatementKind::Dialogue { .. } => "dialogue",
            StatementKind::Menu { .. } => "menu",
            StatementKind::Conditional { .. } => "conditional",
            StatementKind::Jump { .. } => "jump",
            StatementKind::Call { .. } => "call",
            StatementKind::Return { .. } => "return",
            StatementKind::Scene { .. } => "scene",
            StatementKind::Show { .. } => "show",
            StatementKind::Hide { .. } => "hide",
            StatementKind::With { .. } => "with",
            StatementKind::Pass => "pass",
            StatementKind::Other { .. } => "other",
        }
    }

    /// Target name and flavour for jump/call statements.
    pub fn flow(&self) -> Option<(FlowKind, &str)> {
        match self {
            StatementKind::Jump { target } => Some((FlowKind::Jump, target)),
            StatementKind::Call { target } => Some((FlowKind::Call, target)),
            _ => None,
        }
    }

    pub fn is_branching(&self) -> bool {
        matches!(self, StatementKind::Menu { .. } | StatementKind::Conditional { .. })
    }

    /// Dialogue and visual statements, the ones merged into blocks.
    pub fn is_simple(&self) -> bool {
        matches!(
            self,
            StatementKind::Dialogue { .. }
                | StatementKind::Scene { .. }
                | StatementKind::Show { .. }
                | StatementKind::Hide { .. }
                | StatementKind::With { .. }
        )
    }

    pub fn is_inert(&self) -> bool {
        matches!(self, StatementKind::Pass | StatementKind::Other { .. })
    }

    /// Same statement content, children bodies excluded.
    pub fn shallow_eq(&self, other: &StatementKind) -> bool {
        match (self, other) {
            (
                StatementKind::Label { name: a, parameters: pa, .. },
                StatementKind::Label { name: b, parameters: pb, .. },
            ) => a == b && pa == pb,
            (
                StatementKind::Menu { prompt: a, choices: ca },
                StatementKind::Menu { prompt: b, choices: cb },
            ) => {
                a == b
                    && ca.len() == cb.len()
                    && ca
                        .iter()
                        .zip(cb.iter())
                        .all(|(x, y)| x.text == y.text && x.condition == y.condition)
            }
            (
                StatementKind::Conditional { branches: ba },
                StatementKind::Conditional { branches: bb },
            ) => {
                ba.len() == bb.len()
                    && ba.iter().zip(bb.iter()).all(|(x, y)| x.condition == y.condition)
            }
            (a, b) => a == b,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: NodeId,
    #[serde(flatten)]
    pub kind: StatementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Original source text; the serializer reuses it verbatim while set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Statement {
    pub fn new(id: impl Into<NodeId>, kind: StatementKind) -> Self {
        Statement { id: id.into(), kind, line: None, raw: None }
    }

    pub fn with_trivia(mut self, line: u32, raw: impl Into<String>) -> Self {
        self.line = Some(line);
        self.raw = Some(raw.into());
        self
    }

    pub fn label(id: impl Into<NodeId>, name: &str, body: Vec<Statement>) -> Self {
        Statement::new(
            id,
            StatementKind::Label { name: name.to_string(), parameters: None, body },
        )
    }

    pub fn dialogue(id: impl Into<NodeId>, speaker: Option<&str>, text: &str) -> Self {
        Statement::new(
            id,
            StatementKind::Dialogue {
                speaker: speaker.map(str::to_string),
                text: text.to_string(),
                attributes: Vec::new(),
            },
        )
    }

    pub fn menu(id: impl Into<NodeId>, prompt: Option<&str>, choices: Vec<Choice>) -> Self {
        Statement::new(
            id,
            StatementKind::Menu { prompt: prompt.map(str::to_string), choices },
        )
    }

    pub fn conditional(id: impl Into<NodeId>, branches: Vec<Branch>) -> Self {
        Statement::new(id, StatementKind::Conditional { branches })
    }

    pub fn jump(id: impl Into<NodeId>, target: &str) -> Self {
        Statement::new(id, StatementKind::Jump { target: target.to_string() })
    }

    pub fn call(id: impl Into<NodeId>, target: &str) -> Self {
        Statement::new(id, StatementKind::Call { target: target.to_string() })
    }

    pub fn ret(id: impl Into<NodeId>) -> Self {
        Statement::new(id, StatementKind::Return { value: None })
    }

    pub fn scene(id: impl Into<NodeId>, image: &str) -> Self {
        Statement::new(id, StatementKind::Scene { image: Some(image.to_string()) })
    }

    pub fn show(id: impl Into<NodeId>, image: &str) -> Self {
        Statement::new(id, StatementKind::Show { image: image.to_string() })
    }

    pub fn label_name(&self) -> Option<&str> {
        match &self.kind {
            StatementKind::Label { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn label_body(&self) -> Option<&[Statement]> {
        match &self.kind {
            StatementKind::Label { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn label_body_mut(&mut self) -> Option<&mut Vec<Statement>> {
        match &mut self.kind {
            StatementKind::Label { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl Choice {
    pub fn new(text: &str, body: Vec<Statement>) -> Self {
        Choice { text: text.to_string(), condition: None, body }
    }
}

impl Branch {
    pub fn new(condition: Option<&str>, body: Vec<Statement>) -> Self {
        Branch { condition: condition.map(str::to_string), body }
    }
}

/// The authoritative script structure. Top-level labels are entry points.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Tree {
    pub statements: Vec<Statement>,
    #[serde(default, skip_serializing)]
    pub(crate) id_seq: u64,
}

// The id sequence is bookkeeping, not content.
impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.statements == other.statements
    }
}

impl Tree {
    pub fn new(statements: Vec<Statement>) -> Self {
        Tree { statements, id_seq: 0 }
    }

    /// Top-level entry points in document order.
    pub fn labels(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter().filter(|s| s.label_name().is_some())
    }

    pub fn label_names(&self) -> Vec<&str> {
        self.labels().filter_map(|s| s.label_name()).collect()
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.find_label(name).is_some()
    }

    pub fn find_label(&self, name: &str) -> Option<&Statement> {
        self.statements.iter().find(|s| s.label_name() == Some(name))
    }

    pub fn find_label_mut(&mut self, name: &str) -> Option<&mut Statement> {
        self.statements.iter_mut().find(|s| s.label_name() == Some(name))
    }

    pub fn find(&self, id: &NodeId) -> Option<&Statement> {
        crate::walk::find(&self.statements, id)
    }

    pub fn find_mut(&mut self, id: &NodeId) -> Option<&mut Statement> {
        crate::walk::find_mut(&mut self.statements, id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.find(id).is_some()
    }

    /// Number of statements at every depth.
    pub fn statement_count(&self) -> usize {
        let mut n = 0;
        crate::walk::visit(&self.statements, &mut |_| n += 1);
        n
    }

    pub fn label_count(&self) -> usize {
        self.labels().count()
    }

    /// Fresh id that does not collide with any statement in the tree.
    pub fn mint_id(&mut self) -> NodeId {
        loop {
            self.id_seq += 1;
            let id = NodeId(format!("stmt-{}", self.id_seq));
            if !self.contains(&id) {
                return id;
            }
        }
    }
}
