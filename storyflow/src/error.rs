use crate::model::{EdgeId, GraphNodeId, NodeId};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

/// Everything the core reports instead of panicking.
///
/// `code()` is stable and is what UIs key their messages on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("edge {edge} targets unknown entry point '{target}'")]
    InvalidTarget { edge: EdgeId, target: String },

    #[error("entry point '{label}' does not exist")]
    MissingLabel { label: String },

    #[error("entry point '{name}' already exists")]
    DuplicateLabel { name: String, existing: NodeId },

    #[error("'{name}' is not a valid entry point name: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("could not sync node {node}: {reason}")]
    SyncFailed { node: GraphNodeId, reason: String },

    #[error("{what} index {index} out of range (len {len})")]
    OutOfRange { what: &'static str, index: usize, len: usize },

    #[error("no such node: {id}")]
    MissingNode { id: String },

    #[error("invalid connection: {reason}")]
    InvalidConnection { reason: String },

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("caps exceeded: {0}")]
    CapsExceeded(String),
}

impl SyncError {
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::InvalidTarget { .. } => "invalid_target",
            SyncError::MissingLabel { .. } => "missing_label",
            SyncError::DuplicateLabel { .. } => "duplicate_label",
            SyncError::InvalidName { .. } => "invalid_name",
            SyncError::SyncFailed { .. } => "sync_failed",
            SyncError::OutOfRange { .. } => "out_of_range",
            SyncError::MissingNode { .. } => "missing_node",
            SyncError::InvalidConnection { .. } => "invalid_connection",
            SyncError::InvalidDocument(_) => "invalid_document",
            SyncError::CapsExceeded(_) => "caps_exceeded",
        }
    }

    pub(crate) fn missing(id: impl ToString) -> Self {
        SyncError::MissingNode { id: id.to_string() }
    }

    pub(crate) fn connection(reason: impl Into<String>) -> Self {
        SyncError::InvalidConnection { reason: reason.into() }
    }
}

// Wire form is `{code, message}`, what UIs branch on.
impl Serialize for SyncError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("SyncError", 2)?;
        st.serialize_field("code", self.code())?;
        st.serialize_field("message", &self.to_string())?;
        st.end()
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
