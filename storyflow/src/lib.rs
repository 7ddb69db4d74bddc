pub mod model;
pub mod walk;
pub mod graph;
pub mod error;
pub mod limits;
pub mod pending;
pub mod history;
pub mod sync;
pub mod ops;
pub mod algorithms {
    pub mod build;
    pub mod resolve;
}
mod json;

pub use algorithms::build::{build_graph, build_graph_with, entry_point_id, BuildOptions};
pub use algorithms::resolve::{InsertPosition, Resolver};
pub use error::{Result, SyncError};
pub use graph::{
    BlockLine, EdgeKind, EdgeTarget, ExitType, Graph, GraphEdge, GraphNode, LineContent, NodeData,
    NodeType, Port, Position,
};
pub use json::FORMAT_VERSION;
pub use model::{
    Branch, Choice, EdgeId, FlowKind, GraphNodeId, NodeId, Statement, StatementKind, Tree,
};
pub use ops::{CommitReport, OpOutcome, OperationHandler};
pub use pending::{PendingNode, PendingPool, PendingStatus, SyncRecord};
pub use sync::{
    AstSynchronizer, DeleteOutcome, DialogueSpec, InsertTarget, MenuSpec, MergeOutcome,
    ModifiedSet, SyncReport,
};

impl Tree {
    /// `{version, statements}` document.
    pub fn to_json_value(&self) -> serde_json::Value {
        json::tree_to_json_impl(self)
    }

    // Strict variant: caps, unique ids and unique entry points are checked
    pub fn from_json_value_strict(v: serde_json::Value) -> Result<Tree> {
        json::tree_from_json_impl_strict(v)
    }
}

impl Graph {
    pub fn to_json_value(&self) -> serde_json::Value {
        json::graph_to_json_impl(self)
    }
}
