use crate::graph::{GraphNode, NodeData, Position};
use crate::model::{GraphNodeId, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    Created,
    Connected,
    Synced,
    Orphan,
}

impl PendingStatus {
    pub fn can_become(self, next: PendingStatus) -> bool {
        use PendingStatus::*;
        matches!(
            (self, next),
            (Created, Connected)
                | (Connected, Synced)
                | (Created, Orphan)
                | (Connected, Orphan)
                | (Orphan, Connected)
        )
    }
}

/// Where a materialized node ended up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub statement: NodeId,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingNode {
    pub node: GraphNode,
    pub status: PendingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub connected_from: Option<GraphNodeId>,
    pub connected_port: Option<String>,
    pub synced: Option<SyncRecord>,
    // creation order; timestamps can tie
    seq: u64,
}

impl PendingNode {
    pub fn id(&self) -> &GraphNodeId {
        &self.node.id
    }
}

/// Staging area for nodes drawn in the graph that have no statement yet.
/// A node absent from the pool lives purely in the tree.
#[derive(Clone, Debug, Default)]
pub struct PendingPool {
    nodes: HashMap<GraphNodeId, PendingNode>,
    next_seq: u64,
}

impl PendingPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Fresh `pending-<n>` id not present in the pool.
    pub fn mint_id(&mut self) -> GraphNodeId {
        loop {
            let id = GraphNodeId(format!("pending-{}", self.bump()));
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    /// Stages `node` in `created` state. Replaces any entry with the same id.
    pub fn add(&mut self, node: GraphNode) -> &PendingNode {
        let now = Utc::now();
        let seq = self.bump();
        let id = node.id.clone();
        let entry = PendingNode {
            node,
            status: PendingStatus::Created,
            created_at: now,
            updated_at: now,
            connected_from: None,
            connected_port: None,
            synced: None,
            seq,
        };
        self.nodes.insert(id.clone(), entry);
        &self.nodes[&id]
    }

    pub fn create(&mut self, data: NodeData, position: Position) -> GraphNodeId {
        let id = self.mint_id();
        self.add(GraphNode::new(id.clone(), data, position));
        id
    }

    pub fn remove(&mut self, id: &GraphNodeId) -> Option<PendingNode> {
        self.nodes.remove(id)
    }

    pub fn get(&self, id: &GraphNodeId) -> Option<&PendingNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &GraphNodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// All entries in creation order.
    pub fn get_all(&self) -> Vec<&PendingNode> {
        let mut all: Vec<&PendingNode> = self.nodes.values().collect();
        all.sort_by_key(|p| p.seq);
        all
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn with_status(&self, status: PendingStatus) -> Vec<&PendingNode> {
        self.get_all().into_iter().filter(|p| p.status == status).collect()
    }

    /// Applies a lifecycle transition. Returns false (and changes nothing) for
    /// unknown ids and transitions the lifecycle does not allow. Re-applying
    /// the current status is accepted as a no-op.
    pub fn transition(&mut self, id: &GraphNodeId, status: PendingStatus) -> bool {
        let Some(p) = self.nodes.get_mut(id) else {
            return false;
        };
        if p.status == status {
            return true;
        }
        if !p.status.can_become(status) {
            log::debug!("pending {}: refused {:?} -> {:?}", id, p.status, status);
            return false;
        }
        p.status = status;
        p.updated_at = Utc::now();
        true
    }

    /// Records the incoming connection and moves the node to `connected`.
    pub fn connect(&mut self, id: &GraphNodeId, from: &GraphNodeId, port: Option<&str>) -> bool {
        if !self.transition(id, PendingStatus::Connected) {
            return false;
        }
        if let Some(p) = self.nodes.get_mut(id) {
            p.connected_from = Some(from.clone());
            p.connected_port = port.map(str::to_string);
        }
        true
    }

    /// Forgets the incoming connection; status is left for the next sweep.
    pub fn disconnect(&mut self, id: &GraphNodeId) -> bool {
        match self.nodes.get_mut(id) {
            Some(p) => {
                p.connected_from = None;
                p.connected_port = None;
                p.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn mark_synced(&mut self, id: &GraphNodeId, record: SyncRecord) -> bool {
        if !self.transition(id, PendingStatus::Synced) {
            return false;
        }
        if let Some(p) = self.nodes.get_mut(id) {
            p.synced = Some(record);
        }
        true
    }

    /// `mark_synced` for nodes written without a drawn connection: staged
    /// entry points and placed orphans pass through `connected` first.
    pub fn promote(&mut self, id: &GraphNodeId, record: SyncRecord) -> bool {
        let status = self.nodes.get(id).map(|p| p.status);
        if matches!(status, Some(PendingStatus::Created | PendingStatus::Orphan)) {
            self.transition(id, PendingStatus::Connected);
        }
        self.mark_synced(id, record)
    }

    pub fn update_data(&mut self, id: &GraphNodeId, data: NodeData) -> bool {
        match self.nodes.get_mut(id) {
            Some(p) => {
                p.node.data = data;
                p.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn update_position(&mut self, id: &GraphNodeId, position: Position) -> bool {
        match self.nodes.get_mut(id) {
            Some(p) => {
                p.node.position = position;
                p.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}
