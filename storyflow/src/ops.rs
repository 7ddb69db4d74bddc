//! Editing session: the tree, its graph, staged nodes and history.
//!
//! Every graph edit goes through [`OperationHandler`]. Tree effects are
//! applied through [`AstSynchronizer`], the graph is rebuilt afterwards and
//! each user operation that changes the tree leaves exactly one undo step.

use crate::algorithms::build::{build_graph_with, entry_point_id, BuildOptions};
use crate::algorithms::resolve::Resolver;
use crate::error::{Result, SyncError};
use crate::graph::{EdgeKind, EdgeTarget, Graph, GraphEdge, GraphNode, LineContent, NodeData, Position};
use crate::history::History;
use crate::model::{EdgeId, FlowKind, GraphNodeId, NodeId, Tree};
use crate::pending::{PendingPool, PendingStatus, SyncRecord};
use crate::sync::{AstSynchronizer, DialogueSpec, InsertTarget};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// What an operation did, for the UI to patch its view.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OpOutcome {
    pub tree_changed: bool,
    /// Pending nodes that reached the tree during the operation.
    pub synced: Vec<GraphNodeId>,
    pub removed_edges: Vec<EdgeId>,
    pub removed_statements: Vec<NodeId>,
    pub failures: Vec<SyncError>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CommitReport {
    pub synced: Vec<GraphNodeId>,
    /// Entry points created, including `orphan_<n>` holders.
    pub labels: Vec<String>,
    /// Nodes left in the pool because nothing attaches them.
    pub orphans: Vec<GraphNodeId>,
    pub failures: Vec<SyncError>,
}

// Connection between nodes that are not both in the tree yet. Drawn, never
// written.
#[derive(Clone, Debug, PartialEq)]
struct Link {
    source: GraphNodeId,
    port: Option<String>,
    target: GraphNodeId,
    kind: EdgeKind,
}

pub struct OperationHandler {
    tree: Tree,
    graph: Graph,
    pool: PendingPool,
    links: Vec<Link>,
    layout: HashMap<GraphNodeId, Position>,
    history: History<Tree>,
    // synced pending id -> first statement written for it
    aliases: HashMap<GraphNodeId, NodeId>,
    sync: AstSynchronizer,
    options: BuildOptions,
    orphan_seq: u64,
}

impl OperationHandler {
    pub fn new(tree: Tree) -> Self {
        Self::with_history_capacity(tree, crate::history::DEFAULT_CAPACITY)
    }

    pub fn with_history_capacity(tree: Tree, capacity: usize) -> Self {
        let mut h = OperationHandler {
            tree,
            graph: Graph::new(),
            pool: PendingPool::new(),
            links: Vec::new(),
            layout: HashMap::new(),
            history: History::with_capacity(capacity),
            aliases: HashMap::new(),
            sync: AstSynchronizer::new(),
            options: BuildOptions::default(),
            orphan_seq: 0,
        };
        h.rebuild();
        h
    }

    pub fn set_build_options(&mut self, options: BuildOptions) {
        self.options = options;
        self.rebuild();
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Graph derived from the tree, with moved nodes at their new positions.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn pool(&self) -> &PendingPool {
        &self.pool
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Everything the editor draws: the derived graph plus pending nodes
    /// and the links between not-yet-written nodes.
    pub fn view(&self) -> Graph {
        let mut g = self.graph.clone();
        for p in self.pool.get_all() {
            g.add_node(p.node.clone());
        }
        for link in &self.links {
            g.add_edge(self.link_edge(link));
        }
        g
    }

    pub fn diagnostics(&self) -> Vec<SyncError> {
        self.graph.diagnostics()
    }

    /// Current id of a node, following pending ids that have since been
    /// written to the tree.
    pub fn resolve_id(&self, id: &GraphNodeId) -> GraphNodeId {
        self.aliases
            .get(id)
            .and_then(|stmt| self.graph.owner_of(stmt))
            .map(|n| n.id.clone())
            .unwrap_or_else(|| id.clone())
    }

    fn link_edge(&self, link: &Link) -> GraphEdge {
        GraphEdge::new(
            &self.resolve_id(&link.source),
            link.port.as_deref(),
            EdgeTarget::Resolved(self.resolve_id(&link.target)),
            link.kind,
        )
    }

    fn rebuild(&mut self) {
        self.graph = build_graph_with(&self.tree, &self.options);
        for node in &mut self.graph.nodes {
            if let Some(pos) = self.layout.get(&node.id) {
                node.position = *pos;
            }
        }
        let graph = &self.graph;
        let pool = &self.pool;
        let aliases = &self.aliases;
        let alive = |id: &GraphNodeId| {
            pool.contains(id)
                || graph.contains(id)
                || aliases.get(id).is_some_and(|stmt| graph.owner_of(stmt).is_some())
        };
        self.links.retain(|l| {
            alive(&l.source) && alive(&l.target) && (pool.contains(&l.source) || pool.contains(&l.target))
        });
    }

    /// Runs `f` as one undoable step. On error the tree is put back.
    fn transact<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let before = self.tree.clone();
        match f(self) {
            Ok(r) => {
                if self.tree != before {
                    self.history.record(before);
                }
                Ok(r)
            }
            Err(e) => {
                if self.tree != before {
                    self.tree = before;
                    self.rebuild();
                }
                log::warn!("operation rejected: {}", e);
                Err(e)
            }
        }
    }

    fn set_tree(&mut self, tree: Tree) -> bool {
        if tree == self.tree {
            return false;
        }
        self.tree = tree;
        self.rebuild();
        true
    }

    // -- creation and connection --

    /// Stages a new node in the pool; the tree is not touched.
    pub fn create_node(&mut self, data: NodeData, position: Position) -> GraphNodeId {
        let id = self.pool.create(data, position);
        log::debug!("created pending {}", id);
        id
    }

    pub fn connect_nodes(
        &mut self,
        source: &GraphNodeId,
        source_port: Option<&str>,
        target: &GraphNodeId,
    ) -> Result<OpOutcome> {
        let source = self.resolve_id(source);
        let target = self.resolve_id(target);
        if source == target {
            return Err(SyncError::connection("a node cannot connect to itself"));
        }
        let source_data = match self.pool.get(&source) {
            Some(p) => p.node.data.clone(),
            None => self.graph.node(&source).ok_or_else(|| SyncError::missing(&source))?.data.clone(),
        };
        if let Some(port) = source_port {
            if source_data.port_index(port).is_none() {
                return Err(SyncError::connection(format!("{} has no port '{}'", source, port)));
            }
        }

        if let Some(p) = self.pool.get(&target) {
            if p.node.is_entry_point() {
                return Err(SyncError::connection("commit the entry point before connecting to it"));
            }
            return self.transact(|h| {
                if !h.pool.connect(&target, &source, source_port) {
                    return Err(SyncError::connection(format!("{} cannot be reconnected", target)));
                }
                h.links.retain(|l| l.target != target);
                h.links.push(Link {
                    source: source.clone(),
                    port: source_port.map(str::to_string),
                    target: target.clone(),
                    kind: EdgeKind::Sequential,
                });
                Ok(h.flush())
            });
        }

        let target_node = self.graph.node(&target).ok_or_else(|| SyncError::missing(&target))?;
        if let Some(name) = target_node.entry_name().map(str::to_string) {
            if self.pool.contains(&source) {
                return self.link_pending_to_entry(&source, source_port, &target, &name);
            }
            return self.transact(|h| {
                let changed = h.connect_to_entry(&source, source_port, &name)?;
                Ok(OpOutcome { tree_changed: changed, ..OpOutcome::default() })
            });
        }

        // Existing non-entry nodes already have their place in the tree.
        let exists = self.graph.edges.iter().any(|e| {
            e.source == source
                && e.source_port.as_deref() == source_port
                && e.target.node() == Some(&target)
                && e.kind == EdgeKind::Sequential
        });
        if exists {
            return Ok(OpOutcome::default());
        }
        let owner = Resolver::new(&self.graph).resolve_node_label(&target);
        Err(SyncError::connection(match owner {
            Some(label) => format!("{} already belongs to '{}'", target, label),
            None => format!("{} is already in the tree", target),
        }))
    }

    fn link_pending_to_entry(
        &mut self,
        source: &GraphNodeId,
        port: Option<&str>,
        target: &GraphNodeId,
        name: &str,
    ) -> Result<OpOutcome> {
        let kind = match self.pool.get(source).map(|p| &p.node.data) {
            Some(NodeData::Call { .. }) => EdgeKind::Call,
            _ => EdgeKind::Jump,
        };
        if let Some(data) = self.pool.get(source).map(|p| p.node.data.clone()) {
            match data {
                NodeData::Jump { .. } => {
                    self.pool.update_data(source, NodeData::Jump { target: name.to_string() });
                }
                NodeData::Call { .. } => {
                    self.pool.update_data(source, NodeData::Call { target: name.to_string() });
                }
                _ => {}
            }
        }
        self.links.retain(|l| !(l.source == *source && l.port.as_deref() == port && l.kind != EdgeKind::Sequential));
        self.links.push(Link {
            source: source.clone(),
            port: port.map(str::to_string),
            target: target.clone(),
            kind,
        });
        Ok(OpOutcome::default())
    }

    /// Writes a jump to entry point `name` for a connection drawn from a
    /// node that is already in the tree.
    fn connect_to_entry(&mut self, source: &GraphNodeId, port: Option<&str>, name: &str) -> Result<bool> {
        let src = self.graph.node(source).cloned().ok_or_else(|| SyncError::missing(source))?;
        let first = src.statements.first().cloned();
        let mut tree = self.tree.clone();
        match (&src.data, port) {
            (NodeData::Menu { .. }, Some(p)) | (NodeData::Conditional { .. }, Some(p)) => {
                let index = src.data.port_index(p).ok_or_else(|| SyncError::connection(format!("unknown port '{}'", p)))?;
                let owner = first.ok_or_else(|| SyncError::missing(source))?;
                if matches!(src.data, NodeData::Menu { .. }) {
                    self.sync.insert_jump_into_choice(&owner, index, name, &mut tree)?;
                } else {
                    self.sync.insert_jump_into_condition_branch(&owner, index, name, &mut tree)?;
                }
            }
            (NodeData::Jump { .. }, None) | (NodeData::Call { .. }, None) => {
                let stmt = first.ok_or_else(|| SyncError::missing(source))?;
                self.sync.update_flow_target(&stmt, name, &mut tree);
            }
            (NodeData::EntryPoint { name: from, .. }, None) => {
                self.sync
                    .insert_jump_into_label(from, name, &mut tree, None)
                    .ok_or_else(|| SyncError::MissingLabel { label: from.clone() })?;
            }
            (_, None) => {
                let label = Resolver::new(&self.graph)
                    .resolve_node_label(source)
                    .ok_or_else(|| SyncError::connection(format!("{} is not attached to an entry point", source)))?;
                let anchor = src.anchor().cloned().ok_or_else(|| SyncError::missing(source))?;
                self.sync
                    .insert_jump_into_label(&label, name, &mut tree, Some(&anchor))
                    .ok_or_else(|| SyncError::missing(&anchor))?;
            }
            (_, Some(p)) => return Err(SyncError::connection(format!("{} has no port '{}'", source, p))),
        }
        Ok(self.set_tree(tree))
    }

    /// Pending ids whose source has since been written now point at the
    /// source's current graph node.
    fn repoint(&mut self) {
        let moves: Vec<(GraphNodeId, GraphNodeId, Option<String>)> = self
            .pool
            .get_all()
            .into_iter()
            .filter_map(|p| {
                let from = p.connected_from.as_ref()?;
                if self.pool.contains(from) {
                    return None;
                }
                let now = self.resolve_id(from);
                (now != *from).then(|| (p.id().clone(), now, p.connected_port.clone()))
            })
            .collect();
        for (id, from, port) in moves {
            self.pool.connect(&id, &from, port.as_deref());
        }
    }

    /// Writes every connected pending node that can be placed. Entry links
    /// drawn from a written node become jumps.
    fn flush(&mut self) -> OpOutcome {
        self.repoint();
        let mut out = OpOutcome::default();
        if self.pool.with_status(PendingStatus::Connected).is_empty() {
            return out;
        }
        let report = self.sync.sync_to_ast(&self.graph, &self.pool, &self.tree);
        out.failures = report.failures;
        if report.synced.is_empty() {
            return out;
        }
        let written: HashSet<&GraphNodeId> = report.synced.iter().map(|(id, _)| id).collect();
        let entry_links: Vec<Link> = self
            .links
            .iter()
            .filter(|l| written.contains(&l.source) && l.kind != EdgeKind::Sequential)
            .cloned()
            .collect();
        out.tree_changed = self.set_tree(report.tree);
        for (id, rec) in report.synced {
            self.adopt(&id, rec);
            out.synced.push(id);
        }
        for link in entry_links {
            let source = self.resolve_id(&link.source);
            let Some(name) = self.graph.node(&link.target).and_then(|n| n.entry_name()).map(str::to_string) else {
                continue;
            };
            match self.connect_to_entry(&source, link.port.as_deref(), &name) {
                Ok(changed) => out.tree_changed |= changed,
                Err(e) => out.failures.push(e),
            }
        }
        self.rebuild();
        out
    }

    /// Retires a pending node that now lives in the tree. The graph must
    /// already be rebuilt from the tree holding `rec.statement`.
    fn adopt(&mut self, id: &GraphNodeId, rec: SyncRecord) {
        let stmt = rec.statement.clone();
        let pos = self.pool.get(id).map(|p| p.node.position);
        if !self.pool.promote(id, rec) {
            log::warn!("pending {} could not be marked synced", id);
        }
        self.pool.remove(id);
        self.aliases.insert(id.clone(), stmt.clone());
        if let (Some(pos), Some(node)) = (pos, self.graph.owner_of(&stmt)) {
            // a pending block merged into an existing one keeps that one's place
            if node.statements.first() == Some(&stmt) {
                let real = node.id.clone();
                self.layout.insert(real.clone(), pos);
                if let Some(n) = self.graph.node_mut(&real) {
                    n.position = pos;
                }
            }
        }
        log::debug!("pending {} is now {}", id, stmt);
    }

    // -- deletion --

    pub fn delete_node(&mut self, id: &GraphNodeId) -> Result<OpOutcome> {
        let id = self.resolve_id(id);
        if self.pool.contains(&id) {
            let removed_edges: Vec<EdgeId> = self
                .links
                .iter()
                .filter(|l| l.source == id || l.target == id)
                .map(|l| self.link_edge(l).id)
                .collect();
            self.pool.remove(&id);
            self.links.retain(|l| l.source != id && l.target != id);
            self.detach_from(&id);
            self.layout.remove(&id);
            log::debug!("discarded pending {}", id);
            return Ok(OpOutcome { removed_edges, ..OpOutcome::default() });
        }
        let outcome = self
            .sync
            .delete_node(&id, &self.graph, &self.tree)
            .ok_or_else(|| SyncError::missing(&id))?;
        self.transact(|h| {
            let tree_changed = h.set_tree(outcome.tree);
            h.layout.remove(&id);
            h.detach_from(&id);
            Ok(OpOutcome {
                tree_changed,
                removed_edges: outcome.removed_edges,
                removed_statements: outcome.removed_statements,
                ..OpOutcome::default()
            })
        })
    }

    fn detach_from(&mut self, id: &GraphNodeId) {
        let hanging: Vec<GraphNodeId> = self
            .pool
            .get_all()
            .into_iter()
            .filter(|p| p.connected_from.as_ref() == Some(id))
            .map(|p| p.id().clone())
            .collect();
        for p in hanging {
            self.pool.disconnect(&p);
        }
    }

    /// Undoes what an edge stands for. Sequential and return-flow edges are
    /// implied by statement order, so removing them is a visual no-op.
    pub fn remove_connection(&mut self, edge_id: &EdgeId) -> Result<OpOutcome> {
        if let Some(pos) = self.links.iter().position(|l| self.link_edge(l).id == *edge_id) {
            let link = self.links.remove(pos);
            if link.kind == EdgeKind::Sequential {
                self.pool.disconnect(&link.target);
            }
            return Ok(OpOutcome { removed_edges: vec![edge_id.clone()], ..OpOutcome::default() });
        }
        let edge = self.graph.edge(edge_id).cloned().ok_or_else(|| SyncError::missing(edge_id))?;
        let kind = match edge.kind {
            EdgeKind::Jump => FlowKind::Jump,
            EdgeKind::Call => FlowKind::Call,
            EdgeKind::Sequential | EdgeKind::ReturnFlow => return Ok(OpOutcome::default()),
        };
        let src = self.graph.node(&edge.source).cloned().ok_or_else(|| SyncError::missing(&edge.source))?;
        let first = src.statements.first().cloned().ok_or_else(|| SyncError::missing(&edge.source))?;
        self.transact(|h| {
            let mut tree = h.tree.clone();
            let before: Vec<EdgeId> = h.graph.edges.iter().map(|e| e.id.clone()).collect();
            match (&src.data, edge.source_port.as_deref()) {
                (NodeData::Menu { .. }, Some(p)) | (NodeData::Conditional { .. }, Some(p)) => {
                    let index = src.data.port_index(p).ok_or_else(|| SyncError::missing(edge_id))?;
                    let done = if matches!(src.data, NodeData::Menu { .. }) {
                        h.sync.remove_flow_from_choice(&first, index, kind, &mut tree)
                    } else {
                        h.sync.remove_flow_from_branch(&first, index, kind, &mut tree)
                    };
                    if !done {
                        return Err(SyncError::missing(edge_id));
                    }
                }
                // the node stays; its edge now leads nowhere
                _ => {
                    if !h.sync.update_flow_target(&first, "", &mut tree) {
                        return Err(SyncError::missing(edge_id));
                    }
                }
            }
            let tree_changed = h.set_tree(tree);
            let removed_edges = before.into_iter().filter(|id| h.graph.edge(id).is_none()).collect();
            Ok(OpOutcome { tree_changed, removed_edges, ..OpOutcome::default() })
        })
    }

    // -- commit --

    /// Marks staged nodes that nothing attaches to an entry point as orphans.
    pub fn sweep_orphans(&mut self) -> Vec<GraphNodeId> {
        let candidates: Vec<GraphNodeId> = self
            .pool
            .get_all()
            .into_iter()
            .filter(|p| matches!(p.status, PendingStatus::Created | PendingStatus::Connected))
            .filter(|p| !p.node.is_entry_point())
            .map(|p| p.id().clone())
            .collect();
        let mut marked = Vec::new();
        for id in candidates {
            if !self.attached(&id) && self.pool.transition(&id, PendingStatus::Orphan) {
                marked.push(id);
            }
        }
        marked
    }

    fn attached(&self, id: &GraphNodeId) -> bool {
        let resolver = Resolver::new(&self.graph);
        let mut seen: HashSet<GraphNodeId> = HashSet::new();
        let mut cur = id.clone();
        loop {
            if !seen.insert(cur.clone()) {
                return false;
            }
            let Some(p) = self.pool.get(&cur) else {
                return resolver.is_connected_to_scene(&cur);
            };
            if p.node.is_entry_point() {
                return true;
            }
            match &p.connected_from {
                Some(from) => cur = self.resolve_id(from),
                None => return false,
            }
        }
    }

    /// Moves the pool into the tree: staged entry points become labels,
    /// connected nodes are written where they attach. Unattached nodes are
    /// reported and stay staged unless `include_orphans`, in which case
    /// each chain gets an `orphan_<n>` label of its own.
    pub fn commit_pending_nodes(&mut self, include_orphans: bool) -> CommitReport {
        let mut report = CommitReport::default();
        let result = self.transact(|h| {
            let entries: Vec<(GraphNodeId, String)> = h
                .pool
                .get_all()
                .into_iter()
                .filter(|p| p.status != PendingStatus::Synced)
                .filter_map(|p| p.node.entry_name().map(|n| (p.id().clone(), n.to_string())))
                .collect();
            for (id, name) in entries {
                let mut tree = h.tree.clone();
                match h.sync.add_label(&name, &mut tree, None) {
                    Ok(stmt) => {
                        h.set_tree(tree);
                        h.adopt(&id, SyncRecord { statement: stmt, label: name.clone() });
                        report.labels.push(name);
                    }
                    Err(e) => report.failures.push(SyncError::SyncFailed { node: id, reason: e.to_string() }),
                }
            }

            let out = h.flush();
            report.synced.extend(out.synced);
            report.failures.extend(out.failures);

            if include_orphans {
                h.place_orphans(&mut report);
            }
            Ok(())
        });
        if let Err(e) = result {
            report.failures.push(e);
        }
        self.sweep_orphans();
        report.orphans = self.pool.get_all().into_iter().map(|p| p.id().clone()).collect();
        log::debug!(
            "commit: {} synced, {} labels, {} left staged",
            report.synced.len(),
            report.labels.len(),
            report.orphans.len()
        );
        report
    }

    fn next_orphan_label(&mut self) -> String {
        loop {
            self.orphan_seq += 1;
            let name = format!("orphan_{}", self.orphan_seq);
            if !self.tree.has_label(&name) {
                return name;
            }
        }
    }

    fn place_orphans(&mut self, report: &mut CommitReport) {
        let mut failed: HashSet<GraphNodeId> = HashSet::new();
        loop {
            let staged: Vec<(GraphNodeId, Option<GraphNodeId>, NodeData)> = self
                .pool
                .get_all()
                .into_iter()
                .filter(|p| !failed.contains(p.id()))
                .map(|p| (p.id().clone(), p.connected_from.clone(), p.node.data.clone()))
                .collect();
            // chain heads first; whatever hangs off them follows in the flush
            let head = staged
                .iter()
                .position(|(_, from, _)| {
                    from.as_ref().map_or(true, |f| !self.pool.contains(f) || failed.contains(f))
                })
                .unwrap_or(0);
            let Some((id, _, data)) = staged.into_iter().nth(head) else {
                break;
            };

            let name = self.next_orphan_label();
            let mut tree = self.tree.clone();
            let placed = self.sync.add_label(&name, &mut tree, None).and_then(|_| {
                let target = InsertTarget::Label { label: name.clone(), after: None };
                self.sync.materialize(&data, &target, &mut tree)
            });
            match placed {
                Ok((first, _)) => {
                    self.set_tree(tree);
                    self.adopt(&id, SyncRecord { statement: first, label: name.clone() });
                    report.labels.push(name);
                    report.synced.push(id);
                    let out = self.flush();
                    report.synced.extend(out.synced);
                    report.failures.extend(out.failures);
                }
                Err(e) => {
                    report.failures.push(SyncError::SyncFailed { node: id.clone(), reason: e.to_string() });
                    failed.insert(id);
                }
            }
        }
    }

    // -- edits --

    /// Positions are layout only; the tree never changes.
    pub fn move_node(&mut self, id: &GraphNodeId, position: Position) -> bool {
        let id = self.resolve_id(id);
        if self.pool.update_position(&id, position) {
            return true;
        }
        match self.graph.node_mut(&id) {
            Some(node) => {
                node.position = position;
                self.layout.insert(id, position);
                true
            }
            None => false,
        }
    }

    /// Replaces a node's payload. Staged nodes take any payload; nodes in
    /// the tree keep their type and have the difference written back.
    pub fn update_node_data(&mut self, id: &GraphNodeId, data: NodeData) -> Result<OpOutcome> {
        let id = self.resolve_id(id);
        if self.pool.update_data(&id, data.clone()) {
            return Ok(OpOutcome::default());
        }
        let node = self.graph.node(&id).cloned().ok_or_else(|| SyncError::missing(&id))?;
        if node.node_type() != data.node_type() {
            return Err(SyncError::InvalidDocument(format!(
                "{} is a {:?} node, not {:?}",
                id,
                node.node_type(),
                data.node_type()
            )));
        }
        self.transact(|h| {
            let mut tree = h.tree.clone();
            h.write_node_data(&node, &data, &mut tree)?;
            let tree_changed = h.set_tree(tree);
            Ok(OpOutcome { tree_changed, ..OpOutcome::default() })
        })
    }

    fn write_node_data(&self, node: &GraphNode, data: &NodeData, tree: &mut Tree) -> Result<()> {
        let first = node.statements.first().cloned().ok_or_else(|| SyncError::missing(&node.id))?;
        match data {
            NodeData::EntryPoint { name, .. } => {
                let old = node.entry_name().unwrap_or_default();
                self.sync.rename_label(old, name, tree)?;
            }
            NodeData::Jump { target } | NodeData::Call { target } => {
                self.sync.update_flow_target(&first, target, tree);
            }
            NodeData::Return => {}
            NodeData::Menu { prompt, ports } => {
                let old = node.data.ports().len();
                if ports.len() != old {
                    return Err(SyncError::OutOfRange { what: "choice", index: ports.len(), len: old });
                }
                self.sync.update_menu_prompt(&first, prompt.as_deref(), tree);
                for (i, port) in ports.iter().enumerate() {
                    self.sync.update_choice_text(&first, i, &port.label, tree)?;
                }
            }
            NodeData::Conditional { ports } => {
                let old = node.data.ports().len();
                if ports.len() != old {
                    return Err(SyncError::OutOfRange { what: "branch", index: ports.len(), len: old });
                }
                for (i, port) in ports.iter().enumerate() {
                    let cond = (!(i + 1 == ports.len() && port.label == "else")).then_some(port.label.as_str());
                    self.sync.update_branch_condition(&first, i, cond, tree)?;
                }
            }
            NodeData::Block { lines } => {
                let kept: HashSet<&NodeId> = lines.iter().filter_map(|l| l.statement.as_ref()).collect();
                let mut prev: Option<NodeId> = None;
                for line in lines {
                    match &line.statement {
                        Some(stmt) => {
                            if let LineContent::Dialogue { speaker, text, attributes } = &line.content {
                                let spec = DialogueSpec {
                                    speaker: speaker.clone(),
                                    text: text.clone(),
                                    attributes: attributes.clone(),
                                };
                                self.sync.update_dialogue(stmt, spec, tree);
                            }
                            prev = Some(stmt.clone());
                        }
                        None => {
                            let kind = crate::sync::line_kind(&line.content);
                            let id = match &prev {
                                Some(p) => self.sync.insert_after(p, kind, tree)?,
                                None => self.sync.insert_before(&first, kind, tree)?,
                            };
                            prev = Some(id);
                        }
                    }
                }
                for stmt in node.statements.iter().filter(|s| !kept.contains(s)) {
                    self.sync.remove_statement(stmt, tree);
                }
            }
        }
        Ok(())
    }

    pub fn add_label(&mut self, name: &str, position: Option<Position>) -> Result<GraphNodeId> {
        self.transact(|h| {
            let mut tree = h.tree.clone();
            h.sync.add_label(name, &mut tree, None)?;
            let id = entry_point_id(name);
            if let Some(pos) = position {
                h.layout.insert(id.clone(), pos);
            }
            h.set_tree(tree);
            Ok(id)
        })
    }

    pub fn rename_label(&mut self, old: &str, new: &str) -> Result<()> {
        self.transact(|h| {
            let mut tree = h.tree.clone();
            h.sync.rename_label(old, new, &mut tree)?;
            if let Some(pos) = h.layout.remove(&entry_point_id(old)) {
                h.layout.insert(entry_point_id(new), pos);
            }
            h.set_tree(tree);
            Ok(())
        })
    }

    /// Swaps in a freshly parsed tree, keeping the trivia of statements that
    /// did not change.
    pub fn replace_tree(&mut self, tree: Tree) -> bool {
        let merged = self.sync.merge_ast_changes(&self.tree, &tree);
        let before = self.tree.clone();
        if self.set_tree(merged.tree) {
            self.history.record(before);
            return true;
        }
        false
    }

    pub fn undo(&mut self) -> bool {
        if !self.history.can_undo() {
            return false;
        }
        let current = self.tree.clone();
        match self.history.undo(current) {
            Some(prev) => {
                self.tree = prev;
                self.rebuild();
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        if !self.history.can_redo() {
            return false;
        }
        let current = self.tree.clone();
        match self.history.redo(current) {
            Some(next) => {
                self.tree = next;
                self.rebuild();
                true
            }
            None => false,
        }
    }
}
