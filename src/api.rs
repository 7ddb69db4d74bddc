use crate::error;
use crate::interop::{arr_str, to_js, warn};
use crate::Editor;
use storyflow::{EdgeId, GraphNodeId, NodeData, Position, Tree};
use wasm_bindgen::prelude::*;
type JsValue = wasm_bindgen::JsValue;

#[wasm_bindgen]
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn parse_tree(v: JsValue) -> Result<Tree, JsValue> {
    let val = serde_wasm_bindgen::from_value::<serde_json::Value>(v)
        .map_err(|e| error::bad_input("document", e))?;
    Tree::from_json_value_strict(val).map_err(|e| error::from_sync(&e))
}

fn parse_data(v: JsValue) -> Result<NodeData, JsValue> {
    serde_wasm_bindgen::from_value::<NodeData>(v).map_err(|e| error::bad_input("data", e))
}

fn finite(x: f32, y: f32) -> Result<Position, JsValue> {
    if !x.is_finite() {
        return Err(error::non_finite("x"));
    }
    if !y.is_finite() {
        return Err(error::non_finite("y"));
    }
    Ok(Position::new(x, y))
}

// Plain variants swallow the error after telling the console about it.
fn logged<T>(op: &str, r: storyflow::Result<T>) -> Option<T> {
    match r {
        Ok(v) => Some(v),
        Err(e) => {
            warn(&format!("{}: {}", op, e));
            None
        }
    }
}

#[wasm_bindgen]
impl Editor {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Editor {
        crate::Editor::rs_new()
    }

    // Documents
    pub fn to_json(&self) -> JsValue {
        to_js(&self.inner.tree().to_json_value())
    }
    pub fn from_json(&mut self, v: JsValue) -> bool {
        match parse_tree(v) {
            Ok(tree) => {
                self.rs_load(tree);
                true
            }
            Err(_) => false,
        }
    }
    pub fn from_json_res(&mut self, v: JsValue) -> JsValue {
        match parse_tree(v) {
            Ok(tree) => {
                self.rs_load(tree);
                error::ok(JsValue::TRUE)
            }
            Err(e) => e,
        }
    }
    pub fn replace_tree(&mut self, v: JsValue) -> bool {
        match parse_tree(v) {
            Ok(tree) => self.inner.replace_tree(tree),
            Err(_) => false,
        }
    }
    pub fn replace_tree_res(&mut self, v: JsValue) -> JsValue {
        match parse_tree(v) {
            Ok(tree) => error::ok(JsValue::from_bool(self.inner.replace_tree(tree))),
            Err(e) => e,
        }
    }

    // Views
    pub fn get_graph(&self) -> JsValue {
        to_js(&self.inner.view().to_json_value())
    }
    /// Graph derived from the tree alone, without pending nodes.
    pub fn get_tree_graph(&self) -> JsValue {
        to_js(&self.inner.graph().to_json_value())
    }
    pub fn get_diagnostics(&self) -> JsValue {
        to_js(&self.inner.diagnostics())
    }
    pub fn get_labels(&self) -> js_sys::Array {
        arr_str(&self.inner.tree().label_names())
    }
    pub fn pending_count(&self) -> u32 {
        self.inner.pool().len() as u32
    }
    pub fn node_count(&self) -> u32 {
        self.inner.view().node_count() as u32
    }
    pub fn edge_count(&self) -> u32 {
        self.inner.view().edge_count() as u32
    }
    pub fn get_node(&self, id: &str) -> JsValue {
        let id = self.inner.resolve_id(&GraphNodeId::from(id));
        match self.inner.view().node(&id) {
            Some(n) => to_js(n),
            None => JsValue::NULL,
        }
    }
    pub fn get_node_res(&self, id: &str) -> JsValue {
        if !self.rs_has_node(id) {
            return error::missing_node(id);
        }
        error::ok(self.get_node(id))
    }

    // Editing
    pub fn create_node(&mut self, data: JsValue, x: f32, y: f32) -> Option<String> {
        let data = parse_data(data).ok()?;
        let pos = finite(x, y).unwrap_or_default();
        Some(self.inner.create_node(data, pos).0)
    }
    pub fn create_node_res(&mut self, data: JsValue, x: f32, y: f32) -> JsValue {
        let data = match parse_data(data) {
            Ok(d) => d,
            Err(e) => return e,
        };
        match finite(x, y) {
            Ok(pos) => error::ok(JsValue::from_str(self.inner.create_node(data, pos).as_str())),
            Err(e) => e,
        }
    }
    pub fn connect_nodes(&mut self, source: &str, port: Option<String>, target: &str) -> bool {
        let r = self.inner.connect_nodes(&source.into(), port.as_deref(), &target.into());
        logged("connect_nodes", r).is_some()
    }
    pub fn connect_nodes_res(&mut self, source: &str, port: Option<String>, target: &str) -> JsValue {
        error::from_result(self.inner.connect_nodes(&source.into(), port.as_deref(), &target.into()))
    }
    pub fn delete_node(&mut self, id: &str) -> bool {
        logged("delete_node", self.inner.delete_node(&GraphNodeId::from(id))).is_some()
    }
    pub fn delete_node_res(&mut self, id: &str) -> JsValue {
        error::from_result(self.inner.delete_node(&GraphNodeId::from(id)))
    }
    pub fn remove_connection(&mut self, edge_id: &str) -> bool {
        logged("remove_connection", self.inner.remove_connection(&EdgeId::from(edge_id))).is_some()
    }
    pub fn remove_connection_res(&mut self, edge_id: &str) -> JsValue {
        error::from_result(self.inner.remove_connection(&EdgeId::from(edge_id)))
    }
    pub fn move_node(&mut self, id: &str, x: f32, y: f32) -> bool {
        match finite(x, y) {
            Ok(pos) => self.inner.move_node(&GraphNodeId::from(id), pos),
            Err(_) => false,
        }
    }
    pub fn move_node_res(&mut self, id: &str, x: f32, y: f32) -> JsValue {
        let pos = match finite(x, y) {
            Ok(p) => p,
            Err(e) => return e,
        };
        if !self.rs_has_node(id) {
            return error::missing_node(id);
        }
        error::ok(JsValue::from_bool(self.inner.move_node(&GraphNodeId::from(id), pos)))
    }
    pub fn update_node_data(&mut self, id: &str, data: JsValue) -> bool {
        match parse_data(data) {
            Ok(d) => logged("update_node_data", self.inner.update_node_data(&GraphNodeId::from(id), d)).is_some(),
            Err(_) => false,
        }
    }
    pub fn update_node_data_res(&mut self, id: &str, data: JsValue) -> JsValue {
        match parse_data(data) {
            Ok(d) => error::from_result(self.inner.update_node_data(&GraphNodeId::from(id), d)),
            Err(e) => e,
        }
    }
    pub fn commit_pending_nodes(&mut self, include_orphans: bool) -> JsValue {
        let report = self.inner.commit_pending_nodes(include_orphans);
        for f in &report.failures {
            warn(&format!("commit_pending_nodes: {}", f));
        }
        to_js(&report)
    }
    pub fn sweep_orphans(&mut self) -> js_sys::Array {
        let swept = self.inner.sweep_orphans();
        arr_str(&swept.iter().map(|id| id.as_str()).collect::<Vec<_>>())
    }

    // Entry points
    pub fn add_label(&mut self, name: &str, x: Option<f32>, y: Option<f32>) -> Option<String> {
        let pos = match (x, y) {
            (Some(x), Some(y)) => finite(x, y).ok(),
            _ => None,
        };
        logged("add_label", self.inner.add_label(name, pos)).map(|id| id.0)
    }
    pub fn add_label_res(&mut self, name: &str, x: Option<f32>, y: Option<f32>) -> JsValue {
        let pos = match (x, y) {
            (Some(x), Some(y)) => match finite(x, y) {
                Ok(p) => Some(p),
                Err(e) => return e,
            },
            _ => None,
        };
        error::from_result(self.inner.add_label(name, pos))
    }
    pub fn rename_label(&mut self, old: &str, new: &str) -> bool {
        logged("rename_label", self.inner.rename_label(old, new)).is_some()
    }
    pub fn rename_label_res(&mut self, old: &str, new: &str) -> JsValue {
        match self.inner.rename_label(old, new) {
            Ok(()) => error::ok(JsValue::TRUE),
            Err(e) => error::from_sync(&e),
        }
    }

    // History
    pub fn undo(&mut self) -> bool {
        self.inner.undo()
    }
    pub fn redo(&mut self) -> bool {
        self.inner.redo()
    }
    pub fn can_undo(&self) -> bool {
        self.inner.can_undo()
    }
    pub fn can_redo(&self) -> bool {
        self.inner.can_redo()
    }
}

impl Default for Editor {
    fn default() -> Self {
        Editor::new()
    }
}
