use wasm_bindgen::prelude::*;
mod api;
mod error;
mod interop;

/// Editing session handle held by the JavaScript UI.
#[wasm_bindgen]
pub struct Editor {
    pub(crate) inner: storyflow::OperationHandler,
}

impl Editor {
    pub fn rs_new() -> Editor {
        Editor { inner: storyflow::OperationHandler::new(storyflow::Tree::default()) }
    }

    pub fn rs_load(&mut self, tree: storyflow::Tree) {
        self.inner = storyflow::OperationHandler::new(tree);
    }

    // Looks in the view so pending nodes count too.
    pub fn rs_has_node(&self, id: &str) -> bool {
        let id = self.inner.resolve_id(&storyflow::GraphNodeId::from(id));
        self.inner.graph().contains(&id) || self.inner.pool().contains(&id)
    }
}
