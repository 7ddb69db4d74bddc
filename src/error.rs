use crate::interop::{new_obj, set_kv, to_js};
use storyflow::SyncError;
use wasm_bindgen::prelude::*;

pub fn ok(v: JsValue) -> JsValue {
    let o = new_obj();
    set_kv(&o, "ok", &JsValue::from_bool(true));
    set_kv(&o, "value", &v);
    o.into()
}

pub fn err(code: &'static str, message: impl Into<String>, data: Option<JsValue>) -> JsValue {
    let root = new_obj();
    set_kv(&root, "ok", &JsValue::from_bool(false));
    let e = new_obj();
    set_kv(&e, "code", &JsValue::from_str(code));
    set_kv(&e, "message", &JsValue::from_str(&message.into()));
    if let Some(d) = data { set_kv(&e, "data", &d); }
    set_kv(&root, "error", &e.into());
    root.into()
}

/// Core errors keep their stable code; the variant's fields ride along as
/// `data` where a UI can use them.
pub fn from_sync(e: &SyncError) -> JsValue {
    let data = match e {
        SyncError::InvalidTarget { edge, target } => {
            let d = new_obj();
            set_kv(&d, "edge", &JsValue::from_str(edge.as_str()));
            set_kv(&d, "target", &JsValue::from_str(target));
            Some(d.into())
        }
        SyncError::DuplicateLabel { name, existing } => {
            let d = new_obj();
            set_kv(&d, "name", &JsValue::from_str(name));
            set_kv(&d, "existing", &JsValue::from_str(existing.as_str()));
            Some(d.into())
        }
        SyncError::OutOfRange { what, index, len } => {
            let d = new_obj();
            set_kv(&d, "what", &JsValue::from_str(what));
            set_kv(&d, "index", &JsValue::from_f64(*index as f64));
            set_kv(&d, "len", &JsValue::from_f64(*len as f64));
            Some(d.into())
        }
        SyncError::MissingNode { id } => {
            let d = new_obj();
            set_kv(&d, "id", &JsValue::from_str(id));
            Some(d.into())
        }
        _ => None,
    };
    err(e.code(), e.to_string(), data)
}

pub fn from_result<T: serde::Serialize>(r: storyflow::Result<T>) -> JsValue {
    match r {
        Ok(v) => ok(to_js(&v)),
        Err(e) => from_sync(&e),
    }
}

#[inline]
pub fn non_finite(param: &str) -> JsValue {
    let d = new_obj(); set_kv(&d, "param", &JsValue::from_str(param));
    err("non_finite", format!("parameter '{}' must be finite", param), Some(d.into()))
}

#[inline]
pub fn missing_node(id: &str) -> JsValue {
    from_sync(&SyncError::MissingNode { id: id.to_string() })
}

#[inline]
pub fn bad_input(what: &str, e: impl std::fmt::Display) -> JsValue {
    let d = new_obj(); set_kv(&d, "param", &JsValue::from_str(what));
    err("json_parse", format!("{}: {}", what, e), Some(d.into()))
}
