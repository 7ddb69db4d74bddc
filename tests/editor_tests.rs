#![cfg(target_arch = "wasm32")]

use js_sys::Reflect;
use serde::Serialize;
use storyflow_wasm::Editor;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn get(v: &JsValue, k: &str) -> JsValue {
    Reflect::get(v, &JsValue::from_str(k)).unwrap_or(JsValue::UNDEFINED)
}

fn is_ok(v: &JsValue) -> bool {
    get(v, "ok").as_bool().unwrap_or(false)
}

fn is_err(v: &JsValue, code: &str) -> bool {
    if is_ok(v) {
        return false;
    }
    get(&get(v, "error"), "code").as_string().map_or(false, |s| s == code)
}

fn doc(v: serde_json::Value) -> JsValue {
    v.serialize(&serde_wasm_bindgen::Serializer::json_compatible()).unwrap()
}

fn story() -> JsValue {
    doc(serde_json::json!({
        "version": 1,
        "statements": [
            {"id": "l1", "type": "label", "name": "start", "body": [
                {"id": "d1", "type": "dialogue", "speaker": "e", "text": "Hello"},
                {"id": "j1", "type": "jump", "target": "park"}
            ]},
            {"id": "l2", "type": "label", "name": "park", "body": [
                {"id": "d2", "type": "dialogue", "text": "Nice"},
                {"id": "r1", "type": "return"}
            ]}
        ]
    }))
}

#[wasm_bindgen_test]
fn loads_and_exports_documents() {
    let mut ed = Editor::new();
    assert!(is_ok(&ed.from_json_res(story())));
    assert_eq!(ed.get_labels().length(), 2);
    assert_eq!(ed.pending_count(), 0);
    let out = ed.to_json();
    let first = Reflect::get_u32(&get(&out, "statements"), 0).unwrap();
    assert_eq!(get(&first, "name").as_string().as_deref(), Some("start"));
    assert!(ed.get_node("label:park").is_object());
    assert!(ed.get_node("ghost").is_null());
}

#[wasm_bindgen_test]
fn malformed_input_returns_typed_errors() {
    let mut ed = Editor::new();
    let r = ed.from_json_res(doc(serde_json::json!({"statements": [{"type": "pass"}]})));
    assert!(is_err(&r, "invalid_document"));
    let r = ed.from_json_res(JsValue::from_f64(3.0));
    assert!(is_err(&r, "invalid_document") || is_err(&r, "json_parse"));
    assert!(is_err(&ed.create_node_res(JsValue::from_str("nope"), 0.0, 0.0), "json_parse"));
    let data = doc(serde_json::json!({"type": "return"}));
    assert!(is_err(&ed.create_node_res(data, f32::NAN, 0.0), "non_finite"));
    assert_eq!(ed.pending_count(), 0, "state mutated on error");
}

#[wasm_bindgen_test]
fn editing_round_trip() {
    let mut ed = Editor::new();
    assert!(ed.from_json(story()));

    let r = ed.add_label_res("park", None, None);
    assert!(is_err(&r, "duplicate_label"));
    assert_eq!(get(&get(&get(&r, "error"), "data"), "name").as_string().as_deref(), Some("park"));

    let r = ed.add_label_res("beach", Some(10.0), Some(20.0));
    assert!(is_ok(&r));
    assert_eq!(get(&r, "value").as_string().as_deref(), Some("label:beach"));

    let jump = doc(serde_json::json!({"type": "jump", "target": "beach"}));
    let id = ed.create_node(jump, 5.0, 5.0).unwrap();
    assert_eq!(ed.pending_count(), 1);
    let r = ed.connect_nodes_res("return:r1", None, &id);
    assert!(is_ok(&r) || is_err(&r, "invalid_connection"));

    assert!(is_err(&ed.delete_node_res("ghost"), "missing_node"));
    assert!(is_err(&ed.move_node_res("ghost", 1.0, 1.0), "missing_node"));
    assert!(is_ok(&ed.move_node_res("label:start", 1.0, 1.0)));

    let r = ed.delete_node_res("label:park");
    assert!(is_ok(&r));
    assert!(ed.get_node("label:park").is_null());
    assert!(ed.can_undo());
    assert!(ed.undo());
    assert!(ed.get_node("label:park").is_object());
    assert!(ed.redo());
    assert!(ed.get_node("label:park").is_null());
}

#[wasm_bindgen_test]
fn commit_reports_plain_objects() {
    let mut ed = Editor::new();
    assert!(ed.from_json(story()));
    let data = doc(serde_json::json!({"type": "block", "lines": [{"kind": "dialogue", "text": "hey"}]}));
    let id = ed.create_node(data, 0.0, 0.0).unwrap();
    let report = ed.commit_pending_nodes(false);
    let orphans = get(&report, "orphans");
    assert!(js_sys::Array::is_array(&orphans));
    assert_eq!(Reflect::get_u32(&orphans, 0).unwrap().as_string(), Some(id));
    // already marked by the commit
    assert_eq!(ed.sweep_orphans().length(), 0);
    assert_eq!(ed.pending_count(), 1);
    let report = ed.commit_pending_nodes(true);
    let labels = get(&report, "labels");
    assert_eq!(Reflect::get_u32(&labels, 0).unwrap().as_string().as_deref(), Some("orphan_1"));
    assert_eq!(ed.pending_count(), 0);
}

#[wasm_bindgen_test]
fn fuzz_res_methods_no_abort() {
    let mut ed = Editor::new();
    assert!(ed.from_json(story()));
    let ids = ["label:start", "label:park", "block:d1", "jump:j1", "return:r1", "ghost", ""];
    let mut seed: u64 = 0x5eed_1234_abcd_0001;
    let mut rnd = || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        (seed >> 16) as u32
    };
    for _ in 0..300u32 {
        let a = ids[(rnd() as usize) % ids.len()];
        let b = ids[(rnd() as usize) % ids.len()];
        let res = match rnd() % 9 {
            0 => ed.connect_nodes_res(a, None, b),
            1 => ed.connect_nodes_res(a, Some("choice-7".into()), b),
            2 => ed.delete_node_res(a),
            3 => ed.move_node_res(a, f32::from_bits(rnd()), f32::from_bits(rnd())),
            4 => ed.remove_connection_res(&format!("{}->{}#seq", a, b)),
            5 => ed.rename_label_res("start", b),
            6 => ed.update_node_data_res(a, doc(serde_json::json!({"type": "jump", "target": b}))),
            7 => JsValue::from_bool(ed.undo()),
            _ => ed.replace_tree_res(story()),
        };
        assert!(res.is_object() || res.as_bool().is_some());
    }
    let _ = ed.get_graph();
    let _ = ed.get_diagnostics();
}
