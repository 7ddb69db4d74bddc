use serde_json::{json, Value};
use storyflow::{Choice, Statement, SyncError, Tree, FORMAT_VERSION};

fn dialogue(id: &str, text: &str) -> Value {
    json!({"id": id, "type": "dialogue", "text": text})
}

#[test]
fn document_round_trips() {
    let tree = Tree::new(vec![
        Statement::label(
            "l1",
            "start",
            vec![
                Statement::dialogue("d1", Some("e"), "Hello").with_trivia(2, "    e \"Hello\""),
                Statement::menu("m", Some("Go?"), vec![Choice::new("Yes", vec![Statement::jump("j", "end")])]),
            ],
        ),
        Statement::label("l2", "end", vec![Statement::ret("r")]),
    ]);
    let v = tree.to_json_value();
    assert_eq!(v["version"], json!(FORMAT_VERSION));
    assert_eq!(v["statements"][0]["type"], "label");
    assert_eq!(v["statements"][0]["body"][0]["raw"], "    e \"Hello\"");
    let back = Tree::from_json_value_strict(v).unwrap();
    assert_eq!(back, tree);
}

#[test]
fn bare_statement_array_is_accepted() {
    let v = json!([{"id": "l", "type": "label", "name": "a", "body": [dialogue("d", "hi")]}]);
    let tree = Tree::from_json_value_strict(v).unwrap();
    assert_eq!(tree.label_names(), vec!["a"]);
    assert_eq!(tree.statement_count(), 2);
}

#[test]
fn newer_versions_are_refused() {
    let v = json!({"version": FORMAT_VERSION + 1, "statements": []});
    let err = Tree::from_json_value_strict(v).unwrap_err();
    assert_eq!(err.code(), "invalid_document");
}

#[test]
fn malformed_statements_are_refused() {
    let v = json!({"statements": [{"id": "x", "type": "teleport"}]});
    assert_eq!(Tree::from_json_value_strict(v).unwrap_err().code(), "invalid_document");
    let v = json!({"statements": [{"type": "pass"}]});
    assert_eq!(Tree::from_json_value_strict(v).unwrap_err().code(), "invalid_document");
}

#[test]
fn duplicate_ids_are_refused() {
    let v = json!({"statements": [
        {"id": "l", "type": "label", "name": "a", "body": [dialogue("d", "one"), dialogue("d", "two")]}
    ]});
    let err = Tree::from_json_value_strict(v).unwrap_err();
    assert_eq!(err.code(), "invalid_document");
}

#[test]
fn duplicate_entry_points_are_refused() {
    let v = json!({"statements": [
        {"id": "l1", "type": "label", "name": "a", "body": []},
        {"id": "l2", "type": "label", "name": "a", "body": []}
    ]});
    let err = Tree::from_json_value_strict(v).unwrap_err();
    assert!(matches!(err, SyncError::DuplicateLabel { ref name, .. } if name == "a"));
}

#[test]
fn json_caps_exceeded_statements() {
    let too_many = 200_001usize;
    let body: Vec<_> = (0..too_many).map(|i| json!({"id": format!("p{}", i), "type": "pass"})).collect();
    let v = json!({"version": 1, "statements": [{"id": "l", "type": "label", "name": "a", "body": body}]});
    let err = Tree::from_json_value_strict(v).unwrap_err();
    assert_eq!(err.code(), "caps_exceeded");
}

#[test]
fn json_caps_exceeded_text() {
    let long = "x".repeat(64 * 1024 + 1);
    let v = json!({"statements": [{"id": "l", "type": "label", "name": "a", "body": [dialogue("d", &long)]}]});
    assert_eq!(Tree::from_json_value_strict(v).unwrap_err().code(), "caps_exceeded");

    let v = json!({"statements": [{"id": "l", "type": "label", "name": "", "body": []}]});
    assert_eq!(Tree::from_json_value_strict(v).unwrap_err().code(), "invalid_document");
}

#[test]
fn json_caps_exceeded_choices() {
    let choices: Vec<_> = (0..257).map(|i| json!({"text": format!("c{}", i)})).collect();
    let v = json!({"statements": [
        {"id": "l", "type": "label", "name": "a", "body": [{"id": "m", "type": "menu", "choices": choices}]}
    ]});
    assert_eq!(Tree::from_json_value_strict(v).unwrap_err().code(), "caps_exceeded");
}

#[test]
fn json_caps_exceeded_depth() {
    // deep documents need more stack than the default test thread has
    let code = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let mut inner = json!({"id": "leaf", "type": "pass"});
            for i in 0..70 {
                inner = json!({"id": format!("m{}", i), "type": "menu", "choices": [{"text": "go", "body": [inner]}]});
            }
            let v = json!({"statements": [{"id": "l", "type": "label", "name": "a", "body": [inner]}]});
            Tree::from_json_value_strict(v).unwrap_err().code()
        })
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(code, "caps_exceeded");
}

#[test]
fn graph_serializes_with_typed_nodes() {
    let tree = Tree::new(vec![Statement::label("l", "a", vec![Statement::jump("j", "nowhere")])]);
    let v = storyflow::build_graph(&tree).to_json_value();
    assert_eq!(v["nodes"][0]["data"]["type"], "entry_point");
    assert_eq!(v["nodes"][1]["data"]["type"], "jump");
    assert_eq!(v["edges"][0]["target"], json!({"state": "unresolved", "value": "nowhere"}));
    assert_eq!(v["edges"][0]["valid"], json!(false));
}
