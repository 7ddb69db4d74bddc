use storyflow::{
    entry_point_id, BlockLine, Choice, EdgeId, EdgeKind, ExitType, GraphNodeId, LineContent,
    NodeData, NodeId, OperationHandler, PendingStatus, Port, Position, Statement, StatementKind, Tree,
};

fn two_labels() -> Tree {
    Tree::new(vec![
        Statement::label("la", "a", vec![Statement::dialogue("d1", None, "hi")]),
        Statement::label("lb", "b", vec![Statement::dialogue("d2", None, "bye")]),
    ])
}

fn chain_of_three() -> Tree {
    Tree::new(vec![
        Statement::label("la", "a", vec![Statement::dialogue("da", None, "A"), Statement::jump("ja", "b")]),
        Statement::label("lb", "b", vec![Statement::dialogue("db", None, "B"), Statement::jump("jb", "c")]),
        Statement::label("lc", "c", vec![Statement::dialogue("dc", None, "C")]),
    ])
}

fn menu_tree() -> Tree {
    Tree::new(vec![
        Statement::label(
            "ls",
            "start",
            vec![Statement::menu(
                "m",
                Some("Pick"),
                vec![
                    Choice::new("Go", vec![Statement::new("p0", StatementKind::Pass)]),
                    Choice::new("Stay", vec![Statement::dialogue("c1", None, "staying")]),
                ],
            )],
        ),
        Statement::label("le", "end", vec![]),
    ])
}

fn body<'t>(tree: &'t Tree, label: &str) -> &'t [Statement] {
    tree.find_label(label).and_then(|l| l.label_body()).unwrap()
}

fn id(s: &str) -> GraphNodeId {
    GraphNodeId::from(s)
}

fn line(text: &str) -> NodeData {
    NodeData::Block { lines: vec![BlockLine::dialogue(None, text)] }
}

#[test]
fn connecting_behind_entry_point_writes_to_body_start() {
    let mut h = OperationHandler::new(two_labels());
    let p = h.create_node(line("new"), Position::new(10.0, 20.0));
    assert_eq!(h.tree(), &two_labels());
    assert!(h.view().contains(&p));

    let out = h.connect_nodes(&entry_point_id("a"), None, &p).unwrap();
    assert!(out.tree_changed);
    assert_eq!(out.synced, vec![p.clone()]);
    assert!(h.pool().is_empty());

    let a = body(h.tree(), "a");
    assert_eq!(a.len(), 2);
    assert_eq!(a[1].id, NodeId::from("d1"));
    // the new line merged with the existing one into a single block
    let real = h.resolve_id(&p);
    assert_ne!(real, p);
    let node = h.graph().node(&real).unwrap();
    assert_eq!(node.statements.len(), 2);
    assert_eq!(node.position, Position::new(10.0, 20.0));
    assert!(h.can_undo());
}

#[test]
fn chains_of_pending_nodes_sync_once_attached() {
    let mut h = OperationHandler::new(two_labels());
    let first = h.create_node(line("one"), Position::default());
    let second = h.create_node(NodeData::Return, Position::default());

    let out = h.connect_nodes(&first, None, &second).unwrap();
    assert!(!out.tree_changed);
    assert!(!h.can_undo());
    assert_eq!(h.pool().get(&second).unwrap().status, PendingStatus::Connected);
    assert!(h.view().edges.iter().any(|e| e.source == first && e.target.node() == Some(&second)));

    let out = h.connect_nodes(&id("block:d1"), None, &first).unwrap();
    assert_eq!(out.synced, vec![first.clone(), second.clone()]);
    let a = body(h.tree(), "a");
    assert_eq!(a.len(), 3);
    assert!(matches!(a[1].kind, StatementKind::Dialogue { .. }));
    assert!(matches!(a[2].kind, StatementKind::Return { .. }));
    assert!(h.pool().is_empty());
    assert_eq!(h.resolve_id(&first), id("block:d1"));
    assert!(h.resolve_id(&second).as_str().starts_with("return:"));
    // drawn links are gone once both ends live in the tree
    assert_eq!(h.view(), h.graph().clone());
}

#[test]
fn menu_port_to_entry_point_writes_choice_jump() {
    let mut h = OperationHandler::new(menu_tree());
    let out = h.connect_nodes(&id("menu:m"), Some("choice-0"), &entry_point_id("end")).unwrap();
    assert!(out.tree_changed);
    let edge = h.graph().edge(&EdgeId::from("menu:m[choice-0]->label:end#jump")).unwrap();
    assert!(edge.valid);
    assert!(!h.tree().contains(&NodeId::from("p0")));

    let err = h.connect_nodes(&id("menu:m"), Some("choice-9"), &entry_point_id("end")).unwrap_err();
    assert_eq!(err.code(), "invalid_connection");
}

#[test]
fn block_and_entry_sources_jump_to_entry_points() {
    let mut h = OperationHandler::new(two_labels());
    h.connect_nodes(&id("block:d1"), None, &entry_point_id("b")).unwrap();
    let a = body(h.tree(), "a");
    assert_eq!(a.len(), 2);
    assert_eq!(a[1].kind, StatementKind::Jump { target: "b".into() });
    assert!(h.diagnostics().is_empty());

    // entry -> entry appends to the body, and the same jump is not duplicated
    let out = h.connect_nodes(&entry_point_id("a"), None, &entry_point_id("b")).unwrap();
    assert!(!out.tree_changed);
    assert_eq!(body(h.tree(), "a").len(), 2);
}

#[test]
fn existing_nodes_cannot_be_reattached() {
    let mut h = OperationHandler::new(menu_tree());
    // already the case: accepted as a no-op
    let out = h.connect_nodes(&entry_point_id("start"), None, &id("menu:m")).unwrap();
    assert!(!out.tree_changed);

    let err = h.connect_nodes(&id("block:c1"), None, &id("menu:m")).unwrap_err();
    assert_eq!(err.code(), "invalid_connection");
    let err = h.connect_nodes(&entry_point_id("end"), None, &entry_point_id("end")).unwrap_err();
    assert_eq!(err.code(), "invalid_connection");
    let err = h.connect_nodes(&id("ghost"), None, &entry_point_id("end")).unwrap_err();
    assert_eq!(err.code(), "missing_node");
    assert_eq!(h.tree(), &menu_tree());
    assert!(!h.can_undo());
}

#[test]
fn pending_entry_points_are_not_targets() {
    let mut h = OperationHandler::new(two_labels());
    let e = h.create_node(
        NodeData::EntryPoint { name: "chapter2".into(), preview: String::new(), exit: ExitType::FallThrough },
        Position::default(),
    );
    let err = h.connect_nodes(&entry_point_id("a"), None, &e).unwrap_err();
    assert_eq!(err.code(), "invalid_connection");
}

#[test]
fn pending_jump_linked_to_entry_point_lands_as_jump() {
    let mut h = OperationHandler::new(two_labels());
    let j = h.create_node(NodeData::Jump { target: String::new() }, Position::default());
    let out = h.connect_nodes(&j, None, &entry_point_id("b")).unwrap();
    assert!(!out.tree_changed);
    assert_eq!(h.pool().get(&j).unwrap().node.data, NodeData::Jump { target: "b".into() });
    assert!(h.view().edges.iter().any(|e| e.source == j && e.kind == EdgeKind::Jump));

    let out = h.connect_nodes(&id("block:d1"), None, &j).unwrap();
    assert!(out.tree_changed);
    assert!(out.failures.is_empty());
    let a = body(h.tree(), "a");
    assert_eq!(a.len(), 2);
    assert_eq!(a[1].kind, StatementKind::Jump { target: "b".into() });
    let real = h.resolve_id(&j);
    let edge = h.graph().edges_from(&real).find(|e| e.kind == EdgeKind::Jump).unwrap();
    assert!(edge.valid);
}

#[test]
fn deleting_entry_point_cascades_and_undoes() {
    let mut h = OperationHandler::new(chain_of_three());
    let out = h.delete_node(&entry_point_id("b")).unwrap();
    assert!(out.tree_changed);
    assert_eq!(h.tree().label_names(), vec!["a", "c"]);
    assert_eq!(body(h.tree(), "a").len(), 1);
    assert_eq!(body(h.tree(), "c"), body(&chain_of_three(), "c"));
    assert!(out.removed_statements.contains(&NodeId::from("ja")));
    assert!(out.removed_edges.contains(&EdgeId::from("jump:ja->label:b#jump")));
    assert!(h.diagnostics().is_empty());

    assert!(h.undo());
    assert_eq!(h.tree(), &chain_of_three());
    assert!(h.redo());
    assert_eq!(h.tree().label_count(), 2);
    assert!(!h.redo());
}

#[test]
fn deleting_pending_node_leaves_tree_alone() {
    let mut h = OperationHandler::new(two_labels());
    let p = h.create_node(line("draft"), Position::default());
    let out = h.delete_node(&p).unwrap();
    assert!(!out.tree_changed);
    assert!(h.pool().is_empty());
    assert!(!h.can_undo());
    assert_eq!(h.delete_node(&id("ghost")).unwrap_err().code(), "missing_node");
}

fn dialogue_texts(stmts: &[Statement]) -> Vec<&str> {
    stmts
        .iter()
        .filter_map(|s| match &s.kind {
            StatementKind::Dialogue { text, .. } => Some(text.as_str()),
            StatementKind::Pass => Some("pass"),
            _ => None,
        })
        .collect()
}

#[test]
fn staged_chain_through_menu_port_lands_in_choice() {
    let mut h = OperationHandler::new(two_labels());
    let menu = h.create_node(
        NodeData::Menu { prompt: None, ports: vec![Port::choice(0, "Go"), Port::choice(1, "Stay")] },
        Position::default(),
    );
    let inner = h.create_node(line("inside go"), Position::default());
    let out = h.connect_nodes(&menu, Some("choice-0"), &inner).unwrap();
    assert!(!out.tree_changed);

    let out = h.connect_nodes(&entry_point_id("a"), None, &menu).unwrap();
    assert_eq!(out.synced.len(), 2);
    assert!(h.pool().is_empty());

    let a = body(h.tree(), "a");
    assert_eq!(a.len(), 2);
    let StatementKind::Menu { choices, .. } = &a[0].kind else {
        panic!("menu expected at body start");
    };
    assert_eq!(dialogue_texts(&choices[0].body), vec!["inside go"]);
    assert_eq!(dialogue_texts(&choices[1].body), vec!["pass"]);
    assert_eq!(dialogue_texts(&a[1..]), vec!["hi"]);

    let real_menu = h.resolve_id(&menu);
    let real_inner = h.resolve_id(&inner);
    assert!(h.graph().edges.iter().any(|e| e.source == real_menu
        && e.source_port.as_deref() == Some("choice-0")
        && e.target.node() == Some(&real_inner)));
}

#[test]
fn staged_chain_through_branch_port_lands_in_branch() {
    let mut h = OperationHandler::new(two_labels());
    let cond = h.create_node(
        NodeData::Conditional { ports: vec![Port::branch(0, Some("flag")), Port::branch(1, None)] },
        Position::default(),
    );
    let inner = h.create_node(line("otherwise"), Position::default());
    h.connect_nodes(&cond, Some("branch-1"), &inner).unwrap();
    h.connect_nodes(&entry_point_id("b"), None, &cond).unwrap();
    assert!(h.pool().is_empty());

    let b = body(h.tree(), "b");
    let StatementKind::Conditional { branches } = &b[0].kind else {
        panic!("conditional expected at body start");
    };
    assert_eq!(branches[0].condition.as_deref(), Some("flag"));
    assert_eq!(dialogue_texts(&branches[0].body), vec!["pass"]);
    assert_eq!(branches[1].condition, None);
    assert_eq!(dialogue_texts(&branches[1].body), vec!["otherwise"]);
    assert_eq!(dialogue_texts(&b[1..]), vec!["bye"]);
}

#[test]
fn removing_connections() {
    let mut h = OperationHandler::new(chain_of_three());
    // implied by statement order
    let out = h.remove_connection(&EdgeId::from("label:a->block:da#seq")).unwrap();
    assert!(!out.tree_changed);

    let before: Vec<EdgeId> = h.graph().edges.iter().map(|e| e.id.clone()).collect();
    let out = h.remove_connection(&EdgeId::from("jump:ja->label:b#jump")).unwrap();
    assert!(out.tree_changed);
    assert!(out.removed_statements.is_empty());
    // the jump node stays, pointing nowhere
    let a = body(h.tree(), "a");
    assert_eq!(a.len(), 2);
    assert!(matches!(&a[1].kind, StatementKind::Jump { target } if target.is_empty()));
    assert!(h.graph().contains(&id("jump:ja")));
    assert!(h.graph().edge(&EdgeId::from("block:da->jump:ja#seq")).is_some());
    let gone: Vec<EdgeId> = before.into_iter().filter(|e| h.graph().edge(e).is_none()).collect();
    assert_eq!(out.removed_edges, gone);
    assert_eq!(gone, vec![EdgeId::from("jump:ja->label:b#jump")]);
    assert!(h.diagnostics().iter().any(|d| d.code() == "invalid_target"));

    let err = h.remove_connection(&EdgeId::from("nope")).unwrap_err();
    assert_eq!(err.code(), "missing_node");
}

#[test]
fn removing_choice_jump_leaves_placeholder() {
    let mut h = OperationHandler::new(menu_tree());
    h.connect_nodes(&id("menu:m"), Some("choice-0"), &entry_point_id("end")).unwrap();
    let out = h.remove_connection(&EdgeId::from("menu:m[choice-0]->label:end#jump")).unwrap();
    assert!(out.tree_changed);
    let StatementKind::Menu { choices, .. } = &h.tree().find(&NodeId::from("m")).unwrap().kind else {
        panic!("menu expected");
    };
    assert!(matches!(choices[0].body[..], [Statement { kind: StatementKind::Pass, .. }]));
}

#[test]
fn removing_pending_link_disconnects() {
    let mut h = OperationHandler::new(two_labels());
    let first = h.create_node(line("one"), Position::default());
    let second = h.create_node(NodeData::Return, Position::default());
    h.connect_nodes(&first, None, &second).unwrap();
    let edge = h
        .view()
        .edges
        .iter()
        .find(|e| e.source == first)
        .map(|e| e.id.clone())
        .unwrap();
    h.remove_connection(&edge).unwrap();
    assert!(h.pool().get(&second).unwrap().connected_from.is_none());
    assert!(h.view().edges.iter().all(|e| e.source != first));
}

#[test]
fn commit_reports_and_optionally_places_orphans() {
    let mut h = OperationHandler::new(two_labels());
    let p = h.create_node(line("lonely"), Position::default());

    let report = h.commit_pending_nodes(false);
    assert_eq!(report.orphans, vec![p.clone()]);
    assert!(report.labels.is_empty());
    assert_eq!(h.pool().get(&p).unwrap().status, PendingStatus::Orphan);
    assert_eq!(h.tree(), &two_labels());

    let report = h.commit_pending_nodes(true);
    assert!(report.orphans.is_empty());
    assert_eq!(report.labels, vec!["orphan_1".to_string()]);
    assert_eq!(report.synced, vec![p]);
    let holder = body(h.tree(), "orphan_1");
    assert_eq!(holder.len(), 1);
    assert_eq!(
        holder[0].kind,
        StatementKind::Dialogue { speaker: None, text: "lonely".into(), attributes: vec![] }
    );
    assert!(h.pool().is_empty());

    assert!(h.undo());
    assert!(!h.tree().has_label("orphan_1"));
}

#[test]
fn committing_entry_point_attaches_what_hangs_off_it() {
    let mut h = OperationHandler::new(two_labels());
    let e = h.create_node(
        NodeData::EntryPoint { name: "chapter2".into(), preview: String::new(), exit: ExitType::FallThrough },
        Position::new(100.0, 0.0),
    );
    let b = h.create_node(line("opening"), Position::default());
    let out = h.connect_nodes(&e, None, &b).unwrap();
    assert!(!out.tree_changed);

    let report = h.commit_pending_nodes(false);
    assert!(report.failures.is_empty());
    assert_eq!(report.labels, vec!["chapter2".to_string()]);
    assert_eq!(report.synced, vec![b]);
    assert!(report.orphans.is_empty());
    assert_eq!(body(h.tree(), "chapter2").len(), 1);
    assert_eq!(h.resolve_id(&e), entry_point_id("chapter2"));
    let node = h.graph().entry_point("chapter2").unwrap();
    assert_eq!(node.position, Position::new(100.0, 0.0));
}

#[test]
fn swept_orphans_can_be_reattached() {
    let mut h = OperationHandler::new(two_labels());
    let p = h.create_node(NodeData::Return, Position::default());
    assert_eq!(h.sweep_orphans(), vec![p.clone()]);
    assert_eq!(h.pool().get(&p).unwrap().status, PendingStatus::Orphan);

    let out = h.connect_nodes(&id("block:d2"), None, &p).unwrap();
    assert_eq!(out.synced, vec![p]);
    assert!(matches!(body(h.tree(), "b")[1].kind, StatementKind::Return { .. }));
}

#[test]
fn moving_nodes_never_touches_the_tree() {
    let mut h = OperationHandler::new(two_labels());
    assert!(h.move_node(&entry_point_id("a"), Position::new(500.0, 600.0)));
    assert!(!h.can_undo());
    h.add_label("z", None).unwrap();
    assert_eq!(h.graph().entry_point("a").unwrap().position, Position::new(500.0, 600.0));

    h.rename_label("a", "alpha").unwrap();
    assert_eq!(h.graph().entry_point("alpha").unwrap().position, Position::new(500.0, 600.0));

    let p = h.create_node(NodeData::Return, Position::default());
    assert!(h.move_node(&p, Position::new(1.0, 2.0)));
    assert_eq!(h.pool().get(&p).unwrap().node.position, Position::new(1.0, 2.0));
    assert!(!h.move_node(&id("ghost"), Position::default()));
}

#[test]
fn node_data_edits_write_back() {
    let mut h = OperationHandler::new(chain_of_three());
    let out = h.update_node_data(&id("jump:ja"), NodeData::Jump { target: "c".into() }).unwrap();
    assert!(out.tree_changed);
    assert!(h.graph().edge(&EdgeId::from("jump:ja->label:c#jump")).unwrap().valid);

    let err = h.update_node_data(&id("jump:ja"), NodeData::Return).unwrap_err();
    assert_eq!(err.code(), "invalid_document");

    let lines = vec![
        BlockLine {
            statement: Some(NodeId::from("db")),
            content: LineContent::Dialogue { speaker: Some("e".into()), text: "changed".into(), attributes: vec![] },
        },
        BlockLine::dialogue(None, "added"),
    ];
    h.update_node_data(&id("block:db"), NodeData::Block { lines }).unwrap();
    let b = body(h.tree(), "b");
    assert_eq!(b.len(), 3);
    assert_eq!(
        b[0].kind,
        StatementKind::Dialogue { speaker: Some("e".into()), text: "changed".into(), attributes: vec![] }
    );
    assert!(matches!(&b[1].kind, StatementKind::Dialogue { text, .. } if text == "added"));

    h.update_node_data(
        &entry_point_id("c"),
        NodeData::EntryPoint { name: "sea".into(), preview: String::new(), exit: ExitType::FallThrough },
    )
    .unwrap();
    assert_eq!(h.tree().label_names(), vec!["a", "b", "sea"]);
    assert!(h.diagnostics().is_empty());
}

#[test]
fn entry_point_edits_validate() {
    let mut h = OperationHandler::new(two_labels());
    assert_eq!(h.add_label("a", None).unwrap_err().code(), "duplicate_label");
    assert_eq!(h.add_label("Bad", None).unwrap_err().code(), "invalid_name");
    assert_eq!(h.rename_label("a", "b").unwrap_err().code(), "duplicate_label");
    assert!(!h.can_undo());

    let fresh = h.add_label("fresh", Some(Position::new(7.0, 8.0))).unwrap();
    assert_eq!(fresh, entry_point_id("fresh"));
    assert_eq!(h.graph().node(&fresh).unwrap().position, Position::new(7.0, 8.0));
}

#[test]
fn replacing_tree_keeps_unchanged_trivia() {
    let original = Tree::new(vec![Statement::label(
        "la",
        "a",
        vec![Statement::dialogue("d1", None, "hi").with_trivia(2, "    \"hi\"")],
    )]);
    let mut h = OperationHandler::new(original);
    let parsed = Tree::new(vec![Statement::label(
        "la",
        "a",
        vec![Statement::dialogue("d1", None, "hi"), Statement::dialogue("d2", None, "more")],
    )]);
    assert!(h.replace_tree(parsed.clone()));
    assert_eq!(h.tree().find(&NodeId::from("d1")).unwrap().raw.as_deref(), Some("    \"hi\""));
    assert_eq!(h.tree().find(&NodeId::from("d2")).unwrap().raw, None);
    assert!(h.can_undo());
    assert!(!h.replace_tree(parsed));
}

#[test]
fn outcomes_serialize_with_error_codes() {
    let mut h = OperationHandler::new(two_labels());
    let p = h.create_node(line("x"), Position::default());
    let out = h.connect_nodes(&entry_point_id("a"), None, &p).unwrap();
    let v = serde_json::to_value(&out).unwrap();
    assert_eq!(v["tree_changed"], serde_json::json!(true));
    assert_eq!(v["synced"][0], serde_json::json!(p.as_str()));

    let err = h.add_label("a", None).unwrap_err();
    let v = serde_json::to_value(&err).unwrap();
    assert_eq!(v["code"], "duplicate_label");
    assert_eq!(v["message"], "entry point 'a' already exists");
}
