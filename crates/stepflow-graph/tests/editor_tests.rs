use pretty_assertions::assert_eq;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use stepflow_graph::{
    EdgeKind, EditorConfig, EditorError, FlowEditor, InsertLocus, LayoutMode, NodeKind,
    VisualizationService,
};
use stepflow_model::{Step, StepPath};
use stepflow_store::{IntegrationStore, StaticViewCatalog, ViewTemplate};
use stepflow_test_utils::{
    branched_document, document_with, kafka_source_template, linear_document, middle_step,
    sink_step, source_step,
};

fn editor(doc: stepflow_model::Integration) -> FlowEditor {
    FlowEditor::with_document(EditorConfig::default(), doc)
}

#[test]
fn deleting_selected_step_clears_selection() {
    let editor = editor(linear_document());
    let uuid = editor.store().steps()[1].uuid.clone();
    let node_id = format!("node_{uuid}");

    editor.on_node_click(&node_id).unwrap();
    assert_eq!(editor.viewport().selected_uuid(), Some(uuid.clone()));
    assert!(editor.viewport().is_panel_expanded());

    let index = editor.steps().find_step_idx_with_uuid(&uuid).unwrap();
    editor.store().delete_step(index).unwrap();

    assert_eq!(editor.viewport().selected_uuid(), None);
    assert_eq!(editor.viewport().selected_step(), None);
    assert!(!editor.viewport().is_panel_expanded());
}

fn tagged_log(tag: &str) -> Step {
    let mut step = middle_step("log");
    step.parameters.insert("tag".to_string(), Value::from(tag));
    step
}

#[test]
fn deleting_selected_step_never_hands_selection_to_namesake() {
    let editor = editor(document_with([
        source_step("timer-source"),
        tagged_log("X"),
        tagged_log("Y"),
    ]));
    let x = editor.store().steps()[1].uuid.clone();
    editor.on_node_click(&format!("node_{x}")).unwrap();

    editor.store().delete_step(1).unwrap();

    // Y now carries X's old identifier
    assert_eq!(editor.store().steps()[1].uuid, x);
    assert_eq!(editor.viewport().selected_uuid(), None);
    assert_eq!(editor.viewport().selected_step(), None);
    assert!(!editor.viewport().is_panel_expanded());
}

#[test]
fn selection_follows_step_across_renumbering() {
    let editor = editor(document_with([
        source_step("timer-source"),
        tagged_log("X"),
        tagged_log("Y"),
    ]));
    let y = editor.store().steps()[2].uuid.clone();
    editor.on_node_click(&format!("node_{y}")).unwrap();

    editor.store().delete_step(1).unwrap();

    let selected = editor.viewport().selected_step().unwrap();
    assert_eq!(selected.parameters.get("tag"), Some(&Value::from("Y")));
    assert_eq!(selected.uuid, "KameletBinding-1_log-1");
    assert_eq!(editor.viewport().selected_uuid(), Some(selected.uuid.clone()));
    assert!(editor.viewport().is_panel_expanded());
}

#[test]
fn saving_selected_step_keeps_selection() {
    let editor = editor(branched_document());
    let set_body = editor
        .store()
        .nested_steps()
        .iter()
        .find(|n| n.step.name == "set-body")
        .unwrap()
        .step
        .uuid
        .clone();
    editor.on_node_click(&format!("node_{set_body}")).unwrap();

    let values = BTreeMap::from([("expression".to_string(), Value::from("hello"))]);
    editor.save_config(&set_body, values).unwrap();

    let selected = editor.viewport().selected_step().unwrap();
    assert_eq!(selected.name, "set-body");
    assert_eq!(selected.parameters.get("expression"), Some(&Value::from("hello")));
    assert!(editor.viewport().is_panel_expanded());
}

#[test]
fn removing_nested_step_clears_nested_selection() {
    let editor = editor(branched_document());
    let nested = editor.store().nested_steps();
    let filter = nested.iter().find(|n| n.step.name == "filter").unwrap();
    let set_body = nested.iter().find(|n| n.step.name == "set-body").unwrap();
    editor
        .on_node_click(&format!("node_{}", set_body.step.uuid))
        .unwrap();

    // the removal rewrites the whole choice subtree
    editor.steps().delete_step_by_uuid(&filter.step.uuid).unwrap();
    assert_eq!(editor.viewport().selected_uuid(), None);
    assert!(!editor.viewport().is_panel_expanded());
}

#[test]
fn node_click_toggles_panel() {
    let editor = editor(linear_document());
    let first = format!("node_{}", editor.store().steps()[0].uuid);
    let second = format!("node_{}", editor.store().steps()[1].uuid);

    editor.on_node_click(&first).unwrap();
    assert!(editor.viewport().is_panel_expanded());

    editor.on_node_click(&second).unwrap();
    assert!(editor.viewport().is_panel_expanded());
    assert_eq!(
        editor.viewport().selected_step().unwrap().name,
        "log".to_string()
    );

    editor.on_node_click(&second).unwrap();
    assert!(!editor.viewport().is_panel_expanded());
    assert_eq!(editor.viewport().selected_uuid(), None);

    assert!(matches!(
        editor.on_node_click("node_missing"),
        Err(EditorError::NodeNotFound(_))
    ));
}

#[test]
fn placeholder_click_is_ignored() {
    let editor = FlowEditor::new(EditorConfig::default());
    editor.on_node_click("placeholder_start").unwrap();
    assert_eq!(editor.viewport().selected_uuid(), None);
    assert!(!editor.viewport().is_panel_expanded());
}

#[test]
fn drop_on_start_placeholder_fills_empty_flow() {
    let editor = FlowEditor::new(EditorConfig::default());
    let nodes = editor.viewport().nodes();
    assert_eq!(nodes.len(), 1);
    assert!(editor.viewport().edges().is_empty());

    editor
        .on_drop("placeholder_start", kafka_source_template())
        .unwrap();
    let nodes = editor.viewport().nodes();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].kind, NodeKind::Step);
    assert_eq!(nodes[0].label, "kafka-source");
}

#[test]
fn drop_on_insert_edge_inserts_between() {
    let editor = editor(linear_document());
    let edge = editor
        .viewport()
        .edges()
        .into_iter()
        .find(|e| e.kind == EdgeKind::Insert)
        .unwrap();
    assert_eq!(
        edge.locus,
        Some(InsertLocus::Before {
            path: StepPath::top_level(1)
        })
    );

    editor.on_drop(&edge.id, middle_step("set-body")).unwrap();
    let names: Vec<_> = editor
        .store()
        .steps()
        .iter()
        .map(|s| s.name.clone())
        .collect();
    assert_eq!(names, vec!["timer-source", "set-body", "log", "kafka-sink"]);
}

#[test]
fn drop_on_step_node_is_rejected() {
    let editor = editor(linear_document());
    let node = format!("node_{}", editor.store().steps()[0].uuid);
    assert!(matches!(
        editor.on_drop(&node, sink_step("kafka-sink")),
        Err(EditorError::NotADropTarget(_))
    ));
}

#[test]
fn delete_nested_step_via_button() {
    let editor = editor(branched_document());
    let nested = editor.store().nested_steps();
    let filter = nested
        .iter()
        .find(|n| n.step.name == "filter")
        .unwrap()
        .step
        .uuid
        .clone();

    editor.on_node_click(&format!("node_{filter}")).unwrap();
    editor.on_delete_click(&filter).unwrap();

    assert_eq!(editor.viewport().selected_uuid(), None);
    assert_eq!(editor.store().nested_steps().len(), 2);
    assert!(editor
        .viewport()
        .nodes()
        .iter()
        .all(|n| n.step.as_ref().map_or(true, |s| s.name != "filter")));
}

#[test]
fn delete_branch_edge_removes_branch() {
    let editor = editor(branched_document());
    let edge = editor
        .viewport()
        .edges()
        .into_iter()
        .find(|e| e.kind == EdgeKind::Delete && e.label.as_deref() == Some("otherwise"))
        .unwrap();
    editor.on_delete_branch_click(&edge.id).unwrap();
    assert_eq!(editor.store().steps()[2].branch_count(), 1);
    // min 1 reached: no more delete edges
    assert_eq!(
        editor
            .viewport()
            .edges()
            .iter()
            .filter(|e| e.kind == EdgeKind::Delete)
            .count(),
        0
    );
}

#[test]
fn save_config_updates_parameters() {
    let editor = editor(linear_document());
    let uuid = editor.store().steps()[0].uuid.clone();
    let values = BTreeMap::from([("period".to_string(), Value::from(1000))]);
    editor.save_config(&uuid, values).unwrap();
    assert_eq!(
        editor.store().steps()[0].parameters.get("period"),
        Some(&Value::from(1000))
    );
}

#[test]
fn views_follow_commits() {
    let catalog = StaticViewCatalog::default().with_step_view(
        "log",
        ViewTemplate {
            name: "Log viewer".into(),
            url: None,
        },
    );
    let editor = editor(linear_document()).with_view_provider(Arc::new(catalog));
    assert_eq!(editor.store().views().len(), 1);

    editor.store().delete_step(1).unwrap();
    assert!(editor.store().views().is_empty());
}

#[test]
fn undo_redraws_graph() {
    let editor = editor(linear_document());
    let before = editor.viewport().graph();
    editor.store().delete_step(1).unwrap();
    assert_ne!(editor.viewport().graph(), before);
    assert!(editor.store().undo());
    assert_eq!(editor.viewport().graph(), before);
}

#[test]
fn derivation_is_idempotent() {
    let doc = branched_document();
    for service in [
        VisualizationService::default(),
        VisualizationService::new(LayoutMode::Vertical, true),
    ] {
        assert_eq!(service.derive(&doc), service.derive(&doc));
    }
}

#[test]
fn layout_switch_keeps_selection() {
    let editor = editor(linear_document());
    let uuid = editor.store().steps()[0].uuid.clone();
    editor.on_node_click(&format!("node_{uuid}")).unwrap();
    editor.set_layout(LayoutMode::Vertical);
    editor.set_multiple_flows(true);
    assert_eq!(editor.viewport().selected_uuid(), Some(uuid));
    assert!(editor.viewport().nodes().iter().any(|n| n.selected));
}
