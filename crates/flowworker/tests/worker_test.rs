use actix_web::{test, web, App};
use flowcore::{
    Connection, ExecuteChunk, ExecuteRequest, ExecuteResponse, FlowSnapshot, HealthResponse,
    NodeSpec,
};
use flowworker::{configure, read_snapshot, WorkerError, WorkerState};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

fn chat_flow() -> FlowSnapshot {
    FlowSnapshot::new(
        Some("chat".to_string()),
        vec![
            NodeSpec::new("output", "chat.output"),
            NodeSpec::new("llm", "llm.openai").with_data(json!({"model": "gpt-4o"})),
            NodeSpec::new("input", "chat.input"),
        ],
        vec![
            Connection::new("input", "message", "llm", "prompt"),
            Connection::new("llm", "text", "output", "message"),
        ],
    )
}

fn state() -> web::Data<WorkerState> {
    web::Data::new(WorkerState::new(Uuid::new_v4(), Uuid::new_v4(), chat_flow()).unwrap())
}

#[actix_web::test]
async fn test_health_reports_identity() {
    let state = state();
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let health: HealthResponse = test::call_and_read_body_json(&app, req).await;

    assert!(health.is_healthy());
    assert_eq!(health.project_id, Some(state.project_id()));
    assert_eq!(health.flow_id, Some(state.flow_id()));
}

#[actix_web::test]
async fn test_execute_visits_nodes_in_dependency_order() {
    let state = state();
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

    let req = test::TestRequest::post()
        .uri("/execute")
        .set_json(ExecuteRequest::new(json!({"message": "hi"})).with_parameters(json!({"tweaks": {}})))
        .to_request();
    let response: ExecuteResponse = test::call_and_read_body_json(&app, req).await;

    assert_eq!(response.flow_id, state.flow_id());
    assert_eq!(response.nodes_visited, vec!["input", "llm", "output"]);
    assert_eq!(response.output, json!({"message": "hi"}));
    assert_eq!(response.parameters, json!({"tweaks": {}}));
}

#[actix_web::test]
async fn test_execute_streams_ndjson_when_asked() {
    let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

    let req = test::TestRequest::post()
        .uri("/execute")
        .set_json(ExecuteRequest::new(json!("hello")).with_parameters(json!({"stream": true})))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/x-ndjson"
    );

    let body = test::read_body(resp).await;
    let chunks: Vec<ExecuteChunk> = std::str::from_utf8(&body)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(chunks.len(), 4);
    assert!(matches!(&chunks[0], ExecuteChunk::Node { index: 0, node_id, .. } if node_id == "input"));
    match &chunks[3] {
        ExecuteChunk::Result { result } => assert_eq!(result.output, json!("hello")),
        other => panic!("expected result chunk, got {:?}", other),
    }
}

#[actix_web::test]
async fn test_execute_rejects_malformed_body() {
    let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

    let req = test::TestRequest::post()
        .uri("/execute")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn test_cyclic_snapshot_is_rejected() {
    let json = serde_json::to_vec(&json!({
        "nodes": [
            {"id": "a", "node_type": "x"},
            {"id": "b", "node_type": "y"}
        ],
        "connections": [
            {"from_node": "a", "from_port": "out", "to_node": "b", "to_port": "in"},
            {"from_node": "b", "from_port": "out", "to_node": "a", "to_port": "in"}
        ]
    }))
    .unwrap();

    let result = read_snapshot(&json[..], Duration::from_secs(1)).await;
    assert!(matches!(result, Err(WorkerError::Invalid(_))));
}

#[tokio::test]
async fn test_unparseable_snapshot_is_rejected() {
    let result = read_snapshot(&b"{\"nodes\": 42"[..], Duration::from_secs(1)).await;
    assert!(matches!(result, Err(WorkerError::Parse(_))));
}
