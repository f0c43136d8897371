#![cfg(unix)]

use flowaccess::{FlowAccessProvider, InMemoryPublicationStore};
use flowcore::{Connection, ExecuteRequest, FlowId, FlowMetadata, FlowSnapshot, NodeSpec};
use flowpool::{PoolConfig, PoolError, WorkerClient, WorkerPoolManager, WorkerStatus};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

fn pool_config(port_base: u16) -> PoolConfig {
    PoolConfig {
        capacity: 2,
        port_base,
        worker_program: env!("CARGO_BIN_EXE_flowworker").into(),
        readiness_timeout: Duration::from_secs(20),
        poll_interval: Duration::from_millis(100),
        probe_timeout: Duration::from_secs(1),
        shutdown_grace: Duration::from_secs(2),
        ..PoolConfig::default()
    }
}

async fn published_pool(port_base: u16) -> (WorkerPoolManager, FlowId) {
    let store = Arc::new(InMemoryPublicationStore::new());
    let flow_id = Uuid::new_v4();
    let snapshot = FlowSnapshot::new(
        Some("echo".to_string()),
        vec![
            NodeSpec::new("input", "chat.input"),
            NodeSpec::new("output", "chat.output"),
        ],
        vec![Connection::new("input", "message", "output", "message")],
    );
    store.insert_flow(FlowMetadata::public(flow_id)).await;
    store.publish(flow_id, &snapshot).await;

    let access = Arc::new(FlowAccessProvider::new(store));
    (WorkerPoolManager::with_config(pool_config(port_base), access), flow_id)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_real_worker_serves_is_reused_and_reloads() {
    let (pool, flow_id) = published_pool(39100).await;
    let project_id = Uuid::new_v4();

    let first = pool
        .try_get_or_create_worker(project_id, flow_id, Uuid::new_v4(), &[])
        .await
        .unwrap();
    assert_eq!(first.port, 39100);

    let response = WorkerClient::new()
        .execute(&first.endpoint, &ExecuteRequest::new(json!({"message": "hi"})))
        .await
        .unwrap();
    assert_eq!(response.flow_id, flow_id);
    assert_eq!(response.nodes_visited, vec!["input", "output"]);

    let again = pool
        .try_get_or_create_worker(project_id, flow_id, Uuid::new_v4(), &[])
        .await
        .unwrap();
    assert_eq!(again, first);

    assert!(pool.reload_worker(project_id, flow_id).await);
    assert!(pool.get_worker_stats().await.workers.is_empty());

    let reloaded = pool
        .try_get_or_create_worker(project_id, flow_id, Uuid::new_v4(), &[])
        .await
        .unwrap();
    assert_eq!(reloaded.port, 39101);

    let stats = pool.get_worker_stats().await;
    assert_eq!(stats.occupancy, 1);
    assert_eq!(stats.workers[0].status, WorkerStatus::Ready);
    assert!(stats.workers[0].alive);

    pool.shutdown().await;
    assert!(pool.get_worker_stats().await.workers.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_worker_that_cannot_bind_fails_before_readiness_deadline() {
    let (pool, flow_id) = published_pool(39200).await;
    let _occupied = std::net::TcpListener::bind(("127.0.0.1", 39200)).unwrap();

    let started = Instant::now();
    let result = pool
        .try_get_or_create_worker(Uuid::new_v4(), flow_id, Uuid::new_v4(), &[])
        .await;

    assert!(matches!(result, Err(PoolError::SpawnFailure(_))));
    assert!(started.elapsed() < Duration::from_secs(10));

    let stats = pool.get_worker_stats().await;
    assert!(stats.workers.is_empty());
    assert!(stats.allocated_ports.is_empty());
}
