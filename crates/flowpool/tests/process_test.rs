#![cfg(unix)]

use flowcore::{FlowSnapshot, NodeSpec};
use flowpool::{LaunchSpec, ProcessLauncher, WorkerLauncher, WorkerProcess};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn launch_spec(port: u16) -> LaunchSpec {
    LaunchSpec {
        project_id: Uuid::new_v4(),
        flow_id: Uuid::new_v4(),
        host: "127.0.0.1".to_string(),
        port,
        snapshot: Arc::new(FlowSnapshot::new(
            Some("shell".to_string()),
            vec![NodeSpec::new("input", "chat.input")],
            vec![],
        )),
    }
}

fn shell(script: &str) -> ProcessLauncher {
    // Startup flags land in $1.. and are ignored by the script
    ProcessLauncher::new("sh").with_args(vec![
        "-c".to_string(),
        script.to_string(),
        "worker".to_string(),
    ])
}

#[tokio::test]
async fn test_worker_reads_snapshot_until_eof_then_terminates() {
    // `cat` only returns once stdin is closed
    let launcher = shell("cat >/dev/null; sleep 30");

    let mut process = launcher.launch(launch_spec(9100)).await.unwrap();
    assert!(process.id().is_some());
    assert!(process.is_alive());

    process.terminate(Duration::from_secs(2)).await.unwrap();
    assert!(!process.is_alive());
}

#[tokio::test]
async fn test_terminate_forces_stubborn_worker() {
    let launcher = shell("trap '' TERM; cat >/dev/null; sleep 30");

    let mut process = launcher.launch(launch_spec(9101)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = std::time::Instant::now();
    process.terminate(Duration::from_millis(300)).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!process.is_alive());
}

#[tokio::test]
async fn test_exited_worker_is_not_alive() {
    let launcher = shell("cat >/dev/null; exit 1");

    let mut process = launcher.launch(launch_spec(9102)).await.unwrap();

    let mut alive = true;
    for _ in 0..50 {
        if !process.is_alive() {
            alive = false;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!alive);

    // Terminating an exited worker is a no-op
    process.terminate(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_missing_executable_is_spawn_failure() {
    let launcher = ProcessLauncher::new(format!("/nonexistent/flowworker-{}", Uuid::new_v4()));
    let result = launcher.launch(launch_spec(9103)).await;
    assert!(matches!(result, Err(flowpool::PoolError::SpawnFailure(_))));
}

#[tokio::test]
async fn test_worker_that_never_reads_stdin_is_killed() {
    let launcher = shell("sleep 30").with_handoff_timeout(Duration::from_millis(500));

    // Larger than any pipe buffer, so the write cannot complete unread
    let blob = "x".repeat(256 * 1024 + 1);
    let mut spec = launch_spec(9104);
    spec.snapshot = Arc::new(FlowSnapshot::new(
        Some("bulky".to_string()),
        vec![NodeSpec::new("input", "chat.input").with_data(serde_json::json!({ "blob": blob }))],
        vec![],
    ));

    let started = std::time::Instant::now();
    let result = tokio::time::timeout(Duration::from_secs(5), launcher.launch(spec))
        .await
        .expect("launch must respect its handoff timeout");

    match result {
        Err(flowpool::PoolError::SpawnFailure(reason)) => assert!(reason.contains("500ms")),
        Err(e) => panic!("expected spawn failure, got {}", e),
        Ok(_) => panic!("expected spawn failure, got a running worker"),
    }
    assert!(started.elapsed() < Duration::from_secs(3));
}
