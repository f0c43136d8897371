#![allow(dead_code)]

use async_trait::async_trait;
use flowaccess::{FlowAccessProvider, InMemoryPublicationStore};
use flowcore::{FlowId, FlowMetadata, FlowSnapshot, NodeSpec, ProjectId};
use flowpool::{
    HealthProbe, LaunchSpec, PoolConfig, PoolError, WorkerLauncher, WorkerPoolManager,
    WorkerProcess,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Observable state of one fake worker
#[derive(Clone)]
pub struct Spawned {
    pub project_id: ProjectId,
    pub flow_id: FlowId,
    pub host: String,
    pub port: u16,
    pub snapshot: Arc<FlowSnapshot>,
    pub alive: Arc<AtomicBool>,
    pub terminated: Arc<AtomicBool>,
}

impl Spawned {
    pub fn crash(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn was_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

/// Launcher that records spawns instead of starting processes
#[derive(Default)]
pub struct FakeLauncher {
    spawned: Mutex<Vec<Spawned>>,
    fail_spawn: AtomicBool,
    start_dead: AtomicBool,
    fail_terminate: AtomicBool,
}

impl FakeLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_spawns(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::SeqCst);
    }

    /// Workers exit right after launch
    pub fn start_dead(&self, dead: bool) {
        self.start_dead.store(dead, Ordering::SeqCst);
    }

    pub fn fail_terminations(&self, fail: bool) {
        self.fail_terminate.store(fail, Ordering::SeqCst);
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned.lock().unwrap().len()
    }

    pub fn spawned(&self) -> Vec<Spawned> {
        self.spawned.lock().unwrap().clone()
    }

    pub fn last(&self) -> Spawned {
        self.spawned.lock().unwrap().last().cloned().expect("nothing spawned")
    }
}

#[async_trait]
impl WorkerLauncher for FakeLauncher {
    async fn launch(&self, spec: LaunchSpec) -> Result<Box<dyn WorkerProcess>, PoolError> {
        tokio::task::yield_now().await;
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(PoolError::SpawnFailure("no such executable".to_string()));
        }

        let spawned = Spawned {
            project_id: spec.project_id,
            flow_id: spec.flow_id,
            host: spec.host,
            port: spec.port,
            snapshot: spec.snapshot,
            alive: Arc::new(AtomicBool::new(!self.start_dead.load(Ordering::SeqCst))),
            terminated: Arc::new(AtomicBool::new(false)),
        };
        self.spawned.lock().unwrap().push(spawned.clone());

        Ok(Box::new(FakeProcess {
            pid: 40_000 + spawned.port as u32,
            alive: spawned.alive,
            terminated: spawned.terminated,
            fail_terminate: self.fail_terminate.load(Ordering::SeqCst),
        }))
    }
}

pub struct FakeProcess {
    pid: u32,
    alive: Arc<AtomicBool>,
    terminated: Arc<AtomicBool>,
    fail_terminate: bool,
}

#[async_trait]
impl WorkerProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn is_alive(&mut self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn terminate(&mut self, _grace: Duration) -> Result<(), PoolError> {
        self.terminated.store(true, Ordering::SeqCst);
        if self.fail_terminate {
            return Err(PoolError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "operation not permitted",
            )));
        }
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Probe that answers healthy unless the endpoint's port is marked down
#[derive(Default)]
pub struct FakeProbe {
    down: Mutex<HashSet<u16>>,
    probes: AtomicUsize,
}

impl FakeProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, port: u16, down: bool) {
        let mut ports = self.down.lock().unwrap();
        if down {
            ports.insert(port);
        } else {
            ports.remove(&port);
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn is_healthy(&self, endpoint: &str, _timeout: Duration) -> bool {
        tokio::task::yield_now().await;
        self.probes.fetch_add(1, Ordering::SeqCst);
        let port = endpoint
            .rsplit(':')
            .next()
            .and_then(|p| p.parse::<u16>().ok());
        match port {
            Some(port) => !self.down.lock().unwrap().contains(&port),
            None => false,
        }
    }
}

pub fn snapshot(name: &str) -> FlowSnapshot {
    FlowSnapshot::new(
        Some(name.to_string()),
        vec![NodeSpec::new("input", "chat.input")],
        vec![],
    )
}

pub fn test_config(capacity: usize) -> PoolConfig {
    PoolConfig {
        capacity,
        port_base: 9100,
        readiness_timeout: Duration::from_secs(30),
        poll_interval: Duration::from_secs(1),
        probe_timeout: Duration::from_secs(5),
        shutdown_grace: Duration::from_secs(1),
        ..PoolConfig::default()
    }
}

/// Pool over an in-memory store, with fake processes and probes
pub struct Harness {
    pub pool: WorkerPoolManager,
    pub store: Arc<InMemoryPublicationStore>,
    pub launcher: Arc<FakeLauncher>,
    pub probe: Arc<FakeProbe>,
    pub project_id: ProjectId,
}

impl Harness {
    pub fn new(capacity: usize) -> Self {
        Self::with_config(test_config(capacity))
    }

    pub fn with_config(config: PoolConfig) -> Self {
        let store = Arc::new(InMemoryPublicationStore::new());
        let access = Arc::new(FlowAccessProvider::new(store.clone()));
        let launcher = FakeLauncher::new();
        let probe = FakeProbe::new();
        let pool =
            WorkerPoolManager::with_components(config, access, launcher.clone(), probe.clone());

        Self {
            pool,
            store,
            launcher,
            probe,
            project_id: Uuid::new_v4(),
        }
    }

    /// Publish a new public flow and return its id
    pub async fn public_flow(&self, name: &str) -> FlowId {
        let flow_id = Uuid::new_v4();
        self.store
            .insert_flow(FlowMetadata::public(flow_id).with_name(name))
            .await;
        self.store.publish(flow_id, &snapshot(name)).await;
        flow_id
    }

    pub async fn private_flow(&self, name: &str, owner: Uuid) -> FlowId {
        let flow_id = Uuid::new_v4();
        self.store
            .insert_flow(FlowMetadata::owned_by_user(flow_id, owner).with_name(name))
            .await;
        self.store.publish(flow_id, &snapshot(name)).await;
        flow_id
    }

    pub async fn get(&self, flow_id: FlowId) -> Option<flowpool::WorkerHandle> {
        self.pool
            .get_or_create_worker(self.project_id, flow_id, Uuid::new_v4(), &[])
            .await
    }
}
