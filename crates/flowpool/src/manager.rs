use crate::{
    HealthProbe, HttpHealthProbe, KeyedLocks, LaunchSpec, PoolConfig, PoolError, PoolStats,
    PortAllocator, ProcessLauncher, WorkerKey, WorkerLauncher, WorkerProcess, WorkerRecord,
    WorkerStats, WorkerStatus,
};
use flowaccess::FlowAccessProvider;
use flowcore::{FlowId, GroupId, ProjectId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

/// Where a caller can reach its worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHandle {
    pub endpoint: String,
    pub port: u16,
}

/// On-demand pool of flow worker processes, at most one per (project, flow).
///
/// Cloning is cheap and every clone drives the same pool. Workers are created
/// lazily on first request, reused while they stay healthy, and the least
/// recently used one is evicted when the pool is full.
///
/// Network and process I/O never runs while the pool state is locked; the
/// per-key creation lock is what serializes concurrent requests for the same
/// flow.
#[derive(Clone)]
pub struct WorkerPoolManager {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: PoolConfig,
    access: Arc<FlowAccessProvider>,
    launcher: Arc<dyn WorkerLauncher>,
    probe: Arc<dyn HealthProbe>,
    state: Mutex<PoolState>,
    creation: KeyedLocks<WorkerKey>,
}

struct PoolState {
    workers: HashMap<WorkerKey, WorkerRecord>,
    ports: PortAllocator,
    closed: bool,
}

impl PoolState {
    /// Unregister a worker and free its port
    fn take_worker(&mut self, key: &WorkerKey) -> Option<WorkerRecord> {
        let record = self.workers.remove(key)?;
        self.ports.release(record.port);
        Some(record)
    }

    /// Same as `take_worker`, but only if the record is still `id`
    fn take_worker_if(&mut self, key: &WorkerKey, id: Uuid) -> Option<WorkerRecord> {
        match self.workers.get(key) {
            Some(record) if record.id == id => self.take_worker(key),
            _ => None,
        }
    }

    /// Eviction candidate: longest idle, ready workers before starting ones
    fn most_idle(&self, now: Instant) -> Option<WorkerKey> {
        self.workers
            .values()
            .max_by_key(|r| (r.status != WorkerStatus::Starting, r.idle_time(now)))
            .map(|r| r.key)
    }
}

enum Existing {
    Vacant,
    Live { id: Uuid, handle: WorkerHandle },
    Dead(WorkerRecord),
}

impl WorkerPoolManager {
    /// Pool with default configuration
    pub fn new(access: Arc<FlowAccessProvider>) -> Self {
        Self::with_config(PoolConfig::default(), access)
    }

    /// Pool that launches `config.worker_program` and probes over HTTP
    pub fn with_config(config: PoolConfig, access: Arc<FlowAccessProvider>) -> Self {
        let launcher = Arc::new(
            ProcessLauncher::new(config.worker_program.clone())
                .with_args(config.worker_args.clone())
                .with_handoff_timeout(config.handoff_timeout),
        );
        let probe = Arc::new(HttpHealthProbe::new());
        Self::with_components(config, access, launcher, probe)
    }

    /// Pool with a custom launcher and health probe
    pub fn with_components(
        config: PoolConfig,
        access: Arc<FlowAccessProvider>,
        launcher: Arc<dyn WorkerLauncher>,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        let ports = PortAllocator::new(config.port_base, config.port_range_len());
        tracing::info!(
            "Worker pool: capacity {}, ports {}..{}",
            config.capacity,
            config.port_base,
            config.port_base as usize + config.port_range_len()
        );

        Self {
            inner: Arc::new(PoolInner {
                config,
                access,
                launcher,
                probe,
                state: Mutex::new(PoolState {
                    workers: HashMap::new(),
                    ports,
                    closed: false,
                }),
                creation: KeyedLocks::new(),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn capacity(&self) -> usize {
        self.inner.config.capacity
    }

    pub fn access(&self) -> &Arc<FlowAccessProvider> {
        &self.inner.access
    }

    /// Endpoint of a healthy worker for the flow, spawning one if needed.
    ///
    /// `None` covers every failure: unknown or unpublished flow, denied
    /// requester, exhausted capacity, spawn failure and readiness timeout.
    /// The cause is logged.
    pub async fn get_or_create_worker(
        &self,
        project_id: ProjectId,
        flow_id: FlowId,
        requester_id: UserId,
        requester_groups: &[GroupId],
    ) -> Option<WorkerHandle> {
        let key = WorkerKey::new(project_id, flow_id);
        match self
            .try_get_or_create_worker(project_id, flow_id, requester_id, requester_groups)
            .await
        {
            Ok(handle) => Some(handle),
            Err(PoolError::NotFoundOrForbidden) => {
                tracing::info!("No accessible flow for {} (requester {})", key, requester_id);
                None
            }
            Err(e) => {
                tracing::error!("Failed to provide worker for {}: {}", key, e);
                None
            }
        }
    }

    /// Like `get_or_create_worker`, keeping the failure reason.
    ///
    /// Creation runs on its own task: a caller that stops waiting does not
    /// abandon a half-registered worker.
    pub async fn try_get_or_create_worker(
        &self,
        project_id: ProjectId,
        flow_id: FlowId,
        requester_id: UserId,
        requester_groups: &[GroupId],
    ) -> Result<WorkerHandle, PoolError> {
        let inner = Arc::clone(&self.inner);
        let key = WorkerKey::new(project_id, flow_id);
        let groups = requester_groups.to_vec();

        tokio::spawn(async move { inner.get_or_create(key, requester_id, &groups).await })
            .await
            .map_err(|e| PoolError::SpawnFailure(format!("creation task failed: {}", e)))?
    }

    /// Tear down the flow's worker so the next request starts one from the
    /// latest publication. False only if the worker could not be stopped.
    pub async fn reload_worker(&self, project_id: ProjectId, flow_id: FlowId) -> bool {
        self.inner.reload(WorkerKey::new(project_id, flow_id)).await
    }

    /// Terminate every worker and refuse further requests
    pub async fn shutdown(&self) {
        self.inner.shutdown().await
    }

    pub async fn get_worker_stats(&self) -> PoolStats {
        self.inner.stats().await
    }
}

impl PoolInner {
    async fn get_or_create(
        &self,
        key: WorkerKey,
        requester_id: UserId,
        requester_groups: &[GroupId],
    ) -> Result<WorkerHandle, PoolError> {
        let _guard = self.creation.lock(&key).await;

        if let Some(handle) = self.reuse(key, requester_id, requester_groups).await? {
            return Ok(handle);
        }

        // Authorization before any eviction: a denied request changes nothing
        let snapshot = self
            .access
            .get_published_flow(key.flow_id, requester_id, requester_groups)
            .await
            .ok_or(PoolError::NotFoundOrForbidden)?;

        let port = self.reserve_port(key).await?;

        let spec = LaunchSpec {
            project_id: key.project_id,
            flow_id: key.flow_id,
            host: self.config.worker_host.clone(),
            port,
            snapshot,
        };
        let process = match self.launcher.launch(spec).await {
            Ok(process) => process,
            Err(e) => {
                self.state.lock().await.ports.release(port);
                return Err(e);
            }
        };

        let endpoint = self.config.endpoint_for(port);
        let id = self.register(key, port, endpoint.clone(), process).await?;
        tracing::info!(
            "Spawned worker for {} on port {}, waiting for readiness",
            key,
            port
        );

        self.await_ready(key, id, WorkerHandle { endpoint, port })
            .await
    }

    /// Hand out the registered worker if it is alive, authorized and healthy.
    /// Stale workers are removed on the way.
    async fn reuse(
        &self,
        key: WorkerKey,
        requester_id: UserId,
        requester_groups: &[GroupId],
    ) -> Result<Option<WorkerHandle>, PoolError> {
        let existing = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(PoolError::Closed);
            }
            let alive = state.workers.get_mut(&key).map(|r| r.is_alive());
            match alive {
                None => Existing::Vacant,
                Some(true) => match state.workers.get(&key) {
                    Some(record) => Existing::Live {
                        id: record.id,
                        handle: WorkerHandle {
                            endpoint: record.endpoint.clone(),
                            port: record.port,
                        },
                    },
                    None => Existing::Vacant,
                },
                Some(false) => match state.take_worker(&key) {
                    Some(record) => Existing::Dead(record),
                    None => Existing::Vacant,
                },
            }
        };

        let (id, handle) = match existing {
            Existing::Vacant => return Ok(None),
            Existing::Dead(record) => {
                tracing::warn!("Worker for {} on port {} has exited", key, record.port);
                self.retire(record).await;
                return Ok(None);
            }
            Existing::Live { id, handle } => (id, handle),
        };

        if !self
            .access
            .is_authorized(key.flow_id, requester_id, requester_groups)
            .await
        {
            return Err(PoolError::NotFoundOrForbidden);
        }

        if let Some(record) = self.state.lock().await.workers.get_mut(&key) {
            if record.id == id {
                record.touch();
            }
        }

        if self
            .probe
            .is_healthy(&handle.endpoint, self.config.probe_timeout)
            .await
        {
            let mut state = self.state.lock().await;
            match state.workers.get_mut(&key) {
                Some(record) if record.id == id => {
                    // Left in Starting by an earlier creation that stopped polling
                    record.mark_ready();
                    tracing::debug!("Reusing worker for {} at {}", key, handle.endpoint);
                    return Ok(Some(handle));
                }
                _ => return Ok(None),
            }
        }

        tracing::warn!(
            "Worker for {} at {} failed its health check, replacing it",
            key,
            handle.endpoint
        );
        let stale = self.state.lock().await.take_worker_if(&key, id);
        if let Some(record) = stale {
            self.retire(record).await;
        }
        Ok(None)
    }

    /// Claim a port, evicting the longest idle worker if the pool is full
    async fn reserve_port(&self, key: WorkerKey) -> Result<u16, PoolError> {
        let (reserved, evicted) = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(PoolError::Closed);
            }

            // Allocated ports include creations still in flight
            let mut evicted = None;
            if state.ports.allocated_count() >= self.config.capacity {
                evicted = state
                    .most_idle(Instant::now())
                    .and_then(|victim| state.take_worker(&victim));
            }

            let reserved = if state.ports.allocated_count() >= self.config.capacity {
                Err(PoolError::ResourceExhausted(format!(
                    "all {} slots are held by workers still starting",
                    self.config.capacity
                )))
            } else {
                state.ports.allocate().ok_or_else(|| {
                    PoolError::ResourceExhausted("no free port in the reserved range".to_string())
                })
            };
            (reserved, evicted)
        };

        if let Some(record) = evicted {
            tracing::info!(
                "Evicting worker for {} on port {} to make room for {}",
                record.key,
                record.port,
                key
            );
            self.retire(record).await;
        }

        reserved
    }

    async fn register(
        &self,
        key: WorkerKey,
        port: u16,
        endpoint: String,
        mut process: Box<dyn WorkerProcess>,
    ) -> Result<Uuid, PoolError> {
        let replaced = {
            let mut state = self.state.lock().await;
            if state.closed {
                state.ports.release(port);
                drop(state);
                if let Err(e) = process.terminate(self.config.shutdown_grace).await {
                    tracing::warn!("Failed to stop worker for {} after shutdown: {}", key, e);
                }
                return Err(PoolError::Closed);
            }

            let record = WorkerRecord::new(key, port, endpoint, process);
            let id = record.id;
            let replaced = state.take_worker(&key);
            state.workers.insert(key, record);
            (id, replaced)
        };

        let (id, replaced) = replaced;
        if let Some(record) = replaced {
            tracing::warn!("Replacing worker for {} on port {}", key, record.port);
            self.retire(record).await;
        }
        Ok(id)
    }

    /// Poll a freshly spawned worker until it answers healthy, exits, or the
    /// readiness deadline passes
    async fn await_ready(
        &self,
        key: WorkerKey,
        id: Uuid,
        handle: WorkerHandle,
    ) -> Result<WorkerHandle, PoolError> {
        let started = Instant::now();
        let deadline = started + self.config.readiness_timeout;

        loop {
            {
                let mut state = self.state.lock().await;
                let alive = match state.workers.get_mut(&key) {
                    Some(record) if record.id == id => record.is_alive(),
                    _ => {
                        return Err(PoolError::SpawnFailure(format!(
                            "worker for {} was removed while starting",
                            key
                        )))
                    }
                };
                if !alive {
                    let record = state.take_worker(&key);
                    drop(state);
                    if let Some(record) = record {
                        self.retire(record).await;
                    }
                    return Err(PoolError::SpawnFailure(format!(
                        "worker for {} exited during startup",
                        key
                    )));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let budget = self.config.probe_timeout.min(deadline - now);
            if self.probe.is_healthy(&handle.endpoint, budget).await {
                let mut state = self.state.lock().await;
                return match state.workers.get_mut(&key) {
                    Some(record) if record.id == id => {
                        record.mark_ready();
                        record.touch();
                        tracing::info!(
                            "Worker for {} ready at {} after {:?}",
                            key,
                            handle.endpoint,
                            started.elapsed()
                        );
                        Ok(handle)
                    }
                    _ => Err(PoolError::SpawnFailure(format!(
                        "worker for {} was removed while starting",
                        key
                    ))),
                };
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        let stale = self.state.lock().await.take_worker_if(&key, id);
        if let Some(record) = stale {
            self.retire(record).await;
        }
        Err(PoolError::ReadinessTimeout {
            timeout: self.config.readiness_timeout,
        })
    }

    async fn reload(&self, key: WorkerKey) -> bool {
        let _guard = self.creation.lock(&key).await;

        let record = self.state.lock().await.take_worker(&key);
        match record {
            Some(record) => {
                tracing::info!("Reloading worker for {} on port {}", key, record.port);
                self.retire(record).await
            }
            None => {
                tracing::debug!("No worker to reload for {}", key);
                true
            }
        }
    }

    async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;

        let records: Vec<WorkerRecord> = state.workers.drain().map(|(_, r)| r).collect();
        state.ports.release_all();
        tracing::info!("Shutting down worker pool ({} workers)", records.len());

        futures::future::join_all(records.into_iter().map(|r| self.retire(r))).await;
        tracing::info!("Worker pool shut down");
    }

    /// Terminate an unregistered worker. False if it could not be stopped.
    async fn retire(&self, mut record: WorkerRecord) -> bool {
        record.mark_terminated();
        match record.process.terminate(self.config.shutdown_grace).await {
            Ok(()) => {
                tracing::debug!("Worker for {} on port {} terminated", record.key, record.port);
                true
            }
            Err(e) => {
                tracing::error!(
                    "Failed to terminate worker for {} (pid {:?}): {}",
                    record.key,
                    record.process.id(),
                    e
                );
                false
            }
        }
    }

    async fn stats(&self) -> PoolStats {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let mut workers: Vec<WorkerStats> = state
            .workers
            .values_mut()
            .map(|record| WorkerStats {
                key: record.key,
                port: record.port,
                endpoint: record.endpoint.clone(),
                pid: record.process.id(),
                status: record.status,
                alive: record.is_alive(),
                created_at: record.created_at,
                last_used_at: record.last_used_at,
                age_secs: record.age(now).as_secs_f64(),
                idle_secs: record.idle_time(now).as_secs_f64(),
            })
            .collect();
        workers.sort_by_key(|w| w.port);

        PoolStats {
            capacity: self.config.capacity,
            occupancy: state.ports.allocated_count(),
            allocated_ports: state.ports.allocated(),
            closed: state.closed,
            workers,
        }
    }
}
