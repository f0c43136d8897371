use crate::WorkerProcess;
use chrono::{DateTime, Utc};
use flowcore::{FlowId, ProjectId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;
use uuid::Uuid;

/// Pool key: one live worker per (project, flow)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerKey {
    pub project_id: ProjectId,
    pub flow_id: FlowId,
}

impl WorkerKey {
    pub fn new(project_id: ProjectId, flow_id: FlowId) -> Self {
        Self {
            project_id,
            flow_id,
        }
    }
}

impl fmt::Display for WorkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project_id, self.flow_id)
    }
}

/// Lifecycle of a registered worker.
///
/// Transitions only move forward: `Starting -> Ready -> Terminated`. A worker
/// that fails during startup is removed instead of being kept in an error
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Starting,
    Ready,
    Terminated,
}

pub struct WorkerRecord {
    /// Distinguishes successive workers registered under the same key
    pub id: Uuid,
    pub key: WorkerKey,
    pub port: u16,
    pub endpoint: String,
    pub process: Box<dyn WorkerProcess>,
    pub status: WorkerStatus,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    started: Instant,
    last_used: Instant,
}

impl WorkerRecord {
    pub fn new(
        key: WorkerKey,
        port: u16,
        endpoint: String,
        process: Box<dyn WorkerProcess>,
    ) -> Self {
        let now = Utc::now();
        let instant = Instant::now();
        Self {
            id: Uuid::new_v4(),
            key,
            port,
            endpoint,
            process,
            status: WorkerStatus::Starting,
            created_at: now,
            last_used_at: now,
            started: instant,
            last_used: instant,
        }
    }

    pub fn touch(&mut self) {
        self.last_used_at = Utc::now();
        self.last_used = Instant::now();
    }

    pub fn mark_ready(&mut self) -> bool {
        self.advance(WorkerStatus::Ready)
    }

    pub fn mark_terminated(&mut self) -> bool {
        self.advance(WorkerStatus::Terminated)
    }

    fn advance(&mut self, next: WorkerStatus) -> bool {
        let allowed = matches!(
            (self.status, next),
            (WorkerStatus::Starting, WorkerStatus::Ready)
                | (WorkerStatus::Starting, WorkerStatus::Terminated)
                | (WorkerStatus::Ready, WorkerStatus::Terminated)
        );
        if allowed {
            self.status = next;
        }
        allowed
    }

    pub fn is_alive(&mut self) -> bool {
        self.process.is_alive()
    }

    pub fn age(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.started)
    }

    pub fn idle_time(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.last_used)
    }
}

impl fmt::Debug for WorkerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerRecord")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("port", &self.port)
            .field("status", &self.status)
            .field("pid", &self.process.id())
            .finish()
    }
}
