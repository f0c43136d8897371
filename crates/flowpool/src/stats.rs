use crate::{WorkerKey, WorkerStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub occupancy: usize,
    pub allocated_ports: Vec<u16>,
    pub closed: bool,
    pub workers: Vec<WorkerStats>,
}

impl PoolStats {
    pub fn worker(&self, key: &WorkerKey) -> Option<&WorkerStats> {
        self.workers.iter().find(|w| &w.key == key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStats {
    pub key: WorkerKey,
    pub port: u16,
    pub endpoint: String,
    pub pid: Option<u32>,
    pub status: WorkerStatus,
    pub alive: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub age_secs: f64,
    pub idle_secs: f64,
}
