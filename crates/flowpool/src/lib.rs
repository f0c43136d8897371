//! Worker pool manager
//!
//! Keeps a bounded set of isolated worker processes, one per
//! (project, flow) key. Workers are created on demand after the requester
//! has been authorized, reused while they stay healthy, evicted by idle time
//! when the pool is full, and torn down on reload so the next request
//! cold-starts against the latest publication.

mod client;
mod config;
mod error;
mod launcher;
mod locks;
mod manager;
mod ports;
mod probe;
mod record;
mod stats;

pub use client::{ClientError, WorkerClient};
pub use config::{ConfigError, PoolConfig};
pub use error::PoolError;
pub use launcher::{ChildProcess, LaunchSpec, ProcessLauncher, WorkerLauncher, WorkerProcess};
pub use locks::{KeyGuard, KeyedLocks};
pub use manager::{WorkerHandle, WorkerPoolManager};
pub use ports::PortAllocator;
pub use probe::{HealthProbe, HttpHealthProbe};
pub use record::{WorkerKey, WorkerRecord, WorkerStatus};
pub use stats::{PoolStats, WorkerStats};
