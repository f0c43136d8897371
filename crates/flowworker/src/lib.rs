//! Worker process serving one published flow snapshot
//!
//! A worker is started by the pool with its project id, flow id and port,
//! reads the snapshot from stdin until EOF, and then serves `GET /health`
//! and `POST /execute` on that port until it is terminated.

mod error;
mod execute;
mod input;
mod routes;

pub use error::WorkerError;
pub use execute::{ExecutionTrace, WorkerState};
pub use input::read_snapshot;
pub use routes::configure;
