//! Core data model for the flow worker pool
//!
//! This crate provides the types shared by the access provider, the pool
//! manager and the worker process. It has no runtime dependencies.

mod access;
mod error;
mod protocol;
mod publication;
mod snapshot;

pub use access::{FlowMetadata, OwnerKind};
pub use error::{FlowError, SnapshotError};
pub use protocol::{ExecuteChunk, ExecuteRequest, ExecuteResponse, HealthResponse};
pub use publication::{PublicationRecord, PublicationStatus, SnapshotPayload};
pub use snapshot::{Connection, FlowSnapshot, NodeId, NodeSpec};

pub type FlowId = uuid::Uuid;
pub type ProjectId = uuid::Uuid;
pub type UserId = uuid::Uuid;
pub type GroupId = uuid::Uuid;

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
