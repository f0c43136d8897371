use async_trait::async_trait;
use flowcore::{FlowId, FlowMetadata, PublicationRecord};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read-only view of the persisted publications and flow ownership.
#[async_trait]
pub trait PublicationStore: Send + Sync {
    /// Newest publication of `flow_id` whose status is `Published`.
    async fn latest_publication(
        &self,
        flow_id: FlowId,
    ) -> Result<Option<PublicationRecord>, StoreError>;

    /// Ownership metadata of the flow itself.
    async fn flow_metadata(&self, flow_id: FlowId) -> Result<Option<FlowMetadata>, StoreError>;

    /// Flows with at least one published record, most recently published first.
    async fn published_flows(&self) -> Result<Vec<FlowMetadata>, StoreError>;
}
