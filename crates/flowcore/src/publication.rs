use crate::{FlowError, FlowId, FlowSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PublicationStatus {
    Published,
    Draft,
    Unpublished,
    #[serde(other)]
    Unknown,
}

/// Snapshot payload as persisted: either JSON text or an embedded structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotPayload {
    Text(String),
    Structured(serde_json::Value),
}

impl SnapshotPayload {
    pub fn decode(&self) -> Result<FlowSnapshot, FlowError> {
        let snapshot = match self {
            SnapshotPayload::Text(text) => serde_json::from_str(text)?,
            SnapshotPayload::Structured(value) => serde_json::from_value(value.clone())?,
        };
        Ok(snapshot)
    }
}

impl From<&FlowSnapshot> for SnapshotPayload {
    fn from(snapshot: &FlowSnapshot) -> Self {
        // FlowSnapshot contains only JSON-representable fields
        SnapshotPayload::Structured(
            serde_json::to_value(snapshot).unwrap_or(serde_json::Value::Null),
        )
    }
}

/// Immutable, timestamped publication of a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub id: Uuid,
    pub flow_id: FlowId,
    pub status: PublicationStatus,
    pub published_at: DateTime<Utc>,
    pub payload: SnapshotPayload,
}

impl PublicationRecord {
    pub fn published(flow_id: FlowId, payload: SnapshotPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            flow_id,
            status: PublicationStatus::Published,
            published_at: Utc::now(),
            payload,
        }
    }

    pub fn with_status(mut self, status: PublicationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = published_at;
        self
    }

    pub fn is_published(&self) -> bool {
        self.status == PublicationStatus::Published
    }
}
