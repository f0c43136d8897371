use crate::{PublicationStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowcore::{FlowId, FlowMetadata, PublicationRecord, SnapshotPayload};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

/// On-disk form of an in-memory store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub flows: Vec<FlowMetadata>,
    #[serde(default)]
    pub publications: Vec<PublicationRecord>,
}

/// Publication store kept entirely in memory
#[derive(Default)]
pub struct InMemoryPublicationStore {
    flows: RwLock<HashMap<FlowId, FlowMetadata>>,
    publications: RwLock<Vec<PublicationRecord>>,
}

impl InMemoryPublicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(document: StoreDocument) -> Self {
        let flows = document
            .flows
            .into_iter()
            .map(|meta| (meta.flow_id, meta))
            .collect();

        Self {
            flows: RwLock::new(flows),
            publications: RwLock::new(document.publications),
        }
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let document: StoreDocument = serde_json::from_str(&raw)?;
        tracing::info!(
            "Loaded {} flows and {} publications from {}",
            document.flows.len(),
            document.publications.len(),
            path.as_ref().display()
        );
        Ok(Self::from_document(document))
    }

    pub async fn insert_flow(&self, metadata: FlowMetadata) {
        self.flows.write().await.insert(metadata.flow_id, metadata);
    }

    pub async fn remove_flow(&self, flow_id: FlowId) -> Option<FlowMetadata> {
        self.flows.write().await.remove(&flow_id)
    }

    /// Record a new `Published` publication and return it
    pub async fn publish(
        &self,
        flow_id: FlowId,
        payload: impl Into<SnapshotPayload>,
    ) -> PublicationRecord {
        let record = PublicationRecord::published(flow_id, payload.into());
        self.add_publication(record.clone()).await;
        record
    }

    pub async fn add_publication(&self, record: PublicationRecord) {
        self.publications.write().await.push(record);
    }
}

#[async_trait]
impl PublicationStore for InMemoryPublicationStore {
    async fn latest_publication(
        &self,
        flow_id: FlowId,
    ) -> Result<Option<PublicationRecord>, StoreError> {
        let publications = self.publications.read().await;
        // max_by_key keeps the last of equal maxima, so later inserts win ties
        Ok(publications
            .iter()
            .filter(|p| p.flow_id == flow_id && p.is_published())
            .max_by_key(|p| p.published_at)
            .cloned())
    }

    async fn flow_metadata(&self, flow_id: FlowId) -> Result<Option<FlowMetadata>, StoreError> {
        Ok(self.flows.read().await.get(&flow_id).cloned())
    }

    async fn published_flows(&self) -> Result<Vec<FlowMetadata>, StoreError> {
        let flows = self.flows.read().await;
        let publications = self.publications.read().await;

        let mut latest: HashMap<FlowId, DateTime<Utc>> = HashMap::new();
        for publication in publications.iter().filter(|p| p.is_published()) {
            let entry = latest
                .entry(publication.flow_id)
                .or_insert(publication.published_at);
            if publication.published_at > *entry {
                *entry = publication.published_at;
            }
        }

        let mut listed: Vec<(DateTime<Utc>, FlowMetadata)> = latest
            .into_iter()
            .filter_map(|(flow_id, at)| flows.get(&flow_id).map(|meta| (at, meta.clone())))
            .collect();
        listed.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(listed.into_iter().map(|(_, meta)| meta).collect())
    }
}
