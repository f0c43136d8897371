use crate::PublicationStore;
use flowcore::{FlowId, FlowMetadata, FlowSnapshot, GroupId, UserId};
use std::sync::Arc;

/// Resolves published snapshots and gates them behind the ownership rule.
///
/// Every failure collapses to `None`: a missing publication, a missing flow,
/// a denied requester, a store error and an undecodable payload all look the
/// same to the caller. The cause is logged.
#[derive(Clone)]
pub struct FlowAccessProvider {
    store: Arc<dyn PublicationStore>,
}

impl FlowAccessProvider {
    pub fn new(store: Arc<dyn PublicationStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn PublicationStore> {
        &self.store
    }

    /// Latest published snapshot of `flow_id`, if the requester may see it
    pub async fn get_published_flow(
        &self,
        flow_id: FlowId,
        requester_id: UserId,
        requester_groups: &[GroupId],
    ) -> Option<Arc<FlowSnapshot>> {
        let publication = match self.store.latest_publication(flow_id).await {
            Ok(Some(publication)) => publication,
            Ok(None) => {
                tracing::debug!("No published snapshot for flow {}", flow_id);
                return None;
            }
            Err(e) => {
                tracing::error!("Failed to look up publication for flow {}: {}", flow_id, e);
                return None;
            }
        };

        let metadata = self.get_flow_metadata(flow_id).await?;

        if !metadata.is_accessible_by(requester_id, requester_groups) {
            tracing::warn!(
                "Requester {} denied access to flow {} ({:?})",
                requester_id,
                flow_id,
                metadata.owner_kind
            );
            return None;
        }

        match publication.payload.decode() {
            Ok(snapshot) => {
                tracing::debug!(
                    "Resolved publication {} of flow {} ({} nodes)",
                    publication.id,
                    flow_id,
                    snapshot.nodes().len()
                );
                Some(Arc::new(snapshot))
            }
            Err(e) => {
                tracing::error!(
                    "Failed to decode publication {} of flow {}: {}",
                    publication.id,
                    flow_id,
                    e
                );
                None
            }
        }
    }

    /// Ownership check alone, without resolving the snapshot
    pub async fn is_authorized(
        &self,
        flow_id: FlowId,
        requester_id: UserId,
        requester_groups: &[GroupId],
    ) -> bool {
        match self.get_flow_metadata(flow_id).await {
            Some(metadata) => metadata.is_accessible_by(requester_id, requester_groups),
            None => false,
        }
    }

    pub async fn get_flow_metadata(&self, flow_id: FlowId) -> Option<FlowMetadata> {
        match self.store.flow_metadata(flow_id).await {
            Ok(Some(metadata)) => Some(metadata),
            Ok(None) => {
                tracing::debug!("Flow {} not found", flow_id);
                None
            }
            Err(e) => {
                tracing::error!("Failed to look up flow {}: {}", flow_id, e);
                None
            }
        }
    }

    /// Published flows the requester may run, at most `limit` of them
    pub async fn list_accessible_flows(
        &self,
        requester_id: UserId,
        requester_groups: &[GroupId],
        limit: usize,
    ) -> Vec<FlowMetadata> {
        let candidates = match self.store.published_flows().await {
            Ok(flows) => flows,
            Err(e) => {
                tracing::error!("Failed to list published flows: {}", e);
                return Vec::new();
            }
        };

        candidates
            .into_iter()
            .filter(|meta| meta.is_accessible_by(requester_id, requester_groups))
            .take(limit)
            .collect()
    }
}
