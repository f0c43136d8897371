use crate::{FlowId, GroupId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access-control category of a flow.
///
/// Stored classifications that are not recognised deserialize to
/// `Unknown`, which denies every requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    Public,
    User,
    Group,
    #[serde(other)]
    Unknown,
}

impl OwnerKind {
    /// Apply the ownership rule for a requester.
    pub fn allows(
        &self,
        owner_id: Option<Uuid>,
        requester_id: UserId,
        requester_groups: &[GroupId],
    ) -> bool {
        match (self, owner_id) {
            (OwnerKind::Public, _) => true,
            (OwnerKind::User, Some(owner)) => owner == requester_id,
            (OwnerKind::Group, Some(owner)) => requester_groups.contains(&owner),
            _ => false,
        }
    }
}

/// Ownership metadata of a flow, as kept by the flow store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMetadata {
    pub flow_id: FlowId,
    #[serde(default)]
    pub name: Option<String>,
    pub owner_kind: OwnerKind,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
}

impl FlowMetadata {
    pub fn public(flow_id: FlowId) -> Self {
        Self {
            flow_id,
            name: None,
            owner_kind: OwnerKind::Public,
            owner_id: None,
        }
    }

    pub fn owned_by_user(flow_id: FlowId, user_id: UserId) -> Self {
        Self {
            flow_id,
            name: None,
            owner_kind: OwnerKind::User,
            owner_id: Some(user_id),
        }
    }

    pub fn owned_by_group(flow_id: FlowId, group_id: GroupId) -> Self {
        Self {
            flow_id,
            name: None,
            owner_kind: OwnerKind::Group,
            owner_id: Some(group_id),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_accessible_by(&self, requester_id: UserId, requester_groups: &[GroupId]) -> bool {
        self.owner_kind
            .allows(self.owner_id, requester_id, requester_groups)
    }
}
