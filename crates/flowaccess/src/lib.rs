//! Flow access provider
//!
//! Resolves the latest published snapshot of a flow and authorizes a
//! requester against the flow's ownership rule before anything else in the
//! pool is allowed to happen.

mod memory;
mod provider;
mod store;

pub use memory::{InMemoryPublicationStore, StoreDocument};
pub use provider::FlowAccessProvider;
pub use store::{PublicationStore, StoreError};
