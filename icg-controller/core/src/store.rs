use crate::k8s::{
    DestinationRule, Gateway, NamespaceResourceScope, Resource, ServiceEntry, VirtualService,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, time::Duration};
use thiserror::Error;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

/// Models the cluster's configuration API.
///
/// This is the only shared, mutable state the controller touches. Calls may
/// block on I/O; callers bound them with their own deadlines.
#[async_trait::async_trait]
pub trait ConfigStore: Send + Sync {
    async fn list<K: MeshResource>(&self, namespace: &str) -> Result<Vec<K>, StoreError>;

    async fn get<K: MeshResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, StoreError>;

    /// Creates `resource` in the namespace and under the name in its
    /// metadata, returning the resource as stored.
    async fn create<K: MeshResource>(&self, resource: &K) -> Result<K, StoreError>;

    /// Fails with [`StoreError::NotFound`] if there is no such resource, and
    /// with [`StoreError::DeletionPending`] if the resource still exists once
    /// the call returns.
    async fn delete<K: MeshResource>(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

/// A namespaced mesh resource kind the store can hold.
pub trait MeshResource:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    const KIND: Kind;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    VirtualService,
    DestinationRule,
    Gateway,
    ServiceEntry,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resource not found")]
    NotFound,

    #[error("resource already exists")]
    AlreadyExists,

    /// The resource is marked for deletion but is held by finalizers.
    #[error("deletion is pending finalization")]
    DeletionPending,

    #[error("rejected with status {code}: {message}")]
    Rejected { code: u16, message: String },

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Client(#[from] kube::Error),
}

// === impl Kind ===

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VirtualService => "VirtualService",
            Self::DestinationRule => "DestinationRule",
            Self::Gateway => "Gateway",
            Self::ServiceEntry => "ServiceEntry",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl MeshResource ===

impl MeshResource for VirtualService {
    const KIND: Kind = Kind::VirtualService;
}

impl MeshResource for DestinationRule {
    const KIND: Kind = Kind::DestinationRule;
}

impl MeshResource for Gateway {
    const KIND: Kind = Kind::Gateway;
}

impl MeshResource for ServiceEntry {
    const KIND: Kind = Kind::ServiceEntry;
}
