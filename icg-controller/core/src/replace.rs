//! Create-or-replace of named resources.
//!
//! The store offers no atomic upsert, so a replacement deletes the existing
//! resource and then creates the new one:
//!
//! ```text
//! START -> DELETE_ATTEMPTED -> CREATE_ATTEMPTED -> DONE
//!                 |                   |
//!                 +-> DeleteFailed    +-> CreateFailedAfterDelete
//! ```
//!
//! A delete that the store accepts but that finalizers hold open is a
//! failed delete: the previous resource still exists, so nothing is created.
//!
//! A missing resource is a successful delete, so a failed replacement may
//! always be retried. If the create fails after the delete succeeded, the
//! resource is gone until a retry succeeds; that outcome is reported as
//! [`ReplaceError::CreateFailedAfterDelete`] and never swallowed.
//!
//! Replacements of the same resource through one `Replacer` are serialized.
//! Nothing orders writers in other processes: two replicas replacing the
//! same resource may interleave their deletes and creates, and the last
//! create to land wins while the other fails with `AlreadyExists`.

use crate::{
    lock::KeyedLocks,
    store::{ConfigStore, Kind, MeshResource, StoreError},
};
use std::{future::Future, time::Duration};
use thiserror::Error;
use tokio::time;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug)]
pub struct Replacer<S> {
    store: S,
    timeout: Duration,
    locks: KeyedLocks<(Kind, String, String)>,
}

#[derive(Debug, Error)]
pub enum ReplaceError {
    /// The existing resource could not be removed. Nothing was created.
    #[error("failed to delete {kind} {namespace}/{name}: {source}")]
    DeleteFailed {
        kind: Kind,
        namespace: String,
        name: String,
        #[source]
        source: StoreError,
    },

    /// The existing resource (if any) was removed, but its replacement was
    /// not created.
    #[error(
        "failed to create {kind} {namespace}/{name}: {source}; \
         the previous {kind} no longer exists"
    )]
    CreateFailedAfterDelete {
        kind: Kind,
        namespace: String,
        name: String,
        #[source]
        source: StoreError,
    },
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// === impl Replacer ===

impl<S: ConfigStore> Replacer<S> {
    /// Each store call made by a replacement must complete within `timeout`.
    pub fn new(store: S, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            locks: KeyedLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replaces the resource `namespace/name` of kind `K` with `resource`,
    /// returning the resource as created.
    ///
    /// `resource`'s namespace and name are set from the arguments.
    #[instrument(skip(self, resource), fields(kind = %K::KIND))]
    pub async fn replace<K: MeshResource>(
        &self,
        namespace: &str,
        name: &str,
        mut resource: K,
    ) -> Result<K, ReplaceError> {
        let _writer = self
            .locks
            .lock((K::KIND, namespace.to_string(), name.to_string()))
            .await;

        let meta = resource.meta_mut();
        meta.namespace = Some(namespace.to_string());
        meta.name = Some(name.to_string());

        match self.bounded(self.store.delete::<K>(namespace, name)).await {
            Ok(()) => debug!("Deleted previous resource"),
            Err(StoreError::NotFound) => debug!("No previous resource"),
            Err(source) => {
                warn!(error = %source, "Failed to delete previous resource");
                return Err(ReplaceError::DeleteFailed {
                    kind: K::KIND,
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    source,
                });
            }
        }

        match self.bounded(self.store.create(&resource)).await {
            Ok(created) => {
                info!("Replaced");
                Ok(created)
            }
            Err(source) => {
                error!(error = %source, "Failed to create resource after deleting its predecessor");
                Err(ReplaceError::CreateFailedAfterDelete {
                    kind: K::KIND,
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    source,
                })
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match time::timeout(self.timeout, call).await {
            Ok(res) => res,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

// === impl ReplaceError ===

impl ReplaceError {
    pub fn kind(&self) -> Kind {
        match self {
            Self::DeleteFailed { kind, .. } | Self::CreateFailedAfterDelete { kind, .. } => *kind,
        }
    }

    /// True if the previous resource may have been removed without a
    /// replacement.
    pub fn is_after_delete(&self) -> bool {
        matches!(self, Self::CreateFailedAfterDelete { .. })
    }
}
