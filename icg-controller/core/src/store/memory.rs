//! An in-memory [`ConfigStore`] with fault injection.

use super::{ConfigStore, Kind, MeshResource, StoreError};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Get,
    Create,
    Delete,
}

type Key = (Kind, String, String);

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<Key, serde_json::Value>,
    faults: HashMap<(Op, Kind), u16>,
    delays: HashMap<(Op, Kind), Duration>,
    calls: HashMap<(Op, Kind), usize>,
    finalized: HashSet<Kind>,
    resource_version: u64,
}

// === impl MemoryStore ===

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a resource as-is, bypassing fault injection and call counts.
    pub fn insert<K: MeshResource>(&self, resource: K) {
        let key = key::<K>(resource.meta().namespace.as_deref(), resource.meta().name.as_deref())
            .expect("inserted resources must have a namespace and name");
        let value = serde_json::to_value(resource).expect("resource must serialize");
        self.state.lock().objects.insert(key, value);
    }

    /// Fails every subsequent `op` on `kind` with an API error until healed.
    pub fn fail(&self, op: Op, kind: Kind) {
        self.state.lock().faults.insert((op, kind), 500);
    }

    pub fn heal(&self, op: Op, kind: Kind) {
        self.state.lock().faults.remove(&(op, kind));
    }

    /// Deletes of `kind` leave the resource in place, as if held by a
    /// finalizer.
    pub fn finalize(&self, kind: Kind) {
        self.state.lock().finalized.insert(kind);
    }

    /// Delays every subsequent `op` on `kind` before it takes effect.
    pub fn delay(&self, op: Op, kind: Kind, delay: Duration) {
        self.state.lock().delays.insert((op, kind), delay);
    }

    /// The number of times `op` was attempted on `kind`.
    pub fn calls(&self, op: Op, kind: Kind) -> usize {
        self.state
            .lock()
            .calls
            .get(&(op, kind))
            .copied()
            .unwrap_or(0)
    }

    /// Reads a resource, bypassing fault injection and call counts.
    pub fn peek<K: MeshResource>(&self, namespace: &str, name: &str) -> Option<K> {
        let key = (K::KIND, namespace.to_string(), name.to_string());
        let value = self.state.lock().objects.get(&key).cloned()?;
        Some(serde_json::from_value(value).expect("stored resource must deserialize"))
    }

    async fn enter(&self, op: Op, kind: Kind) -> Result<(), StoreError> {
        let delay = {
            let mut state = self.state.lock();
            *state.calls.entry((op, kind)).or_default() += 1;
            if let Some(&code) = state.faults.get(&(op, kind)) {
                return Err(StoreError::Rejected {
                    code,
                    message: format!("injected {op:?} fault"),
                });
            }
            state.delays.get(&(op, kind)).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConfigStore for MemoryStore {
    async fn list<K: MeshResource>(&self, namespace: &str) -> Result<Vec<K>, StoreError> {
        self.enter(Op::List, K::KIND).await?;
        let state = self.state.lock();
        state
            .objects
            .iter()
            .filter(|((kind, ns, _), _)| *kind == K::KIND && ns == namespace)
            .map(|(_, value)| decode(value.clone()))
            .collect()
    }

    async fn get<K: MeshResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, StoreError> {
        self.enter(Op::Get, K::KIND).await?;
        let key = (K::KIND, namespace.to_string(), name.to_string());
        let value = self.state.lock().objects.get(&key).cloned();
        value.map(decode).transpose()
    }

    async fn create<K: MeshResource>(&self, resource: &K) -> Result<K, StoreError> {
        self.enter(Op::Create, K::KIND).await?;
        let key = key::<K>(resource.meta().namespace.as_deref(), resource.meta().name.as_deref())?;

        let mut state = self.state.lock();
        if state.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists);
        }
        state.resource_version += 1;
        let mut created = resource.clone();
        created.meta_mut().resource_version = Some(state.resource_version.to_string());
        let value = serde_json::to_value(&created).map_err(invalid)?;
        state.objects.insert(key, value);
        Ok(created)
    }

    async fn delete<K: MeshResource>(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.enter(Op::Delete, K::KIND).await?;
        let key = (K::KIND, namespace.to_string(), name.to_string());
        let mut state = self.state.lock();
        if !state.objects.contains_key(&key) {
            return Err(StoreError::NotFound);
        }
        if state.finalized.contains(&K::KIND) {
            return Err(StoreError::DeletionPending);
        }
        state.objects.remove(&key);
        Ok(())
    }
}

fn key<K: MeshResource>(namespace: Option<&str>, name: Option<&str>) -> Result<Key, StoreError> {
    match (namespace, name) {
        (Some(ns), Some(name)) => Ok((K::KIND, ns.to_string(), name.to_string())),
        _ => Err(StoreError::Rejected {
            code: 422,
            message: "metadata.namespace and metadata.name are required".to_string(),
        }),
    }
}

fn decode<K: MeshResource>(value: serde_json::Value) -> Result<K, StoreError> {
    serde_json::from_value(value).map_err(invalid)
}

fn invalid(error: serde_json::Error) -> StoreError {
    StoreError::Rejected {
        code: 422,
        message: error.to_string(),
    }
}
