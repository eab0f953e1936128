use crate::{
    k8s::{DestinationRule, Gateway, ServiceEntry, VirtualService},
    store::{ConfigStore, Kind, MeshResource, StoreError},
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tracing::{debug, instrument};

/// The mesh resources of a namespace, each listed independently.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSnapshot {
    pub virtual_services: Vec<VirtualService>,
    pub destination_rules: Vec<DestinationRule>,
    pub gateways: Vec<Gateway>,
    pub service_entries: Vec<ServiceEntry>,
}

/// One of the snapshot's lists failed, so there is no snapshot.
#[derive(Debug, Error)]
#[error("failed to list {kind} resources: {source}")]
pub struct UpstreamListFailed {
    pub kind: Kind,
    #[source]
    pub source: StoreError,
}

/// Lists every mesh resource kind in `namespace`.
///
/// The lists are issued concurrently, each bounded by `timeout`. Any failure
/// fails the whole snapshot; partial results are never returned.
#[instrument(skip(store))]
pub async fn snapshot<S: ConfigStore>(
    store: &S,
    namespace: &str,
    timeout: Duration,
) -> Result<ClusterSnapshot, UpstreamListFailed> {
    let (virtual_services, destination_rules, gateways, service_entries) = tokio::try_join!(
        list::<S, VirtualService>(store, namespace, timeout),
        list::<S, DestinationRule>(store, namespace, timeout),
        list::<S, Gateway>(store, namespace, timeout),
        list::<S, ServiceEntry>(store, namespace, timeout),
    )?;

    for vs in &virtual_services {
        debug!(name = ?vs.metadata.name, hosts = ?vs.spec.hosts, "VirtualService");
    }
    for dr in &destination_rules {
        debug!(name = ?dr.metadata.name, host = %dr.spec.host, "DestinationRule");
    }
    for gw in &gateways {
        debug!(name = ?gw.metadata.name, servers = ?gw.spec.servers, "Gateway");
    }
    for se in &service_entries {
        debug!(name = ?se.metadata.name, hosts = ?se.spec.hosts, "ServiceEntry");
    }

    Ok(ClusterSnapshot {
        virtual_services,
        destination_rules,
        gateways,
        service_entries,
    })
}

async fn list<S: ConfigStore, K: MeshResource>(
    store: &S,
    namespace: &str,
    timeout: Duration,
) -> Result<Vec<K>, UpstreamListFailed> {
    let res = match time::timeout(timeout, store.list::<K>(namespace)).await {
        Ok(res) => res,
        Err(_) => Err(StoreError::Timeout(timeout)),
    };
    res.map_err(|source| UpstreamListFailed {
        kind: K::KIND,
        source,
    })
}

#[cfg(test)]
mod tests;
