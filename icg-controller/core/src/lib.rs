//! Traffic policy synthesis and replacement.
//!
//! Clients describe intents--"split traffic for a service across versions
//! with these weights", "balance a version of a service with this
//! algorithm"--which are turned into Istio routing resources and written to
//! the cluster:
//!
//! ```text
//! [ TrafficSplitRequest ]      -> split::Synthesizer  -> [ VirtualService ]  \
//!                                                                              -> Replacer -> ConfigStore
//! [ LoadBalancePolicyRequest ] -> subset::synthesize  -> [ DestinationRule ] /
//! ```
//!
//! There is no atomic upsert in the store contract, so a write is a delete
//! followed by a create (see [`replace`]). The read path lists the mesh
//! resources of a namespace into a [`snapshot::ClusterSnapshot`].

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod lock;
pub mod replace;
pub mod request;
pub mod snapshot;
pub mod split;
pub mod store;
pub mod subset;

pub use self::{
    replace::{ReplaceError, Replacer},
    request::{InvalidSpecification, LoadBalancePolicyRequest, LoadBalancer, TrafficSplitRequest},
    snapshot::{ClusterSnapshot, UpstreamListFailed},
    store::{ConfigStore, Kind, MeshResource, StoreError},
};
pub use icg_controller_k8s_api as k8s;
