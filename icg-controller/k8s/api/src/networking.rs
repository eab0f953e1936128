//! Istio `networking.istio.io/v1alpha3` resources.
//!
//! Only the fields the controller writes are modeled. Everything else a
//! resource carries is kept in an [`Unmodeled`] map, so a resource read from
//! the cluster serializes back unchanged.

pub mod destination_rule;
pub mod gateway;
pub mod service_entry;
pub mod virtual_service;

pub const GROUP: &str = "networking.istio.io";
pub const VERSION: &str = "v1alpha3";

/// Fields of a resource that have no typed representation.
pub type Unmodeled = serde_json::Map<String, serde_json::Value>;
