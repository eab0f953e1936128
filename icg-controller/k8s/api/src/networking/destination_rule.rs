use super::Unmodeled;
use crate::labels;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Defines the subsets of a host and the traffic policy applied to them once
/// routing has occurred.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "networking.istio.io",
    version = "v1alpha3",
    kind = "DestinationRule",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct DestinationRuleSpec {
    pub host: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsets: Vec<Subset>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_policy: Option<TrafficPolicy>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub export_to: Vec<String>,

    #[serde(flatten)]
    pub unmodeled: Unmodeled,
}

/// A named set of a service's endpoints, selected by label.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subset {
    pub name: String,

    #[serde(default, skip_serializing_if = "labels::Map::is_empty")]
    pub labels: labels::Map,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_policy: Option<TrafficPolicy>,

    #[serde(flatten)]
    pub unmodeled: Unmodeled,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrafficPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<LoadBalancerSettings>,

    /// Connection pool, outlier detection and TLS settings.
    #[serde(flatten)]
    pub unmodeled: Unmodeled,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple: Option<SimpleLb>,

    /// `consistentHash`, locality settings, etc.
    #[serde(flatten)]
    pub unmodeled: Unmodeled,
}

/// Standard load balancing algorithms that require no tuning.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimpleLb {
    Unspecified,
    RoundRobin,
    LeastConn,
    Random,
    Passthrough,
    LeastRequest,
}

// === impl SimpleLb ===

impl SimpleLb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::RoundRobin => "ROUND_ROBIN",
            Self::LeastConn => "LEAST_CONN",
            Self::Random => "RANDOM",
            Self::Passthrough => "PASSTHROUGH",
            Self::LeastRequest => "LEAST_REQUEST",
        }
    }
}

impl fmt::Display for SimpleLb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl TrafficPolicy ===

impl TrafficPolicy {
    pub fn simple(lb: SimpleLb) -> Self {
        Self {
            load_balancer: Some(LoadBalancerSettings {
                simple: Some(lb),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

// === impl Subset ===

impl Subset {
    /// A subset selecting the pods labeled with `version`.
    pub fn for_version(version: &str) -> Self {
        Self {
            name: version.to_string(),
            labels: labels::version(version),
            ..Default::default()
        }
    }
}
