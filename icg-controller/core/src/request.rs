use crate::k8s::destination_rule::SimpleLb;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, str::FromStr};
use thiserror::Error;

/// Splits a service's traffic across its versions.
///
/// Versions and weights are paired by position.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrafficSplitRequest {
    #[serde(rename = "ns")]
    pub namespace: String,

    #[serde(rename = "svcname")]
    pub service: String,

    pub versions: Vec<String>,

    pub weights: Vec<i64>,
}

/// Applies a load balancing algorithm to a version of a service.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoadBalancePolicyRequest {
    #[serde(rename = "ns")]
    pub namespace: String,

    #[serde(rename = "svcname")]
    pub service: String,

    pub version: String,

    #[serde(rename = "lb")]
    pub load_balancer: LoadBalancer,
}

/// The load balancing algorithms a policy may request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum LoadBalancer {
    RoundRobin,
    LeastConn,
    Random,
    Passthrough,
}

/// A request that can not be turned into a well-formed resource.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvalidSpecification {
    #[error("namespace must not be empty")]
    EmptyNamespace,

    #[error("service name must not be empty")]
    EmptyService,

    #[error("version must not be empty")]
    EmptyVersion,

    #[error("namespace {0:?} is not a valid DNS-1123 label")]
    InvalidNamespace(String),

    #[error("service name {0:?} is not a valid DNS-1123 label")]
    InvalidService(String),

    #[error("version {0:?} is not a valid DNS-1123 label")]
    InvalidVersion(String),

    #[error("at least one version must be specified")]
    NoVersions,

    #[error("{versions} versions were specified with {weights} weights")]
    ArityMismatch { versions: usize, weights: usize },

    #[error("weight {weight} of version {version} is not within 0..=100")]
    WeightOutOfRange { version: String, weight: i64 },

    #[error("weights must sum to 100, not {0}")]
    WeightSum(i64),

    #[error("version {0} is specified more than once")]
    DuplicateVersion(String),

    #[error("unknown load balancer {0:?}; expected one of ROUND_ROBIN, LEAST_CONN, RANDOM, PASSTHROUGH")]
    UnknownLoadBalancer(String),
}

const MAX_WEIGHT: i64 = 100;

/// Names and label values are limited to 63 characters.
const MAX_LABEL_LEN: usize = 63;

// === impl TrafficSplitRequest ===

impl TrafficSplitRequest {
    /// Checks every invariant of a split, returning the (version, weight)
    /// pairs in request order.
    pub fn validate(&self) -> Result<Vec<(&str, i32)>, InvalidSpecification> {
        validate_identity(&self.namespace, &self.service)?;

        if self.versions.len() != self.weights.len() {
            return Err(InvalidSpecification::ArityMismatch {
                versions: self.versions.len(),
                weights: self.weights.len(),
            });
        }
        if self.versions.is_empty() {
            return Err(InvalidSpecification::NoVersions);
        }

        let mut seen = HashSet::with_capacity(self.versions.len());
        let mut pairs = Vec::with_capacity(self.versions.len());
        for (version, &weight) in self.versions.iter().zip(&self.weights) {
            validate_version(version)?;
            if !seen.insert(version.as_str()) {
                return Err(InvalidSpecification::DuplicateVersion(version.clone()));
            }
            let weight = match i32::try_from(weight) {
                Ok(w) if (0..=MAX_WEIGHT).contains(&weight) => w,
                _ => {
                    return Err(InvalidSpecification::WeightOutOfRange {
                        version: version.clone(),
                        weight,
                    })
                }
            };
            pairs.push((version.as_str(), weight));
        }

        let sum = self.weights.iter().sum::<i64>();
        if sum != MAX_WEIGHT {
            return Err(InvalidSpecification::WeightSum(sum));
        }

        Ok(pairs)
    }
}

// === impl LoadBalancePolicyRequest ===

impl LoadBalancePolicyRequest {
    pub fn validate(&self) -> Result<(), InvalidSpecification> {
        validate_identity(&self.namespace, &self.service)?;
        validate_version(&self.version)
    }
}

fn validate_identity(namespace: &str, service: &str) -> Result<(), InvalidSpecification> {
    if namespace.is_empty() {
        return Err(InvalidSpecification::EmptyNamespace);
    }
    if service.is_empty() {
        return Err(InvalidSpecification::EmptyService);
    }
    if !is_dns_label(namespace) {
        return Err(InvalidSpecification::InvalidNamespace(namespace.to_string()));
    }
    if !is_dns_label(service) {
        return Err(InvalidSpecification::InvalidService(service.to_string()));
    }
    Ok(())
}

/// A version names a subset and is the value of its `version` label, so it
/// must be valid as both.
fn validate_version(version: &str) -> Result<(), InvalidSpecification> {
    if version.is_empty() {
        return Err(InvalidSpecification::EmptyVersion);
    }
    if !is_dns_label(version) {
        return Err(InvalidSpecification::InvalidVersion(version.to_string()));
    }
    Ok(())
}

/// Lowercase alphanumerics and `-`, starting and ending with an
/// alphanumeric, at most 63 characters.
fn is_dns_label(s: &str) -> bool {
    let alnum = |c: u8| c.is_ascii_lowercase() || c.is_ascii_digit();
    match (s.as_bytes().first(), s.as_bytes().last()) {
        (Some(&first), Some(&last)) => {
            s.len() <= MAX_LABEL_LEN
                && alnum(first)
                && alnum(last)
                && s.bytes().all(|c| alnum(c) || c == b'-')
        }
        _ => false,
    }
}

// === impl LoadBalancer ===

impl LoadBalancer {
    pub fn as_str(&self) -> &'static str {
        SimpleLb::from(*self).as_str()
    }
}

impl From<LoadBalancer> for SimpleLb {
    fn from(lb: LoadBalancer) -> Self {
        match lb {
            LoadBalancer::RoundRobin => SimpleLb::RoundRobin,
            LoadBalancer::LeastConn => SimpleLb::LeastConn,
            LoadBalancer::Random => SimpleLb::Random,
            LoadBalancer::Passthrough => SimpleLb::Passthrough,
        }
    }
}

impl FromStr for LoadBalancer {
    type Err = InvalidSpecification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ROUND_ROBIN" => Ok(Self::RoundRobin),
            "LEAST_CONN" => Ok(Self::LeastConn),
            "RANDOM" => Ok(Self::Random),
            "PASSTHROUGH" => Ok(Self::Passthrough),
            _ => Err(InvalidSpecification::UnknownLoadBalancer(s.to_string())),
        }
    }
}

impl TryFrom<String> for LoadBalancer {
    type Error = InvalidSpecification;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LoadBalancer> for &'static str {
    fn from(lb: LoadBalancer) -> Self {
        lb.as_str()
    }
}

impl fmt::Display for LoadBalancer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
