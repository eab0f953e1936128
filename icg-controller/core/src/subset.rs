use crate::{
    k8s::{
        destination_rule::{Subset, TrafficPolicy},
        labels, DestinationRule, DestinationRuleSpec, ObjectMeta,
    },
    request::{InvalidSpecification, LoadBalancePolicyRequest},
};

/// Builds the `DestinationRule` for a load balancing policy.
///
/// The rule is named after the service alone and holds a single subset for
/// the requested version. Replacing it therefore drops whatever subsets an
/// earlier request declared for other versions of the service.
pub fn synthesize(req: &LoadBalancePolicyRequest) -> Result<DestinationRule, InvalidSpecification> {
    req.validate()?;

    Ok(DestinationRule {
        metadata: ObjectMeta {
            namespace: Some(req.namespace.clone()),
            name: Some(req.service.clone()),
            labels: Some(labels::managed()),
            ..Default::default()
        },
        spec: DestinationRuleSpec {
            host: req.service.clone(),
            subsets: vec![Subset::for_version(&req.version)],
            traffic_policy: Some(TrafficPolicy::simple(req.load_balancer.into())),
            ..Default::default()
        },
    })
}
