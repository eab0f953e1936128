use crate::{
    k8s::{
        labels,
        virtual_service::{Destination, HttpRoute, HttpRouteDestination},
        ObjectMeta, VirtualService, VirtualServiceSpec,
    },
    request::{InvalidSpecification, TrafficSplitRequest},
};

/// Builds the `VirtualService` for a traffic split.
///
/// Every synthesized route is bound to the same, preconfigured set of
/// gateways; nothing about the binding is taken from the request.
#[derive(Clone, Debug)]
pub struct Synthesizer {
    gateways: Vec<String>,
}

impl Synthesizer {
    pub fn new(gateways: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            gateways: gateways.into_iter().map(Into::into).collect(),
        }
    }

    /// Produces a resource named after the service with a single HTTP rule,
    /// whose destinations are the request's versions (as subsets of the
    /// service) in request order.
    ///
    /// Equal requests always produce equal resources.
    pub fn synthesize(
        &self,
        req: &TrafficSplitRequest,
    ) -> Result<VirtualService, InvalidSpecification> {
        let pairs = req.validate()?;

        let route = pairs
            .into_iter()
            .map(|(version, weight)| HttpRouteDestination {
                destination: Destination {
                    host: req.service.clone(),
                    subset: Some(version.to_string()),
                    ..Default::default()
                },
                weight: Some(weight),
                ..Default::default()
            })
            .collect();

        Ok(VirtualService {
            metadata: ObjectMeta {
                namespace: Some(req.namespace.clone()),
                name: Some(req.service.clone()),
                labels: Some(labels::managed()),
                ..Default::default()
            },
            spec: VirtualServiceSpec {
                hosts: vec![req.service.clone()],
                gateways: self.gateways.clone(),
                http: vec![HttpRoute {
                    route,
                    ..Default::default()
                }],
                ..Default::default()
            },
        })
    }
}
