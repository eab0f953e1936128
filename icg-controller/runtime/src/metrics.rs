use crate::core::{Kind, ReplaceError};
use hyper::http::StatusCode;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct ApiMetrics {
    requests: Family<RequestLabels, Counter>,
    replaces: Family<ReplaceLabels, Counter>,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct RequestLabels {
    route: &'static str,
    status: String,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct ReplaceLabels {
    kind: &'static str,
    outcome: &'static str,
}

// === ApiMetrics ===

impl ApiMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let requests = Family::<RequestLabels, Counter>::default();
        reg.register(
            "api_requests",
            "Total number of traffic API requests by route and response status",
            requests.clone(),
        );

        let replaces = Family::<ReplaceLabels, Counter>::default();
        reg.register(
            "replace",
            "Total number of resource replacements by kind and outcome",
            replaces.clone(),
        );

        Self { requests, replaces }
    }

    pub(crate) fn request(&self, route: &'static str, status: StatusCode) {
        self.requests
            .get_or_create(&RequestLabels {
                route,
                status: status.as_u16().to_string(),
            })
            .inc();
    }

    pub(crate) fn replaced(&self, kind: Kind, res: Result<(), &ReplaceError>) {
        let outcome = match res {
            Ok(()) => "replaced",
            Err(ReplaceError::DeleteFailed { .. }) => "delete_failed",
            Err(ReplaceError::CreateFailedAfterDelete { .. }) => "create_failed_after_delete",
        };
        self.replaces
            .get_or_create(&ReplaceLabels {
                kind: kind.as_str(),
                outcome,
            })
            .inc();
    }

    #[cfg(test)]
    pub(crate) fn replace_count(&self, kind: Kind, outcome: &'static str) -> u64 {
        self.replaces
            .get_or_create(&ReplaceLabels {
                kind: kind.as_str(),
                outcome,
            })
            .get()
    }
}
