//! The traffic management HTTP API.
//!
//! | Route                       | Method | Success                     |
//! |-----------------------------|--------|-----------------------------|
//! | `/api/icg/hello`            | GET    | 200, a greeting             |
//! | `/api/icg/istioConfig`      | GET    | 200, the namespace snapshot |
//! | `/api/icg/weightConfig`     | POST   | 201, the `VirtualService`   |
//! | `/api/icg/lbConfig`         | POST   | 201, the `DestinationRule`  |

use crate::{
    core::{
        replace::Replacer, snapshot, split, subset, ConfigStore, InvalidSpecification,
        LoadBalancePolicyRequest, MeshResource, ReplaceError, TrafficSplitRequest,
    },
    metrics::ApiMetrics,
};
use bytes::Bytes;
use futures::future;
use http_body_util::{BodyExt, Limited};
use hyper::{http, Request, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info_span, trace, warn, Instrument};

/// Serves the traffic API against a [`ConfigStore`].
pub struct Api<S> {
    inner: Arc<Inner<S>>,
}

/// Settings fixed at startup.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// The namespace whose configuration is reported by `istioConfig`.
    pub namespace: String,

    /// The gateways every synthesized `VirtualService` is bound to.
    pub gateways: Vec<String>,

    /// Bounds each call to the store.
    pub store_timeout: Duration,
}

struct Inner<S> {
    namespace: String,
    store_timeout: Duration,
    routes: split::Synthesizer,
    replacer: Replacer<S>,
    metrics: ApiMetrics,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[source] BoxError),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Body = http_body_util::Full<Bytes>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

const GREETING: &str = "Hello Istio Client Go";

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Route {
    Hello,
    IstioConfig,
    WeightConfig,
    LbConfig,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

// === impl Api ===

impl<S> Clone for Api<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: ConfigStore + 'static> Api<S> {
    pub fn new(store: S, config: ApiConfig, metrics: ApiMetrics) -> Self {
        let ApiConfig {
            namespace,
            gateways,
            store_timeout,
        } = config;
        Self {
            inner: Arc::new(Inner {
                namespace,
                store_timeout,
                routes: split::Synthesizer::new(gateways),
                replacer: Replacer::new(store, store_timeout),
                metrics,
            }),
        }
    }

    async fn handle<B>(self, req: Request<B>) -> Result<Response<Body>, Error>
    where
        B: hyper::body::Body + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let route = Route::from_path(req.uri().path());
        let rsp = match (route, req.method()) {
            (Some(Route::Hello), &http::Method::GET) => {
                json_response(http::StatusCode::OK, &GREETING)?
            }
            (Some(Route::IstioConfig), &http::Method::GET) => self.istio_config().await?,
            (Some(Route::WeightConfig), &http::Method::POST) => match read_json(req).await? {
                Ok(split) => self.weight_config(split).await?,
                Err(rsp) => rsp,
            },
            (Some(Route::LbConfig), &http::Method::POST) => match read_json(req).await? {
                Ok(policy) => self.lb_config(policy).await?,
                Err(rsp) => rsp,
            },
            (Some(_), _) => empty_response(http::StatusCode::METHOD_NOT_ALLOWED),
            (None, _) => empty_response(http::StatusCode::NOT_FOUND),
        };

        let name = route.map(Route::as_str).unwrap_or("unknown");
        self.inner.metrics.request(name, rsp.status());
        Ok(rsp)
    }

    async fn istio_config(&self) -> Result<Response<Body>, Error> {
        let namespace = &self.inner.namespace;
        match snapshot::snapshot(self.inner.replacer.store(), namespace, self.inner.store_timeout)
            .await
        {
            Ok(snapshot) => json_response(http::StatusCode::OK, &snapshot),
            Err(error) => {
                warn!(%error, %namespace, "Failed to list mesh configuration");
                error_response(
                    http::StatusCode::INTERNAL_SERVER_ERROR,
                    "UpstreamListFailed",
                    error,
                )
            }
        }
    }

    async fn weight_config(&self, split: TrafficSplitRequest) -> Result<Response<Body>, Error> {
        debug!(?split);
        let vs = match self.inner.routes.synthesize(&split) {
            Ok(vs) => vs,
            Err(error) => return invalid_response(error),
        };
        self.replace(split.namespace, split.service, vs).await
    }

    async fn lb_config(&self, policy: LoadBalancePolicyRequest) -> Result<Response<Body>, Error> {
        debug!(?policy);
        let dr = match subset::synthesize(&policy) {
            Ok(dr) => dr,
            Err(error) => return invalid_response(error),
        };
        self.replace(policy.namespace, policy.service, dr).await
    }

    /// Replaces the resource on a background task so that a client going
    /// away can not interrupt a replacement between its delete and create.
    async fn replace<K: MeshResource>(
        &self,
        namespace: String,
        name: String,
        resource: K,
    ) -> Result<Response<Body>, Error> {
        let inner = self.inner.clone();
        let task = tokio::spawn(
            async move {
                inner
                    .replacer
                    .replace(&namespace, &name, resource)
                    .await
            }
            .in_current_span(),
        );

        let res = match task.await {
            Ok(res) => res,
            Err(error) => {
                warn!(%error, "Replacement task failed");
                return error_response(
                    http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal",
                    "replacement did not complete; the resource may no longer exist",
                );
            }
        };

        self.inner.metrics.replaced(K::KIND, res.as_ref().map(|_| ()));
        match res {
            Ok(created) => json_response(http::StatusCode::CREATED, &created),
            Err(error) => replace_error_response(error),
        }
    }
}

impl<S, B> tower::Service<Request<B>> for Api<S>
where
    S: ConfigStore + 'static,
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        trace!(method = %req.method(), uri = %req.uri(), "Request");
        let span = info_span!("api", method = %req.method(), path = %req.uri().path());
        Box::pin(self.clone().handle(req).instrument(span))
    }
}

// === impl Route ===

impl Route {
    fn from_path(path: &str) -> Option<Self> {
        match path {
            "/api/icg/hello" => Some(Self::Hello),
            "/api/icg/istioConfig" => Some(Self::IstioConfig),
            "/api/icg/weightConfig" => Some(Self::WeightConfig),
            "/api/icg/lbConfig" => Some(Self::LbConfig),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::IstioConfig => "istio_config",
            Self::WeightConfig => "weight_config",
            Self::LbConfig => "lb_config",
        }
    }
}

/// Reads a JSON request body.
///
/// A body that can not be parsed is an invalid specification and produces
/// a response rather than an error.
async fn read_json<B, T>(req: Request<B>) -> Result<Result<T, Response<Body>>, Error>
where
    B: hyper::body::Body,
    B::Error: Into<BoxError>,
    T: DeserializeOwned,
{
    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(body) => body.to_bytes(),
        Err(error) if error.is::<http_body_util::LengthLimitError>() => {
            return error_response(
                http::StatusCode::PAYLOAD_TOO_LARGE,
                "InvalidSpecification",
                format_args!("request body exceeds {MAX_BODY_BYTES} bytes"),
            )
            .map(Err);
        }
        Err(error) => return Err(Error::Request(error)),
    };

    match serde_json::from_slice(&body) {
        Ok(t) => Ok(Ok(t)),
        Err(error) => {
            debug!(%error, "Failed to parse request body");
            error_response(http::StatusCode::BAD_REQUEST, "InvalidSpecification", error).map(Err)
        }
    }
}

fn invalid_response(error: InvalidSpecification) -> Result<Response<Body>, Error> {
    debug!(%error, "Invalid specification");
    error_response(http::StatusCode::BAD_REQUEST, "InvalidSpecification", error)
}

fn replace_error_response(error: ReplaceError) -> Result<Response<Body>, Error> {
    let kind = match error {
        ReplaceError::DeleteFailed { .. } => "DeleteFailed",
        ReplaceError::CreateFailedAfterDelete { .. } => "CreateFailedAfterDelete",
    };
    error_response(http::StatusCode::INTERNAL_SERVER_ERROR, kind, error)
}

fn error_response(
    status: http::StatusCode,
    error: &str,
    message: impl std::fmt::Display,
) -> Result<Response<Body>, Error> {
    json_response(
        status,
        &ErrorBody {
            error,
            message: message.to_string(),
        },
    )
}

fn json_response<T: Serialize + ?Sized>(
    status: http::StatusCode,
    body: &T,
) -> Result<Response<Body>, Error> {
    let mut bytes = serde_json::to_vec_pretty(body)?;
    bytes.push(b'\n');
    Ok(Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json; charset=utf-8")
        .body(Body::from(bytes))
        .expect("json response must be valid"))
}

fn empty_response(status: http::StatusCode) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::default())
        .expect("empty response must be valid")
}

#[cfg(test)]
mod tests;
