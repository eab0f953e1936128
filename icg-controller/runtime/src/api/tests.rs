use super::*;
use crate::core::{
    store::memory::{MemoryStore, Op},
    Kind,
};
use crate::k8s::{DestinationRule, VirtualService};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

fn api(store: &MemoryStore) -> (Api<MemoryStore>, ApiMetrics) {
    let metrics = ApiMetrics::default();
    let config = ApiConfig {
        namespace: "shop".to_string(),
        gateways: vec!["reactapp-gateway".to_string()],
        store_timeout: Duration::from_secs(10),
    };
    (Api::new(store.clone(), config, metrics.clone()), metrics)
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .method(http::Method::GET)
        .uri(path)
        .body(Body::default())
        .unwrap()
}

fn post(path: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(http::Method::POST)
        .uri(path)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

async fn send(api: &Api<MemoryStore>, req: Request<Body>) -> (http::StatusCode, Value) {
    let rsp = api.clone().oneshot(req).await.expect("request must be served");
    let status = rsp.status();
    let bytes = rsp.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return (status, Value::Null);
    }
    (status, serde_json::from_slice(&bytes).expect("body must be json"))
}

fn split_body() -> Value {
    json!({
        "ns": "shop",
        "svcname": "catalog",
        "versions": ["v1", "v2"],
        "weights": [30, 70],
    })
}

fn policy_body(lb: &str) -> Value {
    json!({
        "ns": "shop",
        "svcname": "catalog",
        "version": "v2",
        "lb": lb,
    })
}

#[tokio::test]
async fn hello() {
    let (api, _) = api(&MemoryStore::new());
    let (status, body) = send(&api, get("/api/icg/hello")).await;
    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(body, json!("Hello Istio Client Go"));
}

#[tokio::test]
async fn unknown_routes_and_methods() {
    let (api, _) = api(&MemoryStore::new());
    let (status, _) = send(&api, get("/api/icg/nope")).await;
    assert_eq!(status, http::StatusCode::NOT_FOUND);

    let (status, _) = send(&api, get("/api/icg/weightConfig")).await;
    assert_eq!(status, http::StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = send(&api, post("/api/icg/istioConfig", &json!({}))).await;
    assert_eq!(status, http::StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn weight_config_creates_virtual_service() {
    let store = MemoryStore::new();
    let (api, metrics) = api(&store);

    let (status, body) = send(&api, post("/api/icg/weightConfig", &split_body())).await;
    assert_eq!(status, http::StatusCode::CREATED);
    assert_eq!(body["kind"], "VirtualService");
    assert_eq!(body["metadata"]["namespace"], "shop");
    assert_eq!(body["metadata"]["name"], "catalog");
    assert_eq!(
        body["spec"],
        json!({
            "hosts": ["catalog"],
            "gateways": ["reactapp-gateway"],
            "http": [{
                "route": [
                    { "destination": { "host": "catalog", "subset": "v1" }, "weight": 30 },
                    { "destination": { "host": "catalog", "subset": "v2" }, "weight": 70 },
                ],
            }],
        })
    );

    let stored = store
        .peek::<VirtualService>("shop", "catalog")
        .expect("virtual service must be stored");
    assert_eq!(serde_json::to_value(&stored).unwrap(), body);
    assert_eq!(metrics.replace_count(Kind::VirtualService, "replaced"), 1);
}

#[tokio::test]
async fn weight_config_rejects_invalid_splits() {
    let store = MemoryStore::new();
    let (api, _) = api(&store);

    let mut body = split_body();
    body["weights"] = json!([30, 60]);
    let (status, rsp) = send(&api, post("/api/icg/weightConfig", &body)).await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(rsp["error"], "InvalidSpecification");
    assert_eq!(rsp["message"], "weights must sum to 100, not 90");

    let mut body = split_body();
    body["versions"] = json!(["v1"]);
    let (status, rsp) = send(&api, post("/api/icg/weightConfig", &body)).await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(rsp["error"], "InvalidSpecification");

    let (status, rsp) = send(&api, post("/api/icg/weightConfig", &json!({ "ns": "shop" }))).await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(rsp["error"], "InvalidSpecification");

    assert_eq!(store.calls(Op::Delete, Kind::VirtualService), 0);
    assert_eq!(store.calls(Op::Create, Kind::VirtualService), 0);
}

#[tokio::test]
async fn lb_config_creates_destination_rule() {
    let store = MemoryStore::new();
    let (api, _) = api(&store);

    let (status, body) = send(&api, post("/api/icg/lbConfig", &policy_body("LEAST_CONN"))).await;
    assert_eq!(status, http::StatusCode::CREATED);
    assert_eq!(body["kind"], "DestinationRule");
    assert_eq!(
        body["spec"],
        json!({
            "host": "catalog",
            "subsets": [{ "name": "v2", "labels": { "version": "v2" } }],
            "trafficPolicy": { "loadBalancer": { "simple": "LEAST_CONN" } },
        })
    );
    assert!(store.peek::<DestinationRule>("shop", "catalog").is_some());
}

#[tokio::test]
async fn lb_config_rejects_unknown_algorithms() {
    let store = MemoryStore::new();
    let (api, _) = api(&store);

    let (status, rsp) = send(&api, post("/api/icg/lbConfig", &policy_body("FASTEST"))).await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(rsp["error"], "InvalidSpecification");
    assert!(
        rsp["message"].as_str().unwrap().contains("FASTEST"),
        "{rsp}"
    );
    assert_eq!(store.calls(Op::Delete, Kind::DestinationRule), 0);
}

#[tokio::test]
async fn malformed_identifiers_leave_the_cluster_untouched() {
    let store = MemoryStore::new();
    let (api, _) = api(&store);
    let (status, _) = send(&api, post("/api/icg/lbConfig", &policy_body("RANDOM"))).await;
    assert_eq!(status, http::StatusCode::CREATED);

    let mut body = policy_body("ROUND_ROBIN");
    body["version"] = json!("v1_beta");
    let (status, rsp) = send(&api, post("/api/icg/lbConfig", &body)).await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(rsp["error"], "InvalidSpecification");

    let mut body = split_body();
    body["svcname"] = json!("../destinationrules/catalog");
    let (status, rsp) = send(&api, post("/api/icg/weightConfig", &body)).await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(rsp["error"], "InvalidSpecification");

    assert_eq!(store.calls(Op::Delete, Kind::DestinationRule), 1);
    assert_eq!(store.calls(Op::Delete, Kind::VirtualService), 0);
    let dr = store
        .peek::<DestinationRule>("shop", "catalog")
        .expect("the existing rule must survive");
    assert_eq!(dr.spec.subsets[0].name, "v2");
}

#[tokio::test]
async fn failed_delete_is_a_server_error() {
    let store = MemoryStore::new();
    store.fail(Op::Delete, Kind::DestinationRule);
    let (api, metrics) = api(&store);

    let (status, rsp) = send(&api, post("/api/icg/lbConfig", &policy_body("RANDOM"))).await;
    assert_eq!(status, http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(rsp["error"], "DeleteFailed");
    assert_eq!(store.calls(Op::Create, Kind::DestinationRule), 0);
    assert_eq!(metrics.replace_count(Kind::DestinationRule, "delete_failed"), 1);
}

#[tokio::test]
async fn failed_create_reports_the_missing_resource() {
    let store = MemoryStore::new();
    store.fail(Op::Create, Kind::VirtualService);
    let (api, metrics) = api(&store);

    let (status, rsp) = send(&api, post("/api/icg/weightConfig", &split_body())).await;
    assert_eq!(status, http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(rsp["error"], "CreateFailedAfterDelete");
    assert!(
        rsp["message"].as_str().unwrap().contains("no longer exists"),
        "{rsp}"
    );
    assert_eq!(
        metrics.replace_count(Kind::VirtualService, "create_failed_after_delete"),
        1
    );

    store.heal(Op::Create, Kind::VirtualService);
    let (status, _) = send(&api, post("/api/icg/weightConfig", &split_body())).await;
    assert_eq!(status, http::StatusCode::CREATED);
}

#[tokio::test]
async fn istio_config_reports_the_namespace() {
    let store = MemoryStore::new();
    let (api, _) = api(&store);
    for svc in ["catalog", "reviews"] {
        let mut body = split_body();
        body["svcname"] = json!(svc);
        let (status, _) = send(&api, post("/api/icg/weightConfig", &body)).await;
        assert_eq!(status, http::StatusCode::CREATED);
    }
    let (status, _) = send(&api, post("/api/icg/lbConfig", &policy_body("ROUND_ROBIN"))).await;
    assert_eq!(status, http::StatusCode::CREATED);

    let (status, body) = send(&api, get("/api/icg/istioConfig")).await;
    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(body["virtualServices"].as_array().unwrap().len(), 2);
    assert_eq!(body["destinationRules"].as_array().unwrap().len(), 1);
    assert_eq!(body["gateways"], json!([]));
    assert_eq!(body["serviceEntries"], json!([]));
}

#[tokio::test]
async fn istio_config_is_all_or_nothing() {
    let store = MemoryStore::new();
    store.fail(Op::List, Kind::Gateway);
    let (api, _) = api(&store);

    let (status, body) = send(&api, get("/api/icg/istioConfig")).await;
    assert_eq!(status, http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "UpstreamListFailed");
    assert!(body.get("virtualServices").is_none());
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let store = MemoryStore::new();
    let (api, _) = api(&store);

    let mut body = split_body();
    body["svcname"] = json!("x".repeat(MAX_BODY_BYTES));
    let (status, rsp) = send(&api, post("/api/icg/weightConfig", &body)).await;
    assert_eq!(status, http::StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(rsp["error"], "InvalidSpecification");
}
