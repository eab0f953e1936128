use super::*;
use crate::{
    k8s::{DestinationRule, ObjectMeta, VirtualService},
    request::{LoadBalancePolicyRequest, LoadBalancer, TrafficSplitRequest},
    split::Synthesizer,
    store::memory::{MemoryStore, Op},
    subset,
};

const TIMEOUT: Duration = Duration::from_secs(10);

fn route(ns: &str, svc: &str) -> VirtualService {
    Synthesizer::new(["reactapp-gateway"])
        .synthesize(&TrafficSplitRequest {
            namespace: ns.to_string(),
            service: svc.to_string(),
            versions: vec!["v1".to_string()],
            weights: vec![100],
        })
        .unwrap()
}

fn policy(ns: &str, svc: &str) -> DestinationRule {
    subset::synthesize(&LoadBalancePolicyRequest {
        namespace: ns.to_string(),
        service: svc.to_string(),
        version: "v1".to_string(),
        load_balancer: LoadBalancer::RoundRobin,
    })
    .unwrap()
}

fn gateway(ns: &str, name: &str) -> Gateway {
    Gateway {
        metadata: ObjectMeta {
            namespace: Some(ns.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Default::default(),
    }
}

fn populated() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert(route("shop", "catalog"));
    store.insert(route("shop", "reviews"));
    store.insert(policy("shop", "catalog"));
    store.insert(route("other", "catalog"));
    store.insert(gateway("other", "reactapp-gateway"));
    store
}

#[tokio::test]
async fn lists_each_kind_in_namespace() {
    let store = populated();
    let snap = snapshot(&store, "shop", TIMEOUT)
        .await
        .expect("snapshot must succeed");

    assert_eq!(snap.virtual_services.len(), 2);
    assert_eq!(snap.destination_rules.len(), 1);
    assert_eq!(snap.gateways.len(), 0);
    assert_eq!(snap.service_entries.len(), 0);
    assert!(snap
        .virtual_services
        .iter()
        .all(|vs| vs.metadata.namespace.as_deref() == Some("shop")));

    for kind in [
        Kind::VirtualService,
        Kind::DestinationRule,
        Kind::Gateway,
        Kind::ServiceEntry,
    ] {
        assert_eq!(store.calls(Op::List, kind), 1, "{kind}");
    }
}

#[tokio::test]
async fn empty_namespace() {
    let snap = snapshot(&populated(), "empty", TIMEOUT)
        .await
        .expect("snapshot must succeed");
    assert_eq!(snap, ClusterSnapshot::default());
}

#[tokio::test]
async fn any_failed_list_fails_the_snapshot() {
    let store = populated();
    store.fail(Op::List, Kind::Gateway);

    let error = snapshot(&store, "shop", TIMEOUT)
        .await
        .expect_err("snapshot must fail");
    assert_eq!(error.kind, Kind::Gateway);
    assert!(error.to_string().contains("Gateway"), "{error}");
}

#[tokio::test(start_paused = true)]
async fn slow_list_fails_the_snapshot() {
    let store = populated();
    store.delay(Op::List, Kind::ServiceEntry, Duration::from_secs(60));

    let error = snapshot(&store, "shop", Duration::from_secs(1))
        .await
        .expect_err("snapshot must time out");
    assert_eq!(error.kind, Kind::ServiceEntry);
    assert!(matches!(error.source, StoreError::Timeout(_)));
}

#[test]
fn serializes_collections_by_kind() {
    let snap = ClusterSnapshot {
        virtual_services: vec![route("shop", "catalog")],
        ..Default::default()
    };
    let value = serde_json::to_value(&snap).unwrap();
    assert_eq!(value["virtualServices"][0]["kind"], "VirtualService");
    assert_eq!(value["destinationRules"], serde_json::json!([]));
    assert_eq!(value["gateways"], serde_json::json!([]));
    assert_eq!(value["serviceEntries"], serde_json::json!([]));
}

#[tokio::test]
async fn resources_are_reported_as_stored() {
    let inputs = [
        serde_json::json!({
            "apiVersion": "networking.istio.io/v1alpha3",
            "kind": "VirtualService",
            "metadata": { "name": "reviews", "namespace": "shop" },
            "spec": {
                "hosts": ["reviews"],
                "http": [
                    {
                        "match": [{ "headers": { "end-user": { "exact": "jason" } } }],
                        "route": [{ "destination": { "host": "reviews", "subset": "v2" } }],
                    },
                    {
                        "timeout": "10s",
                        "route": [{ "destination": { "host": "reviews", "subset": "v1" } }],
                    },
                ],
                "tcp": [{ "route": [{ "destination": { "host": "mongo" } }] }],
            },
        }),
        serde_json::json!({
            "apiVersion": "networking.istio.io/v1alpha3",
            "kind": "DestinationRule",
            "metadata": { "name": "reviews", "namespace": "shop" },
            "spec": {
                "host": "reviews",
                "trafficPolicy": {
                    "connectionPool": { "http": { "http1MaxPendingRequests": 10 } },
                    "outlierDetection": { "consecutive5xxErrors": 5 },
                },
                "subsets": [{ "name": "v1", "labels": { "version": "v1" } }],
            },
        }),
        serde_json::json!({
            "apiVersion": "networking.istio.io/v1alpha3",
            "kind": "Gateway",
            "metadata": { "name": "reactapp-gateway", "namespace": "shop" },
            "spec": {
                "selector": { "istio": "ingressgateway" },
                "servers": [{
                    "port": { "number": 443, "name": "https", "protocol": "HTTPS" },
                    "hosts": ["*"],
                    "tls": { "mode": "SIMPLE", "credentialName": "reactapp-cert" },
                }],
            },
        }),
        serde_json::json!({
            "apiVersion": "networking.istio.io/v1alpha3",
            "kind": "ServiceEntry",
            "metadata": { "name": "external-api", "namespace": "shop" },
            "spec": {
                "hosts": ["api.example.com"],
                "location": "MESH_EXTERNAL",
                "resolution": "STATIC",
                "endpoints": [{ "address": "10.0.0.1" }],
            },
        }),
    ];

    let store = MemoryStore::new();
    store.insert::<VirtualService>(serde_json::from_value(inputs[0].clone()).unwrap());
    store.insert::<DestinationRule>(serde_json::from_value(inputs[1].clone()).unwrap());
    store.insert::<Gateway>(serde_json::from_value(inputs[2].clone()).unwrap());
    store.insert::<ServiceEntry>(serde_json::from_value(inputs[3].clone()).unwrap());

    let snap = snapshot(&store, "shop", TIMEOUT)
        .await
        .expect("snapshot must succeed");
    let value = serde_json::to_value(&snap).unwrap();
    assert_eq!(value["virtualServices"][0], inputs[0]);
    assert_eq!(value["destinationRules"][0], inputs[1]);
    assert_eq!(value["gateways"][0], inputs[2]);
    assert_eq!(value["serviceEntries"][0], inputs[3]);
}
