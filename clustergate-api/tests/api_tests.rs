//! HTTP surface tests
//!
//! Requests go straight through the router, no listener involved.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use clustergate_api::routes;
use common::{deployment_manifest, kubeconfig, pod, MemoryFactory, TestEnv};
use serde_json::{json, Value};
use tower::ServiceExt;

const SERVER: &str = "https://staging.example.com:6443";

async fn send(
    env: &TestEnv,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = routes::router(env.state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(env: &TestEnv, config: String) -> i64 {
    let (status, body) = send(
        env,
        Method::POST,
        "/api/clusters",
        Some(json!({ "config": config })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["msg"], "success");
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health() {
    let env = TestEnv::new().await;
    let (status, body) = send(&env, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");

    let (status, body) = send(&env, Method::GET, "/api/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ready");
}

#[tokio::test]
async fn test_register_and_list_clusters() {
    let env = TestEnv::new().await;
    let first = register(&env, kubeconfig(SERVER, None)).await;
    let second = register(&env, kubeconfig("https://other.example.com", None)).await;
    assert_ne!(first, second);

    let (status, body) = send(&env, Method::GET, "/api/clusters", None).await;
    assert_eq!(status, StatusCode::OK);
    let clusters = body["data"].as_array().unwrap();
    assert_eq!(clusters.len(), 2);
    assert!(clusters.iter().all(|c| c.get("config").is_none()));
}

#[tokio::test]
async fn test_resource_lifecycle() {
    let env = TestEnv::new().await;
    let id = register(&env, kubeconfig(SERVER, None)).await;
    let base = format!("/api/clusters/{}/resources", id);

    let (status, body) = send(
        &env,
        Method::POST,
        &base,
        Some(json!({ "manifest": deployment_manifest("web", Some("shop"), 1) })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["metadata"]["name"], "web");

    let (status, body) = send(
        &env,
        Method::PUT,
        &base,
        Some(json!({ "manifest": deployment_manifest("web", Some("shop"), 3) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["spec"]["replicas"], 3);

    let item = format!("{}/shop/Deployment/web", base);
    let (status, body) = send(&env, Method::GET, &item, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "success");
    assert_eq!(body["data"]["spec"]["replicas"], 3);

    let (status, _) = send(&env, Method::DELETE, &item, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&env, Method::GET, &item, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "failure");
    assert_eq!(body["data"]["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_update_at_path() {
    let env = TestEnv::new().await;
    let id = register(&env, kubeconfig(SERVER, None)).await;
    let base = format!("/api/clusters/{}/resources", id);
    send(
        &env,
        Method::POST,
        &base,
        Some(json!({ "manifest": deployment_manifest("web", None, 1) })),
    )
    .await;

    let (status, body) = send(
        &env,
        Method::PUT,
        &format!("{}/default/Deployment/web", base),
        Some(json!({ "manifest": deployment_manifest("web", None, 6) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["spec"]["replicas"], 6);

    let (status, body) = send(
        &env,
        Method::PUT,
        &format!("{}/default/Deployment/api", base),
        Some(json!({ "manifest": deployment_manifest("web", None, 6) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["error"], "MANIFEST_INVALID");

    let (status, body) = send(
        &env,
        Method::PUT,
        &format!("{}/default/statefulsets/web", base),
        Some(json!({ "manifest": deployment_manifest("web", None, 8) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["error"], "MANIFEST_INVALID");

    let (_, body) = send(
        &env,
        Method::GET,
        &format!("{}/default/deployments/web", base),
        None,
    )
    .await;
    assert_eq!(body["data"]["spec"]["replicas"], 6);
}

#[tokio::test]
async fn test_update_of_missing_resource() {
    let env = TestEnv::new().await;
    let id = register(&env, kubeconfig(SERVER, None)).await;

    let (status, body) = send(
        &env,
        Method::PUT,
        &format!("/api/clusters/{}/resources", id),
        Some(json!({ "manifest": deployment_manifest("ghost", None, 1) })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["error"], "NOT_FOUND");
    assert_eq!(env.factory.cluster(SERVER, None).creates().await, 0);
}

#[tokio::test]
async fn test_create_collision_is_conflict_status() {
    let env = TestEnv::new().await;
    let id = register(&env, kubeconfig(SERVER, None)).await;
    let uri = format!("/api/clusters/{}/resources", id);
    let body = json!({ "manifest": deployment_manifest("web", None, 1) });

    send(&env, Method::POST, &uri, Some(body.clone())).await;
    let (status, answer) = send(&env, Method::POST, &uri, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(answer["data"]["error"], "ALREADY_EXISTS");
}

#[tokio::test]
async fn test_bad_manifest_and_credential() {
    let env = TestEnv::new().await;
    let good = register(&env, kubeconfig(SERVER, None)).await;
    let bad = register(&env, "not: [a kubeconfig".to_string()).await;

    let (status, body) = send(
        &env,
        Method::POST,
        &format!("/api/clusters/{}/resources", good),
        Some(json!({ "manifest": "kind: Deployment\nmetadata:\n  name: web\n" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["error"], "MANIFEST_INVALID");

    let (status, body) = send(
        &env,
        Method::POST,
        &format!("/api/clusters/{}/resources", bad),
        Some(json!({ "manifest": deployment_manifest("web", None, 1) })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["data"]["error"], "CREDENTIAL_INVALID");
}

#[tokio::test]
async fn test_malformed_requests_get_failure_envelope() {
    let env = TestEnv::new().await;

    let (status, body) = send(
        &env,
        Method::POST,
        "/api/clusters",
        Some(json!({ "kubeconfig": "wrong field" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "failure");
    assert_eq!(body["data"]["error"], "BAD_REQUEST");

    let (status, body) = send(&env, Method::GET, "/api/clusters/abc/pods/default", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "failure");

    let (status, body) = send(&env, Method::GET, "/api/clusters/77/pods/default", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_custom_kind_query_uses_api_version() {
    let env = TestEnv::new().await;
    let id = register(&env, kubeconfig(SERVER, None)).await;
    let manifest = "apiVersion: example.com/v1\nkind: Widget\nmetadata:\n  name: w1\nspec:\n  size: 2\n";
    send(
        &env,
        Method::POST,
        &format!("/api/clusters/{}/resources", id),
        Some(json!({ "manifest": manifest })),
    )
    .await;

    let item = format!("/api/clusters/{}/resources/default/Widget/w1", id);
    let (status, _) = send(&env, Method::GET, &item, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &env,
        Method::GET,
        &format!("{}?api_version=example.com/v1", item),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["spec"]["size"], 2);
}

#[tokio::test]
async fn test_pod_queries() {
    let env = TestEnv::with_factory(
        MemoryFactory::new()
            .with_pod(pod("web-0", "shop"))
            .with_pod(pod("web-1", "shop")),
    )
    .await;
    let id = register(&env, kubeconfig(SERVER, None)).await;

    let uri = format!("/api/clusters/{}/pods/shop", id);
    let (status, body) = send(&env, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &env,
        Method::GET,
        &format!("/api/clusters/{}/pods/shop/web-1", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "web-1");

    let (status, body) = send(
        &env,
        Method::GET,
        &format!("/api/clusters/{}/pods/shop/web-9", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "failure");
}
