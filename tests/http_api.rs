//! HTTP surface tests driven through the router with `tower::ServiceExt`.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use smartstore::{
    AppState, TieringService,
    cache::MemoryCache,
    config::GatewayConfig,
    metadata::MemoryMetadataStore,
    routes,
    services::TieringConfig,
    storage::{ProviderRegistry, RoutingTable},
};
use std::sync::Arc;
use tower::ServiceExt;

const CONFIG: &str = r#"
env: prod
cache:
  small_object_threshold: 64
object_storage:
  providers:
    - name: MEMORY
      type: MEMORY
      region: local
  routes:
    - env: prod
      logical_region: us
      bucket: assets
      storage_class: HOT
      provider_name: MEMORY
      provider_bucket: phys-assets
"#;

fn app_from(raw: &str) -> Router {
    let cfg = GatewayConfig::from_yaml_str(raw).unwrap();
    let (registry, failures) = ProviderRegistry::from_config(&cfg.object_storage.providers);
    let service = TieringService::new(
        Arc::new(MemoryCache::new()),
        Arc::new(MemoryMetadataStore::new()),
        Arc::new(RoutingTable::from_config(&cfg.object_storage)),
        Arc::new(registry),
        TieringConfig::from(&cfg),
    );
    routes::routes().with_state(AppState::new(service, failures))
}

fn app() -> Router {
    app_from(CONFIG)
}

fn put(uri: &str, data: &'static [u8]) -> Request<Body> {
    Request::put(uri)
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::CONTENT_LENGTH, data.len())
        .body(Body::from(data))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    resp.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

#[tokio::test]
async fn healthz_is_always_ok() {
    let resp = app().oneshot(get("/healthz")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");
}

#[tokio::test]
async fn readyz_passes_with_healthy_collaborators() {
    let resp = app().oneshot(get("/readyz")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["checks"]["metadata"]["ok"], true);
    assert_eq!(body["checks"]["providers"]["ok"], true);
}

#[tokio::test]
async fn readyz_reports_providers_that_failed_to_build() {
    let raw = r#"
object_storage:
  providers:
    - name: MEMORY
      type: MEMORY
    - name: s3
      type: AWS_S3
      region: us-east-1
"#;

    let resp = app_from(raw).oneshot(get("/readyz")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "error");
    assert!(body["checks"]["providers"]["error"]
        .as_str()
        .unwrap()
        .starts_with("s3:"));
}

#[tokio::test]
async fn put_then_get_round_trips_a_small_object() {
    let app = app();

    let resp = app
        .clone()
        .oneshot(put("/v1/prod/us/assets/hello.txt", b"hello world"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["backend"], "CACHE_AND_BACKEND");
    assert_eq!(body["size"], 11);
    assert_eq!(body["etag"], format!("{:x}", md5::compute(b"hello world")));

    let resp = app.oneshot(get("/v1/prod/us/assets/hello.txt")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_LENGTH], "11");
    assert_eq!(body_bytes(resp).await, b"hello world");
}

#[tokio::test]
async fn nested_keys_and_large_bodies_go_backend_only() {
    let app = app();
    let data: &'static [u8] = &[b'z'; 200];

    let resp = app
        .clone()
        .oneshot(put("/v1/prod/us/assets/photos/2025/img.jpg", data))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["backend"], "BACKEND_ONLY");

    let resp = app
        .oneshot(get("/v1/prod/us/assets/photos/2025/img.jpg"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(body_bytes(resp).await, data);
}

#[tokio::test]
async fn put_without_content_length_is_treated_as_unknown_size() {
    let req = Request::put("/v1/prod/us/assets/stream.bin")
        .body(Body::from("abc"))
        .unwrap();

    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["backend"], "BACKEND_ONLY");
    assert_eq!(body["size"], 0);
}

#[tokio::test]
async fn unknown_object_is_404_with_json_error() {
    let resp = app().oneshot(get("/v1/prod/us/assets/missing")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["status"], 404);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn unrouted_storage_class_is_404() {
    let req = Request::put("/v1/prod/us/assets/cold.txt")
        .header("x-storage-class", "COLD")
        .header(header::CONTENT_LENGTH, 3)
        .body(Body::from("brr"))
        .unwrap();

    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_hides_the_object() {
    let app = app();
    app.clone()
        .oneshot(put("/v1/prod/us/assets/doomed.txt", b"bye"))
        .await
        .unwrap();

    let resp = app
        .clone()
        .oneshot(
            Request::delete("/v1/prod/us/assets/doomed.txt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .clone()
        .oneshot(get("/v1/prod/us/assets/doomed.txt"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .oneshot(
            Request::delete("/v1/prod/us/assets/doomed.txt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
