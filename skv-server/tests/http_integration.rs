use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use skv_server::metrics::Metrics;
use skv_server::{build_router, AppState};
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;

fn test_app() -> (axum::Router, CancellationToken) {
    let cancel = CancellationToken::new();
    let dispatcher = skv_core::build_cache(3, 10, cancel.clone());
    let state = AppState {
        dispatcher: Arc::new(dispatcher),
        metrics: Arc::new(Metrics::new()),
    };
    (build_router(state), cancel)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn put_then_get_round_trip_over_http() {
    let (app, cancel) = test_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/?key=key1&value=v1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "OK");

    let request = Request::builder().method(Method::GET).uri("/?key=key1").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "OK");
    assert_eq!(json["result"]["key1"], "v1");

    cancel.cancel();
}

#[tokio::test]
async fn get_with_no_query_params_returns_a_status_probe() {
    let (app, cancel) = test_app();

    let request = Request::builder().method(Method::GET).uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "OK");
    assert!(json["message"].as_array().unwrap().len() == 3);

    cancel.cancel();
}

#[tokio::test]
async fn put_with_mismatched_keys_and_values_reports_an_error_with_http_200() {
    let (app, cancel) = test_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/?key=a&key=b&value=1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "Error");

    cancel.cancel();
}

#[tokio::test]
async fn delete_empties_the_cache() {
    let (app, cancel) = test_app();

    let put = Request::builder().method(Method::POST).uri("/?key=a&value=1").body(Body::empty()).unwrap();
    app.clone().oneshot(put).await.unwrap();

    let delete = Request::builder().method(Method::DELETE).uri("/").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(delete).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["status"], "OK");
    assert_eq!(json["message"], "1 cache entries deleted");

    let get = Request::builder().method(Method::GET).uri("/?key=a").body(Body::empty()).unwrap();
    let response = app.oneshot(get).await.unwrap();
    let json = body_json(response).await;
    assert!(json["result"].as_object().unwrap().is_empty());

    cancel.cancel();
}

#[tokio::test]
async fn repeated_query_keys_are_all_honored() {
    let (app, cancel) = test_app();

    let put = Request::builder()
        .method(Method::POST)
        .uri("/?key=a&key=b&key=c&value=1&value=2&value=3")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(put).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["status"], "OK");
    assert_eq!(json["message"], "3 key/value pairs are sent to the cache");

    cancel.cancel();
}
