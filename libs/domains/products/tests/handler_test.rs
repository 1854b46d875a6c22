//! Handler tests for Products domain
//!
//! These tests drive the products router against a real MongoDB:
//! - Request deserialization and validation
//! - Status codes across the product lifecycle
//! - Error bodies for constraint violations
//! - NDJSON streaming
//!
//! They cover only the products router, not the full application with docs,
//! health checks and middleware.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use axum_helpers::ErrorResponse;
use domain_products::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use test_utils::{assertions::*, TestDataBuilder, TestMongo};
use tower::ServiceExt; // For oneshot()

async fn app(mongo: &TestMongo, builder: &TestDataBuilder) -> Router {
    let repo = MongoProductRepository::new(&mongo.database(&builder.name("db", "main")));
    repo.init_indexes().await.unwrap();
    handlers::router(ProductService::new(repo))
}

// Helper to parse JSON response body
async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_product_lifecycle() {
    let mongo = TestMongo::new().await;
    let builder = TestDataBuilder::from_test_name("handler_lifecycle");
    let app = app(&mongo, &builder).await;

    // Create
    let response = app
        .clone()
        .oneshot(post("/", json!({ "name": "Widget", "price": 9.99 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Product = json_body(response.into_body()).await;
    assert_eq!(created.name, "Widget");

    // Read
    let uri = format!("/{}", created.id);
    let response = app.clone().oneshot(request("GET", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: Product = json_body(response.into_body()).await;
    assert_eq!(fetched, created);

    // Delete
    let response = app.clone().oneshot(request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Gone
    let response = app.oneshot(request("GET", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error: ErrorResponse = json_body(response.into_body()).await;
    assert_eq!(error.error, "NOT_FOUND");
    assert!(error.message.contains(&created.id.to_string()));
}

#[tokio::test]
async fn test_duplicate_sku_returns_409() {
    let mongo = TestMongo::new().await;
    let builder = TestDataBuilder::from_test_name("handler_duplicate_sku");
    let app = app(&mongo, &builder).await;
    let payload = json!({ "sku": builder.sku("dup"), "name": "Widget", "price": 1.0 });

    let response = app.clone().oneshot(post("/", payload.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.clone().oneshot(post("/", payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error: ErrorResponse = json_body(response.into_body()).await;
    assert_eq!(error.code, 1008);

    // The first product is still reachable by SKU
    let uri = format!("/sku/{}", builder.sku("dup"));
    let response = app.oneshot(request("GET", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bulk_create_is_all_or_nothing_on_validation() {
    let mongo = TestMongo::new().await;
    let builder = TestDataBuilder::from_test_name("handler_bulk");
    let app = app(&mongo, &builder).await;

    let response = app
        .clone()
        .oneshot(post(
            "/bulk",
            json!([
                { "name": "ok", "price": 1.0 },
                { "name": "", "price": 2.0 }
            ]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = json_body(response.into_body()).await;
    let details = assert_some(error.details, "violation details");
    assert_eq!(details[0].field, "[1].name");

    let response = app.oneshot(request("GET", "/count")).await.unwrap();
    let count: u64 = json_body(response.into_body()).await;
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_bulk_with_taken_sku_leaves_store_unchanged() {
    let mongo = TestMongo::new().await;
    let builder = TestDataBuilder::from_test_name("handler_bulk_taken_sku");
    let app = app(&mongo, &builder).await;
    let taken = builder.sku("taken");

    let response = app
        .clone()
        .oneshot(post("/", json!({ "sku": taken, "name": "Existing", "price": 1.0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(post(
            "/bulk",
            json!([
                { "name": "first", "price": 1.0 },
                { "sku": taken, "name": "second", "price": 2.0 },
                { "name": "third", "price": 3.0 }
            ]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error: ErrorResponse = json_body(response.into_body()).await;
    assert!(error.message.contains(&taken));

    let response = app.oneshot(request("GET", "/count")).await.unwrap();
    let count: u64 = json_body(response.into_body()).await;
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_bulk_with_repeated_sku_is_400() {
    let mongo = TestMongo::new().await;
    let builder = TestDataBuilder::from_test_name("handler_bulk_repeated_sku");
    let app = app(&mongo, &builder).await;
    let sku = builder.sku("twice");

    let response = app
        .oneshot(post(
            "/bulk",
            json!([
                { "sku": sku, "name": "a", "price": 1.0 },
                { "sku": sku, "name": "b", "price": 2.0 }
            ]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = json_body(response.into_body()).await;
    let details = assert_some(error.details, "violation details");
    assert_eq!(details[0].field, "[1].sku");
    assert_eq!(details[0].code, "duplicate");
}

#[tokio::test]
async fn test_patch_then_list_reflects_change() {
    let mongo = TestMongo::new().await;
    let builder = TestDataBuilder::from_test_name("handler_patch");
    let app = app(&mongo, &builder).await;

    let response = app
        .clone()
        .oneshot(post("/", json!({ "name": "Lamp", "price": 20.0, "category": "home" })))
        .await
        .unwrap();
    let created: Product = json_body(response.into_body()).await;

    let patch = Request::builder()
        .method("PATCH")
        .uri(format!("/{}", created.id))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "price": 18.0 }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(patch).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request("GET", "/?category=home"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed: Vec<Product> = json_body(response.into_body()).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].price, 18.0);
    assert_eq!(listed[0].category.as_deref(), Some("home"));
}

#[tokio::test]
async fn test_stream_returns_ndjson() {
    let mongo = TestMongo::new().await;
    let builder = TestDataBuilder::from_test_name("handler_stream");
    let app = app(&mongo, &builder).await;

    let response = app
        .clone()
        .oneshot(post(
            "/bulk",
            json!([
                { "name": "a", "price": 3.0 },
                { "name": "b", "price": 1.0 },
                { "name": "c", "price": 2.0 }
            ]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(request("GET", "/stream?sort=price_asc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        handlers::NDJSON
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    let prices: Vec<f64> = body
        .lines()
        .map(|line| serde_json::from_str::<Product>(line).unwrap().price)
        .collect();
    assert_eq!(prices, vec![1.0, 2.0, 3.0]);
}
