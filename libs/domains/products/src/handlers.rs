//! HTTP handlers for Products API

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_helpers::{
    ErrorResponse, FieldViolation, JsonBody, QueryParams, UuidPath,
    errors::responses::{
        BadRequestUuidResponse, BadRequestValidationResponse, ConflictResponse,
        InternalServerErrorResponse, NotFoundResponse, ServiceUnavailableResponse,
    },
};
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::{ProductError, ProductResult};
use crate::models::{CreateProduct, Product, ProductFilter, ProductSort, UpdateProduct};
use crate::repository::ProductRepository;
use crate::service::ProductService;

pub const NDJSON: &str = "application/x-ndjson";

/// OpenAPI documentation for Products API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_products,
        stream_products,
        count_products,
        create_product,
        create_products_bulk,
        get_product,
        get_by_sku,
        replace_product,
        update_product,
        delete_product,
    ),
    components(
        schemas(
            Product,
            CreateProduct,
            UpdateProduct,
            ProductFilter,
            ProductSort,
            ErrorResponse,
            FieldViolation
        ),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            BadRequestUuidResponse,
            ConflictResponse,
            InternalServerErrorResponse,
            ServiceUnavailableResponse
        )
    ),
    tags(
        (name = "Products", description = "Product catalog endpoints")
    )
)]
pub struct ApiDoc;

/// Create the products router with all HTTP endpoints
pub fn router<R: ProductRepository + 'static>(service: ProductService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/bulk", post(create_products_bulk))
        .route("/stream", get(stream_products))
        .route("/count", get(count_products))
        .route("/sku/{sku}", get(get_by_sku))
        .route(
            "/{id}",
            get(get_product)
                .put(replace_product)
                .patch(update_product)
                .delete(delete_product),
        )
        .with_state(shared_service)
}

/// List products with optional filters
#[utoipa::path(
    get,
    path = "",
    tag = "Products",
    params(ProductFilter),
    responses(
        (status = 200, description = "One page of products", body = Vec<Product>),
        (status = 503, response = ServiceUnavailableResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_products<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    QueryParams(filter): QueryParams<ProductFilter>,
) -> ProductResult<Json<Vec<Product>>> {
    let products: Vec<Product> = service.list(filter).await?.try_collect().await?;
    Ok(Json(products))
}

/// Stream products as newline-delimited JSON
///
/// Products are written as the cursor yields them, one JSON object per line.
/// A store failure mid-stream aborts the response.
#[utoipa::path(
    get,
    path = "/stream",
    tag = "Products",
    params(ProductFilter),
    responses(
        (status = 200, description = "One product per line", body = Product, content_type = "application/x-ndjson"),
        (status = 503, response = ServiceUnavailableResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn stream_products<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    QueryParams(filter): QueryParams<ProductFilter>,
) -> ProductResult<Response> {
    let lines = service
        .list(filter)
        .await?
        .map(|item| item.and_then(|product| ndjson_line(&product)))
        .inspect_err(|e| tracing::error!(error = %e, "Product stream aborted"));

    Ok(([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(lines)).into_response())
}

fn ndjson_line(product: &Product) -> ProductResult<Vec<u8>> {
    let mut line =
        serde_json::to_vec(product).map_err(|e| ProductError::Internal(e.to_string()))?;
    line.push(b'\n');
    Ok(line)
}

/// Count products matching a filter
#[utoipa::path(
    get,
    path = "/count",
    tag = "Products",
    params(ProductFilter),
    responses(
        (status = 200, description = "Number of matching products", body = u64),
        (status = 503, response = ServiceUnavailableResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn count_products<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    QueryParams(filter): QueryParams<ProductFilter>,
) -> ProductResult<Json<u64>> {
    let count = service.count(filter).await?;
    Ok(Json(count))
}

/// Create a new product
#[utoipa::path(
    post,
    path = "",
    tag = "Products",
    request_body = CreateProduct,
    responses(
        (status = 201, description = "Product created successfully", body = Product),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 503, response = ServiceUnavailableResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    JsonBody(input): JsonBody<CreateProduct>,
) -> ProductResult<impl IntoResponse> {
    let product = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Create up to 100 products in one request
///
/// Nothing is stored unless every item is valid and every SKU is free;
/// violations name the item index, e.g. `[2].price`. A SKU already taken in
/// the store answers 409 and the items written before it are removed.
#[utoipa::path(
    post,
    path = "/bulk",
    tag = "Products",
    request_body = Vec<CreateProduct>,
    responses(
        (status = 201, description = "Products created successfully", body = Vec<Product>),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 503, response = ServiceUnavailableResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_products_bulk<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    JsonBody(inputs): JsonBody<Vec<CreateProduct>>,
) -> ProductResult<impl IntoResponse> {
    let products = service.create_bulk(inputs).await?;
    Ok((StatusCode::CREATED, Json(products)))
}

/// Get a product by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Products",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product found", body = Product),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    UuidPath(id): UuidPath,
) -> ProductResult<Json<Product>> {
    let product = service.get(id).await?;
    Ok(Json(product))
}

/// Get a product by SKU
#[utoipa::path(
    get,
    path = "/sku/{sku}",
    tag = "Products",
    params(
        ("sku" = String, Path, description = "External catalog identifier")
    ),
    responses(
        (status = 200, description = "Product found", body = Product),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_by_sku<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    Path(sku): Path<String>,
) -> ProductResult<Json<Product>> {
    let product = service.get_by_sku(&sku).await?;
    Ok(Json(product))
}

/// Replace every mutable field of a product
///
/// Optional fields missing from the body are cleared.
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Products",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = CreateProduct,
    responses(
        (status = 204, description = "Product replaced"),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn replace_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    UuidPath(id): UuidPath,
    JsonBody(input): JsonBody<CreateProduct>,
) -> ProductResult<StatusCode> {
    service.replace(id, input).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Partially update a product
#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Products",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = UpdateProduct,
    responses(
        (status = 204, description = "Product updated"),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    UuidPath(id): UuidPath,
    JsonBody(patch): JsonBody<UpdateProduct>,
) -> ProductResult<StatusCode> {
    service.update(id, patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Products",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 204, description = "Product deleted successfully"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    UuidPath(id): UuidPath,
) -> ProductResult<StatusCode> {
    service.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockProductRepository;
    use axum::http::Request;
    use futures::stream;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app(mock_repo: MockProductRepository) -> Router {
        router(ProductService::new(mock_repo))
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    async fn error_body(response: Response) -> ErrorResponse {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_create_returns_201_with_generated_id() {
        let mut mock_repo = MockProductRepository::new();
        mock_repo.expect_insert().times(1).returning(|p| Ok(p.id));

        let response = app(mock_repo)
            .oneshot(json_request("POST", "/", json!({ "name": "Widget", "price": 9.99 })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let product: Product = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(product.name, "Widget");
        assert_eq!(product.price, 9.99);
        assert_eq!(product.id.get_version_num(), 7);
    }

    #[tokio::test]
    async fn test_create_validation_error_lists_violations() {
        let response = app(MockProductRepository::new())
            .oneshot(json_request("POST", "/", json!({ "name": " ", "price": -1 })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = error_body(response).await;
        assert_eq!(body.error, "VALIDATION_ERROR");
        let fields: Vec<_> = body
            .details
            .unwrap()
            .into_iter()
            .map(|v| v.field)
            .collect();
        assert_eq!(fields, vec!["name", "price"]);
    }

    #[tokio::test]
    async fn test_create_without_price_is_unprocessable() {
        let response = app(MockProductRepository::new())
            .oneshot(json_request("POST", "/", json!({ "name": "Widget" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error_body(response).await.error, "JSON_EXTRACTION");
    }

    #[tokio::test]
    async fn test_duplicate_sku_is_409() {
        let mut mock_repo = MockProductRepository::new();
        mock_repo
            .expect_insert()
            .returning(|_| Err(ProductError::DuplicateSku("WID-1".into())));

        let response = app(mock_repo)
            .oneshot(json_request(
                "POST",
                "/",
                json!({ "sku": "WID-1", "name": "Widget", "price": 1.0 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(error_body(response).await.message.contains("WID-1"));
    }

    #[tokio::test]
    async fn test_bulk_create_returns_all_products() {
        let mut mock_repo = MockProductRepository::new();
        mock_repo
            .expect_insert_many()
            .times(1)
            .returning(|ps| Ok(ps.iter().map(|p| p.id).collect()));

        let response = app(mock_repo)
            .oneshot(json_request(
                "POST",
                "/bulk",
                json!([{ "name": "a", "price": 1 }, { "name": "b", "price": 2 }]),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let products: Vec<Product> = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(products.len(), 2);
    }

    #[tokio::test]
    async fn test_get_invalid_uuid_is_400() {
        let response = app(MockProductRepository::new())
            .oneshot(get("/not-a-uuid"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_body(response).await.error, "INVALID_UUID");
    }

    #[tokio::test]
    async fn test_get_missing_is_404() {
        let mut mock_repo = MockProductRepository::new();
        mock_repo.expect_find_by_id().returning(|_| Ok(None));

        let response = app(mock_repo)
            .oneshot(get(&format!("/{}", Uuid::now_v7())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(error_body(response).await.code, 1004);
    }

    #[tokio::test]
    async fn test_list_and_stream_render_the_same_products() {
        let items = vec![
            Product::new(CreateProduct::new("a", 1.0)),
            Product::new(CreateProduct::new("b", 2.0)),
        ];
        let expected = items.clone();

        let mut mock_repo = MockProductRepository::new();
        mock_repo
            .expect_find_all()
            .times(2)
            .returning(move |_| Ok(stream::iter(items.clone().into_iter().map(Ok)).boxed()));
        let app = app(mock_repo);

        let response = app.clone().oneshot(get("/?limit=10")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed: Vec<Product> = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(listed, expected);

        let response = app.oneshot(get("/stream")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], NDJSON);
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        let streamed: Vec<Product> = body
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(streamed, expected);
    }

    #[tokio::test]
    async fn test_list_passes_query_filter() {
        let mut mock_repo = MockProductRepository::new();
        mock_repo
            .expect_find_all()
            .withf(|f| {
                f.category.as_deref() == Some("tools")
                    && f.min_price == Some(5.0)
                    && f.sort == ProductSort::PriceAsc
            })
            .returning(|_| Ok(stream::empty().boxed()));

        let response = app(mock_repo)
            .oneshot(get("/?category=tools&min_price=5&sort=price_asc"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bad_query_is_400() {
        let response = app(MockProductRepository::new())
            .oneshot(get("/?sort=cheapest"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_count_returns_number() {
        let mut mock_repo = MockProductRepository::new();
        mock_repo.expect_count().returning(|_| Ok(42));

        let response = app(mock_repo).oneshot(get("/count")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"42");
    }

    #[tokio::test]
    async fn test_patch_and_delete_return_204() {
        let id = Uuid::now_v7();
        let mut mock_repo = MockProductRepository::new();
        mock_repo.expect_update().returning(|_, _| Ok(1));
        mock_repo.expect_delete().returning(|_| Ok(1));
        let app = app(mock_repo);

        let response = app
            .clone()
            .oneshot(json_request("PATCH", &format!("/{id}"), json!({ "price": 3.5 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_put_missing_product_is_404() {
        let mut mock_repo = MockProductRepository::new();
        mock_repo.expect_update().returning(|_, _| Ok(0));

        let response = app(mock_repo)
            .oneshot(json_request(
                "PUT",
                &format!("/{}", Uuid::now_v7()),
                json!({ "name": "Widget", "price": 1 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unavailable_store_is_503() {
        let mut mock_repo = MockProductRepository::new();
        mock_repo
            .expect_count()
            .returning(|_| Err(ProductError::Unavailable("server selection timeout".into())));

        let response = app(mock_repo).oneshot(get("/count")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error_body(response).await.error, "DATABASE_UNAVAILABLE");
    }
}
