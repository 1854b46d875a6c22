use axum::http::{HeaderValue, Method, header};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Creates a CORS layer for the catalog API.
///
/// Origins that are not valid header values are skipped with a warning.
/// `"*"` in the list switches to any-origin (without credentials).
pub fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    async fn preflight(origins: &[String], origin: &str) -> Option<HeaderValue> {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(create_cors_layer(origins));

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/")
                    .header(header::ORIGIN, origin)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .cloned()
    }

    #[tokio::test]
    async fn test_listed_origin_is_allowed() {
        let origins = vec!["https://shop.example.com".to_string()];
        let allowed = preflight(&origins, "https://shop.example.com").await;
        assert_eq!(allowed.unwrap(), "https://shop.example.com");
    }

    #[tokio::test]
    async fn test_unlisted_origin_is_not_echoed() {
        let origins = vec!["https://shop.example.com".to_string()];
        assert!(preflight(&origins, "https://evil.example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_wildcard_allows_any() {
        let origins = vec!["*".to_string()];
        assert_eq!(
            preflight(&origins, "https://anything.example.com").await.unwrap(),
            "*"
        );
    }
}
