//! Readiness endpoint

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use axum_helpers::{run_health_checks, HealthCheckFuture};
use mongodb::Client;

async fn ready(State(client): State<Client>) -> impl IntoResponse {
    let checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![(
        "mongodb",
        Box::pin(async {
            database::mongodb::check_health(&client)
                .await
                .map_err(|e| e.to_string())
        }),
    )];

    run_health_checks(checks).await
}

/// `/ready` answers 200 once MongoDB responds to a ping, 503 otherwise.
pub fn router(client: Client) -> Router {
    Router::new().route("/ready", get(ready)).with_state(client)
}
