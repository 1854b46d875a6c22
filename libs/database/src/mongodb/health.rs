use mongodb::Client;

use super::connector::ping;
use crate::common::{DatabaseError, DatabaseResult};

/// Ping the server, mapping failure to [`DatabaseError::HealthCheckFailed`].
///
/// Suitable for readiness checks:
///
/// ```ignore
/// let checks = vec![("mongodb", Box::pin(async {
///     database::mongodb::check_health(&client).await.map_err(|e| e.to_string())
/// }) as HealthCheckFuture)];
/// ```
pub async fn check_health(client: &Client) -> DatabaseResult<()> {
    ping(client)
        .await
        .map_err(|e| DatabaseError::HealthCheckFailed(e.to_string()))
}
