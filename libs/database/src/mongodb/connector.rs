use mongodb::{Client, bson::doc, options::ClientOptions};
use tracing::{info, instrument};

use super::MongoConfig;
use crate::common::{DatabaseError, DatabaseResult, RetryConfig, retry_if};

/// Parse the connection string and apply pool and timeout settings.
pub(crate) async fn client_options(config: &MongoConfig) -> DatabaseResult<ClientOptions> {
    let mut options = ClientOptions::parse(config.url())
        .await
        .map_err(|e| DatabaseError::ConfigError(e.to_string()))?;

    options.max_pool_size = Some(config.max_pool_size);
    options.min_pool_size = Some(config.min_pool_size);
    options.connect_timeout = Some(config.connect_timeout());
    options.server_selection_timeout = Some(config.server_selection_timeout());

    if let Some(ref app_name) = config.app_name {
        options.app_name = Some(app_name.clone());
    }

    Ok(options)
}

/// Round-trip a `ping` to the server. The driver connects lazily, so this is
/// what actually proves a client works.
pub(crate) async fn ping(client: &Client) -> DatabaseResult<()> {
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .map(|_| ())
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))
}

/// Build a client from `config` and verify it with a ping.
#[instrument(skip(config), fields(url = %config.redacted_url(), database = %config.database()))]
pub async fn connect_from_config(config: &MongoConfig) -> DatabaseResult<Client> {
    config.validate()?;

    let options = client_options(config).await?;
    let client = Client::with_options(options)?;
    ping(&client).await?;

    info!("Connected to MongoDB");
    Ok(client)
}

/// [`connect_from_config`] with exponential backoff, useful at startup when the
/// database container may still be coming up. Configuration errors are not
/// retried.
///
/// ```ignore
/// use database::common::RetryConfig;
/// use database::mongodb::{MongoConfig, connect_from_config_with_retry};
///
/// let config = MongoConfig::from_env()?;
/// let client =
///     connect_from_config_with_retry(&config, Some(RetryConfig::new().with_max_retries(5))).await?;
/// ```
pub async fn connect_from_config_with_retry(
    config: &MongoConfig,
    retry_config: Option<RetryConfig>,
) -> DatabaseResult<Client> {
    retry_if(
        || connect_from_config(config),
        retry_config.unwrap_or_default(),
        DatabaseError::is_transient,
    )
    .await
}
