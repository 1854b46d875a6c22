//! Configuration for the Catalog API

use core_config::{app_info, env_or_default, server::ServerConfig, AppInfo, FromEnv};
use database::mongodb::MongoConfig;

pub use core_config::Environment;

const DEFAULT_PRODUCTS_COLLECTION: &str = "products";

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub mongodb: MongoConfig,
    pub server: ServerConfig,
    pub environment: Environment,
    /// Collection holding product documents (`PRODUCTS_COLLECTION`)
    pub products_collection: String,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let mut mongodb = MongoConfig::from_env()?;
        let server = ServerConfig::from_env()?;
        let app = app_info!();

        if mongodb.app_name.is_none() {
            mongodb = mongodb.with_app_name(app.name);
        }
        mongodb.validate()?;

        Ok(Self {
            app,
            mongodb,
            server,
            environment,
            products_collection: env_or_default(
                "PRODUCTS_COLLECTION",
                DEFAULT_PRODUCTS_COLLECTION,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONGO: [(&str, Option<&str>); 2] = [
        ("MONGODB_URL", Some("mongodb://localhost:27017")),
        ("MONGODB_DATABASE", Some("catalog")),
    ];

    #[test]
    fn test_config_defaults() {
        let vars = MONGO
            .into_iter()
            .chain([("PRODUCTS_COLLECTION", None), ("MONGODB_APP_NAME", None)])
            .collect::<Vec<_>>();

        temp_env::with_vars(vars, || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.products_collection, "products");
            assert_eq!(config.mongodb.database(), "catalog");
            assert_eq!(config.mongodb.app_name.as_deref(), Some("catalog_api"));
            assert_eq!(config.app.name, "catalog_api");
        });
    }

    #[test]
    fn test_config_custom_collection() {
        let vars = MONGO
            .into_iter()
            .chain([("PRODUCTS_COLLECTION", Some("products_v2"))])
            .collect::<Vec<_>>();

        temp_env::with_vars(vars, || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.products_collection, "products_v2");
        });
    }

    #[test]
    fn test_config_requires_mongodb_url() {
        temp_env::with_vars(
            [
                ("MONGODB_URL", None::<&str>),
                ("MONGO_URL", None),
                ("MONGODB_DATABASE", Some("catalog")),
            ],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(err.to_string().contains("MONGODB_URL"));
            },
        );
    }

    #[test]
    fn test_config_rejects_bad_scheme() {
        temp_env::with_vars(
            [
                ("MONGODB_URL", Some("postgres://localhost:5432")),
                ("MONGODB_DATABASE", Some("catalog")),
            ],
            || assert!(Config::from_env().is_err()),
        );
    }
}
