//! Custom extractors for Axum handlers.
//!
//! All extractors reject with [`AppError`](crate::errors::AppError), so
//! malformed input produces the same JSON error shape as domain failures.

pub mod json_body;
pub mod query;
pub mod uuid_path;

pub use json_body::JsonBody;
pub use query::QueryParams;
pub use uuid_path::UuidPath;
