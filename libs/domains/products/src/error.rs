use axum::response::{IntoResponse, Response};
use axum_helpers::{AppError, FieldViolation};
use mongodb::error::{ErrorKind, RETRYABLE_WRITE_ERROR, WriteFailure};
use thiserror::Error;
use uuid::Uuid;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Product {0} not found")]
    NotFound(Uuid),

    #[error("Product with SKU '{0}' not found")]
    SkuNotFound(String),

    #[error("Validation failed with {} violation(s)", .0.len())]
    Validation(Vec<FieldViolation>),

    #[error("Product with SKU '{0}' already exists")]
    DuplicateSku(String),

    /// Duplicate key with no SKU to name; the driver text stays in the logs.
    #[error("Product conflicts with an existing product")]
    Conflict,

    /// The store could not be reached; the caller may retry.
    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ProductResult<T> = Result<T, ProductError>;

impl ProductError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProductError::Unavailable(_))
    }

    /// Attach the SKU to a duplicate-key failure so the client learns which
    /// value collided.
    pub(crate) fn with_sku(self, sku: Option<&str>) -> Self {
        match (self, sku) {
            (ProductError::Conflict, Some(sku)) => ProductError::DuplicateSku(sku.to_string()),
            (other, _) => other,
        }
    }
}

/// Convert ProductError to AppError for standardized error responses
impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::NotFound(_) | ProductError::SkuNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            ProductError::Validation(violations) => AppError::Validation(violations),
            ProductError::DuplicateSku(_) | ProductError::Conflict => {
                AppError::Conflict(err.to_string())
            }
            ProductError::Unavailable(msg) => AppError::DatabaseUnavailable(msg),
            ProductError::Database(msg) => AppError::Database(msg),
            ProductError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for ProductError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

fn is_duplicate_key(kind: &ErrorKind) -> bool {
    match kind {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::InsertMany(e) => e
            .write_errors
            .as_ref()
            .is_some_and(|errors| errors.iter().any(|w| w.code == DUPLICATE_KEY)),
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Position in the batch of the first document an `insert_many` rejected as a
/// duplicate key.
pub(crate) fn duplicate_key_index(err: &mongodb::error::Error) -> Option<usize> {
    match err.kind.as_ref() {
        ErrorKind::InsertMany(e) => e
            .write_errors
            .as_ref()?
            .iter()
            .find(|w| w.code == DUPLICATE_KEY)
            .map(|w| w.index),
        _ => None,
    }
}

fn is_unavailable(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. }
    ) || err.contains_label(RETRYABLE_WRITE_ERROR)
}

impl From<mongodb::error::Error> for ProductError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key(&err.kind) {
            tracing::warn!(error = %err, "Duplicate key rejected by the store");
            ProductError::Conflict
        } else if is_unavailable(&err) {
            ProductError::Unavailable(err.to_string())
        } else {
            ProductError::Database(err.to_string())
        }
    }
}
