use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::ProductResult;
use crate::models::{CreateProduct, Product, ProductFilter, UpdateProduct};

/// Lazy, finite stream of products backed by a store cursor. Restart it by
/// issuing the query again.
pub type ProductStream = BoxStream<'static, ProductResult<Product>>;

/// Mutation applied by [`ProductRepository::update`]
#[derive(Debug, Clone, PartialEq)]
pub enum ProductChanges {
    /// Set only the fields present in the patch
    Patch(UpdateProduct),
    /// Overwrite every mutable field; absent optionals are cleared
    Replace(CreateProduct),
}

impl ProductChanges {
    pub fn sku(&self) -> Option<&str> {
        match self {
            ProductChanges::Patch(patch) => patch.sku.as_deref(),
            ProductChanges::Replace(input) => input.sku.as_deref(),
        }
    }
}

/// Repository trait for Product persistence
///
/// Every method is a single round trip to the store. Failures are classified
/// into [`ProductError`](crate::ProductError) variants by the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Insert a fully built product, returning its id
    async fn insert(&self, product: Product) -> ProductResult<Uuid>;

    /// Insert products in order, returning their ids
    async fn insert_many(&self, products: Vec<Product>) -> ProductResult<Vec<Uuid>>;

    async fn find_by_id(&self, id: Uuid) -> ProductResult<Option<Product>>;

    async fn find_by_sku(&self, sku: &str) -> ProductResult<Option<Product>>;

    /// Stream products matching a filter, in the filter's sort order
    async fn find_all(&self, filter: ProductFilter) -> ProductResult<ProductStream>;

    /// Count products matching a filter (paging fields are ignored)
    async fn count(&self, filter: ProductFilter) -> ProductResult<u64>;

    /// Apply changes and refresh `updated_at`; returns the matched count
    async fn update(&self, id: Uuid, changes: ProductChanges) -> ProductResult<u64>;

    /// Delete by id; returns the deleted count
    async fn delete(&self, id: Uuid) -> ProductResult<u64>;
}
