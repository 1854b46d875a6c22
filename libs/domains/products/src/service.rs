//! Product Service - the catalog's domain logic
//!
//! Validates inbound payloads, builds entities and delegates to the
//! repository. Each operation issues at most one repository call, and errors
//! from either layer pass through unchanged.

use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{ProductError, ProductResult};
use crate::models::{CreateProduct, Product, ProductFilter, UpdateProduct};
use crate::repository::{ProductChanges, ProductRepository, ProductStream};
use crate::validation::{validate, validate_batch, validate_patch};

pub struct ProductService<R: ProductRepository> {
    repository: Arc<R>,
}

impl<R: ProductRepository> Clone for ProductService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: ProductRepository> ProductService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    #[instrument(skip(self, input), fields(product_name = %input.name))]
    pub async fn create(&self, input: CreateProduct) -> ProductResult<Product> {
        let input = validate(input).map_err(ProductError::Validation)?;
        let product = Product::new(input.into_inner());

        self.repository.insert(product.clone()).await?;
        Ok(product)
    }

    /// Create several products at once. Nothing is written unless every item
    /// is valid.
    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    pub async fn create_bulk(&self, inputs: Vec<CreateProduct>) -> ProductResult<Vec<Product>> {
        let inputs = validate_batch(inputs).map_err(ProductError::Validation)?;
        let products: Vec<Product> = inputs.into_inner().into_iter().map(Product::new).collect();

        self.repository.insert_many(products.clone()).await?;
        Ok(products)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> ProductResult<Product> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(ProductError::NotFound(id))
    }

    #[instrument(skip(self))]
    pub async fn get_by_sku(&self, sku: &str) -> ProductResult<Product> {
        self.repository
            .find_by_sku(sku)
            .await?
            .ok_or_else(|| ProductError::SkuNotFound(sku.to_string()))
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: ProductFilter) -> ProductResult<ProductStream> {
        self.repository.find_all(filter).await
    }

    #[instrument(skip(self))]
    pub async fn count(&self, filter: ProductFilter) -> ProductResult<u64> {
        self.repository.count(filter).await
    }

    /// Apply a partial update; only the fields present in `patch` change.
    #[instrument(skip(self, patch), fields(product_id = %id))]
    pub async fn update(&self, id: Uuid, patch: UpdateProduct) -> ProductResult<()> {
        let patch = validate_patch(patch).map_err(ProductError::Validation)?;
        self.apply(id, ProductChanges::Patch(patch.into_inner())).await
    }

    /// Overwrite every mutable field; optionals missing from `input` are
    /// cleared.
    #[instrument(skip(self, input), fields(product_id = %id))]
    pub async fn replace(&self, id: Uuid, input: CreateProduct) -> ProductResult<()> {
        let input = validate(input).map_err(ProductError::Validation)?;
        self.apply(id, ProductChanges::Replace(input.into_inner())).await
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, id: Uuid) -> ProductResult<()> {
        match self.repository.delete(id).await? {
            0 => Err(ProductError::NotFound(id)),
            _ => Ok(()),
        }
    }

    async fn apply(&self, id: Uuid, changes: ProductChanges) -> ProductResult<()> {
        match self.repository.update(id, changes).await? {
            0 => Err(ProductError::NotFound(id)),
            _ => Ok(()),
        }
    }
}
