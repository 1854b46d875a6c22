//! MongoDB implementation of ProductRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use mongodb::{
    Collection, Database, IndexModel,
    bson::{self, Document, doc},
    options::{FindOptions, IndexOptions},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{duplicate_key_index, ProductError, ProductResult};
use crate::models::{Product, ProductFilter, ProductSort};
use crate::repository::{ProductChanges, ProductRepository, ProductStream};

pub const DEFAULT_COLLECTION: &str = "products";

/// Stored shape of a product: `_id` is the hyphenated UUID string and
/// timestamps are BSON dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ProductDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sku: Option<String>,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    manufacturer: Option<String>,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

fn to_bson_date(at: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(at.timestamp_millis())
}

fn from_bson_date(at: bson::DateTime, field: &str) -> ProductResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(at.timestamp_millis())
        .ok_or_else(|| ProductError::Internal(format!("stored {field} is out of range")))
}

impl From<&Product> for ProductDocument {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            category: product.category.clone(),
            brand: product.brand.clone(),
            manufacturer: product.manufacturer.clone(),
            created_at: to_bson_date(product.created_at),
            updated_at: to_bson_date(product.updated_at),
        }
    }
}

impl ProductDocument {
    fn into_product(self) -> ProductResult<Product> {
        let id = Uuid::parse_str(&self.id).map_err(|e| {
            ProductError::Internal(format!("stored _id '{}' is not a UUID: {e}", self.id))
        })?;

        Ok(Product {
            id,
            sku: self.sku,
            name: self.name,
            description: self.description,
            price: self.price,
            category: self.category,
            brand: self.brand,
            manufacturer: self.manufacturer,
            created_at: from_bson_date(self.created_at, "created_at")?,
            updated_at: from_bson_date(self.updated_at, "updated_at")?,
        })
    }
}

/// MongoDB implementation of the ProductRepository
#[derive(Clone)]
pub struct MongoProductRepository {
    collection: Collection<ProductDocument>,
}

impl MongoProductRepository {
    pub fn new(db: &Database) -> Self {
        Self::with_collection(db, DEFAULT_COLLECTION)
    }

    pub fn with_collection(db: &Database, collection_name: &str) -> Self {
        let collection = db.collection::<ProductDocument>(collection_name);
        Self { collection }
    }

    /// Create the indexes listings and SKU uniqueness rely on. Idempotent.
    pub async fn init_indexes(&self) -> ProductResult<()> {
        let index = |keys: Document, name: &str| {
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(name.to_string()).build())
                .build()
        };

        let indexes = vec![
            // Sparse so products without a SKU don't collide
            IndexModel::builder()
                .keys(doc! { "sku": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .sparse(true)
                        .name("idx_sku_unique".to_string())
                        .build(),
                )
                .build(),
            index(doc! { "created_at": -1, "_id": -1 }, "idx_created_at"),
            index(doc! { "category": 1, "created_at": -1 }, "idx_category_created"),
            index(doc! { "price": 1 }, "idx_price"),
            index(doc! { "name": 1 }, "idx_name"),
            index(doc! { "brand": 1 }, "idx_brand"),
        ];

        self.collection.create_indexes(indexes).await?;
        tracing::info!(
            collection = %self.collection.name(),
            "Product indexes created successfully"
        );
        Ok(())
    }

    /// Best-effort removal of a batch whose insert failed part way.
    async fn remove_batch(&self, products: &[Product]) {
        let ids: Vec<String> = products.iter().map(|p| p.id.to_string()).collect();
        match self
            .collection
            .delete_many(doc! { "_id": { "$in": ids } })
            .await
        {
            Ok(result) => tracing::warn!(
                removed = result.deleted_count,
                "Rolled back partially inserted batch"
            ),
            Err(e) => tracing::error!(error = %e, "Failed to roll back partially inserted batch"),
        }
    }

    fn id_filter(id: Uuid) -> Document {
        doc! { "_id": id.to_string() }
    }

    /// Build a MongoDB filter document from ProductFilter
    fn build_filter(filter: &ProductFilter) -> Document {
        let mut doc = doc! {};

        if let Some(ref category) = filter.category {
            doc.insert("category", category.as_str());
        }

        if let Some(ref brand) = filter.brand {
            doc.insert("brand", brand.as_str());
        }

        if let Some(ref manufacturer) = filter.manufacturer {
            doc.insert("manufacturer", manufacturer.as_str());
        }

        if filter.min_price.is_some() || filter.max_price.is_some() {
            let mut price_filter = doc! {};
            if let Some(min) = filter.min_price {
                price_filter.insert("$gte", min);
            }
            if let Some(max) = filter.max_price {
                price_filter.insert("$lte", max);
            }
            doc.insert("price", price_filter);
        }

        if let Some(search) = filter.search_term() {
            let pattern = regex::escape(search);
            doc.insert(
                "$or",
                vec![
                    doc! { "name": { "$regex": pattern.as_str(), "$options": "i" } },
                    doc! { "description": { "$regex": pattern.as_str(), "$options": "i" } },
                ],
            );
        }

        doc
    }

    fn sort_document(sort: ProductSort) -> Document {
        match sort {
            ProductSort::Newest => doc! { "created_at": -1, "_id": -1 },
            ProductSort::Oldest => doc! { "created_at": 1, "_id": 1 },
            ProductSort::PriceAsc => doc! { "price": 1, "_id": 1 },
            ProductSort::PriceDesc => doc! { "price": -1, "_id": -1 },
            ProductSort::Name => doc! { "name": 1, "_id": 1 },
        }
    }

    fn update_document(changes: &ProductChanges, now: DateTime<Utc>) -> Document {
        let mut set = doc! {};
        let mut unset = doc! {};

        let mut put = |field: &str, value: Option<&String>, clear_if_absent: bool| match value {
            Some(v) => {
                set.insert(field, v.as_str());
            }
            None if clear_if_absent => {
                unset.insert(field, "");
            }
            None => {}
        };

        match changes {
            ProductChanges::Patch(patch) => {
                put("sku", patch.sku.as_ref(), false);
                put("name", patch.name.as_ref(), false);
                put("description", patch.description.as_ref(), false);
                put("category", patch.category.as_ref(), false);
                put("brand", patch.brand.as_ref(), false);
                put("manufacturer", patch.manufacturer.as_ref(), false);
                if let Some(price) = patch.price {
                    set.insert("price", price);
                }
            }
            ProductChanges::Replace(input) => {
                put("sku", input.sku.as_ref(), true);
                put("name", Some(&input.name), true);
                put("description", input.description.as_ref(), true);
                put("category", input.category.as_ref(), true);
                put("brand", input.brand.as_ref(), true);
                put("manufacturer", input.manufacturer.as_ref(), true);
                set.insert("price", input.price);
            }
        }

        set.insert("updated_at", to_bson_date(now));

        let mut update = doc! { "$set": set };
        if !unset.is_empty() {
            update.insert("$unset", unset);
        }
        update
    }
}

#[async_trait]
impl ProductRepository for MongoProductRepository {
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    async fn insert(&self, product: Product) -> ProductResult<Uuid> {
        self.collection
            .insert_one(ProductDocument::from(&product))
            .await
            .map_err(|e| ProductError::from(e).with_sku(product.sku.as_deref()))?;

        tracing::info!("Product inserted");
        Ok(product.id)
    }

    #[instrument(skip(self, products), fields(count = products.len()))]
    async fn insert_many(&self, products: Vec<Product>) -> ProductResult<Vec<Uuid>> {
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let documents: Vec<ProductDocument> = products.iter().map(ProductDocument::from).collect();
        if let Err(err) = self.collection.insert_many(documents).await {
            let colliding_sku = duplicate_key_index(&err)
                .and_then(|index| products.get(index))
                .and_then(|p| p.sku.clone());

            // Ordered inserts stop at the first failure; earlier items are already stored.
            self.remove_batch(&products).await;

            return Err(match colliding_sku {
                Some(sku) => ProductError::DuplicateSku(sku),
                None => ProductError::from(err),
            });
        }

        tracing::info!("Products inserted");
        Ok(products.into_iter().map(|p| p.id).collect())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> ProductResult<Option<Product>> {
        self.collection
            .find_one(Self::id_filter(id))
            .await?
            .map(ProductDocument::into_product)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_sku(&self, sku: &str) -> ProductResult<Option<Product>> {
        self.collection
            .find_one(doc! { "sku": sku })
            .await?
            .map(ProductDocument::into_product)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn find_all(&self, filter: ProductFilter) -> ProductResult<ProductStream> {
        let options = FindOptions::builder()
            .limit(filter.effective_limit())
            .skip(filter.effective_offset())
            .sort(Self::sort_document(filter.sort))
            .build();

        let cursor = self
            .collection
            .find(Self::build_filter(&filter))
            .with_options(options)
            .await?;

        Ok(cursor
            .map(|item| item.map_err(ProductError::from).and_then(ProductDocument::into_product))
            .boxed())
    }

    #[instrument(skip(self))]
    async fn count(&self, filter: ProductFilter) -> ProductResult<u64> {
        let count = self
            .collection
            .count_documents(Self::build_filter(&filter))
            .await?;
        Ok(count)
    }

    #[instrument(skip(self, changes), fields(product_id = %id))]
    async fn update(&self, id: Uuid, changes: ProductChanges) -> ProductResult<u64> {
        let update = Self::update_document(&changes, Utc::now());

        let result = self
            .collection
            .update_one(Self::id_filter(id), update)
            .await
            .map_err(|e| ProductError::from(e).with_sku(changes.sku()))?;

        tracing::info!(matched = result.matched_count, "Product updated");
        Ok(result.matched_count)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn delete(&self, id: Uuid) -> ProductResult<u64> {
        let result = self.collection.delete_one(Self::id_filter(id)).await?;

        tracing::info!(deleted = result.deleted_count, "Product deleted");
        Ok(result.deleted_count)
    }
}
