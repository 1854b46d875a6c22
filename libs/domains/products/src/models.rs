use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::validation::{finite, not_blank};

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 500;

/// Product entity as exposed by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    /// Server-assigned identifier (UUID v7)
    pub id: Uuid,
    /// External catalog identifier (ASIN, SKU); unique when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    /// Category slug
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating a product, also used as the body of a full replace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProduct {
    #[validate(length(max = 64), custom(function = "not_blank"))]
    #[serde(default)]
    pub sku: Option<String>,
    #[validate(custom(function = "not_blank"), length(max = 200))]
    #[serde(default)]
    pub name: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: Option<String>,
    #[validate(range(min = 0.0), custom(function = "finite"))]
    pub price: f64,
    #[validate(length(max = 100), custom(function = "not_blank"))]
    #[serde(default)]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub brand: Option<String>,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub manufacturer: Option<String>,
}

impl CreateProduct {
    /// Minimal payload with the two required fields
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            sku: None,
            name: name.into(),
            description: None,
            price,
            category: None,
            brand: None,
            manufacturer: None,
        }
    }
}

/// DTO for a partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProduct {
    #[validate(length(max = 64), custom(function = "not_blank"))]
    pub sku: Option<String>,
    #[validate(custom(function = "not_blank"), length(max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 0.0), custom(function = "finite"))]
    pub price: Option<f64>,
    #[validate(length(max = 100), custom(function = "not_blank"))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(length(max = 200))]
    pub manufacturer: Option<String>,
}

impl UpdateProduct {
    /// True when the patch would change nothing
    pub fn is_empty(&self) -> bool {
        self.sku.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.category.is_none()
            && self.brand.is_none()
            && self.manufacturer.is_none()
    }
}

/// Sort order for listings. Every order breaks ties on the id.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductSort {
    /// Most recently created first
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
    /// Alphabetical by name
    Name,
}

/// Query filters for listing and counting products
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductFilter {
    /// Exact category slug
    pub category: Option<String>,
    pub brand: Option<String>,
    pub manufacturer: Option<String>,
    /// Inclusive lower price bound
    pub min_price: Option<f64>,
    /// Inclusive upper price bound
    pub max_price: Option<f64>,
    /// Case-insensitive substring match on name or description
    pub search: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
    /// Page size, clamped to 1..=500
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Number of results to skip, capped at `i64::MAX`
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            category: None,
            brand: None,
            manufacturer: None,
            min_price: None,
            max_price: None,
            search: None,
            sort: ProductSort::default(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl ProductFilter {
    pub fn effective_limit(&self) -> i64 {
        self.limit.clamp(1, MAX_LIMIT)
    }

    /// The store encodes skip as a signed 64-bit integer
    pub fn effective_offset(&self) -> u64 {
        self.offset.min(i64::MAX as u64)
    }

    /// Search text with surrounding whitespace removed; blank means no search
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl Product {
    /// Build a new entity from a validated payload.
    ///
    /// Timestamps are truncated to milliseconds, the precision the store
    /// keeps, so a product read back compares equal to the one inserted.
    pub fn new(input: CreateProduct) -> Self {
        let now = Utc::now().trunc_subsecs(3);
        Self {
            id: Uuid::now_v7(),
            sku: input.sku,
            name: input.name,
            description: input.description,
            price: input.price,
            category: input.category,
            brand: input.brand,
            manufacturer: input.manufacturer,
            created_at: now,
            updated_at: now,
        }
    }
}
