//! Product catalog types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProductId;

/// Aggregate review score shown next to a product.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Rating {
    pub rate: f64,
    pub count: u32,
}

/// A catalog product as served by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<BTreeMap<String, String>>,
    #[serde(default, alias = "isFeatured")]
    pub is_featured: bool,
    /// Set when the product was created by duplicating another one.
    #[serde(default, alias = "duplicatedFrom", skip_serializing_if = "Option::is_none")]
    pub duplicated_from: Option<ProductId>,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Case-insensitive match against title, category or description.
    ///
    /// Used by the free-text search endpoints.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.category.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }

    /// Build the payload for a copy of this product.
    ///
    /// The copy keeps everything but the id and timestamps. The title
    /// defaults to `Copy of <title>` and the price to the original price.
    #[must_use]
    pub fn duplicate(&self, new_title: Option<String>, new_price: Option<Decimal>) -> NewProduct {
        NewProduct {
            title: new_title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("Copy of {}", self.title)),
            price: new_price.unwrap_or(self.price),
            description: self.description.clone(),
            category: self.category.clone(),
            image: self.image.clone(),
            rating: self.rating,
            specifications: self.specifications.clone(),
            is_featured: self.is_featured,
            duplicated_from: Some(self.id.clone()),
        }
    }
}

/// Validation failures for product payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("title is required")]
    MissingTitle,
    #[error("price must not be negative")]
    NegativePrice,
}

/// Payload for creating a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicated_from: Option<ProductId>,
}

impl NewProduct {
    /// Check the fields a product cannot be created without.
    ///
    /// # Errors
    ///
    /// Returns `ProductError` if the title is blank or the price is negative.
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.title.trim().is_empty() {
            return Err(ProductError::MissingTitle);
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err(ProductError::NegativePrice);
        }
        Ok(())
    }

    /// Materialize the payload into a product with the given id.
    #[must_use]
    pub fn into_product(self, id: ProductId, created_at: DateTime<Utc>) -> Product {
        Product {
            id,
            title: self.title,
            price: self.price,
            description: self.description,
            category: self.category,
            image: self.image,
            rating: self.rating,
            specifications: self.specifications,
            is_featured: self.is_featured,
            duplicated_from: self.duplicated_from,
            created_at: Some(created_at),
            updated_at: None,
        }
    }
}

/// Partial update for a product. Absent fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProductUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
}

impl ProductUpdate {
    /// Check the fields that are present.
    ///
    /// # Errors
    ///
    /// Returns `ProductError` if a present title is blank or a present price
    /// is negative.
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.title.as_ref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ProductError::MissingTitle);
        }
        if self
            .price
            .is_some_and(|p| p.is_sign_negative() && !p.is_zero())
        {
            return Err(ProductError::NegativePrice);
        }
        Ok(())
    }

    /// Apply the present fields to `product` and stamp `updated_at`.
    pub fn apply_to(self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            product.title = title;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(image) = self.image {
            product.image = image;
        }
        if let Some(rating) = self.rating {
            product.rating = rating;
        }
        if let Some(specifications) = self.specifications {
            product.specifications = Some(specifications);
        }
        if let Some(is_featured) = self.is_featured {
            product.is_featured = is_featured;
        }
        product.updated_at = Some(now);
    }
}

/// Listing filters accepted by `GET /products`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductFilter {
    /// Exact category match.
    pub category: Option<String>,
    /// Only featured products.
    pub featured: bool,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
}

impl ProductFilter {
    /// Whether a single product passes the category, featured and search
    /// filters. `limit` is applied by [`ProductFilter::apply`].
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(category) = &self.category
            && product.category != *category
        {
            return false;
        }
        if self.featured && !product.is_featured {
            return false;
        }
        if let Some(search) = &self.search
            && !product
                .title
                .to_lowercase()
                .contains(&search.to_lowercase())
        {
            return false;
        }
        true
    }

    /// Filter and truncate a product list.
    #[must_use]
    pub fn apply<I>(&self, products: I) -> Vec<Product>
    where
        I: IntoIterator<Item = Product>,
    {
        let filtered = products.into_iter().filter(|p| self.matches(p));
        match self.limit {
            Some(limit) => filtered.take(limit).collect(),
            None => filtered.collect(),
        }
    }
}

/// Distinct, non-empty categories in first-seen order.
#[must_use]
pub fn distinct_categories<'a, I>(products: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Product>,
{
    let mut categories: Vec<String> = Vec::new();
    for product in products {
        if !product.category.is_empty() && !categories.contains(&product.category) {
            categories.push(product.category.clone());
        }
    }
    categories
}

/// Up to `limit` products other than `exclude`, those in `category`
/// (case-insensitive) first. Order within each group is preserved.
#[must_use]
pub fn recommendations<I>(
    products: I,
    exclude: &str,
    category: Option<&str>,
    limit: usize,
) -> Vec<Product>
where
    I: IntoIterator<Item = Product>,
{
    let others = products.into_iter().filter(|p| p.id.as_str() != exclude);
    let (mut same, rest): (Vec<_>, Vec<_>) =
        others.partition(|p| category.is_some_and(|c| p.category.eq_ignore_ascii_case(c)));
    same.extend(rest);
    same.truncate(limit);
    same
}
