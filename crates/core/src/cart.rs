//! Client-side shopping cart.
//!
//! The cart is a small reducer: every change goes through [`Cart::apply`]
//! with a [`CartAction`]. Rejected actions leave the cart untouched and
//! return a [`CartError`]. Totals are derived on read; the reducer refuses
//! any line that would push the subtotal outside the decimal range.
//!
//! The persisted form is a JSON array of [`CartItem`]s. [`Cart::from_snapshot`]
//! is deliberately lenient about individual entries: anything that does not
//! look like a valid line is dropped instead of failing the whole load.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::product::Product;
use crate::types::{CartItemId, ProductId, UserId, line_total};

/// A cart row kept by the server for a signed-in user.
///
/// Unlike [`CartItem`] this references the product by id; the product is
/// joined in when the backend can resolve it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}

/// One line in the client cart. A product snapshot plus quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ProductId,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

const fn default_quantity() -> u32 {
    1
}

impl From<&Product> for CartItem {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            title: product.title.clone(),
            price: product.price,
            image: (!product.image.is_empty()).then(|| product.image.clone()),
            category: (!product.category.is_empty()).then(|| product.category.clone()),
            quantity: 1,
            size: None,
            color: None,
        }
    }
}

/// A state transition for the cart.
#[derive(Debug, Clone, PartialEq)]
pub enum CartAction {
    /// Add `quantity` of a product. `0` is treated as `1`.
    Add { item: CartItem, quantity: u32 },
    /// Drop the line for a product.
    Remove(ProductId),
    /// Overwrite a line's quantity. `0` removes the line.
    SetQuantity { id: ProductId, quantity: i64 },
    /// Empty the cart.
    Clear,
}

/// Reasons the reducer refuses an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("cart item is missing an id or title")]
    InvalidItem,
    #[error("quantity must not be negative (got {0})")]
    NegativeQuantity(i64),
    #[error("quantity {0} is out of range")]
    QuantityOverflow(i64),
    #[error("cart subtotal would be out of range")]
    TotalOutOfRange,
    #[error("malformed cart snapshot: {0}")]
    MalformedSnapshot(String),
}

/// Ordered cart lines, at most one per product id.
///
/// Only built through the reducer or [`Cart::from_snapshot`], so the
/// subtotal always fits in a [`Decimal`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Current lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == *id)
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of `price × quantity` across all lines.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        line_total(self.lines()).unwrap_or(Decimal::MAX)
    }

    fn lines(&self) -> impl Iterator<Item = (Decimal, u32)> + '_ {
        self.items.iter().map(|item| (item.price, item.quantity))
    }

    /// Apply a transition.
    ///
    /// # Errors
    ///
    /// Returns `CartError` and leaves the cart unchanged if the action is
    /// rejected.
    pub fn apply(&mut self, action: CartAction) -> Result<(), CartError> {
        match action {
            CartAction::Add { item, quantity } => self.add(item, quantity),
            CartAction::Remove(id) => {
                self.remove(&id);
                Ok(())
            }
            CartAction::SetQuantity { id, quantity } => self.set_quantity(&id, quantity),
            CartAction::Clear => {
                self.clear();
                Ok(())
            }
        }
    }

    /// Add a product, merging with an existing line for the same id.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidItem` if the item has no id or title and
    /// `CartError::TotalOutOfRange` if the new subtotal would overflow.
    pub fn add(&mut self, item: CartItem, quantity: u32) -> Result<(), CartError> {
        if item.id.is_empty() || item.title.is_empty() {
            tracing::warn!(product_id = %item.id, "Rejected cart item without id or title");
            return Err(CartError::InvalidItem);
        }

        let quantity = quantity.max(1);
        let merged = self.items.iter().map(|line| {
            if line.id == item.id {
                (line.price, line.quantity.saturating_add(quantity))
            } else {
                (line.price, line.quantity)
            }
        });
        let added = self.get(&item.id).is_none().then_some((item.price, quantity));
        if line_total(merged.chain(added)).is_none() {
            tracing::warn!(product_id = %item.id, quantity, "Rejected cart line, subtotal out of range");
            return Err(CartError::TotalOutOfRange);
        }

        if let Some(existing) = self.items.iter_mut().find(|line| line.id == item.id) {
            existing.quantity = existing.quantity.saturating_add(quantity);
        } else {
            self.items.push(CartItem { quantity, ..item });
        }
        Ok(())
    }

    /// Remove the line for `id`. Unknown ids are ignored.
    pub fn remove(&mut self, id: &ProductId) {
        self.items.retain(|item| item.id != *id);
    }

    /// Overwrite the quantity for `id`. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NegativeQuantity` for negative quantities,
    /// `CartError::QuantityOverflow` for values beyond `u32::MAX` and
    /// `CartError::TotalOutOfRange` if the new subtotal would overflow.
    pub fn set_quantity(&mut self, id: &ProductId, quantity: i64) -> Result<(), CartError> {
        if quantity < 0 {
            tracing::warn!(product_id = %id, quantity, "Rejected negative cart quantity");
            return Err(CartError::NegativeQuantity(quantity));
        }
        if quantity == 0 {
            self.remove(id);
            return Ok(());
        }
        let quantity = u32::try_from(quantity).map_err(|_| CartError::QuantityOverflow(quantity))?;
        let updated = self.items.iter().map(|line| {
            (line.price, if line.id == *id { quantity } else { line.quantity })
        });
        if line_total(updated).is_none() {
            tracing::warn!(product_id = %id, quantity, "Rejected cart quantity, subtotal out of range");
            return Err(CartError::TotalOutOfRange);
        }
        if let Some(line) = self.items.iter_mut().find(|line| line.id == *id) {
            line.quantity = quantity;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Serialize the cart to its snapshot form.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; in practice this cannot fail for
    /// well-formed decimals.
    pub fn to_snapshot(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.items)
    }

    /// Rebuild a cart from a stored snapshot.
    ///
    /// A value that is valid JSON but not an array loads as an empty cart.
    /// Array entries whose `price` is not a number, that fail to
    /// deserialize, or that the reducer rejects are skipped. Numeric ids are
    /// normalized to strings.
    ///
    /// # Errors
    ///
    /// Returns `CartError::MalformedSnapshot` if `raw` is not valid JSON.
    pub fn from_snapshot(raw: &str) -> Result<Self, CartError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| CartError::MalformedSnapshot(e.to_string()))?;

        let mut cart = Self::new();
        let Value::Array(entries) = value else {
            tracing::debug!("Cart snapshot is not an array, starting empty");
            return Ok(cart);
        };

        for entry in entries {
            let Some(item) = snapshot_entry(entry) else {
                continue;
            };
            let quantity = item.quantity;
            if let Err(e) = cart.add(item, quantity) {
                tracing::debug!(error = %e, "Skipped invalid cart snapshot entry");
            }
        }
        Ok(cart)
    }
}

fn snapshot_entry(mut entry: Value) -> Option<CartItem> {
    let object = entry.as_object_mut()?;
    if !object.get("price").is_some_and(Value::is_number) {
        tracing::debug!("Skipped cart snapshot entry without numeric price");
        return None;
    }
    if let Some(Value::Number(n)) = object.get("id") {
        let id = n.to_string();
        object.insert("id".to_string(), Value::String(id));
    }
    match serde_json::from_value(entry) {
        Ok(item) => Some(item),
        Err(e) => {
            tracing::debug!(error = %e, "Skipped undecodable cart snapshot entry");
            None
        }
    }
}
