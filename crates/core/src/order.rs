//! Orders, line items and delivery tracking.

use chrono::{DateTime, Duration, Utc};
use ring::digest;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{OrderId, OrderStatus, ProductId, UserId, line_total};

/// Days added to "now" for the estimated delivery date.
pub const DELIVERY_ESTIMATE_DAYS: i64 = 7;

/// One purchased line within an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(alias = "productId", alias = "id")]
    pub product_id: ProductId,
    #[serde(default)]
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, alias = "image_url", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A placed order with its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(alias = "userId")]
    pub user_id: UserId,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(default, alias = "shippingAddress", skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default, alias = "paymentIntentId", skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Delivery tracking view for this order.
    #[must_use]
    pub fn delivery_status(&self, now: DateTime<Utc>) -> DeliveryStatus {
        DeliveryStatus {
            order_id: self.id.clone(),
            status: self.status,
            estimated_delivery: now + Duration::days(DELIVERY_ESTIMATE_DAYS),
            tracking_number: tracking_number(&self.id),
        }
    }

    /// Payment history view for this order.
    #[must_use]
    pub fn payment_record(&self) -> PaymentRecord {
        PaymentRecord {
            id: self.id.clone(),
            payment_intent_id: self.payment_intent_id.clone(),
            amount: self.total,
            status: self.status,
            created_at: self.created_at,
            items: self.items.clone(),
        }
    }
}

/// Validation failures for order payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order must contain at least one item")]
    NoItems,
    #[error("item {0} has a zero quantity")]
    ZeroQuantity(ProductId),
    #[error("item {0} has a negative price")]
    NegativePrice(ProductId),
    #[error("order total is out of range")]
    TotalOutOfRange,
}

/// Payload for `POST /orders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub items: Vec<OrderItem>,
    #[serde(default, alias = "shipping_address")]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default, alias = "payment_intent_id")]
    pub payment_intent_id: Option<String>,
}

impl NewOrder {
    /// Check that the order has purchasable lines.
    ///
    /// # Errors
    ///
    /// Returns `OrderError` for an empty item list, a zero quantity, a
    /// negative price or a total that cannot be represented.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        for item in &self.items {
            if item.quantity == 0 {
                return Err(OrderError::ZeroQuantity(item.product_id.clone()));
            }
            if item.price.is_sign_negative() && !item.price.is_zero() {
                return Err(OrderError::NegativePrice(item.product_id.clone()));
            }
        }
        self.total().map(|_| ())
    }

    /// Sum of line totals.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::TotalOutOfRange` if the sum overflows.
    pub fn total(&self) -> Result<Decimal, OrderError> {
        line_total(self.items.iter().map(|item| (item.price, item.quantity)))
            .ok_or(OrderError::TotalOutOfRange)
    }

    /// The header row for this order, before any id is assigned.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::TotalOutOfRange` if the total overflows.
    pub fn header(&self, user_id: UserId) -> Result<OrderHeader, OrderError> {
        Ok(OrderHeader {
            user_id,
            total: self.total()?,
            shipping_address: self.shipping_address.clone(),
            payment_intent_id: self.payment_intent_id.clone(),
            status: OrderStatus::Pending,
        })
    }
}

/// The order row without its line items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderHeader {
    pub user_id: UserId,
    pub total: Decimal,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_intent_id: Option<String>,
    pub status: OrderStatus,
}

impl OrderHeader {
    /// Attach an id and creation time, yielding an order with no items yet.
    #[must_use]
    pub fn into_order(self, id: OrderId, created_at: DateTime<Utc>) -> Order {
        Order {
            id,
            user_id: self.user_id,
            items: Vec::new(),
            total: self.total,
            shipping_address: self.shipping_address,
            payment_intent_id: self.payment_intent_id,
            status: self.status,
            created_at,
            updated_at: None,
        }
    }
}

/// Shipment tracking info for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub estimated_delivery: DateTime<Utc>,
    pub tracking_number: String,
}

/// One entry in a user's payment history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: OrderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// Tracking number derived from the order id: `TRK` + the low 36 bits of
/// the first five bytes of its SHA-256, as 9 uppercase hex digits.
///
/// The same id yields the same number across builds and processes.
#[must_use]
pub fn tracking_number(order_id: &OrderId) -> String {
    let hash = digest::digest(&digest::SHA256, order_id.as_str().as_bytes());
    let prefix = hash
        .as_ref()
        .iter()
        .take(5)
        .fold(0_u64, |acc, byte| (acc << 8) | u64::from(*byte));
    format!("TRK{:09X}", prefix & 0xF_FFFF_FFFF)
}
