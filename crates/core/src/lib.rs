//! Emporium Core - Shared domain library.
//!
//! This crate provides the types and pure logic shared by every Emporium
//! component:
//! - `api` - REST backend in front of the mock, Supabase or Firestore store
//! - `client` - Storefront API client and persisted cart
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types, the cart reducer and the static mock
//! catalog - no network I/O and no database access. This keeps it lightweight
//! and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money helpers and order status
//! - [`product`] - Products, create/update payloads and listing filters
//! - [`cart`] - Client-side cart reducer and its snapshot format
//! - [`order`] - Orders, line items, shipping and delivery status
//! - [`user`] - Authenticated identity and stored profiles
//! - [`catalog`] - Static sample catalog used when no database is configured

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod order;
pub mod product;
pub mod types;
pub mod user;

pub use cart::{Cart, CartAction, CartError, CartItem, StoredCartItem};
pub use order::{
    DeliveryStatus, NewOrder, Order, OrderError, OrderHeader, OrderItem, PaymentRecord,
    ShippingAddress,
};
pub use product::{NewProduct, Product, ProductError, ProductFilter, ProductUpdate, Rating};
pub use types::*;
pub use user::{AuthUser, ProfileUpdate, UserProfile};
