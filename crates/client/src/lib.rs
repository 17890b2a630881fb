//! Emporium Client - storefront logic without the views.
//!
//! - [`api`] - HTTP client for the Emporium API. Falls back to the built-in
//!   mock catalog whenever the API is unavailable.
//! - [`cart_store`] - The shopping cart, persisted after every change.
//! - [`storage`] - Snapshot storage backends for the cart.
//!
//! # Example
//!
//! ```rust,ignore
//! use emporium_client::{ApiClient, CartStore, FileStorage, Storefront};
//!
//! let store = Storefront::new(ApiClient::from_env()?);
//! let products = store.products().await;
//!
//! let mut cart = CartStore::load(FileStorage::new(".emporium")?)?;
//! cart.add(&products[0], 1)?;
//! println!("{} items, subtotal {}", cart.item_count(), cart.subtotal());
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart_store;
pub mod storage;

pub use api::{
    ApiClient, CardToken, ClientError, MutationResult, PaymentIntentResponse, PaymentRequest,
    PaymentResult, Storefront,
};
pub use cart_store::{CART_KEY, CartStore, CartStoreError};
pub use storage::{FileStorage, MemoryStorage, SnapshotStorage, StorageError};
