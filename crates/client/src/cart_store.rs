//! The storefront cart, kept in sync with snapshot storage.
//!
//! Every accepted transition is applied to the in-memory [`Cart`] and then
//! written out in full before [`CartStore::dispatch`] returns, so storage
//! always holds the latest state.

use emporium_core::{Cart, CartAction, CartError, CartItem, Product, ProductId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::storage::{SnapshotStorage, StorageError};

/// Storage key of the cart snapshot.
pub const CART_KEY: &str = "cart";

#[derive(Debug, Error)]
pub enum CartStoreError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("failed to persist cart: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to encode cart: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A [`Cart`] bound to a storage backend.
#[derive(Debug)]
pub struct CartStore<S> {
    storage: S,
    cart: Cart,
}

impl<S: SnapshotStorage> CartStore<S> {
    /// Restore the cart from `storage`.
    ///
    /// A snapshot that is not text or not valid JSON is discarded and its
    /// key removed. Whatever loads is written back once in normalized form.
    ///
    /// # Errors
    ///
    /// Returns `CartStoreError::Storage` if the backend cannot be read or
    /// written.
    pub fn load(storage: S) -> Result<Self, CartStoreError> {
        let snapshot = match storage.get(CART_KEY) {
            Ok(raw) => raw.map(|raw| Cart::from_snapshot(&raw)),
            Err(StorageError::Malformed { key }) => {
                Some(Err(CartError::MalformedSnapshot(format!("{key} is not valid UTF-8"))))
            }
            Err(e) => return Err(e.into()),
        };
        let cart = match snapshot {
            None => Cart::new(),
            Some(Ok(cart)) => cart,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Discarding unreadable cart snapshot");
                storage.remove(CART_KEY)?;
                Cart::new()
            }
        };

        let store = Self { storage, cart };
        store.persist()?;
        tracing::debug!(items = store.cart.items().len(), "Cart loaded");
        Ok(store)
    }

    /// Apply `action`, then persist the new state.
    ///
    /// # Errors
    ///
    /// Returns `CartStoreError::Cart` (state unchanged, nothing written) if
    /// the reducer rejects the action, or a storage error if the snapshot
    /// could not be written.
    pub fn dispatch(&mut self, action: CartAction) -> Result<(), CartStoreError> {
        self.cart.apply(action)?;
        self.persist()
    }

    /// Add `quantity` of `product`.
    ///
    /// # Errors
    ///
    /// See [`CartStore::dispatch`].
    pub fn add(&mut self, product: &Product, quantity: u32) -> Result<(), CartStoreError> {
        self.dispatch(CartAction::Add {
            item: CartItem::from(product),
            quantity,
        })
    }

    /// # Errors
    ///
    /// See [`CartStore::dispatch`].
    pub fn remove(&mut self, id: &ProductId) -> Result<(), CartStoreError> {
        self.dispatch(CartAction::Remove(id.clone()))
    }

    /// # Errors
    ///
    /// See [`CartStore::dispatch`].
    pub fn set_quantity(&mut self, id: &ProductId, quantity: i64) -> Result<(), CartStoreError> {
        self.dispatch(CartAction::SetQuantity {
            id: id.clone(),
            quantity,
        })
    }

    /// # Errors
    ///
    /// See [`CartStore::dispatch`].
    pub fn clear(&mut self) -> Result<(), CartStoreError> {
        self.dispatch(CartAction::Clear)
    }

    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        self.cart.items()
    }

    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.cart.item_count()
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.cart.subtotal()
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    fn persist(&self) -> Result<(), CartStoreError> {
        let snapshot = self.cart.to_snapshot()?;
        self.storage.set(CART_KEY, &snapshot)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use emporium_core::catalog::mock_product;

    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};

    fn stored(store: &CartStore<MemoryStorage>) -> Option<String> {
        store.storage().get(CART_KEY).unwrap()
    }

    #[test]
    fn empty_storage_loads_empty_cart_and_persists_it() {
        let store = CartStore::load(MemoryStorage::new()).unwrap();
        assert!(store.cart().is_empty());
        assert_eq!(stored(&store).as_deref(), Some("[]"));
    }

    #[test]
    fn adding_same_product_twice_merges() {
        let mut store = CartStore::load(MemoryStorage::new()).unwrap();
        let product = mock_product("5").unwrap();
        store.add(&product, 1).unwrap();
        store.add(&product, 2).unwrap();

        assert_eq!(store.items().len(), 1);
        assert_eq!(store.items()[0].quantity, 3);
        assert_eq!(store.item_count(), 3);
        assert_eq!(store.subtotal(), product.price * Decimal::from(3));
    }

    #[test]
    fn every_transition_is_persisted() {
        let mut store = CartStore::load(MemoryStorage::new()).unwrap();
        let product = mock_product("1").unwrap();
        store.add(&product, 2).unwrap();

        let reloaded = Cart::from_snapshot(&stored(&store).unwrap()).unwrap();
        assert_eq!(&reloaded, store.cart());

        store.set_quantity(&product.id, 5).unwrap();
        let reloaded = Cart::from_snapshot(&stored(&store).unwrap()).unwrap();
        assert_eq!(reloaded.items()[0].quantity, 5);
    }

    #[test]
    fn zero_quantity_removes_and_negative_is_noop() {
        let mut store = CartStore::load(MemoryStorage::new()).unwrap();
        let product = mock_product("1").unwrap();
        store.add(&product, 2).unwrap();
        let before = stored(&store);

        let err = store.set_quantity(&product.id, -3).unwrap_err();
        assert!(matches!(err, CartStoreError::Cart(CartError::NegativeQuantity(-3))));
        assert_eq!(store.items()[0].quantity, 2);
        assert_eq!(stored(&store), before);

        store.set_quantity(&product.id, 0).unwrap();
        assert!(store.cart().is_empty());
    }

    #[test]
    fn clear_persists_empty_snapshot() {
        let mut store = CartStore::load(MemoryStorage::new()).unwrap();
        store.add(&mock_product("1").unwrap(), 1).unwrap();
        store.add(&mock_product("2").unwrap(), 1).unwrap();
        store.clear().unwrap();
        assert!(store.cart().is_empty());
        assert_eq!(stored(&store).as_deref(), Some("[]"));
    }

    #[test]
    fn existing_snapshot_is_restored() {
        let storage = MemoryStorage::new();
        storage
            .set(CART_KEY, r#"[{"id":"5","title":"X","price":10,"quantity":2}]"#)
            .unwrap();

        let store = CartStore::load(storage).unwrap();
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.items()[0].id.as_str(), "5");
        assert_eq!(store.items()[0].title, "X");
        assert_eq!(store.item_count(), 2);
        assert_eq!(store.subtotal(), Decimal::from(20));
    }

    #[test]
    fn malformed_snapshot_is_discarded() {
        let storage = MemoryStorage::new();
        storage.set(CART_KEY, "{definitely not json").unwrap();

        let store = CartStore::load(storage).unwrap();
        assert!(store.cart().is_empty());
        assert_eq!(stored(&store).as_deref(), Some("[]"));
    }

    #[test]
    fn load_normalizes_numeric_ids_and_drops_bad_entries() {
        let storage = MemoryStorage::new();
        storage
            .set(
                CART_KEY,
                r#"[{"id":3,"title":"Jacket","price":55.99},{"id":"4","title":"Bad","price":"free"}]"#,
            )
            .unwrap();

        let store = CartStore::load(storage).unwrap();
        assert_eq!(store.items().len(), 1);
        let snapshot = stored(&store).unwrap();
        assert!(snapshot.contains(r#""id":"3""#));
        assert!(!snapshot.contains("Bad"));
    }

    #[test]
    fn non_utf8_snapshot_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        std::fs::write(&path, [0xff, 0xfe, b'[', b']']).unwrap();

        let store = CartStore::load(FileStorage::new(dir.path()).unwrap()).unwrap();
        assert!(store.cart().is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn snapshot_line_with_overflowing_total_is_dropped() {
        let storage = MemoryStorage::new();
        storage
            .set(
                CART_KEY,
                r#"[{"id":"1","title":"x","price":7.0e28,"quantity":2},{"id":"2","title":"Mug","price":4}]"#,
            )
            .unwrap();

        let store = CartStore::load(storage).unwrap();
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.subtotal(), Decimal::from(4));
        assert!(!stored(&store).unwrap().contains(r#""id":"1""#));
    }

    #[test]
    fn file_backed_cart_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let product = mock_product("9").unwrap();
        {
            let mut store = CartStore::load(FileStorage::new(dir.path()).unwrap()).unwrap();
            store.add(&product, 4).unwrap();
        }

        let store = CartStore::load(FileStorage::new(dir.path()).unwrap()).unwrap();
        assert_eq!(store.item_count(), 4);
        assert_eq!(store.items()[0].id, product.id);
    }
}
