//! In-memory backend seeded with the sample catalog.
//!
//! Everything lives behind one `RwLock`, so each operation (including order
//! creation) is atomic. Concurrent admin writes are last-write-wins.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use emporium_core::catalog::mock_products;
use emporium_core::{
    AuthUser, CartItemId, NewProduct, Order, OrderHeader, OrderId, OrderItem, OrderStatus,
    Product, ProductFilter, ProductId, ProductUpdate, ProfileUpdate, StoredCartItem, UserId,
    UserProfile,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BackendError, BackendKind, DataBackend};

#[derive(Default)]
struct MockData {
    products: Vec<Product>,
    cart: Vec<StoredCartItem>,
    orders: Vec<Order>,
    profiles: HashMap<UserId, UserProfile>,
}

impl MockData {
    fn product(&self, id: &ProductId) -> Option<Product> {
        self.products.iter().find(|p| p.id == *id).cloned()
    }

    /// Cart row with the product joined in.
    fn joined(&self, item: &StoredCartItem) -> StoredCartItem {
        StoredCartItem {
            product: self.product(&item.product_id),
            ..item.clone()
        }
    }
}

/// In-memory data backend.
#[derive(Default)]
pub struct MockBackend {
    data: RwLock<MockData>,
}

impl MockBackend {
    /// Empty store with no products.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the sample catalog.
    #[must_use]
    pub fn seeded() -> Self {
        Self::with_products(mock_products())
    }

    /// Store seeded with the given products.
    #[must_use]
    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            data: RwLock::new(MockData {
                products,
                ..MockData::default()
            }),
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl DataBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mock
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, BackendError> {
        let data = self.data.read().await;
        Ok(filter.apply(data.products.iter().cloned()))
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, BackendError> {
        Ok(self.data.read().await.product(id))
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, BackendError> {
        let product = product.into_product(ProductId::new(new_id()), Utc::now());
        self.data.write().await.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: &ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, BackendError> {
        let mut data = self.data.write().await;
        let Some(product) = data.products.iter_mut().find(|p| p.id == *id) else {
            return Ok(None);
        };
        update.apply_to(product, Utc::now());
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, id: &ProductId) -> Result<bool, BackendError> {
        let mut data = self.data.write().await;
        let before = data.products.len();
        data.products.retain(|p| p.id != *id);
        Ok(data.products.len() != before)
    }

    async fn cart_items(&self, user: &UserId) -> Result<Vec<StoredCartItem>, BackendError> {
        let data = self.data.read().await;
        Ok(data
            .cart
            .iter()
            .filter(|item| item.user_id == *user)
            .map(|item| data.joined(item))
            .collect())
    }

    async fn add_to_cart(
        &self,
        user: &UserId,
        product: &ProductId,
        quantity: u32,
    ) -> Result<StoredCartItem, BackendError> {
        let mut data = self.data.write().await;
        let existing = data
            .cart
            .iter_mut()
            .find(|item| item.user_id == *user && item.product_id == *product);

        let item = if let Some(item) = existing {
            item.quantity = item.quantity.saturating_add(quantity);
            item.clone()
        } else {
            let item = StoredCartItem {
                id: CartItemId::new(new_id()),
                user_id: user.clone(),
                product_id: product.clone(),
                quantity,
                created_at: Some(Utc::now()),
                product: None,
            };
            data.cart.push(item.clone());
            item
        };
        Ok(data.joined(&item))
    }

    async fn update_cart_item(
        &self,
        user: &UserId,
        item: &CartItemId,
        quantity: u32,
    ) -> Result<Option<StoredCartItem>, BackendError> {
        let mut data = self.data.write().await;
        let Some(row) = data
            .cart
            .iter_mut()
            .find(|row| row.id == *item && row.user_id == *user)
        else {
            return Ok(None);
        };
        row.quantity = quantity;
        let row = row.clone();
        Ok(Some(data.joined(&row)))
    }

    async fn remove_cart_item(
        &self,
        user: &UserId,
        item: &CartItemId,
    ) -> Result<bool, BackendError> {
        let mut data = self.data.write().await;
        let before = data.cart.len();
        data.cart
            .retain(|row| !(row.id == *item && row.user_id == *user));
        Ok(data.cart.len() != before)
    }

    async fn clear_cart(&self, user: &UserId) -> Result<(), BackendError> {
        self.data.write().await.cart.retain(|row| row.user_id != *user);
        Ok(())
    }

    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, BackendError> {
        let data = self.data.read().await;
        let mut orders: Vec<Order> = data
            .orders
            .iter()
            .filter(|o| o.user_id == *user)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn get_order(&self, user: &UserId, id: &OrderId) -> Result<Option<Order>, BackendError> {
        let data = self.data.read().await;
        Ok(data
            .orders
            .iter()
            .find(|o| o.id == *id && o.user_id == *user)
            .cloned())
    }

    async fn insert_order_header(&self, header: &OrderHeader) -> Result<Order, BackendError> {
        let order = header
            .clone()
            .into_order(OrderId::new(new_id()), Utc::now());
        self.data.write().await.orders.push(order.clone());
        Ok(order)
    }

    async fn insert_order_items(
        &self,
        order: &OrderId,
        items: &[OrderItem],
    ) -> Result<(), BackendError> {
        let mut data = self.data.write().await;
        let stored = data
            .orders
            .iter_mut()
            .find(|o| o.id == *order)
            .ok_or_else(|| BackendError::Unavailable(format!("order {order} does not exist")))?;
        stored.items.extend_from_slice(items);
        Ok(())
    }

    async fn delete_order(&self, order: &OrderId) -> Result<(), BackendError> {
        self.data.write().await.orders.retain(|o| o.id != *order);
        Ok(())
    }

    async fn create_order(
        &self,
        header: OrderHeader,
        items: Vec<OrderItem>,
    ) -> Result<Order, BackendError> {
        let mut order = header.into_order(OrderId::new(new_id()), Utc::now());
        order.items = items;
        self.data.write().await.orders.push(order.clone());
        Ok(order)
    }

    async fn update_order_status(
        &self,
        user: &UserId,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, BackendError> {
        let mut data = self.data.write().await;
        let Some(order) = data
            .orders
            .iter_mut()
            .find(|o| o.id == *id && o.user_id == *user)
        else {
            return Ok(None);
        };
        order.status = status;
        order.updated_at = Some(Utc::now());
        Ok(Some(order.clone()))
    }

    async fn get_profile(&self, user: &AuthUser) -> Result<UserProfile, BackendError> {
        let data = self.data.read().await;
        Ok(data
            .profiles
            .get(&user.id)
            .cloned()
            .unwrap_or_else(|| UserProfile::from(user)))
    }

    async fn update_profile(
        &self,
        user: &AuthUser,
        update: ProfileUpdate,
    ) -> Result<UserProfile, BackendError> {
        let mut data = self.data.write().await;
        let current = data
            .profiles
            .get(&user.id)
            .cloned()
            .unwrap_or_else(|| UserProfile::from(user));
        let profile = update.merge_into(current, Utc::now());
        data.profiles.insert(user.id.clone(), profile.clone());
        Ok(profile)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::NewOrder;
    use rust_decimal::Decimal;

    use super::*;

    fn order_payload() -> NewOrder {
        serde_json::from_value(serde_json::json!({
            "items": [{"productId": "1", "title": "Backpack", "price": 109.95, "quantity": 2}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn seeded_catalog_is_served() {
        let backend = MockBackend::seeded();
        let products = backend.list_products(&ProductFilter::default()).await.unwrap();
        assert_eq!(products.len(), 20);
        assert_eq!(backend.categories().await.unwrap().len(), 4);
        assert!(backend.get_product(&ProductId::new("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn product_crud() {
        let backend = MockBackend::new();
        let created = backend
            .create_product(NewProduct {
                title: "Lamp".to_string(),
                price: Decimal::new(1999, 2),
                description: "Desk lamp".to_string(),
                category: "home".to_string(),
                image: String::new(),
                rating: emporium_core::Rating::default(),
                specifications: None,
                is_featured: false,
                duplicated_from: None,
            })
            .await
            .unwrap();
        assert!(created.created_at.is_some());

        let updated = backend
            .update_product(
                &created.id,
                ProductUpdate {
                    title: Some("Floor lamp".to_string()),
                    ..ProductUpdate::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Floor lamp");
        assert_eq!(updated.price, Decimal::new(1999, 2));

        assert!(backend.delete_product(&created.id).await.unwrap());
        assert!(!backend.delete_product(&created.id).await.unwrap());
        assert!(
            backend
                .update_product(&created.id, ProductUpdate::default())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn cart_merges_and_is_scoped_to_user() {
        let backend = MockBackend::seeded();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let product = ProductId::new("1");

        let first = backend.add_to_cart(&alice, &product, 1).await.unwrap();
        let second = backend.add_to_cart(&alice, &product, 2).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 3);
        assert_eq!(second.product.as_ref().map(|p| p.id.as_str()), Some("1"));

        assert!(backend.cart_items(&bob).await.unwrap().is_empty());
        assert!(
            backend
                .update_cart_item(&bob, &first.id, 5)
                .await
                .unwrap()
                .is_none()
        );
        assert!(!backend.remove_cart_item(&bob, &first.id).await.unwrap());

        backend.clear_cart(&alice).await.unwrap();
        assert!(backend.cart_items(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn orders_are_newest_first_and_scoped() {
        let backend = MockBackend::seeded();
        let user = UserId::new("u1");
        let payload = order_payload();

        let first = backend
            .create_order(payload.header(user.clone()).unwrap(), payload.items.clone())
            .await
            .unwrap();
        let second = backend
            .create_order(payload.header(user.clone()).unwrap(), payload.items.clone())
            .await
            .unwrap();

        let orders = backend.orders_for_user(&user).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders[0].created_at >= orders[1].created_at);
        assert_eq!(orders[0].total, Decimal::new(21990, 2));

        let other = UserId::new("u2");
        assert!(backend.get_order(&other, &first.id).await.unwrap().is_none());
        assert!(
            backend
                .update_order_status(&other, &second.id, OrderStatus::Shipped)
                .await
                .unwrap()
                .is_none()
        );

        let shipped = backend
            .update_order_status(&user, &second.id, OrderStatus::Shipped)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);
        assert!(shipped.updated_at.is_some());
    }

    #[tokio::test]
    async fn profile_upsert_falls_back_to_token_identity() {
        let backend = MockBackend::new();
        let user = AuthUser {
            id: UserId::new("u1"),
            email: Some("u1@example.com".to_string()),
            full_name: None,
        };

        let profile = backend.get_profile(&user).await.unwrap();
        assert_eq!(profile.email.as_deref(), Some("u1@example.com"));

        let updated = backend
            .update_profile(
                &user,
                ProfileUpdate {
                    phone: Some("555-0100".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert_eq!(backend.get_profile(&user).await.unwrap(), updated);
    }
}
