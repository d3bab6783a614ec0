//! In-memory client storage.

use parking_lot::Mutex;

use crate::{
    backend::{ClientStorage, StorageError},
    ids::CartId,
    session::CustomerAccessToken,
};

/// A [`ClientStorage`] that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryClientStorage {
    cart_id: Mutex<Option<CartId>>,
    token: Mutex<Option<CustomerAccessToken>>,
}

impl MemoryClientStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that already holds a cart id.
    #[must_use]
    pub fn with_cart_id(self, cart: impl Into<CartId>) -> Self {
        *self.cart_id.lock() = Some(cart.into());
        self
    }

    /// Storage that already holds a customer token.
    #[must_use]
    pub fn with_token(self, token: CustomerAccessToken) -> Self {
        *self.token.lock() = Some(token);
        self
    }
}

impl ClientStorage for MemoryClientStorage {
    fn cart_id(&self) -> Result<Option<CartId>, StorageError> {
        Ok(self.cart_id.lock().clone())
    }

    fn set_cart_id(&self, cart: &CartId) -> Result<(), StorageError> {
        *self.cart_id.lock() = Some(cart.clone());

        Ok(())
    }

    fn clear_cart_id(&self) -> Result<(), StorageError> {
        *self.cart_id.lock() = None;

        Ok(())
    }

    fn customer_token(&self) -> Result<Option<CustomerAccessToken>, StorageError> {
        Ok(self.token.lock().clone())
    }

    fn set_customer_token(&self, token: &CustomerAccessToken) -> Result<(), StorageError> {
        *self.token.lock() = Some(token.clone());

        Ok(())
    }

    fn clear_customer_token(&self) -> Result<(), StorageError> {
        *self.token.lock() = None;

        Ok(())
    }
}
