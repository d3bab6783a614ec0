//! In-memory association store.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::{
    backend::{AssociationStoreError, CartAssociationStore},
    clock::{Clock, offset},
    ids::{CartId, CustomerId},
};

#[derive(Debug, Clone)]
struct Association {
    cart: CartId,
    expires_at: Timestamp,
}

/// A [`CartAssociationStore`] held in memory.
///
/// Entries expire against the injected [`Clock`]; an expired entry reads as
/// absent and is dropped on access.
#[derive(Debug)]
pub struct InMemoryAssociationStore {
    clock: Arc<dyn Clock>,
    entries: Mutex<FxHashMap<CustomerId, Association>>,
}

impl InMemoryAssociationStore {
    /// An empty store.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// When `customer`'s association expires, if it exists.
    pub fn expires_at(&self, customer: &CustomerId) -> Option<Timestamp> {
        self.entries
            .lock()
            .get(customer)
            .map(|association| association.expires_at)
    }

    /// Number of stored associations, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl CartAssociationStore for InMemoryAssociationStore {
    async fn get(&self, customer: &CustomerId) -> Result<Option<CartId>, AssociationStoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.get(customer).cloned() {
            Some(association) if association.expires_at > now => Ok(Some(association.cart)),
            Some(_) => {
                entries.remove(customer);

                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        customer: &CustomerId,
        cart: &CartId,
        ttl: SignedDuration,
    ) -> Result<(), AssociationStoreError> {
        let expires_at = offset(self.clock.now(), ttl);

        self.entries.lock().insert(
            customer.clone(),
            Association {
                cart: cart.clone(),
                expires_at,
            },
        );

        Ok(())
    }

    async fn delete(&self, customer: &CustomerId) -> Result<(), AssociationStoreError> {
        self.entries.lock().remove(customer);

        Ok(())
    }
}
