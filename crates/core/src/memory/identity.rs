//! Fixed token → customer table.

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::{
    backend::{CustomerIdentity, IdentityError},
    session::{Customer, CustomerAccessToken},
};

/// A [`CustomerIdentity`] backed by a fixed table of tokens.
#[derive(Debug, Default)]
pub struct StaticCustomerIdentity {
    customers: Mutex<FxHashMap<String, Customer>>,
}

impl StaticCustomerIdentity {
    /// An empty table; every token is unknown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a customer.
    #[must_use]
    pub fn with_customer(self, token: &CustomerAccessToken, customer: Customer) -> Self {
        self.insert(token, customer);
        self
    }

    /// Register a customer, replacing whoever held the token before.
    pub fn insert(&self, token: &CustomerAccessToken, customer: Customer) {
        self.customers
            .lock()
            .insert(token.expose().to_string(), customer);
    }

    /// Revoke a token.
    pub fn revoke(&self, token: &CustomerAccessToken) {
        self.customers.lock().remove(token.expose());
    }
}

#[async_trait]
impl CustomerIdentity for StaticCustomerIdentity {
    async fn resolve(
        &self,
        token: &CustomerAccessToken,
    ) -> Result<Option<Customer>, IdentityError> {
        Ok(self.customers.lock().get(token.expose()).cloned())
    }
}
