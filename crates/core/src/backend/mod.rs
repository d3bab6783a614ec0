//! Collaborators
//!
//! The remote systems the cart store talks to. Everything here is an
//! interface; concrete adapters live in [`crate::memory`] and in the
//! application crate.

pub mod errors;

use async_trait::async_trait;
use mockall::automock;

use crate::{
    cart::{CartSnapshot, LineInput, LineUpdate},
    ids::{CartId, CustomerId, LineId},
    session::{Customer, CustomerAccessToken},
};

pub use errors::{AssociationStoreError, CartBackendError, IdentityError, StorageError};

/// The remote commerce API holding authoritative carts.
#[automock]
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// Create a cart holding `lines`.
    async fn create(&self, lines: Vec<LineInput>) -> Result<CartSnapshot, CartBackendError>;

    /// Fetch a cart; `None` when it no longer exists.
    async fn fetch(&self, cart: &CartId) -> Result<Option<CartSnapshot>, CartBackendError>;

    /// Add lines to a cart.
    async fn add_lines(
        &self,
        cart: &CartId,
        lines: Vec<LineInput>,
    ) -> Result<CartSnapshot, CartBackendError>;

    /// Change line quantities.
    async fn update_lines(
        &self,
        cart: &CartId,
        lines: Vec<LineUpdate>,
    ) -> Result<CartSnapshot, CartBackendError>;

    /// Remove lines.
    async fn remove_lines(
        &self,
        cart: &CartId,
        lines: Vec<LineId>,
    ) -> Result<CartSnapshot, CartBackendError>;

    /// Attach the cart to the customer owning `token`.
    async fn update_buyer_identity(
        &self,
        cart: &CartId,
        token: &CustomerAccessToken,
    ) -> Result<(), CartBackendError>;
}

/// Durable customer → cart mapping with expiry.
#[automock]
#[async_trait]
pub trait CartAssociationStore: Send + Sync {
    /// The cart last associated with `customer`.
    async fn get(&self, customer: &CustomerId) -> Result<Option<CartId>, AssociationStoreError>;

    /// Associate `cart` with `customer` for `ttl`, replacing any previous association.
    async fn set(
        &self,
        customer: &CustomerId,
        cart: &CartId,
        ttl: jiff::SignedDuration,
    ) -> Result<(), AssociationStoreError>;

    /// Forget `customer`'s association.
    async fn delete(&self, customer: &CustomerId) -> Result<(), AssociationStoreError>;
}

/// Resolves access tokens to customers.
#[automock]
#[async_trait]
pub trait CustomerIdentity: Send + Sync {
    /// The customer owning `token`; `None` when the token is not valid.
    async fn resolve(
        &self,
        token: &CustomerAccessToken,
    ) -> Result<Option<Customer>, IdentityError>;
}

/// Client-local persistence for the active cart id and the customer token.
#[automock]
pub trait ClientStorage: Send + Sync {
    /// The stored cart id.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the storage cannot be read.
    fn cart_id(&self) -> Result<Option<CartId>, StorageError>;

    /// Store the active cart id.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the storage cannot be written.
    fn set_cart_id(&self, cart: &CartId) -> Result<(), StorageError>;

    /// Forget the active cart id.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the storage cannot be written.
    fn clear_cart_id(&self) -> Result<(), StorageError>;

    /// The stored customer access token.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the storage cannot be read.
    fn customer_token(&self) -> Result<Option<CustomerAccessToken>, StorageError>;

    /// Store the customer access token.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the storage cannot be written.
    fn set_customer_token(&self, token: &CustomerAccessToken) -> Result<(), StorageError>;

    /// Forget the customer access token.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the storage cannot be written.
    fn clear_customer_token(&self) -> Result<(), StorageError>;
}
