//! Collaborator errors.

use thiserror::Error;

/// Errors returned by a [`CartBackend`](crate::backend::CartBackend).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartBackendError {
    /// The backend could not be reached or timed out.
    #[error("cart backend unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the mutation (e.g. invalid variant, sold out).
    #[error("cart backend rejected the request: {0}")]
    Rejected(String),

    /// The cart or line does not exist.
    #[error("cart not found")]
    NotFound,

    /// The response could not be understood.
    #[error("malformed cart backend response: {0}")]
    Malformed(String),
}

impl CartBackendError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors returned by a [`CartAssociationStore`](crate::backend::CartAssociationStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssociationStoreError {
    /// The store could not be reached.
    #[error("association store unavailable: {0}")]
    Unavailable(String),

    /// The stored value could not be understood.
    #[error("malformed association: {0}")]
    Malformed(String),
}

/// Errors returned by a [`CustomerIdentity`](crate::backend::CustomerIdentity).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The identity provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    /// The identity response could not be understood.
    #[error("malformed identity response: {0}")]
    Malformed(String),
}

/// Errors returned by a [`ClientStorage`](crate::backend::ClientStorage).
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the underlying medium failed.
    #[error("client storage I/O error")]
    Io(#[from] std::io::Error),

    /// Stored data could not be decoded.
    #[error("client storage is corrupt: {0}")]
    Corrupt(String),
}
