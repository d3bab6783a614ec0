//! Storefront errors.

use thiserror::Error;
use trolley::backend::{CartBackendError, IdentityError};

/// Errors raised talking to the storefront GraphQL API.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// An HTTP transport or decoding error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The storefront answered with a non-2xx status.
    #[error("storefront responded with status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,

        /// Response body, for diagnostics.
        body: String,
    },

    /// The response carried top-level GraphQL errors.
    #[error("graphql error: {0}")]
    GraphQl(String),

    /// The mutation was refused with user errors.
    #[error("{0}")]
    UserErrors(String),

    /// A mutation returned neither a cart nor user errors.
    #[error("storefront returned no cart")]
    MissingCart,

    /// The response did not have the expected shape.
    #[error("unexpected storefront response: {0}")]
    Unexpected(String),
}

impl StorefrontError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(error) => error.is_timeout() || error.is_connect() || error.is_request(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::GraphQl(_) | Self::UserErrors(_) | Self::MissingCart | Self::Unexpected(_) => {
                false
            }
        }
    }
}

impl From<StorefrontError> for CartBackendError {
    fn from(error: StorefrontError) -> Self {
        if error.is_transient() {
            return Self::Unavailable(error.to_string());
        }

        match error {
            StorefrontError::UserErrors(message) | StorefrontError::GraphQl(message) => {
                Self::Rejected(message)
            }
            StorefrontError::MissingCart => Self::NotFound,
            StorefrontError::Http(_) | StorefrontError::Status { .. } | StorefrontError::Unexpected(_) => {
                Self::Malformed(error.to_string())
            }
        }
    }
}

impl From<StorefrontError> for IdentityError {
    fn from(error: StorefrontError) -> Self {
        if error.is_transient() {
            Self::Unavailable(error.to_string())
        } else {
            Self::Malformed(error.to_string())
        }
    }
}
