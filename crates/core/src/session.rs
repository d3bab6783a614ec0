//! Customer sessions and the events that drive reconciliation.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::ids::CustomerId;

/// A signed-in customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer id.
    pub id: CustomerId,

    /// Customer email, when the identity provider shares it.
    pub email: Option<String>,
}

impl Customer {
    /// A customer with the given id and no email.
    pub fn new(id: impl Into<CustomerId>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    /// Set the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A customer access token. Redacted in debug output and wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct CustomerAccessToken {
    token: String,
}

impl CustomerAccessToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The raw token, for sending to the backend.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for CustomerAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomerAccessToken(**redacted**)")
    }
}

impl Drop for CustomerAccessToken {
    fn drop(&mut self) {
        self.token.zeroize();
    }
}

/// Page visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// The storefront tab is in front of the user.
    Visible,

    /// The tab is in the background.
    Hidden,
}

/// Signals from the auth flow and the host environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A customer finished signing in.
    LoginCompleted {
        /// The new access token.
        token: CustomerAccessToken,

        /// The customer as reported by the login flow.
        customer: Customer,
    },

    /// The access token was renewed.
    TokenUpdated(CustomerAccessToken),

    /// The customer signed out.
    Logout,

    /// The window regained focus.
    FocusGained,

    /// The page visibility changed.
    VisibilityChanged(Visibility),

    /// Network connectivity returned.
    Online,

    /// Network connectivity was lost.
    Offline,

    /// The active cart was checked out.
    OrderCompleted,
}
