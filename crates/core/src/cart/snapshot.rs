//! Cart Snapshots

use serde::{Deserialize, Serialize};

use crate::{cart::lines::CartLine, ids::CartId};

/// Full authoritative state of a cart as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// Cart id.
    pub id: CartId,

    /// Ordered lines.
    pub lines: Vec<CartLine>,

    /// Where the buyer completes the purchase.
    pub checkout_url: Option<String>,

    /// ISO 4217 currency code of every price in the cart.
    pub currency: String,
}

impl CartSnapshot {
    /// A cart with no lines.
    pub fn empty(id: impl Into<CartId>, currency: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            lines: Vec::new(),
            checkout_url: None,
            currency: currency.into(),
        }
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of line quantities.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }
}
