//! Cart View

use rusty_money::{Money, iso::Currency};

use crate::{
    cart::{CartLine, LocalCart},
    ids::CartId,
    store::SyncPhase,
};

/// A consistent read of the cart for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct CartView {
    /// Backend cart id.
    pub cart_id: Option<CartId>,

    /// Ordered lines, including unconfirmed optimistic edits.
    pub lines: Vec<CartLine>,

    /// Sum of line quantities.
    pub total_quantity: u64,

    /// Sum of quantity × unit price.
    pub total_price: Money<'static, Currency>,

    /// Where the buyer completes the purchase.
    pub checkout_url: Option<String>,

    /// Hydration and synchronization phase.
    pub phase: SyncPhase,

    /// Whether edits are waiting to be confirmed by the backend.
    pub pending: bool,
}

impl CartView {
    pub(crate) fn capture(cart: &LocalCart, phase: SyncPhase, pending: bool) -> Self {
        Self {
            cart_id: cart.id().cloned(),
            lines: cart.lines().to_vec(),
            total_quantity: cart.total_quantity(),
            total_price: cart.total_price(),
            checkout_url: cart.checkout_url().map(str::to_string),
            phase,
            pending,
        }
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
