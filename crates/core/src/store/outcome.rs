//! Operation outcomes
//!
//! Cart mutations never fail from the caller's point of view: every backend
//! failure is rolled back locally and reported as a [`CartNotice`].

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::{cart::NewCartLine, ids::VariantId};

/// Hydration and synchronization phase of the active cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// Client storage has not been read yet.
    #[default]
    Unhydrated,

    /// Storage was read but no usable cart exists.
    NoCart,

    /// A cart is active but not reconciled with a signed-in customer.
    Unsynced,

    /// The active cart is the signed-in customer's associated cart.
    Synced,
}

impl SyncPhase {
    /// Whether a cart is active.
    pub fn has_cart(self) -> bool {
        matches!(self, Self::Unsynced | Self::Synced)
    }
}

/// Result of a cart mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The backend confirmed the change and its snapshot was applied.
    Confirmed,

    /// The change was applied locally and will be sent when its debounce window closes.
    Scheduled,

    /// The backend rejected the change; local state was restored.
    RolledBack(CartNotice),

    /// The client is offline; nothing was changed.
    Offline,

    /// The variant cannot be purchased; nothing was changed.
    Unavailable,

    /// The request would not change the cart.
    Unchanged,
}

/// A user-facing failure report with a way to try again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartNotice {
    /// Human readable description.
    pub message: String,

    /// The operation to replay.
    pub retry: RetryAction,
}

impl Display for CartNotice {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.message)
    }
}

/// A cart mutation that can be replayed with [`CartStore::retry`](crate::store::CartStore::retry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryAction {
    /// Add the line again.
    AddLine(NewCartLine),

    /// Set the quantity again.
    UpdateQuantity {
        /// Variant to change.
        variant_id: VariantId,

        /// Target quantity.
        quantity: u32,
    },

    /// Remove the line again.
    RemoveLine(VariantId),
}

/// How a synchronization attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncResolution {
    /// The customer's associated cart replaced the local one.
    Adopted,

    /// The local cart already was the customer's associated cart.
    AlreadySynced,

    /// The local cart was attached to the customer and associated.
    Attached,

    /// The token did not resolve to a customer.
    Skipped,

    /// Another synchronization was already running.
    InProgress,

    /// A network step failed; the last established cart is kept.
    Failed,
}

/// Why a refresh did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSkip {
    /// The client is offline.
    Offline,

    /// The storefront is not visible.
    Hidden,

    /// A refresh is already in flight.
    InFlight,

    /// A synchronization is running.
    Synchronizing,

    /// Local edits are waiting on a debounce window or in flight.
    EditsPending,

    /// No cart is active.
    NoCart,
}

/// Result of a background refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The authoritative snapshot replaced local state.
    Refreshed,

    /// A local edit happened while the fetch was in flight; the result was dropped.
    Stale,

    /// The active cart no longer existed and a fresh one was created.
    Recreated,

    /// The refresh did not run.
    Skipped(RefreshSkip),

    /// The fetch failed; local state was kept.
    Failed,
}
