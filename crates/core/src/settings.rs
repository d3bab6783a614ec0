//! Synchronization settings

use std::time::Duration;

use jiff::SignedDuration;
use rusty_money::iso::{self, Currency};

/// Timing and currency settings for a [`CartStore`](crate::store::CartStore).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    /// Window in which repeated quantity changes for one variant are coalesced.
    pub update_debounce: SignedDuration,

    /// Delay before an optimistic removal is sent to the backend.
    pub remove_debounce: SignedDuration,

    /// Interval between background refreshes of the active cart.
    pub poll_interval: Duration,

    /// Longest time a dependent flow waits for synchronization to finish.
    pub sync_timeout: Duration,

    /// Lifetime of a customer–cart association, renewed on every write.
    pub association_ttl: SignedDuration,

    /// Currency used for totals until the backend reports one.
    pub currency: &'static Currency,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            update_debounce: SignedDuration::from_millis(800),
            remove_debounce: SignedDuration::from_millis(600),
            poll_interval: Duration::from_secs(30),
            sync_timeout: Duration::from_secs(2),
            association_ttl: SignedDuration::from_hours(24 * 30),
            currency: iso::USD,
        }
    }
}
