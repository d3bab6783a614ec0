//! Connectivity

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared online/offline flag.
///
/// Cart mutations check it before applying any optimistic change.
#[derive(Debug, Clone)]
pub struct Connectivity(Arc<AtomicBool>);

impl Connectivity {
    /// A flag that starts online.
    #[must_use]
    pub fn online() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// A flag that starts offline.
    #[must_use]
    pub fn offline() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Whether the network is believed reachable.
    pub fn is_online(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Record a connectivity change.
    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::Release);
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::online()
    }
}
