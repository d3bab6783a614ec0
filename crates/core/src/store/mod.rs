//! Cart Store
//!
//! [`CartStore`] is the single writer of the client's cart. It applies
//! optimistic edits immediately, confirms them against the [`CartBackend`],
//! and reconciles the active cart with a signed-in customer's associated
//! cart.
//!
//! The store is shared as `Arc<CartStore>`. Its state sits behind a
//! synchronous mutex that is never held across an `.await`; every network
//! round-trip happens between two short critical sections.

mod mutations;
mod outcome;
mod reconcile;
mod state;
mod view;

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use jiff::Timestamp;
use parking_lot::Mutex;
use rusty_money::{Money, iso::Currency};
use tokio::sync::{Notify, broadcast, watch};
use tracing::{debug, warn};

use crate::{
    backend::{CartAssociationStore, CartBackend, ClientStorage, CustomerIdentity},
    cart::CartSnapshot,
    clock::Clock,
    connectivity::Connectivity,
    session::{Customer, CustomerAccessToken},
    settings::SyncSettings,
    signal::SyncSignal,
};

pub use outcome::{
    CartNotice, MutationOutcome, RefreshOutcome, RefreshSkip, RetryAction, SyncPhase,
    SyncResolution,
};
pub use view::CartView;

use state::StoreState;

const NOTICE_CAPACITY: usize = 16;

/// Everything a [`CartStore`] talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Authoritative carts.
    pub backend: Arc<dyn CartBackend>,

    /// Customer → cart associations.
    pub associations: Arc<dyn CartAssociationStore>,

    /// Token → customer resolution.
    pub identity: Arc<dyn CustomerIdentity>,

    /// Client-local persistence.
    pub storage: Arc<dyn ClientStorage>,

    /// Time source for debounce windows.
    pub clock: Arc<dyn Clock>,

    /// Online/offline flag.
    pub connectivity: Connectivity,
}

impl Debug for Collaborators {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Collaborators")
            .field("clock", &self.clock)
            .field("connectivity", &self.connectivity)
            .finish_non_exhaustive()
    }
}

/// The client's cart, kept in step with the backend and the signed-in customer.
pub struct CartStore {
    backend: Arc<dyn CartBackend>,
    associations: Arc<dyn CartAssociationStore>,
    identity: Arc<dyn CustomerIdentity>,
    storage: Arc<dyn ClientStorage>,
    clock: Arc<dyn Clock>,
    connectivity: Connectivity,
    settings: SyncSettings,
    state: Mutex<StoreState>,
    view: watch::Sender<CartView>,
    notices: broadcast::Sender<CartNotice>,
    signal: SyncSignal,
    rescheduled: Notify,
}

impl CartStore {
    /// A store with an empty, unhydrated cart. Call [`CartStore::mount`] next.
    #[must_use]
    pub fn new(collaborators: Collaborators, settings: SyncSettings) -> Self {
        let state = StoreState::new(&settings);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        Self {
            backend: collaborators.backend,
            associations: collaborators.associations,
            identity: collaborators.identity,
            storage: collaborators.storage,
            clock: collaborators.clock,
            connectivity: collaborators.connectivity,
            settings,
            view: watch::Sender::new(state.view()),
            state: Mutex::new(state),
            notices,
            signal: SyncSignal::new(),
            rescheduled: Notify::new(),
        }
    }

    /// Current cart.
    pub fn view(&self) -> CartView {
        self.state.lock().view()
    }

    /// Watch the cart; a new value is published after every change.
    pub fn subscribe(&self) -> watch::Receiver<CartView> {
        self.view.subscribe()
    }

    /// Receive failure notices, including those from debounced edits.
    pub fn notices(&self) -> broadcast::Receiver<CartNotice> {
        self.notices.subscribe()
    }

    /// Synchronization start/completion.
    pub fn sync_signal(&self) -> &SyncSignal {
        &self.signal
    }

    /// Timing settings.
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Shared online/offline flag.
    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Sum of line quantities.
    pub fn total_quantity(&self) -> u64 {
        self.state.lock().cart.total_quantity()
    }

    /// Sum of quantity × unit price.
    pub fn total_price(&self) -> Money<'static, Currency> {
        self.state.lock().cart.total_price()
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.state.lock().cart.is_empty()
    }

    /// Hydration and synchronization phase.
    pub fn phase(&self) -> SyncPhase {
        self.state.lock().phase
    }

    /// The signed-in customer, once resolved.
    pub fn customer(&self) -> Option<Customer> {
        self.state.lock().customer.clone()
    }

    /// Whether debounced edits are waiting or in flight.
    pub fn has_pending_edits(&self) -> bool {
        self.state.lock().has_pending_edits()
    }

    /// The earliest moment a debounced edit becomes due.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        let state = self.state.lock();

        match (state.updates.next_deadline(), state.removals.next_deadline()) {
            (Some(update), Some(removal)) => Some(update.min(removal)),
            (update, removal) => update.or(removal),
        }
    }

    /// Wait until a new debounce window opens or an existing one is restarted.
    pub async fn rescheduled(&self) {
        self.rescheduled.notified().await;
    }

    /// The checkout URL, once any running synchronization and pending edits have settled.
    ///
    /// Waiting on synchronization is bounded by the sync timeout.
    pub async fn checkout_url(&self) -> Option<String> {
        self.signal.wait_idle(self.settings.sync_timeout).await;
        self.flush_all().await;

        self.state.lock().cart.checkout_url().map(str::to_string)
    }

    fn publish(&self) {
        let view = self.state.lock().view();

        self.view.send_replace(view);
    }

    fn notify(&self, notice: CartNotice) {
        if self.notices.send(notice).is_err() {
            debug!("no notice subscribers");
        }
    }

    fn stored_token(&self) -> Option<CustomerAccessToken> {
        self.storage.customer_token().unwrap_or_else(|error| {
            warn!(%error, "failed to read stored customer token");

            None
        })
    }

    fn persist_cart_id(&self, snapshot: &CartSnapshot) {
        if let Err(error) = self.storage.set_cart_id(&snapshot.id) {
            warn!(cart_id = %snapshot.id, %error, "failed to persist cart id");
        }
    }

    fn forget_cart_id(&self) {
        if let Err(error) = self.storage.clear_cart_id() {
            warn!(%error, "failed to clear stored cart id");
        }
    }

    /// Re-write the customer's association, sliding its expiry.
    async fn touch_association(&self) {
        let target = {
            let state = self.state.lock();

            match (state.phase, &state.customer, state.cart.id()) {
                (SyncPhase::Synced, Some(customer), Some(cart_id)) => {
                    Some((customer.id.clone(), cart_id.clone()))
                }
                _ => None,
            }
        };

        let Some((customer_id, cart_id)) = target else {
            return;
        };

        if let Err(error) = self
            .associations
            .set(&customer_id, &cart_id, self.settings.association_ttl)
            .await
        {
            warn!(%customer_id, %cart_id, %error, "failed to refresh cart association");
        }
    }

    /// Current time on the store's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

impl Debug for CartStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CartStore")
            .field("settings", &self.settings)
            .field("state", &*self.state.lock())
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}
