//! Store state
//!
//! Everything behind the store mutex. Methods here are synchronous and never
//! touch a collaborator.

use rustc_hash::FxHashMap;

use crate::{
    cart::{CartError, CartSnapshot, LineRollback, LocalCart},
    debounce::Debouncer,
    ids::{LineId, VariantId},
    session::{Customer, CustomerAccessToken},
    settings::SyncSettings,
    store::{CartView, SyncPhase},
};

#[derive(Debug)]
pub(crate) struct StoreState {
    pub(crate) cart: LocalCart,
    pub(crate) phase: SyncPhase,
    pub(crate) customer: Option<Customer>,

    /// Target quantities per variant; zero removes the line.
    pub(crate) updates: Debouncer<VariantId, u32>,

    /// Line ids captured when the removal was requested.
    pub(crate) removals: Debouncer<VariantId, Option<LineId>>,

    /// Line state before the first unconfirmed debounced edit.
    pub(crate) rollbacks: FxHashMap<VariantId, LineRollback>,

    /// Backend line ids from the last applied snapshot.
    pub(crate) known_lines: FxHashMap<VariantId, LineId>,

    /// Adds awaiting the backend, per variant.
    adding: FxHashMap<VariantId, usize>,

    /// Token that arrived while a synchronization was already running.
    pub(crate) follow_up: Option<CustomerAccessToken>,

    pub(crate) visible: bool,
    pub(crate) refreshing: bool,

    /// Bumped on every local edit; refresh results fetched under an older value are stale.
    pub(crate) generation: u64,

    /// Bumped whenever the active cart is swapped for another one.
    pub(crate) epoch: u64,
}

impl StoreState {
    pub(crate) fn new(settings: &SyncSettings) -> Self {
        Self {
            cart: LocalCart::new(settings.currency),
            phase: SyncPhase::Unhydrated,
            customer: None,
            updates: Debouncer::new(settings.update_debounce),
            removals: Debouncer::new(settings.remove_debounce),
            rollbacks: FxHashMap::default(),
            known_lines: FxHashMap::default(),
            adding: FxHashMap::default(),
            follow_up: None,
            visible: true,
            refreshing: false,
            generation: 0,
            epoch: 0,
        }
    }

    pub(crate) fn has_pending_edits(&self) -> bool {
        !self.updates.is_idle() || !self.removals.is_idle()
    }

    pub(crate) fn is_pending(&self, variant: &VariantId) -> bool {
        self.updates.contains(variant) || self.removals.contains(variant)
    }

    pub(crate) fn begin_add(&mut self, variant: &VariantId) {
        *self.adding.entry(variant.clone()).or_default() += 1;
    }

    pub(crate) fn finish_add(&mut self, variant: &VariantId) {
        if let Some(count) = self.adding.get_mut(variant) {
            *count = count.saturating_sub(1);

            if *count == 0 {
                self.adding.remove(variant);
            }
        }
    }

    pub(crate) fn is_adding(&self, variant: &VariantId) -> bool {
        self.adding.contains_key(variant)
    }

    pub(crate) fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Replace the cart with `snapshot`, then re-apply edits the backend has not seen yet.
    pub(crate) fn adopt(&mut self, snapshot: CartSnapshot) -> Result<(), CartError> {
        self.cart.replace_with(snapshot)?;

        self.remember_lines();

        self.overlay();

        Ok(())
    }

    fn remember_lines(&mut self) {
        self.known_lines = self
            .cart
            .lines()
            .iter()
            .filter_map(|line| {
                line.line_id
                    .clone()
                    .map(|line_id| (line.variant_id.clone(), line_id))
            })
            .collect();
    }

    fn overlay(&mut self) {
        for (variant, quantity) in self.updates.intended_values() {
            self.cart.set_quantity(variant, *quantity);
        }

        for (variant, _) in self.removals.intended_values() {
            self.cart.remove(variant);
        }
    }

    /// Restore a whole cart captured before an optimistic change.
    pub(crate) fn restore_cart(&mut self, cart: LocalCart) {
        self.cart = cart;

        self.overlay();
    }

    /// Put a variant's line back the way it was before its debounced edits.
    pub(crate) fn roll_back(&mut self, variant: &VariantId) {
        self.updates.cancel(variant);
        self.removals.cancel(variant);

        if let Some(rollback) = self.rollbacks.remove(variant) {
            self.cart.restore(variant, rollback);
        }
    }

    /// Forget the active cart and every edit made against it.
    pub(crate) fn reset(&mut self) {
        self.cart.clear();
        self.updates.clear();
        self.removals.clear();
        self.rollbacks.clear();
        self.known_lines.clear();
        self.epoch = self.epoch.wrapping_add(1);
        self.touch();
    }

    /// Swap in another cart wholesale, discarding unconfirmed edits to the old one.
    pub(crate) fn switch_to(&mut self, snapshot: CartSnapshot) -> Result<(), CartError> {
        let cart = LocalCart::from_snapshot(snapshot)?;

        self.reset();
        self.cart = cart;
        self.remember_lines();

        Ok(())
    }

    pub(crate) fn view(&self) -> CartView {
        CartView::capture(&self.cart, self.phase, self.has_pending_edits())
    }
}
