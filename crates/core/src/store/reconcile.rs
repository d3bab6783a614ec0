//! Reconciliation
//!
//! Hydration from client storage, customer synchronization and background
//! refresh. Every network step here logs and swallows its own failure: the
//! worst outcome is keeping the last cart that was successfully established.

use tracing::{Span, debug, info, warn};

use crate::{
    cart::CartSnapshot,
    ids::CartId,
    session::{Customer, CustomerAccessToken, SessionEvent, Visibility},
    store::{CartStore, RefreshOutcome, RefreshSkip, SyncPhase, SyncResolution},
};

enum Associated {
    Adopt(CartSnapshot),
    Attach,
    Failed,
}

impl CartStore {
    /// Hydrate from client storage.
    ///
    /// Loads the stored cart, or creates a new one when it is missing or
    /// gone, then synchronizes if a customer token is stored.
    #[tracing::instrument(name = "cart.store.mount", skip_all, fields(cart_id = tracing::field::Empty))]
    pub async fn mount(&self) -> SyncPhase {
        let stored = self.storage.cart_id().unwrap_or_else(|error| {
            warn!(%error, "failed to read stored cart id");

            None
        });

        let loaded = match stored {
            Some(cart_id) => {
                Span::current().record("cart_id", tracing::field::display(&cart_id));

                self.load(&cart_id).await
            }
            None => false,
        };

        if !loaded {
            self.state.lock().phase = SyncPhase::NoCart;
            self.publish();

            self.create_cart().await;
        }

        if let Some(token) = self.stored_token() {
            self.synchronize(&token).await;
        }

        let phase = self.phase();

        info!(?phase, "cart mounted");

        phase
    }

    async fn load(&self, cart_id: &CartId) -> bool {
        let snapshot = match self.backend.fetch(cart_id).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                info!(%cart_id, "stored cart no longer exists");

                self.forget_cart_id();

                return false;
            }
            Err(error) => {
                warn!(%cart_id, %error, "failed to load stored cart");

                self.forget_cart_id();

                return false;
            }
        };

        let loaded = {
            let mut state = self.state.lock();

            match state.switch_to(snapshot) {
                Ok(()) => {
                    state.phase = SyncPhase::Unsynced;

                    true
                }
                Err(error) => {
                    warn!(%cart_id, %error, "stored cart is unusable");

                    false
                }
            }
        };

        if !loaded {
            self.forget_cart_id();
        }

        self.publish();

        loaded
    }

    /// Create an empty backend cart and make it the active one.
    async fn create_cart(&self) -> bool {
        let snapshot = match self.backend.create(Vec::new()).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%error, "failed to create cart");

                return false;
            }
        };

        let created = {
            let mut state = self.state.lock();

            match state.switch_to(snapshot.clone()) {
                Ok(()) => {
                    state.phase = SyncPhase::Unsynced;

                    true
                }
                Err(error) => {
                    warn!(cart_id = %snapshot.id, %error, "created cart is unusable");

                    false
                }
            }
        };

        if created {
            self.persist_cart_id(&snapshot);

            info!(cart_id = %snapshot.id, "created cart");
        }

        self.publish();

        created
    }

    /// Reconcile the active cart with the customer owning `token`.
    ///
    /// The customer's associated cart wins over the local one. Completion is
    /// always signalled, whatever the outcome. A different token passed while
    /// a run is in progress is reconciled by that run before it completes.
    #[tracing::instrument(
        name = "cart.store.synchronize",
        skip_all,
        fields(customer_id = tracing::field::Empty, resolution = tracing::field::Empty)
    )]
    pub async fn synchronize(&self, token: &CustomerAccessToken) -> SyncResolution {
        let Some(mut run) = self.signal.begin() else {
            debug!("synchronization already running, queueing token");

            self.state.lock().follow_up = Some(token.clone());

            return SyncResolution::InProgress;
        };

        let mut token = token.clone();

        let resolution = loop {
            let resolution = self.reconcile(&token).await;
            let follow_up = self.state.lock().follow_up.take();

            match follow_up {
                Some(next) if next != token => {
                    debug!("customer token changed during synchronization, running again");

                    token = next;
                }
                Some(_) | None => break resolution,
            }
        };

        if matches!(
            resolution,
            SyncResolution::Adopted | SyncResolution::AlreadySynced | SyncResolution::Attached
        ) {
            self.state.lock().phase = SyncPhase::Synced;
        }

        self.publish();

        Span::current().record("resolution", tracing::field::debug(resolution));

        info!(?resolution, "synchronization finished");

        run.resolve(resolution);

        resolution
    }

    async fn reconcile(&self, token: &CustomerAccessToken) -> SyncResolution {
        let customer = match self.identity.resolve(token).await {
            Ok(Some(customer)) => customer,
            Ok(None) => {
                info!("access token does not resolve to a customer");

                return SyncResolution::Skipped;
            }
            Err(error) => {
                warn!(%error, "failed to resolve customer");

                return SyncResolution::Failed;
            }
        };

        Span::current().record("customer_id", tracing::field::display(&customer.id));

        let local = {
            let mut state = self.state.lock();

            state.customer = Some(customer.clone());
            state.cart.id().cloned()
        };

        let associated = match self.associations.get(&customer.id).await {
            Ok(associated) => associated,
            Err(error) => {
                warn!(customer_id = %customer.id, %error, "failed to read cart association");

                return SyncResolution::Failed;
            }
        };

        match associated {
            Some(associated) if Some(&associated) == local.as_ref() => {
                debug!(cart_id = %associated, "local cart is the associated cart");

                SyncResolution::AlreadySynced
            }
            Some(associated) => match self.inspect_associated(&customer, &associated).await {
                Associated::Adopt(snapshot) => self.adopt_associated(snapshot),
                Associated::Attach => self.attach(&customer, local.as_ref(), token).await,
                Associated::Failed => SyncResolution::Failed,
            },
            None => self.attach(&customer, local.as_ref(), token).await,
        }
    }

    async fn inspect_associated(&self, customer: &Customer, associated: &CartId) -> Associated {
        match self.backend.fetch(associated).await {
            Ok(Some(snapshot)) if !snapshot.is_empty() => Associated::Adopt(snapshot),
            Ok(found) => {
                info!(
                    cart_id = %associated,
                    found = found.is_some(),
                    "associated cart is empty or gone, dropping association"
                );

                if let Err(error) = self.associations.delete(&customer.id).await {
                    warn!(customer_id = %customer.id, %error, "failed to delete cart association");
                }

                Associated::Attach
            }
            Err(error) => {
                warn!(cart_id = %associated, %error, "failed to fetch associated cart");

                Associated::Failed
            }
        }
    }

    fn adopt_associated(&self, snapshot: CartSnapshot) -> SyncResolution {
        let cart_id = snapshot.id.clone();

        let discarded = {
            let mut state = self.state.lock();
            let discarded = state.cart.id().cloned();

            if let Err(error) = state.switch_to(snapshot.clone()) {
                warn!(%cart_id, %error, "associated cart is unusable");

                return SyncResolution::Failed;
            }

            discarded
        };

        self.persist_cart_id(&snapshot);

        info!(
            %cart_id,
            discarded = ?discarded,
            "adopted customer's associated cart"
        );

        SyncResolution::Adopted
    }

    async fn attach(
        &self,
        customer: &Customer,
        local: Option<&CartId>,
        token: &CustomerAccessToken,
    ) -> SyncResolution {
        let Some(cart_id) = local else {
            debug!("no local cart to attach");

            return SyncResolution::Failed;
        };

        if let Err(error) = self.backend.update_buyer_identity(cart_id, token).await {
            warn!(%cart_id, %error, "failed to attach cart to customer");

            return SyncResolution::Failed;
        }

        if let Err(error) = self
            .associations
            .set(&customer.id, cart_id, self.settings.association_ttl)
            .await
        {
            warn!(customer_id = %customer.id, %cart_id, %error, "failed to write cart association");
        }

        SyncResolution::Attached
    }

    /// Refetch the active cart to pick up changes made elsewhere.
    ///
    /// Skipped while hidden, offline, synchronizing, already refreshing, or
    /// while local edits are unconfirmed.
    #[tracing::instrument(name = "cart.store.refresh", skip_all, fields(cart_id = tracing::field::Empty))]
    pub async fn refresh(&self) -> RefreshOutcome {
        let (cart_id, generation) = {
            let mut state = self.state.lock();

            let skip = if !self.connectivity.is_online() {
                Some(RefreshSkip::Offline)
            } else if !state.visible {
                Some(RefreshSkip::Hidden)
            } else if state.refreshing {
                Some(RefreshSkip::InFlight)
            } else if self.signal.is_running() {
                Some(RefreshSkip::Synchronizing)
            } else if state.has_pending_edits() {
                Some(RefreshSkip::EditsPending)
            } else {
                None
            };

            if let Some(skip) = skip {
                return RefreshOutcome::Skipped(skip);
            }

            let Some(cart_id) = state.cart.id().cloned() else {
                return RefreshOutcome::Skipped(RefreshSkip::NoCart);
            };

            state.refreshing = true;

            (cart_id, state.generation)
        };

        Span::current().record("cart_id", tracing::field::display(&cart_id));

        let result = self.backend.fetch(&cart_id).await;

        let outcome = {
            let mut state = self.state.lock();

            state.refreshing = false;

            match result {
                Ok(Some(_)) if state.generation != generation || state.has_pending_edits() => {
                    RefreshOutcome::Stale
                }
                Ok(Some(snapshot)) => match state.adopt(snapshot) {
                    Ok(()) => RefreshOutcome::Refreshed,
                    Err(error) => {
                        warn!(%error, "refreshed cart is unusable");

                        RefreshOutcome::Failed
                    }
                },
                Ok(None) => RefreshOutcome::Recreated,
                Err(error) => {
                    warn!(%error, "failed to refresh cart");

                    RefreshOutcome::Failed
                }
            }
        };

        if outcome == RefreshOutcome::Recreated {
            info!("active cart no longer exists, starting a new one");

            self.replace_cart().await;
        } else {
            self.publish();
        }

        debug!(?outcome, "refresh finished");

        outcome
    }

    /// Drop the active cart and start a fresh one, re-synchronizing a signed-in customer.
    async fn replace_cart(&self) {
        self.forget_cart_id();

        {
            let mut state = self.state.lock();

            state.reset();
            state.phase = SyncPhase::NoCart;
        }

        self.publish();

        if self.create_cart().await
            && let Some(token) = self.stored_token()
        {
            self.synchronize(&token).await;
        }
    }

    /// The active cart was checked out: forget it and its association.
    #[tracing::instrument(name = "cart.store.complete_order", skip_all)]
    pub async fn complete_order(&self) {
        let customer = self.state.lock().customer.clone();

        if let Some(customer) = customer
            && let Err(error) = self.associations.delete(&customer.id).await
        {
            warn!(customer_id = %customer.id, %error, "failed to delete cart association");
        }

        info!("order completed, starting a new cart");

        self.replace_cart().await;
    }

    /// Sign out, keeping the cart.
    pub fn logout(&self) {
        if let Err(error) = self.storage.clear_customer_token() {
            warn!(%error, "failed to clear customer token");
        }

        {
            let mut state = self.state.lock();

            state.customer = None;
            state.follow_up = None;

            if state.phase == SyncPhase::Synced {
                state.phase = SyncPhase::Unsynced;
            }
        }

        info!("customer signed out");

        self.publish();
    }

    /// React to a session or environment event.
    pub async fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::LoginCompleted { token, customer } => {
                debug!(customer_id = %customer.id, "login completed");

                self.store_token(&token);
                self.state.lock().customer = Some(customer);
                self.synchronize(&token).await;
            }
            SessionEvent::TokenUpdated(token) => {
                self.store_token(&token);
                self.synchronize(&token).await;
            }
            SessionEvent::Logout => self.logout(),
            SessionEvent::FocusGained => {
                if self.phase() == SyncPhase::Unsynced
                    && let Some(token) = self.stored_token()
                {
                    self.synchronize(&token).await;

                    return;
                }

                self.refresh().await;
            }
            SessionEvent::VisibilityChanged(visibility) => {
                let visible = visibility == Visibility::Visible;

                self.state.lock().visible = visible;

                if visible {
                    self.refresh().await;
                }
            }
            SessionEvent::Online => {
                self.connectivity.set_online(true);
                self.flush_due().await;
                self.refresh().await;
            }
            SessionEvent::Offline => self.connectivity.set_online(false),
            SessionEvent::OrderCompleted => self.complete_order().await,
        }
    }

    fn store_token(&self, token: &CustomerAccessToken) {
        if let Err(error) = self.storage.set_customer_token(token) {
            warn!(%error, "failed to store customer token");
        }
    }
}
