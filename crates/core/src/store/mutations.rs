//! Optimistic cart mutations and their debounced confirmation.

use tracing::{Span, debug, info, warn};

use crate::{
    backend::CartBackendError,
    cart::{CartSnapshot, LineUpdate, NewCartLine, QuantityChange},
    ids::{CartId, LineId, VariantId},
    store::{CartNotice, CartStore, MutationOutcome, RetryAction, SyncPhase, state::StoreState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Update,
    Removal,
}

impl CartStore {
    /// Add units of a variant and confirm with the backend.
    ///
    /// A variant with debounced edits still outstanding is folded into them
    /// instead, so the backend sees one quantity change rather than a racing add.
    #[tracing::instrument(
        name = "cart.store.add_line",
        skip(self, line),
        fields(variant_id = %line.variant_id, quantity = line.quantity, cart_id = tracing::field::Empty)
    )]
    pub async fn add_line(&self, line: NewCartLine) -> MutationOutcome {
        if !self.connectivity.is_online() {
            return MutationOutcome::Offline;
        }

        if !line.available {
            return MutationOutcome::Unavailable;
        }

        if line.quantity == 0 {
            return MutationOutcome::Unchanged;
        }

        let variant = line.variant_id.clone();

        let (cart_id, before, epoch, added) = {
            let mut state = self.state.lock();
            let before = state.cart.clone();
            let rollback = before.rollback_point(&variant);
            let previous = before.line(&variant).map_or(0, |existing| existing.quantity);

            let quantity = state.cart.add(line.clone());
            let added = quantity.saturating_sub(previous);

            if added == 0 {
                debug!(quantity, "nothing left to add");

                return MutationOutcome::Unchanged;
            }

            let revived = state.removals.cancel(&variant).is_some();

            state.touch();

            if revived || state.updates.contains(&variant) {
                state.rollbacks.entry(variant.clone()).or_insert(rollback);
                state.updates.schedule(variant.clone(), quantity, self.now());

                drop(state);

                debug!(revived, quantity, "folded add into pending quantity change");

                self.rescheduled.notify_one();
                self.publish();

                return MutationOutcome::Scheduled;
            }

            state.begin_add(&variant);

            (state.cart.id().cloned(), before, state.epoch, added)
        };

        self.publish();

        if let Some(cart_id) = &cart_id {
            Span::current().record("cart_id", tracing::field::display(cart_id));
        }

        let mut input = line.input();
        input.quantity = added;

        let result = match &cart_id {
            Some(cart_id) => self.backend.add_lines(cart_id, vec![input]).await,
            None => self.backend.create(vec![input]).await,
        };

        match result {
            Ok(snapshot) => {
                let confirmed = self.confirm(snapshot, epoch, cart_id.is_none());

                self.state.lock().finish_add(&variant);

                if confirmed {
                    self.touch_association().await;
                }

                info!("added line");

                MutationOutcome::Confirmed
            }
            Err(error) => {
                warn!(%error, "add to cart failed, rolling back");

                {
                    let mut state = self.state.lock();

                    state.finish_add(&variant);

                    if state.epoch == epoch {
                        state.restore_cart(before);
                        state.touch();
                    }
                }

                self.publish();

                let notice = CartNotice {
                    message: format!("Could not add item to cart: {error}"),
                    retry: RetryAction::AddLine(line),
                };

                self.notify(notice.clone());

                MutationOutcome::RolledBack(notice)
            }
        }
    }

    /// Set a variant's quantity; zero or less removes the line.
    ///
    /// The change is applied at once and sent when the update window closes.
    /// Calls inside the window replace the pending target.
    pub fn update_quantity(&self, variant: &VariantId, quantity: i64) -> MutationOutcome {
        if !self.connectivity.is_online() {
            return MutationOutcome::Offline;
        }

        let requested = u32::try_from(quantity.max(0)).unwrap_or(u32::MAX);

        let scheduled = {
            let mut state = self.state.lock();
            let rollback = state.cart.rollback_point(variant);

            let target = match state.cart.set_quantity(variant, requested) {
                QuantityChange::Updated(quantity) => quantity,
                QuantityChange::Removed => 0,
                QuantityChange::Missing => return MutationOutcome::Unchanged,
            };

            state.rollbacks.entry(variant.clone()).or_insert(rollback);
            state.touch();
            state.updates.schedule(variant.clone(), target, self.now())
        };

        debug!(%variant, requested, ?scheduled, "quantity change scheduled");

        self.rescheduled.notify_one();
        self.publish();

        MutationOutcome::Scheduled
    }

    /// Remove a variant's line.
    ///
    /// The line disappears at once; the backend removal is sent when the
    /// removal window closes, using the line id known now.
    pub fn remove_line(&self, variant: &VariantId) -> MutationOutcome {
        if !self.connectivity.is_online() {
            return MutationOutcome::Offline;
        }

        {
            let mut state = self.state.lock();
            let rollback = state.cart.rollback_point(variant);

            let Some(line) = state.cart.remove(variant) else {
                return MutationOutcome::Unchanged;
            };

            let line_id = line
                .line_id
                .or_else(|| state.known_lines.get(variant).cloned());

            state.rollbacks.entry(variant.clone()).or_insert(rollback);
            state.updates.cancel(variant);
            state.touch();
            state.removals.schedule(variant.clone(), line_id, self.now());
        }

        debug!(%variant, "removal scheduled");

        self.rescheduled.notify_one();
        self.publish();

        MutationOutcome::Scheduled
    }

    /// Replay a rolled back mutation.
    pub async fn retry(&self, action: RetryAction) -> MutationOutcome {
        match action {
            RetryAction::AddLine(line) => self.add_line(line).await,
            RetryAction::UpdateQuantity {
                variant_id,
                quantity,
            } => self.update_quantity(&variant_id, i64::from(quantity)),
            RetryAction::RemoveLine(variant_id) => self.remove_line(&variant_id),
        }
    }

    /// Send every debounced edit whose window has closed. Returns how many
    /// were handed to the backend or dropped as unsendable; updates held back
    /// for an add still in flight are not counted.
    pub async fn flush_due(&self) -> usize {
        let now = self.now();

        self.flush(|state| {
            (
                state.updates.take_due(now),
                state.removals.take_due(now),
            )
        })
        .await
    }

    /// Send every debounced edit now, regardless of its window.
    pub async fn flush_all(&self) -> usize {
        self.flush(|state| (state.updates.take_all(), state.removals.take_all()))
            .await
    }

    async fn flush<F>(&self, take: F) -> usize
    where
        F: FnOnce(
            &mut StoreState,
        ) -> (Vec<(VariantId, u32)>, Vec<(VariantId, Option<LineId>)>),
    {
        let (cart_id, epoch, updates, removals) = {
            let mut state = self.state.lock();
            let (updates, removals) = take(&mut *state);

            (state.cart.id().cloned(), state.epoch, updates, removals)
        };

        let mut sent = removals.len();

        for (variant, quantity) in updates {
            if self
                .send_update(cart_id.as_ref(), epoch, variant, quantity)
                .await
            {
                sent += 1;
            }
        }

        for (variant, line_id) in removals {
            self.send_removal(cart_id.as_ref(), epoch, variant, line_id)
                .await;
        }

        sent
    }

    #[tracing::instrument(
        name = "cart.store.send_update",
        skip_all,
        fields(variant_id = %variant, quantity = quantity)
    )]
    async fn send_update(
        &self,
        cart_id: Option<&CartId>,
        epoch: u64,
        variant: VariantId,
        quantity: u32,
    ) -> bool {
        let (line_id, adding) = {
            let state = self.state.lock();

            (state.known_lines.get(&variant).cloned(), state.is_adding(&variant))
        };

        let (Some(cart_id), Some(line_id)) = (cart_id, line_id) else {
            if adding {
                debug!("line is still being added, holding update back");

                let now = self.now();

                self.state.lock().updates.retry_later(&variant, now);
                self.rescheduled.notify_one();

                return false;
            }

            debug!("line is not known to the backend yet, dropping update");

            self.settle_unsent(Edit::Update, &variant);

            return true;
        };

        let result = if quantity == 0 {
            self.backend.remove_lines(cart_id, vec![line_id]).await
        } else {
            self.backend
                .update_lines(cart_id, vec![LineUpdate { line_id, quantity }])
                .await
        };

        let retry = RetryAction::UpdateQuantity {
            variant_id: variant.clone(),
            quantity,
        };

        self.settle(Edit::Update, variant, epoch, retry, result)
            .await;

        true
    }

    #[tracing::instrument(
        name = "cart.store.send_removal",
        skip_all,
        fields(variant_id = %variant)
    )]
    async fn send_removal(
        &self,
        cart_id: Option<&CartId>,
        epoch: u64,
        variant: VariantId,
        captured: Option<LineId>,
    ) {
        let line_id = captured.or_else(|| self.state.lock().known_lines.get(&variant).cloned());

        let (Some(cart_id), Some(line_id)) = (cart_id, line_id) else {
            debug!("line is not known to the backend yet, dropping removal");

            self.settle_unsent(Edit::Removal, &variant);

            return;
        };

        let result = self.backend.remove_lines(cart_id, vec![line_id]).await;

        self.settle(
            Edit::Removal,
            variant.clone(),
            epoch,
            RetryAction::RemoveLine(variant),
            result,
        )
        .await;
    }

    fn settle_unsent(&self, edit: Edit, variant: &VariantId) {
        let mut state = self.state.lock();

        let queued = match edit {
            Edit::Update => state.updates.complete(variant),
            Edit::Removal => state.removals.complete(variant),
        };

        if !queued && !state.is_pending(variant) {
            state.rollbacks.remove(variant);
        }
    }

    async fn settle(
        &self,
        edit: Edit,
        variant: VariantId,
        epoch: u64,
        retry: RetryAction,
        result: Result<CartSnapshot, CartBackendError>,
    ) {
        {
            let mut state = self.state.lock();

            if state.epoch != epoch {
                debug!("active cart changed while the edit was in flight");

                return;
            }

            match edit {
                Edit::Update => state.updates.complete(&variant),
                Edit::Removal => state.removals.complete(&variant),
            };
        }

        match result {
            Ok(snapshot) => {
                {
                    let mut state = self.state.lock();

                    if !state.is_pending(&variant) {
                        state.rollbacks.remove(&variant);
                    }
                }

                if self.confirm(snapshot, epoch, false) {
                    self.touch_association().await;
                }

                debug!(?edit, "edit confirmed");
            }
            Err(error) => {
                warn!(?edit, %error, "debounced edit failed, rolling back");

                {
                    let mut state = self.state.lock();

                    state.roll_back(&variant);
                    state.touch();
                }

                self.publish();

                self.notify(CartNotice {
                    message: format!("Could not update cart: {error}"),
                    retry,
                });
            }
        }
    }

    /// Apply an authoritative snapshot returned by a mutation.
    ///
    /// Returns `false` when the snapshot no longer belongs to the active cart.
    fn confirm(&self, snapshot: CartSnapshot, epoch: u64, created: bool) -> bool {
        let applied = {
            let mut state = self.state.lock();

            let current = state.cart.id().is_none_or(|id| *id == snapshot.id);

            if state.epoch != epoch || !current {
                debug!(cart_id = %snapshot.id, "discarding snapshot for an inactive cart");

                false
            } else {
                if created {
                    self.persist_cart_id(&snapshot);
                }

                match state.adopt(snapshot) {
                    Ok(()) => {
                        if state.phase == SyncPhase::NoCart || state.phase == SyncPhase::Unhydrated
                        {
                            state.phase = SyncPhase::Unsynced;
                        }

                        state.touch();

                        true
                    }
                    Err(error) => {
                        warn!(%error, "backend returned an unusable snapshot");

                        false
                    }
                }
            }
        };

        self.publish();

        applied
    }
}
