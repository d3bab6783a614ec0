//! In-memory cart backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::{
    backend::{CartBackend, CartBackendError},
    cart::{CartLine, CartSnapshot, LineInput, LineUpdate, NewCartLine},
    ids::{CartId, LineId, VariantId},
    session::CustomerAccessToken,
};

/// A backend operation, for call logs and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOperation {
    /// [`CartBackend::create`].
    Create,

    /// [`CartBackend::fetch`].
    Fetch,

    /// [`CartBackend::add_lines`].
    AddLines,

    /// [`CartBackend::update_lines`].
    UpdateLines,

    /// [`CartBackend::remove_lines`].
    RemoveLines,

    /// [`CartBackend::update_buyer_identity`].
    UpdateBuyerIdentity,
}

#[derive(Debug, Default)]
struct Carts {
    catalog: FxHashMap<VariantId, NewCartLine>,
    carts: FxHashMap<CartId, CartSnapshot>,
    buyers: FxHashMap<CartId, String>,
    failures: Vec<(BackendOperation, CartBackendError)>,
    calls: Vec<BackendOperation>,
    next_id: u64,
}

impl Carts {
    fn record(&mut self, operation: BackendOperation) -> Result<(), CartBackendError> {
        self.calls.push(operation);

        match self.failures.iter().position(|(failing, _)| *failing == operation) {
            Some(index) => Err(self.failures.remove(index).1),
            None => Ok(()),
        }
    }

    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;

        format!("gid://trolley/{prefix}/{}", self.next_id)
    }

    fn cart_mut(&mut self, cart: &CartId) -> Result<&mut CartSnapshot, CartBackendError> {
        self.carts.get_mut(cart).ok_or(CartBackendError::NotFound)
    }

    fn add(
        &mut self,
        cart: &CartId,
        lines: Vec<LineInput>,
    ) -> Result<CartSnapshot, CartBackendError> {
        let mut priced = Vec::with_capacity(lines.len());

        for input in lines {
            let product = self.catalog.get(&input.variant_id).ok_or_else(|| {
                CartBackendError::Rejected(format!("unknown variant {}", input.variant_id))
            })?;

            if !product.available {
                return Err(CartBackendError::Rejected(format!(
                    "variant {} is sold out",
                    input.variant_id
                )));
            }

            priced.push((product.clone(), input.quantity));
        }

        for (product, quantity) in priced {
            let line_id = LineId::new(self.next("CartLine"));
            let snapshot = self.cart_mut(cart)?;

            match snapshot
                .lines
                .iter_mut()
                .find(|line| line.variant_id == product.variant_id)
            {
                Some(line) => {
                    line.quantity = line.clamp_quantity(line.quantity.saturating_add(quantity));
                }
                None => {
                    let mut line = CartLine::from(product);

                    line.quantity = line.clamp_quantity(quantity);
                    line.line_id = Some(line_id);

                    if line.quantity > 0 {
                        snapshot.lines.push(line);
                    }
                }
            }
        }

        self.carts.get(cart).cloned().ok_or(CartBackendError::NotFound)
    }
}

/// A [`CartBackend`] held in memory, with failure injection and a call log.
#[derive(Debug)]
pub struct InMemoryCartBackend {
    currency: String,
    inner: Mutex<Carts>,
}

impl InMemoryCartBackend {
    /// An empty backend pricing carts in `currency`.
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            inner: Mutex::new(Carts::default()),
        }
    }

    /// Make a variant purchasable.
    #[must_use]
    pub fn with_product(self, product: NewCartLine) -> Self {
        self.stock(product);
        self
    }

    /// Make a variant purchasable, replacing any previous listing.
    pub fn stock(&self, product: NewCartLine) {
        self.inner
            .lock()
            .catalog
            .insert(product.variant_id.clone(), product);
    }

    /// Create a cart directly, bypassing the call log.
    ///
    /// # Errors
    ///
    /// Returns a `CartBackendError` if a line names an unknown or unavailable variant.
    pub fn seed_cart(&self, lines: Vec<LineInput>) -> Result<CartId, CartBackendError> {
        let mut inner = self.inner.lock();
        let id = CartId::new(inner.next("Cart"));

        inner
            .carts
            .insert(id.clone(), self.empty_snapshot(id.clone()));
        inner.add(&id, lines)?;

        Ok(id)
    }

    /// Delete a cart, as if it had expired or been checked out elsewhere.
    pub fn delete_cart(&self, cart: &CartId) {
        let mut inner = self.inner.lock();

        inner.carts.remove(cart);
        inner.buyers.remove(cart);
    }

    /// Fail the next call of `operation` with `error`.
    pub fn fail_next(&self, operation: BackendOperation, error: CartBackendError) {
        self.inner.lock().failures.push((operation, error));
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<BackendOperation> {
        self.inner.lock().calls.clone()
    }

    /// How many times `operation` was called.
    pub fn call_count(&self, operation: BackendOperation) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| **call == operation)
            .count()
    }

    /// The stored state of a cart.
    pub fn cart(&self, cart: &CartId) -> Option<CartSnapshot> {
        self.inner.lock().carts.get(cart).cloned()
    }

    /// The raw token of the customer a cart is attached to.
    pub fn buyer(&self, cart: &CartId) -> Option<String> {
        self.inner.lock().buyers.get(cart).cloned()
    }

    fn empty_snapshot(&self, id: CartId) -> CartSnapshot {
        let mut snapshot = CartSnapshot::empty(id, self.currency.clone());

        snapshot.checkout_url = Some(format!("https://checkout.trolley.test/{}", snapshot.id));

        snapshot
    }
}

#[async_trait]
impl CartBackend for InMemoryCartBackend {
    async fn create(&self, lines: Vec<LineInput>) -> Result<CartSnapshot, CartBackendError> {
        let mut inner = self.inner.lock();

        inner.record(BackendOperation::Create)?;

        let id = CartId::new(inner.next("Cart"));

        inner
            .carts
            .insert(id.clone(), self.empty_snapshot(id.clone()));

        match inner.add(&id, lines) {
            Ok(snapshot) => Ok(snapshot),
            Err(error) => {
                inner.carts.remove(&id);

                Err(error)
            }
        }
    }

    async fn fetch(&self, cart: &CartId) -> Result<Option<CartSnapshot>, CartBackendError> {
        let mut inner = self.inner.lock();

        inner.record(BackendOperation::Fetch)?;

        Ok(inner.carts.get(cart).cloned())
    }

    async fn add_lines(
        &self,
        cart: &CartId,
        lines: Vec<LineInput>,
    ) -> Result<CartSnapshot, CartBackendError> {
        let mut inner = self.inner.lock();

        inner.record(BackendOperation::AddLines)?;
        inner.cart_mut(cart)?;
        inner.add(cart, lines)
    }

    async fn update_lines(
        &self,
        cart: &CartId,
        lines: Vec<LineUpdate>,
    ) -> Result<CartSnapshot, CartBackendError> {
        let mut inner = self.inner.lock();

        inner.record(BackendOperation::UpdateLines)?;

        let snapshot = inner.cart_mut(cart)?;

        for update in lines {
            let line = snapshot
                .lines
                .iter_mut()
                .find(|line| line.line_id.as_ref() == Some(&update.line_id))
                .ok_or_else(|| CartBackendError::Rejected(format!("unknown line {}", update.line_id)))?;

            line.quantity = line.clamp_quantity(update.quantity);
        }

        snapshot.lines.retain(|line| line.quantity > 0);

        Ok(snapshot.clone())
    }

    async fn remove_lines(
        &self,
        cart: &CartId,
        lines: Vec<LineId>,
    ) -> Result<CartSnapshot, CartBackendError> {
        let mut inner = self.inner.lock();

        inner.record(BackendOperation::RemoveLines)?;

        let snapshot = inner.cart_mut(cart)?;

        snapshot
            .lines
            .retain(|line| line.line_id.as_ref().is_none_or(|id| !lines.contains(id)));

        Ok(snapshot.clone())
    }

    async fn update_buyer_identity(
        &self,
        cart: &CartId,
        token: &CustomerAccessToken,
    ) -> Result<(), CartBackendError> {
        let mut inner = self.inner.lock();

        inner.record(BackendOperation::UpdateBuyerIdentity)?;
        inner.cart_mut(cart)?;
        inner
            .buyers
            .insert(cart.clone(), token.expose().to_string());

        Ok(())
    }
}
