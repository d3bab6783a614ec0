//! Local Cart
//!
//! The client's believed view of the cart. Every mutation here is purely
//! local; confirming it against the backend is the job of
//! [`CartStore`](crate::store::CartStore).

use rusty_money::{Findable, Money, iso::Currency};

use crate::{
    cart::{errors::CartError, lines::CartLine, lines::NewCartLine, snapshot::CartSnapshot},
    ids::{CartId, VariantId},
};

/// Result of a local quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// The line now holds this many units.
    Updated(u32),

    /// The line was removed because the quantity reached zero.
    Removed,

    /// No line for the variant exists.
    Missing,
}

/// A line's position and contents before a debounced edit, used for rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRollback {
    index: usize,
    line: Option<CartLine>,
}

/// The client's believed view of the cart.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalCart {
    id: Option<CartId>,
    lines: Vec<CartLine>,
    checkout_url: Option<String>,
    currency: &'static Currency,
}

impl LocalCart {
    /// An empty cart with no backend identity yet.
    #[must_use]
    pub fn new(currency: &'static Currency) -> Self {
        Self {
            id: None,
            lines: Vec::new(),
            checkout_url: None,
            currency,
        }
    }

    /// Build a cart from a backend snapshot.
    ///
    /// # Errors
    ///
    /// Returns a `CartError` if the snapshot currency is unknown or a line is empty.
    pub fn from_snapshot(snapshot: CartSnapshot) -> Result<Self, CartError> {
        let currency = Currency::find(&snapshot.currency)
            .ok_or_else(|| CartError::UnknownCurrency(snapshot.currency.clone()))?;

        if let Some(line) = snapshot.lines.iter().find(|line| line.quantity == 0) {
            return Err(CartError::EmptyLine(line.variant_id.to_string()));
        }

        Ok(Self {
            id: Some(snapshot.id),
            lines: snapshot.lines,
            checkout_url: snapshot.checkout_url,
            currency,
        })
    }

    /// Replace the whole cart with a backend snapshot.
    ///
    /// Local state is left untouched when the snapshot is rejected.
    ///
    /// # Errors
    ///
    /// Returns a `CartError` if the snapshot cannot be adopted.
    pub fn replace_with(&mut self, snapshot: CartSnapshot) -> Result<(), CartError> {
        *self = Self::from_snapshot(snapshot)?;

        Ok(())
    }

    /// Forget the backend cart and all lines.
    pub fn clear(&mut self) {
        self.id = None;
        self.lines.clear();
        self.checkout_url = None;
    }

    /// Add units of a variant, merging into an existing line when present.
    ///
    /// Returns the resulting quantity of the variant's line. An existing line
    /// never shrinks here: when the purchasable maximum leaves no room, it is
    /// kept as it is.
    pub fn add(&mut self, new_line: NewCartLine) -> u32 {
        if let Some(line) = self.line_mut(&new_line.variant_id) {
            if new_line.quantity_available.is_some() {
                line.quantity_available = new_line.quantity_available;
            }

            let merged = line.clamp_quantity(line.quantity.saturating_add(new_line.quantity));

            line.quantity = line.quantity.max(merged);

            return line.quantity;
        }

        let mut line = CartLine::from(new_line);

        line.quantity = line.clamp_quantity(line.quantity);

        let quantity = line.quantity;

        if quantity > 0 {
            self.lines.push(line);
        }

        quantity
    }

    /// Set a variant's quantity, removing the line when it clamps to zero.
    pub fn set_quantity(&mut self, variant: &VariantId, quantity: u32) -> QuantityChange {
        let Some(index) = self.position(variant) else {
            return QuantityChange::Missing;
        };

        let clamped = match self.lines.get(index) {
            Some(line) => line.clamp_quantity(quantity),
            None => return QuantityChange::Missing,
        };

        if clamped == 0 {
            self.lines.remove(index);

            return QuantityChange::Removed;
        }

        match self.lines.get_mut(index) {
            Some(line) => {
                line.quantity = clamped;

                QuantityChange::Updated(clamped)
            }
            None => QuantityChange::Missing,
        }
    }

    /// Remove a variant's line.
    pub fn remove(&mut self, variant: &VariantId) -> Option<CartLine> {
        self.position(variant).map(|index| self.lines.remove(index))
    }

    /// Capture a variant's line so it can be restored later.
    pub fn rollback_point(&self, variant: &VariantId) -> LineRollback {
        match self.position(variant) {
            Some(index) => LineRollback {
                index,
                line: self.lines.get(index).cloned(),
            },
            None => LineRollback {
                index: self.lines.len(),
                line: None,
            },
        }
    }

    /// Put a variant's line back the way it was at `rollback`.
    pub fn restore(&mut self, variant: &VariantId, rollback: LineRollback) {
        self.remove(variant);

        if let Some(line) = rollback.line {
            let index = rollback.index.min(self.lines.len());

            self.lines.insert(index, line);
        }
    }

    /// The line for a variant.
    pub fn line(&self, variant: &VariantId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.variant_id == variant)
    }

    pub(crate) fn line_mut(&mut self, variant: &VariantId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|line| &line.variant_id == variant)
    }

    fn position(&self, variant: &VariantId) -> Option<usize> {
        self.lines.iter().position(|line| &line.variant_id == variant)
    }

    /// Ordered lines.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Backend cart id, if one has been established.
    pub fn id(&self) -> Option<&CartId> {
        self.id.as_ref()
    }

    /// Checkout URL from the last snapshot.
    pub fn checkout_url(&self) -> Option<&str> {
        self.checkout_url.as_deref()
    }

    /// Currency of every price in the cart.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Sum of line quantities.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Sum of quantity × unit price.
    pub fn total_price(&self) -> Money<'static, Currency> {
        let total = self
            .lines
            .iter()
            .fold(0_u64, |total, line| total.saturating_add(line.line_total()));

        Money::from_minor(i64::try_from(total).unwrap_or(i64::MAX), self.currency)
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso;
    use testresult::TestResult;

    use crate::ids::LineId;

    use super::*;

    fn snapshot() -> CartSnapshot {
        let mut line = CartLine::from(NewCartLine::new("v1", 2, 5_00));
        line.line_id = Some(LineId::new("line-1"));

        CartSnapshot {
            id: CartId::new("cart-1"),
            lines: vec![line],
            checkout_url: Some("https://shop.test/checkout/cart-1".to_string()),
            currency: "GBP".to_string(),
        }
    }

    #[test]
    fn add_then_zero_quantity_empties_cart() {
        let mut cart = LocalCart::new(iso::USD);

        cart.add(NewCartLine::new("V1", 2, 10_00));

        assert_eq!(cart.total_price(), Money::from_minor(20_00, iso::USD));
        assert_eq!(cart.total_quantity(), 2);

        assert_eq!(cart.set_quantity(&VariantId::new("V1"), 0), QuantityChange::Removed);
        assert!(cart.is_empty());
    }

    #[test]
    fn add_merges_by_variant() {
        let mut cart = LocalCart::new(iso::USD);

        cart.add(NewCartLine::new("v1", 1, 100));
        cart.add(NewCartLine::new("v2", 1, 200));
        let quantity = cart.add(NewCartLine::new("v1", 2, 100));

        assert_eq!(quantity, 3);
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.total_price(), Money::from_minor(500, iso::USD));
    }

    #[test]
    fn add_clamps_to_quantity_available() {
        let mut cart = LocalCart::new(iso::USD);

        cart.add(NewCartLine::new("v1", 2, 100).with_quantity_available(3));
        let quantity = cart.add(NewCartLine::new("v1", 5, 100));

        assert_eq!(quantity, 3);
    }

    #[test]
    fn add_with_no_room_left_keeps_the_line() {
        let mut cart = LocalCart::new(iso::USD);

        cart.add(NewCartLine::new("v1", 2, 100));
        let quantity = cart.add(NewCartLine::new("v1", 1, 100).with_quantity_available(0));

        assert_eq!(quantity, 2);
        assert_eq!(cart.total_quantity(), 2);
        assert!(cart.lines().iter().all(|line| line.quantity > 0));
    }

    #[test]
    fn set_quantity_of_sold_out_line_removes_it() -> TestResult {
        let mut sold_out = snapshot();

        if let Some(line) = sold_out.lines.first_mut() {
            line.quantity_available = Some(0);
        }

        let mut cart = LocalCart::from_snapshot(sold_out)?;

        assert_eq!(cart.set_quantity(&VariantId::new("v1"), 3), QuantityChange::Removed);
        assert!(cart.is_empty());

        Ok(())
    }

    #[test]
    fn set_quantity_on_missing_variant() {
        let mut cart = LocalCart::new(iso::USD);

        assert_eq!(
            cart.set_quantity(&VariantId::new("nope"), 3),
            QuantityChange::Missing
        );
    }

    #[test]
    fn restore_puts_line_back_in_place() {
        let mut cart = LocalCart::new(iso::USD);

        cart.add(NewCartLine::new("v1", 1, 100));
        cart.add(NewCartLine::new("v2", 1, 100));
        cart.add(NewCartLine::new("v3", 1, 100));

        let variant = VariantId::new("v2");
        let before = cart.clone();
        let rollback = cart.rollback_point(&variant);

        cart.remove(&variant);
        cart.restore(&variant, rollback);

        assert_eq!(cart, before);
    }

    #[test]
    fn restore_of_absent_line_removes_it() {
        let mut cart = LocalCart::new(iso::USD);
        let variant = VariantId::new("v1");
        let rollback = cart.rollback_point(&variant);

        cart.add(NewCartLine::new("v1", 1, 100));
        cart.restore(&variant, rollback);

        assert!(cart.is_empty());
    }

    #[test]
    fn replace_with_adopts_snapshot() -> TestResult {
        let mut cart = LocalCart::new(iso::USD);

        cart.add(NewCartLine::new("other", 1, 100));
        cart.replace_with(snapshot())?;

        assert_eq!(cart.id(), Some(&CartId::new("cart-1")));
        assert_eq!(cart.currency(), iso::GBP);
        assert_eq!(cart.total_price(), Money::from_minor(10_00, iso::GBP));
        assert!(cart.line(&VariantId::new("other")).is_none());

        Ok(())
    }

    #[test]
    fn replace_with_rejects_unknown_currency() {
        let mut cart = LocalCart::new(iso::USD);
        let mut bad = snapshot();
        bad.currency = "XXX-NOT-REAL".to_string();

        let result = cart.replace_with(bad);

        assert!(
            matches!(result, Err(CartError::UnknownCurrency(_))),
            "expected UnknownCurrency, got {result:?}"
        );
        assert!(cart.id().is_none());
    }
}
