//! Cart Lines

use serde::{Deserialize, Serialize};

use crate::ids::{LineId, VariantId};

/// One product variant in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Variant this line holds.
    pub variant_id: VariantId,

    /// Backend line id; absent until the line is first persisted.
    pub line_id: Option<LineId>,

    /// Units of the variant, always at least one while the line exists.
    pub quantity: u32,

    /// Unit price in minor units of the cart currency.
    pub unit_price: u64,

    /// Product title.
    pub title: String,

    /// Variant title, e.g. "Large / Blue".
    pub variant_title: Option<String>,

    /// Product image URL.
    pub image_url: Option<String>,

    /// Whether the variant can currently be purchased.
    pub available: bool,

    /// Maximum purchasable quantity, when the backend tracks inventory.
    pub quantity_available: Option<u32>,
}

impl CartLine {
    /// Price of the whole line in minor units.
    pub fn line_total(&self) -> u64 {
        self.unit_price.saturating_mul(u64::from(self.quantity))
    }

    /// Clamp a requested quantity to the purchasable maximum.
    pub fn clamp_quantity(&self, requested: u32) -> u32 {
        match self.quantity_available {
            Some(max) => requested.min(max),
            None => requested,
        }
    }
}

/// An add-to-cart request, carrying enough display data for an optimistic line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartLine {
    /// Variant to add.
    pub variant_id: VariantId,

    /// Units to add.
    pub quantity: u32,

    /// Unit price in minor units.
    pub unit_price: u64,

    /// Product title.
    pub title: String,

    /// Variant title.
    pub variant_title: Option<String>,

    /// Product image URL.
    pub image_url: Option<String>,

    /// Whether the variant can currently be purchased.
    pub available: bool,

    /// Maximum purchasable quantity.
    pub quantity_available: Option<u32>,
}

impl NewCartLine {
    /// An available variant with no inventory limit.
    pub fn new(variant_id: impl Into<VariantId>, quantity: u32, unit_price: u64) -> Self {
        Self {
            variant_id: variant_id.into(),
            quantity,
            unit_price,
            title: String::new(),
            variant_title: None,
            image_url: None,
            available: true,
            quantity_available: None,
        }
    }

    /// Set the product title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the maximum purchasable quantity.
    #[must_use]
    pub fn with_quantity_available(mut self, quantity_available: u32) -> Self {
        self.quantity_available = Some(quantity_available);
        self
    }

    /// Mark the variant as unavailable.
    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// The backend input for this request.
    pub fn input(&self) -> LineInput {
        LineInput {
            variant_id: self.variant_id.clone(),
            quantity: self.quantity,
        }
    }
}

impl From<NewCartLine> for CartLine {
    fn from(line: NewCartLine) -> Self {
        Self {
            variant_id: line.variant_id,
            line_id: None,
            quantity: line.quantity,
            unit_price: line.unit_price,
            title: line.title,
            variant_title: line.variant_title,
            image_url: line.image_url,
            available: line.available,
            quantity_available: line.quantity_available,
        }
    }
}

/// Backend input for creating or adding a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    /// Variant to add.
    pub variant_id: VariantId,

    /// Units to add.
    pub quantity: u32,
}

/// Backend input for changing the quantity of an existing line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineUpdate {
    /// Line to change.
    pub line_id: LineId,

    /// New quantity.
    pub quantity: u32,
}
