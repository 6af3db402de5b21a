//! Cart line items and immutable cart snapshots.
//!
//! A [`CartSnapshot`] is never edited in place. Each cart operation is a pure
//! function returning the next snapshot (or `None` when nothing changes), so
//! whoever publishes a snapshot and whoever persists it always see the same
//! value.
//!
//! ## Invariants
//!
//! Every snapshot built through this module holds:
//! - at most one line per [`ProductId`]
//! - no line with a quantity of zero

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Price, ProductId};

/// A product as offered to the cart, before it has a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartItem {
    /// Catalog product ID.
    pub id: ProductId,
    /// Display name.
    pub title: String,
    /// Display image reference.
    pub image_url: String,
    /// Unit price.
    pub price: Price,
}

impl NewCartItem {
    /// Turn the payload into a cart line with the given quantity.
    #[must_use]
    pub fn with_quantity(self, quantity: u32) -> CartItem {
        CartItem {
            id: self.id,
            title: self.title,
            image_url: self.image_url,
            price: self.price,
            quantity,
        }
    }
}

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Catalog product ID, unique within a cart.
    pub id: ProductId,
    /// Display name.
    pub title: String,
    /// Display image reference.
    pub image_url: String,
    /// Unit price.
    pub price: Price,
    /// Number of units in the cart.
    pub quantity: u32,
}

impl CartItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price * self.quantity
    }
}

/// An immutable, cheaply cloneable view of the cart at one point in time.
///
/// Serializes as a bare JSON array of [`CartItem`]. Deserializing normalizes
/// the input: duplicate IDs are folded into the first occurrence and
/// zero-quantity lines are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartSnapshot {
    items: Arc<Vec<CartItem>>,
}

impl CartSnapshot {
    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from raw lines, merging duplicate IDs (quantities
    /// summed, first position kept) and dropping zero-quantity lines.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut merged: Vec<CartItem> = Vec::new();
        for item in items {
            if item.quantity == 0 {
                continue;
            }
            match merged.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(item.quantity);
                }
                None => merged.push(item),
            }
        }
        Self {
            items: Arc::new(merged),
        }
    }

    /// The lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a line by product ID.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Whether a line exists for the product ID.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.get(id).is_some()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Add one unit of a product.
    ///
    /// A product already in the cart gets its quantity bumped; a new product is
    /// appended with a quantity of one. This always produces a new snapshot.
    #[must_use]
    pub fn with_added(&self, item: NewCartItem) -> Self {
        if let Some(next) = self.with_incremented(&item.id) {
            return next;
        }
        let mut items = self.items.as_ref().clone();
        items.push(item.with_quantity(1));
        Self {
            items: Arc::new(items),
        }
    }

    /// Add one unit to an existing line. Returns `None` if the product is not
    /// in the cart.
    #[must_use]
    pub fn with_incremented(&self, id: &ProductId) -> Option<Self> {
        let position = self.position(id)?;
        let mut items = self.items.as_ref().clone();
        let line = items.get_mut(position)?;
        line.quantity = line.quantity.saturating_add(1);
        Some(Self {
            items: Arc::new(items),
        })
    }

    /// Remove one unit from an existing line, dropping the line when it
    /// reaches zero. Returns `None` if the product is not in the cart.
    #[must_use]
    pub fn with_decremented(&self, id: &ProductId) -> Option<Self> {
        let position = self.position(id)?;
        let mut items = self.items.as_ref().clone();
        let line = items.get_mut(position)?;
        line.quantity = line.quantity.saturating_sub(1);
        if line.quantity == 0 {
            items.remove(position);
        }
        Some(Self {
            items: Arc::new(items),
        })
    }

    /// Fold another snapshot's lines into this one.
    ///
    /// Lines whose product is already present add their quantity to it; new
    /// products are appended after the existing lines in their original order.
    #[must_use]
    pub fn merged_with(&self, other: &Self) -> Self {
        Self::from_items(self.items.iter().chain(other.items.iter()).cloned())
    }

    fn position(&self, id: &ProductId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }
}

impl From<Vec<CartItem>> for CartSnapshot {
    fn from(items: Vec<CartItem>) -> Self {
        Self::from_items(items)
    }
}

impl Serialize for CartSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CartSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<CartItem>::deserialize(deserializer).map(Self::from_items)
    }
}
