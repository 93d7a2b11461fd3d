//! Cart state and derived totals.
//!
//! `CartState` only holds the item list and the active discount code. Subtotal,
//! discount and total are never stored: [`CartState::totals`] derives them from
//! those two inputs every time it is called, so they cannot drift apart.
//!
//! Transitions here are pure. Reconciling stock with the catalog store happens
//! in the storefront's cart engine, which calls these only after the store
//! accepted the change.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::discount::DiscountRules;
use crate::types::{Product, ProductId};

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Same as `product.id`.
    pub id: ProductId,
    /// Product as last seen by this cart. Its `stock` is the count the cart
    /// believes is still available.
    pub product: Product,
    /// Always at least 1.
    pub quantity: u32,
}

impl CartItem {
    /// `price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * self.quantity
    }
}

/// Subtotal, discount and total of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Items in insertion order plus the active discount code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    items: Vec<CartItem>,
    discount_code: Option<String>,
}

impl CartState {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            discount_code: None,
        }
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn discount_code(&self) -> Option<&str> {
        self.discount_code.as_deref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The line for `id`, if present.
    #[must_use]
    pub fn item(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Quantity of `id` in the cart, zero when absent.
    #[must_use]
    pub fn quantity_of(&self, id: &ProductId) -> u32 {
        self.item(id).map_or(0, |item| item.quantity)
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// `Σ price × quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Derive subtotal, discount and total under `rules`.
    #[must_use]
    pub fn totals(&self, rules: &DiscountRules) -> CartTotals {
        let subtotal = self.subtotal();
        let discount = rules.discount_for(subtotal, self.discount_code());
        let total = (subtotal - discount).max(Decimal::ZERO);
        CartTotals {
            subtotal,
            discount,
            total,
        }
    }

    /// Add one unit of `product`.
    ///
    /// An existing line has its quantity incremented and its snapshot replaced
    /// by `product`; otherwise a new line with quantity 1 is appended.
    pub fn add_one(&mut self, product: Product) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == product.id) {
            item.quantity += 1;
            item.product = product;
        } else {
            self.items.push(CartItem {
                id: product.id.clone(),
                product,
                quantity: 1,
            });
        }
    }

    /// Set the quantity and snapshot stock of an existing line.
    ///
    /// A quantity of zero removes the line. Returns `false` when `id` is not
    /// in the cart.
    pub fn set_quantity(&mut self, id: &ProductId, quantity: u32, stock: u32) -> bool {
        if quantity == 0 {
            return self.remove(id).is_some();
        }
        match self.items.iter_mut().find(|item| &item.id == id) {
            Some(item) => {
                item.quantity = quantity;
                item.product.stock = stock;
                true
            }
            None => false,
        }
    }

    /// Remove the line for `id`, returning it.
    pub fn remove(&mut self, id: &ProductId) -> Option<CartItem> {
        let index = self.items.iter().position(|item| &item.id == id)?;
        Some(self.items.remove(index))
    }

    /// Set or clear the active discount code.
    pub fn set_discount_code(&mut self, code: Option<String>) {
        self.discount_code = code;
    }

    /// Drop every line and the discount code.
    pub fn clear(&mut self) {
        self.items.clear();
        self.discount_code = None;
    }

    /// First line whose snapshot stock does not cover its quantity.
    #[must_use]
    pub fn first_short_item(&self) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|item| item.product.stock < item.quantity)
    }
}
