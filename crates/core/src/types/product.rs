//! Catalog product types.

use core::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Price, ProductId};

/// Product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Popcorn bags.
    Pochoclos,
    /// Drinks (juice boxes, soda cups).
    Bebida,
}

impl Category {
    /// The stored/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pochoclos => "POCHOCLOS",
            Self::Bebida => "BEBIDA",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a category string is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown category: {0}")]
pub struct CategoryParseError(pub String);

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "POCHOCLOS" => Ok(Self::Pochoclos),
            "BEBIDA" => Ok(Self::Bebida),
            _ => Err(CategoryParseError(s.to_owned())),
        }
    }
}

/// A catalog product with its live stock count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Document key.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Top-level category.
    pub category: Category,
    /// Free-text subcategory (flavour, brand).
    #[serde(rename = "type")]
    pub product_type: String,
    /// Unit price.
    pub price: Price,
    /// Units currently available.
    pub stock: u32,
    /// Level that a restock resets `stock` to.
    pub initial_stock: u32,
    /// Optional image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Last time the document was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Whether at least one unit is available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Copy of this product with a different stock count.
    #[must_use]
    pub fn with_stock(&self, stock: u32) -> Self {
        Self {
            stock,
            ..self.clone()
        }
    }
}

/// Input for creating a product from the admin surface.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: Category,
    #[serde(rename = "type")]
    pub product_type: String,
    pub price: Price,
    pub stock: u32,
    /// Defaults to `stock` when omitted.
    #[serde(default)]
    pub initial_stock: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewProduct {
    /// Build the product document under the given key.
    #[must_use]
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name,
            category: self.category,
            product_type: self.product_type,
            price: self.price,
            initial_stock: self.initial_stock.unwrap_or(self.stock),
            stock: self.stock,
            image_url: self.image_url,
            updated_at: Some(now),
        }
    }
}

/// Partial update of a product; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category: Option<Category>,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub price: Option<Price>,
    pub stock: Option<u32>,
    pub initial_stock: Option<u32>,
    /// `Some(None)` clears the image; absent leaves it.
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
}

impl ProductUpdate {
    /// Apply the update on top of an existing product.
    pub fn apply_to(self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(product_type) = self.product_type {
            product.product_type = product_type;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(initial_stock) = self.initial_stock {
            product.initial_stock = initial_stock;
        }
        if let Some(image_url) = self.image_url {
            product.image_url = image_url;
        }
        product.updated_at = Some(now);
    }
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    fn sample() -> Product {
        Product {
            id: ProductId::new("4"),
            name: "Pochoclos Dulces".to_string(),
            category: Category::Pochoclos,
            product_type: "Dulces".to_string(),
            price: Price::new(Decimal::from(1500)).unwrap(),
            stock: 0,
            initial_stock: 20,
            image_url: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("bebida".parse::<Category>().unwrap(), Category::Bebida);
        assert_eq!(
            " POCHOCLOS ".parse::<Category>().unwrap(),
            Category::Pochoclos
        );
        assert!("SNACK".parse::<Category>().is_err());
    }

    #[test]
    fn test_in_stock_follows_stock() {
        let product = sample();
        assert!(!product.in_stock());
        assert!(product.with_stock(1).in_stock());
    }

    #[test]
    fn test_product_wire_format() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["type"], "Dulces");
        assert_eq!(value["category"], "POCHOCLOS");
        assert!(value.get("image_url").is_none());
    }

    #[test]
    fn test_update_distinguishes_clear_from_absent() {
        let mut product = sample();
        product.image_url = Some("dulces.png".to_string());

        let keep: ProductUpdate = serde_json::from_value(json!({ "stock": 5 })).unwrap();
        keep.apply_to(&mut product, Utc::now());
        assert_eq!(product.stock, 5);
        assert_eq!(product.image_url.as_deref(), Some("dulces.png"));

        let clear: ProductUpdate = serde_json::from_value(json!({ "image_url": null })).unwrap();
        clear.apply_to(&mut product, Utc::now());
        assert_eq!(product.image_url, None);
    }

    #[test]
    fn test_new_product_defaults_reference_stock() {
        let input: NewProduct = serde_json::from_value(json!({
            "name": "Jugo de Naranja",
            "category": "BEBIDA",
            "type": "Baggio de Caja",
            "price": 600,
            "stock": 12
        }))
        .unwrap();
        let product = input.into_product(ProductId::new("9"), Utc::now());
        assert_eq!(product.initial_stock, 12);
        assert!(product.updated_at.is_some());
    }
}
