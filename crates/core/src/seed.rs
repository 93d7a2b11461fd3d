//! The kiosk's initial catalog.
//!
//! Used to populate an empty catalog store and to lazily recreate a seed
//! product that is looked up or written before it exists.

use rust_decimal::Decimal;

use crate::types::{Category, Price, Product, ProductId};

/// Stock every seed product starts with (and restocks to).
pub const DEFAULT_SEED_STOCK: u32 = 20;

const SEED: &[(&str, &str, Category, &str, i64)] = &[
    ("1", "Pochoclos Miti Miti", Category::Pochoclos, "Mitsui Dukes y Salados", 1500),
    ("2", "Vaso De Pritty", Category::Bebida, "Pritty", 150),
    ("3", "Pochoclos Salados", Category::Pochoclos, "Salados", 1500),
    ("4", "Pochoclos Dulces", Category::Pochoclos, "Dulces", 1500),
    ("5", "Jugo de Durazno", Category::Bebida, "Baggio de Caja", 600),
    ("6", "Vaso de Gaseosa", Category::Bebida, "Coca Cola", 150),
    ("7", "Jugo Multifruta", Category::Bebida, "Baggio de Caja", 600),
    ("8", "Jugo de Manzana", Category::Bebida, "Baggio de Caja", 600),
];

/// All seed products, ordered by id.
#[must_use]
pub fn seed_catalog() -> Vec<Product> {
    SEED.iter()
        .map(|&(id, name, category, product_type, price)| Product {
            id: ProductId::new(id),
            name: name.to_owned(),
            category,
            product_type: product_type.to_owned(),
            price: Price::new(Decimal::from(price)).unwrap_or_default(),
            stock: DEFAULT_SEED_STOCK,
            initial_stock: DEFAULT_SEED_STOCK,
            image_url: None,
            updated_at: None,
        })
        .collect()
}

/// The seed entry for `id`, if there is one.
#[must_use]
pub fn seed_product(id: &ProductId) -> Option<Product> {
    seed_catalog().into_iter().find(|product| &product.id == id)
}
