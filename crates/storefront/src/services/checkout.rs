//! WhatsApp checkout hand-off.
//!
//! A completed checkout is turned into a plain-text order and a `wa.me` link
//! that opens a chat with the kiosk's number, message pre-filled. Nothing is
//! sent from the server; the shopper's device follows the link.

use std::fmt::Write as _;

use serde::Serialize;
use url::Url;

use am_popcorn_core::types::price::format_amount;

use super::cart::CheckoutReceipt;

const WHATSAPP_BASE_URL: &str = "https://wa.me/";

/// Shown in the message when the shopper did not give a name.
pub const NAME_PLACEHOLDER: &str = "[tu nombre]";

/// Everything the client needs to hand the order over.
#[derive(Debug, Clone, Serialize)]
pub struct WhatsAppHandoff {
    pub message: String,
    pub url: String,
}

/// Compose the order message for `receipt`.
#[must_use]
pub fn compose_message(receipt: &CheckoutReceipt, customer_name: Option<&str>) -> String {
    let mut message = String::from("¡Hola AM Popcorn! Quiero hacer este pedido:\n\n");

    for item in &receipt.items {
        let _ = writeln!(
            message,
            "• {} x {} - {}",
            item.quantity,
            item.product.name,
            format_amount(item.line_total())
        );
    }

    message.push('\n');
    if let Some(code) = &receipt.discount_code {
        let _ = writeln!(
            message,
            "Subtotal: {}",
            format_amount(receipt.totals.subtotal)
        );
        let _ = writeln!(
            message,
            "Descuento ({code}): -{}",
            format_amount(receipt.totals.discount)
        );
    }
    let _ = writeln!(message, "Total: {}", format_amount(receipt.totals.total));

    let name = customer_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(NAME_PLACEHOLDER);
    let _ = write!(message, "\nNombre: {name}");

    message
}

/// `https://wa.me/<number>?text=<message>`.
///
/// # Errors
///
/// Returns `url::ParseError` if `number` cannot form a valid URL path.
pub fn whatsapp_link(number: &str, message: &str) -> Result<Url, url::ParseError> {
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    Url::parse_with_params(&format!("{WHATSAPP_BASE_URL}{digits}"), [("text", message)])
}

/// Message and link for `receipt`.
///
/// # Errors
///
/// Returns `url::ParseError` if the link cannot be built.
pub fn handoff(
    receipt: &CheckoutReceipt,
    number: &str,
    customer_name: Option<&str>,
) -> Result<WhatsAppHandoff, url::ParseError> {
    let message = compose_message(receipt, customer_name);
    let url = whatsapp_link(number, &message)?;
    Ok(WhatsAppHandoff {
        message,
        url: url.into(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use am_popcorn_core::seed::seed_catalog;
    use am_popcorn_core::{CartItem, CartTotals};

    use super::*;

    fn receipt(discount_code: Option<&str>) -> CheckoutReceipt {
        let catalog = seed_catalog();
        let dulces = catalog[3].clone();
        let juice = catalog[4].clone();
        let subtotal = Decimal::from(3600);
        let discount = if discount_code.is_some() {
            Decimal::from(1260)
        } else {
            Decimal::ZERO
        };
        CheckoutReceipt {
            items: vec![
                CartItem {
                    id: dulces.id.clone(),
                    product: dulces,
                    quantity: 2,
                },
                CartItem {
                    id: juice.id.clone(),
                    product: juice,
                    quantity: 1,
                },
            ],
            discount_code: discount_code.map(str::to_owned),
            totals: CartTotals {
                subtotal,
                discount,
                total: subtotal - discount,
            },
        }
    }

    #[test]
    fn test_message_lists_items_and_total() {
        let message = compose_message(&receipt(None), None);
        assert!(message.contains("• 2 x Pochoclos Dulces - $3000.00"));
        assert!(message.contains("• 1 x Jugo de Durazno - $600.00"));
        assert!(message.contains("Total: $3600.00"));
        assert!(!message.contains("Descuento"));
        assert!(message.ends_with("Nombre: [tu nombre]"));
    }

    #[test]
    fn test_message_shows_active_discount() {
        let message = compose_message(&receipt(Some("PRIMERA-COMPRA")), Some(" Sofía "));
        assert!(message.contains("Subtotal: $3600.00"));
        assert!(message.contains("Descuento (PRIMERA-COMPRA): -$1260.00"));
        assert!(message.contains("Total: $2340.00"));
        assert!(message.ends_with("Nombre: Sofía"));
    }

    #[test]
    fn test_link_encodes_message() {
        let url = whatsapp_link("+54 9 11 5555-0000", "Total: $10.00\nNombre: Ana").unwrap();
        assert_eq!(url.host_str(), Some("wa.me"));
        assert_eq!(url.path(), "/5491155550000");
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "text");
        assert_eq!(value, "Total: $10.00\nNombre: Ana");
    }
}
