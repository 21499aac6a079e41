use serde::{Deserialize, Serialize};

use crate::domain::catalog::{format_minor_units, VariantId};

/// One line of the shopping cart. Created only by extractor validation
/// against a live catalog snapshot; the variant id must still resolve at
/// confirmation time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub display_name: String,
    pub catalog_variant_id: VariantId,
    pub unit_price_minor_units: i64,
}

pub fn cart_total_minor_units(cart: &[CartEntry]) -> i64 {
    cart.iter().map(|entry| entry.unit_price_minor_units).sum()
}

/// Render the cart contents in insertion order with a total line.
pub fn render_cart(cart: &[CartEntry]) -> String {
    let mut lines = vec!["Your current order:".to_string()];
    for (index, entry) in cart.iter().enumerate() {
        lines.push(format!(
            "  {}. {} - {}",
            index + 1,
            entry.display_name,
            format_minor_units(entry.unit_price_minor_units)
        ));
    }
    lines.push(format!("Total: {}", format_minor_units(cart_total_minor_units(cart))));
    lines.join("\n")
}
