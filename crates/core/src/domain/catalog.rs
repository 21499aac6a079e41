use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantId(pub String);

/// A purchasable SKU under a catalog item (size, flavor, preparation).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogVariant {
    pub id: VariantId,
    pub name: String,
    pub price_minor_units: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub variants: Vec<CatalogVariant>,
}

/// Display composite for a variant, e.g. `Matcha - Honey Oat`.
pub fn variant_display_name(item: &CatalogItem, variant: &CatalogVariant) -> String {
    format!("{} - {}", item.name, variant.name)
}

/// Render minor units as a currency string, e.g. 1550 -> `$15.50`.
/// Money stays integral end to end; formatting is the only place the
/// decimal point appears.
pub fn format_minor_units(minor_units: i64) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let absolute = minor_units.unsigned_abs();
    format!("{sign}${}.{:02}", absolute / 100, absolute % 100)
}

/// Format the menu for display: one numbered line per variant, numbering
/// continuous across items.
pub fn render_menu(items: &[CatalogItem]) -> String {
    let mut lines = vec!["Here's our menu:".to_string()];
    let mut number = 0usize;
    for item in items {
        for variant in &item.variants {
            number += 1;
            lines.push(format!(
                "  {number}. {}: {}",
                variant_display_name(item, variant),
                format_minor_units(variant.price_minor_units)
            ));
        }
    }
    if number == 0 {
        lines.push("  (nothing available right now)".to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{format_minor_units, render_menu, CatalogItem, CatalogVariant, VariantId};

    fn catalog_fixture() -> Vec<CatalogItem> {
        vec![
            CatalogItem {
                id: "item-matcha".to_string(),
                name: "Matcha".to_string(),
                description: Some("Ceremonial grade".to_string()),
                variants: vec![
                    CatalogVariant {
                        id: VariantId("var-honey-oat".to_string()),
                        name: "Honey Oat".to_string(),
                        price_minor_units: 650,
                    },
                    CatalogVariant {
                        id: VariantId("var-einspanner".to_string()),
                        name: "Einspanner".to_string(),
                        price_minor_units: 725,
                    },
                ],
            },
            CatalogItem {
                id: "item-drip".to_string(),
                name: "Drip Coffee".to_string(),
                description: None,
                variants: vec![CatalogVariant {
                    id: VariantId("var-drip".to_string()),
                    name: "Regular".to_string(),
                    price_minor_units: 350,
                }],
            },
        ]
    }

    #[test]
    fn formats_minor_units_with_two_decimal_places() {
        assert_eq!(format_minor_units(0), "$0.00");
        assert_eq!(format_minor_units(99), "$0.99");
        assert_eq!(format_minor_units(1000), "$10.00");
        assert_eq!(format_minor_units(1550), "$15.50");
        assert_eq!(format_minor_units(-250), "-$2.50");
    }

    #[test]
    fn menu_numbers_variants_continuously_across_items() {
        let menu = render_menu(&catalog_fixture());
        assert!(menu.contains("1. Matcha - Honey Oat: $6.50"));
        assert!(menu.contains("2. Matcha - Einspanner: $7.25"));
        assert!(menu.contains("3. Drip Coffee - Regular: $3.50"));
    }

    #[test]
    fn empty_catalog_renders_a_placeholder_line() {
        let menu = render_menu(&[]);
        assert!(menu.contains("nothing available"));
    }
}
