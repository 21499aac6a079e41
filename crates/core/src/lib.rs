pub mod config;
pub mod domain;

pub use domain::cart::{cart_total_minor_units, render_cart, CartEntry};
pub use domain::catalog::{
    format_minor_units, render_menu, variant_display_name, CatalogItem, CatalogVariant, VariantId,
};
pub use domain::conversation::{
    ConversationState, Patch, Stage, StateDelta, CUSTOMER_NAME_FIELD, ORDER_TOKEN_FIELD,
};
pub use domain::intent::Intent;
