use uuid::Uuid;

use orderly_catalog::{CatalogGateway, OrderSubmitter};
use orderly_core::{
    cart_total_minor_units, format_minor_units, render_cart, render_menu, ConversationState,
    Stage, StateDelta, CUSTOMER_NAME_FIELD, ORDER_TOKEN_FIELD,
};

use crate::classifier::extract_candidate_name;
use crate::extractor::ItemExtractor;

/// What a handler hands back to the router: the user-facing text plus a
/// partial state update. Handlers never touch stored state directly.
#[derive(Clone, Debug)]
pub struct HandlerReply {
    pub response: String,
    pub delta: StateDelta,
}

pub(crate) async fn show_menu(gateway: &CatalogGateway, _state: &ConversationState) -> HandlerReply {
    match gateway.list_items().await {
        Ok(items) => HandlerReply {
            response: format!(
                "{}\n\nSay the name of an item to add it, 'cart' to review your order, or 'confirm' to checkout.",
                render_menu(&items)
            ),
            delta: StateDelta { stage: Some(Stage::Browsing), ..StateDelta::default() },
        },
        Err(_) => degraded_menu_reply(),
    }
}

pub(crate) async fn add_to_cart(
    gateway: &CatalogGateway,
    extractor: &dyn ItemExtractor,
    state: &ConversationState,
    text: &str,
) -> HandlerReply {
    let snapshot = match gateway.list_items().await {
        Ok(snapshot) => snapshot,
        Err(_) => return degraded_menu_reply(),
    };

    let extracted = extractor.extract(text, &snapshot).await;
    if extracted.is_empty() {
        return HandlerReply {
            response: "I couldn't find that item on the menu. Try saying 'menu' to see what's available."
                .to_string(),
            delta: StateDelta { stage: Some(Stage::Ordering), ..StateDelta::default() },
        };
    }

    let added = extracted
        .iter()
        .map(|entry| {
            format!("{} ({})", entry.display_name, format_minor_units(entry.unit_price_minor_units))
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut cart = state.cart.clone();
    cart.extend(extracted);
    let total = format_minor_units(cart_total_minor_units(&cart));
    let count = cart.len();

    HandlerReply {
        response: format!(
            "Added {added} to your cart.\nCart total: {total} ({count} item(s)).\n\nSay 'confirm' to checkout, 'cart' to see your order, or keep adding items."
        ),
        delta: StateDelta {
            cart: Some(cart),
            stage: Some(Stage::Ordering),
            ..StateDelta::default()
        },
    }
}

pub(crate) fn show_cart(state: &ConversationState) -> HandlerReply {
    if state.cart.is_empty() {
        return HandlerReply {
            response: "Your cart is empty. Say 'menu' to see what's available!".to_string(),
            delta: StateDelta { stage: Some(Stage::Idle), ..StateDelta::default() },
        };
    }

    HandlerReply {
        response: format!(
            "{}\n\nSay 'confirm' to checkout or 'cancel' to clear your cart.",
            render_cart(&state.cart)
        ),
        delta: StateDelta { stage: Some(Stage::Ordering), ..StateDelta::default() },
    }
}

/// First leg of the confirm flow. With no name on file this parks the
/// conversation in the awaiting-name stage and mints the idempotency token
/// for this confirm action; with a name already collected it places the
/// order directly.
pub(crate) async fn begin_confirm(
    gateway: &CatalogGateway,
    submitter: &OrderSubmitter,
    state: &ConversationState,
) -> HandlerReply {
    if state.cart.is_empty() {
        return empty_cart_reply();
    }

    if let Some(name) = state.customer_name().map(str::to_string) {
        return place_order_reply(gateway, submitter, state, &name).await;
    }

    let mut fields = state.collected_fields.clone();
    fields
        .entry(ORDER_TOKEN_FIELD.to_string())
        .or_insert_with(|| Uuid::new_v4().to_string());

    HandlerReply {
        response: format!(
            "You're ordering {} item(s) for {}.\nWhat name should we put on the order?",
            state.cart.len(),
            format_minor_units(cart_total_minor_units(&state.cart))
        ),
        delta: StateDelta {
            stage: Some(Stage::AwaitingName),
            collected_fields: Some(fields),
            ..StateDelta::default()
        },
    }
}

/// Second leg of the confirm flow, reached via the awaiting-name stage
/// short-circuit. The raw turn text is the candidate name.
pub(crate) async fn confirm_order(
    gateway: &CatalogGateway,
    submitter: &OrderSubmitter,
    state: &ConversationState,
    raw_name: &str,
) -> HandlerReply {
    if state.cart.is_empty() {
        return empty_cart_reply();
    }

    let name = extract_candidate_name(raw_name);
    if name.is_empty() {
        return HandlerReply {
            response: "I didn't catch a name - what name should we put on the order?".to_string(),
            delta: StateDelta::default(),
        };
    }

    place_order_reply(gateway, submitter, state, &name).await
}

pub(crate) fn cancel_order(state: &ConversationState) -> HandlerReply {
    if state.cart.is_empty() {
        return HandlerReply {
            response: "Nothing to cancel - your cart is already empty.\nSay 'menu' to see what's available."
                .to_string(),
            delta: StateDelta { stage: Some(Stage::Idle), ..StateDelta::default() },
        };
    }

    HandlerReply {
        response: format!(
            "Order cancelled. Removed {} item(s) from your cart.\nSay 'menu' to start over.",
            state.cart.len()
        ),
        delta: StateDelta {
            cart: Some(Vec::new()),
            stage: Some(Stage::Idle),
            collected_fields: Some(Default::default()),
            ..StateDelta::default()
        },
    }
}

pub(crate) fn show_help(_state: &ConversationState) -> HandlerReply {
    let help_text = "Here's how to use this ordering assistant:\n\n\
        - 'menu'    - see what's available\n\
        - 'cart'    - view your current order\n\
        - say an item's name to add it (e.g. \"I'll have a cheese burger\")\n\
        - 'confirm' - place your order\n\
        - 'cancel'  - clear your cart and start over\n\n\
        Just type naturally!";

    HandlerReply { response: help_text.to_string(), delta: StateDelta::default() }
}

pub(crate) fn handle_unknown(_state: &ConversationState) -> HandlerReply {
    HandlerReply {
        response: "I didn't quite understand that. Try 'menu' to see options or 'help' for commands."
            .to_string(),
        delta: StateDelta::default(),
    }
}

async fn place_order_reply(
    gateway: &CatalogGateway,
    submitter: &OrderSubmitter,
    state: &ConversationState,
    name: &str,
) -> HandlerReply {
    // Every cart entry must still resolve against the catalog at
    // confirmation time; stale entries are pruned instead of submitted.
    let mut cart = Vec::new();
    let mut unavailable = Vec::new();
    for entry in &state.cart {
        match gateway.resolve_variant(&entry.catalog_variant_id).await {
            Ok(Some(_)) => cart.push(entry.clone()),
            Ok(None) => unavailable.push(entry.clone()),
            Err(_) => {
                // Catalog briefly unreachable: submit as-is and let the
                // ordering service be the arbiter.
                cart = state.cart.clone();
                unavailable.clear();
                break;
            }
        }
    }

    if !unavailable.is_empty() {
        let names = unavailable
            .iter()
            .map(|entry| entry.display_name.clone())
            .collect::<Vec<_>>()
            .join(", ");

        if cart.is_empty() {
            let mut fields = state.collected_fields.clone();
            fields.remove(ORDER_TOKEN_FIELD);
            fields.insert(CUSTOMER_NAME_FIELD.to_string(), name.to_string());
            return HandlerReply {
                response: format!(
                    "Sorry - {names} is no longer available, so there's nothing left to order.\nSay 'menu' to see what's available."
                ),
                delta: StateDelta {
                    cart: Some(Vec::new()),
                    stage: Some(Stage::Idle),
                    collected_fields: Some(fields),
                    ..StateDelta::default()
                },
            };
        }

        let mut fields = state.collected_fields.clone();
        fields.insert(CUSTOMER_NAME_FIELD.to_string(), name.to_string());
        return HandlerReply {
            response: format!(
                "Removed {names} - no longer available.\nYour cart now has {} item(s) for {}.\nSay 'confirm' to place the order.",
                cart.len(),
                format_minor_units(cart_total_minor_units(&cart))
            ),
            delta: StateDelta {
                cart: Some(cart),
                stage: Some(Stage::Ordering),
                collected_fields: Some(fields),
                ..StateDelta::default()
            },
        };
    }

    // One token per logical confirm action: reuse the stashed one on
    // retries so the upstream can deduplicate.
    let token = state
        .order_token()
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match submitter.place_order(&cart, name, &token).await {
        Ok(order_id) => {
            let mut fields = state.collected_fields.clone();
            fields.remove(ORDER_TOKEN_FIELD);
            fields.insert(CUSTOMER_NAME_FIELD.to_string(), name.to_string());

            HandlerReply {
                response: format!(
                    "Order confirmed! You ordered {} item(s) for {}.\nYour order id is {}.\nThank you, {name}! Say 'menu' to start a new order.",
                    cart.len(),
                    format_minor_units(cart_total_minor_units(&cart)),
                    order_id.0
                ),
                delta: StateDelta {
                    cart: Some(Vec::new()),
                    stage: Some(Stage::Idle),
                    collected_fields: Some(fields),
                    ..StateDelta::default()
                },
            }
        }
        Err(error) => {
            let mut fields = state.collected_fields.clone();
            fields.insert(ORDER_TOKEN_FIELD.to_string(), token);
            fields.insert(CUSTOMER_NAME_FIELD.to_string(), name.to_string());

            HandlerReply {
                response: format!(
                    "I couldn't place your order: {error}.\nYour cart is saved - say 'confirm' to try again."
                ),
                delta: StateDelta {
                    stage: Some(Stage::Confirming),
                    collected_fields: Some(fields),
                    ..StateDelta::default()
                },
            }
        }
    }
}

fn empty_cart_reply() -> HandlerReply {
    HandlerReply {
        response: "Your cart is empty! Add some items before confirming.\nSay 'menu' to see what's available."
            .to_string(),
        delta: StateDelta { stage: Some(Stage::Idle), ..StateDelta::default() },
    }
}

fn degraded_menu_reply() -> HandlerReply {
    HandlerReply {
        response: "The menu is unavailable right now. Please try again in a moment.".to_string(),
        delta: StateDelta::default(),
    }
}
