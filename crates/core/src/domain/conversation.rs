use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::cart::CartEntry;
use crate::domain::intent::Intent;

/// Key under `collected_fields` holding the customer display name.
pub const CUSTOMER_NAME_FIELD: &str = "customer_name";
/// Key under `collected_fields` holding the idempotency token for the
/// in-flight confirm action. Generated once per logical confirm, reused
/// across retries, discarded on success or cancel.
pub const ORDER_TOKEN_FIELD: &str = "order_token";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    Browsing,
    Ordering,
    AwaitingName,
    Confirming,
}

impl Stage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Browsing => "browsing",
            Self::Ordering => "ordering",
            Self::AwaitingName => "awaiting_name",
            Self::Confirming => "confirming",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "browsing" => Some(Self::Browsing),
            "ordering" => Some(Self::Ordering),
            "awaiting_name" => Some(Self::AwaitingName),
            "confirming" => Some(Self::Confirming),
            _ => None,
        }
    }
}

/// Per-thread conversation state. Owned exclusively by the state store;
/// handlers receive a read-only snapshot and return a `StateDelta`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub cart: Vec<CartEntry>,
    pub stage: Stage,
    pub last_intent: Option<Intent>,
    pub pending_warning: Option<String>,
    pub collected_fields: BTreeMap<String, String>,
}

impl ConversationState {
    pub fn customer_name(&self) -> Option<&str> {
        self.collected_fields.get(CUSTOMER_NAME_FIELD).map(String::as_str)
    }

    pub fn order_token(&self) -> Option<&str> {
        self.collected_fields.get(ORDER_TOKEN_FIELD).map(String::as_str)
    }

    /// Field-wise merge: fields absent from the delta are left untouched,
    /// fields present (including explicit clears) overwrite.
    pub fn apply(&mut self, delta: StateDelta) {
        if let Some(cart) = delta.cart {
            self.cart = cart;
        }
        if let Some(stage) = delta.stage {
            self.stage = stage;
        }
        match delta.last_intent {
            Patch::Keep => {}
            Patch::Clear => self.last_intent = None,
            Patch::Set(intent) => self.last_intent = Some(intent),
        }
        match delta.pending_warning {
            Patch::Keep => {}
            Patch::Clear => self.pending_warning = None,
            Patch::Set(warning) => self.pending_warning = Some(warning),
        }
        if let Some(fields) = delta.collected_fields {
            self.collected_fields = fields;
        }
    }
}

/// Three-valued update for clearable fields: leave alone, clear, or set.
#[derive(Clone, Debug, PartialEq)]
pub enum Patch<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Keep
    }
}

/// Partial state update returned by a handler. Distinct from the full
/// state so a handler can never accidentally resurrect fields it did not
/// ask for.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateDelta {
    pub cart: Option<Vec<CartEntry>>,
    pub stage: Option<Stage>,
    pub last_intent: Patch<Intent>,
    pub pending_warning: Patch<String>,
    pub collected_fields: Option<BTreeMap<String, String>>,
}
