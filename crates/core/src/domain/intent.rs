use serde::{Deserialize, Serialize};

/// Closed vocabulary of conversation intents. `Unknown` is the mandatory
/// fallback for anything the classifier cannot place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ViewMenu,
    AddItem,
    ViewCart,
    Confirm,
    ProvideName,
    Cancel,
    Help,
    Unknown,
}

impl Intent {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ViewMenu => "view_menu",
            Self::AddItem => "add_item",
            Self::ViewCart => "view_cart",
            Self::Confirm => "confirm",
            Self::ProvideName => "provide_name",
            Self::Cancel => "cancel",
            Self::Help => "help",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a label back into the closed vocabulary. Out-of-vocabulary
    /// labels (e.g. from a remote classifier) return `None` so callers can
    /// degrade to `Unknown` instead of propagating them.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "view_menu" => Some(Self::ViewMenu),
            "add_item" => Some(Self::AddItem),
            "view_cart" => Some(Self::ViewCart),
            "confirm" => Some(Self::Confirm),
            "provide_name" => Some(Self::ProvideName),
            "cancel" => Some(Self::Cancel),
            "help" => Some(Self::Help),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Leaving intents take the user out of the active ordering flow while
    /// cart items are pending; they trigger the warn-and-preserve guard.
    pub const fn is_leaving(&self) -> bool {
        matches!(self, Self::ViewMenu | Self::Help)
    }
}
