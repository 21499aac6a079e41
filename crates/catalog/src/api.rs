use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use orderly_core::CatalogItem;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderId(pub String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderLineItem {
    pub catalog_object_id: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateOrderRequest {
    pub idempotency_key: String,
    pub location_id: String,
    pub line_items: Vec<OrderLineItem>,
    pub display_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum CatalogApiError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("upstream rejected the request: {0}")]
    Rejected(String),
}

/// Boundary to the remote catalog/ordering service. Implementations make
/// blocking network calls with their own timeouts; they never cache.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn list_catalog(&self) -> Result<Vec<CatalogItem>, CatalogApiError>;
    async fn list_locations(&self) -> Result<Vec<Location>, CatalogApiError>;
    async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderId, CatalogApiError>;
}
