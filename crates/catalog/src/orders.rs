use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use orderly_core::CartEntry;

use crate::api::{CatalogApi, CreateOrderRequest, OrderId, OrderLineItem};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("cannot place an order with an empty cart")]
    EmptyCart,
    #[error("no fulfillment location is available")]
    LocationUnavailable,
    #[error("order rejected upstream: {0}")]
    UpstreamRejected(String),
}

/// Builds and submits catalog-referenced orders. The fulfillment location
/// comes from config or, failing that, the first location the upstream
/// reports; it is resolved once and reused.
pub struct OrderSubmitter {
    api: Arc<dyn CatalogApi>,
    configured_location: Option<String>,
    resolved_location: OnceCell<String>,
}

impl OrderSubmitter {
    pub fn new(api: Arc<dyn CatalogApi>, configured_location: Option<String>) -> Self {
        Self { api, configured_location, resolved_location: OnceCell::new() }
    }

    /// Submit the cart as one order. The idempotency key belongs to the
    /// logical confirm action: callers pass the same key when the user
    /// retries, so the upstream deduplicates instead of double-charging.
    pub async fn place_order(
        &self,
        cart: &[CartEntry],
        display_name: &str,
        idempotency_key: &str,
    ) -> Result<OrderId, OrderError> {
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let location_id = self.location_id().await?;

        let line_items = cart
            .iter()
            .map(|entry| OrderLineItem {
                catalog_object_id: entry.catalog_variant_id.0.clone(),
                quantity: 1,
            })
            .collect();

        let order_id = self
            .api
            .create_order(CreateOrderRequest {
                idempotency_key: idempotency_key.to_string(),
                location_id,
                line_items,
                display_name: Some(display_name.to_string()),
            })
            .await
            .map_err(|error| {
                warn!(
                    event_name = "orders.submit_failed",
                    error = %error,
                    "order submission failed"
                );
                OrderError::UpstreamRejected(error.to_string())
            })?;

        info!(
            event_name = "orders.submitted",
            order_id = %order_id.0,
            line_count = cart.len(),
            "order placed"
        );
        Ok(order_id)
    }

    async fn location_id(&self) -> Result<String, OrderError> {
        if let Some(configured) = &self.configured_location {
            return Ok(configured.clone());
        }

        self.resolved_location
            .get_or_try_init(|| async {
                let locations = self
                    .api
                    .list_locations()
                    .await
                    .map_err(|_| OrderError::LocationUnavailable)?;
                locations
                    .into_iter()
                    .find(|location| location.active)
                    .map(|location| location.id)
                    .ok_or(OrderError::LocationUnavailable)
            })
            .await
            .cloned()
    }
}
