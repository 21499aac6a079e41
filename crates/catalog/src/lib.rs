//! Catalog gateway and order submission against the external
//! catalog/ordering service.
//!
//! - `api` - the service boundary (`CatalogApi`) and wire-level types
//! - `http` - reqwest client for the Square-shaped REST API
//! - `gateway` - process-lifetime catalog cache, allow-list filtering,
//!   variant resolution, refresh hook
//! - `orders` - idempotent order submission

pub mod api;
pub mod gateway;
pub mod http;
pub mod orders;

pub use api::{CatalogApi, CatalogApiError, CreateOrderRequest, Location, OrderId, OrderLineItem};
pub use gateway::{CatalogError, CatalogGateway};
pub use http::HttpCatalogClient;
pub use orders::{OrderError, OrderSubmitter};
