use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use orderly_core::{CatalogItem, CatalogVariant, VariantId};

use crate::api::{CatalogApi, CatalogApiError, CreateOrderRequest, Location, OrderId};

/// HTTP client for a Square-shaped catalog/ordering REST API.
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
    access_token: SecretString,
}

impl HttpCatalogClient {
    pub fn new(
        base_url: impl Into<String>,
        access_token: SecretString,
        timeout_secs: u64,
    ) -> Result<Self, CatalogApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|error| CatalogApiError::Transport(error.to_string()))?;

        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string(), access_token })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogClient {
    async fn list_catalog(&self) -> Result<Vec<CatalogItem>, CatalogApiError> {
        let response = self
            .client
            .get(self.url("/v2/catalog/list"))
            .query(&[("types", "ITEM")])
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|error| CatalogApiError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            return Err(CatalogApiError::Rejected(format!(
                "catalog list returned {}",
                response.status()
            )));
        }

        let body: CatalogListResponse = response
            .json()
            .await
            .map_err(|error| CatalogApiError::Transport(error.to_string()))?;

        Ok(body.objects.into_iter().filter_map(catalog_item_from_object).collect())
    }

    async fn list_locations(&self) -> Result<Vec<Location>, CatalogApiError> {
        let response = self
            .client
            .get(self.url("/v2/locations"))
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|error| CatalogApiError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            return Err(CatalogApiError::Rejected(format!(
                "location list returned {}",
                response.status()
            )));
        }

        let body: LocationListResponse = response
            .json()
            .await
            .map_err(|error| CatalogApiError::Transport(error.to_string()))?;

        Ok(body
            .locations
            .into_iter()
            .map(|location| Location {
                id: location.id,
                name: location.name.unwrap_or_default(),
                active: location.status.as_deref() != Some("INACTIVE"),
            })
            .collect())
    }

    async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderId, CatalogApiError> {
        let payload = CreateOrderBody {
            idempotency_key: request.idempotency_key,
            order: OrderBody {
                location_id: request.location_id,
                line_items: request
                    .line_items
                    .into_iter()
                    .map(|line| LineItemBody {
                        catalog_object_id: line.catalog_object_id,
                        quantity: line.quantity.to_string(),
                    })
                    .collect(),
                source: request.display_name.map(|name| OrderSourceBody { name }),
            },
        };

        let response = self
            .client
            .post(self.url("/v2/orders"))
            .bearer_auth(self.access_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|error| CatalogApiError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            return Err(CatalogApiError::Rejected(format!(
                "order create returned {}",
                response.status()
            )));
        }

        let body: CreateOrderResponse = response
            .json()
            .await
            .map_err(|error| CatalogApiError::Transport(error.to_string()))?;

        if let Some(errors) = body.errors.filter(|errors| !errors.is_empty()) {
            let details =
                errors.into_iter().map(|error| error.detail.unwrap_or(error.code)).collect::<Vec<_>>();
            return Err(CatalogApiError::Rejected(details.join("; ")));
        }

        let order = body
            .order
            .ok_or_else(|| CatalogApiError::Rejected("order create returned no order".to_string()))?;
        Ok(OrderId(order.id))
    }
}

fn catalog_item_from_object(object: CatalogObject) -> Option<CatalogItem> {
    if object.object_type != "ITEM" {
        return None;
    }
    let item_data = object.item_data?;

    // Variations without a price cannot be ordered; skip them.
    let variants = item_data
        .variations
        .into_iter()
        .filter_map(|variation| {
            let data = variation.item_variation_data?;
            let price = data.price_money?;
            Some(CatalogVariant {
                id: VariantId(variation.id),
                name: data.name.unwrap_or_else(|| "Regular".to_string()),
                price_minor_units: price.amount,
            })
        })
        .collect::<Vec<_>>();

    Some(CatalogItem {
        id: object.id,
        name: item_data.name,
        description: item_data.description,
        variants,
    })
}

#[derive(Debug, Deserialize)]
struct CatalogListResponse {
    #[serde(default)]
    objects: Vec<CatalogObject>,
}

#[derive(Debug, Deserialize)]
struct CatalogObject {
    #[serde(rename = "type")]
    object_type: String,
    id: String,
    item_data: Option<ItemData>,
}

#[derive(Debug, Deserialize)]
struct ItemData {
    name: String,
    description: Option<String>,
    #[serde(default)]
    variations: Vec<CatalogVariation>,
}

#[derive(Debug, Deserialize)]
struct CatalogVariation {
    id: String,
    item_variation_data: Option<VariationData>,
}

#[derive(Debug, Deserialize)]
struct VariationData {
    name: Option<String>,
    price_money: Option<PriceMoney>,
}

#[derive(Debug, Deserialize)]
struct PriceMoney {
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct LocationListResponse {
    #[serde(default)]
    locations: Vec<LocationObject>,
}

#[derive(Debug, Deserialize)]
struct LocationObject {
    id: String,
    name: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody {
    idempotency_key: String,
    order: OrderBody,
}

#[derive(Debug, Serialize)]
struct OrderBody {
    location_id: String,
    line_items: Vec<LineItemBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<OrderSourceBody>,
}

#[derive(Debug, Serialize)]
struct LineItemBody {
    catalog_object_id: String,
    // The upstream API carries quantities as strings.
    quantity: String,
}

#[derive(Debug, Serialize)]
struct OrderSourceBody {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    order: Option<OrderObject>,
    errors: Option<Vec<ApiErrorObject>>,
}

#[derive(Debug, Deserialize)]
struct OrderObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorObject {
    code: String,
    detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{catalog_item_from_object, CatalogObject};

    fn object_from_json(raw: &str) -> CatalogObject {
        serde_json::from_str(raw).expect("valid catalog object json")
    }

    #[test]
    fn item_objects_map_to_catalog_items() {
        let object = object_from_json(
            r#"{
                "type": "ITEM",
                "id": "item-1",
                "item_data": {
                    "name": "Matcha",
                    "description": "Ceremonial grade",
                    "variations": [
                        {
                            "id": "var-1",
                            "item_variation_data": {
                                "name": "Honey Oat",
                                "price_money": { "amount": 650 }
                            }
                        }
                    ]
                }
            }"#,
        );

        let item = catalog_item_from_object(object).expect("item should map");
        assert_eq!(item.name, "Matcha");
        assert_eq!(item.variants.len(), 1);
        assert_eq!(item.variants[0].name, "Honey Oat");
        assert_eq!(item.variants[0].price_minor_units, 650);
    }

    #[test]
    fn non_item_objects_are_skipped() {
        let object = object_from_json(r#"{ "type": "CATEGORY", "id": "cat-1" }"#);
        assert!(catalog_item_from_object(object).is_none());
    }

    #[test]
    fn variations_without_a_price_are_dropped() {
        let object = object_from_json(
            r#"{
                "type": "ITEM",
                "id": "item-1",
                "item_data": {
                    "name": "Drip",
                    "variations": [
                        { "id": "var-unpriced", "item_variation_data": { "name": "Mystery" } },
                        {
                            "id": "var-priced",
                            "item_variation_data": {
                                "name": "Regular",
                                "price_money": { "amount": 350 }
                            }
                        }
                    ]
                }
            }"#,
        );

        let item = catalog_item_from_object(object).expect("item should map");
        assert_eq!(item.variants.len(), 1);
        assert_eq!(item.variants[0].id.0, "var-priced");
    }
}
