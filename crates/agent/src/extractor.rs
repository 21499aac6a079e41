use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use orderly_core::{variant_display_name, CartEntry, CatalogItem};

use crate::llm::LlmClient;

/// Turns user text into validated cart entries against the current
/// catalog snapshot. Extraction is best-effort and total: an empty result
/// is a normal outcome, and no backend failure escapes to the caller.
#[async_trait]
pub trait ItemExtractor: Send + Sync {
    async fn extract(&self, text: &str, catalog: &[CatalogItem]) -> Vec<CartEntry>;
}

/// Deterministic extractor: case-insensitive containment of item names in
/// the utterance. A variant name mentioned alongside the item picks that
/// variant; otherwise the item's first variant is used.
#[derive(Clone, Debug, Default)]
pub struct CatalogMatchExtractor;

impl CatalogMatchExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ItemExtractor for CatalogMatchExtractor {
    async fn extract(&self, text: &str, catalog: &[CatalogItem]) -> Vec<CartEntry> {
        let query = text.to_lowercase();
        let mut entries = Vec::new();

        for item in catalog {
            if item.variants.is_empty() || !query.contains(&item.name.to_lowercase()) {
                continue;
            }

            let variant = item
                .variants
                .iter()
                .find(|variant| query.contains(&variant.name.to_lowercase()))
                .unwrap_or(&item.variants[0]);

            entries.push(CartEntry {
                display_name: variant_display_name(item, variant),
                catalog_variant_id: variant.id.clone(),
                unit_price_minor_units: variant.price_minor_units,
            });
        }

        entries
    }
}

/// LLM-backed extractor: the model proposes variant ids, and every
/// candidate is checked against the current snapshot. Ids the catalog does
/// not know are silently dropped.
pub struct LlmItemExtractor {
    llm: Arc<dyn LlmClient>,
}

impl LlmItemExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn prompt(text: &str, catalog: &[CatalogItem]) -> String {
        let mut catalog_lines = Vec::new();
        for item in catalog {
            for variant in &item.variants {
                catalog_lines.push(format!("{}: {}", variant.id.0, variant_display_name(item, variant)));
            }
        }

        format!(
            "You match customer requests to catalog variants.\n\
             Catalog (variant_id: name):\n{}\n\n\
             Customer message: {text}\n\n\
             Reply with a JSON array of objects like [{{\"variant_id\": \"...\"}}] \
             for every requested item, or [] if nothing matches.",
            catalog_lines.join("\n")
        )
    }
}

#[async_trait]
impl ItemExtractor for LlmItemExtractor {
    async fn extract(&self, text: &str, catalog: &[CatalogItem]) -> Vec<CartEntry> {
        let raw = match self.llm.complete(&Self::prompt(text, catalog)).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    event_name = "extractor.backend_failed",
                    error = %error,
                    "llm extraction failed, returning no items"
                );
                return Vec::new();
            }
        };

        entries_for_variant_ids(&parse_candidate_ids(&raw), catalog)
    }
}

/// Map candidate variant ids to cart entries via a lookup built from the
/// current snapshot, dropping anything that does not resolve.
pub fn entries_for_variant_ids(candidate_ids: &[String], catalog: &[CatalogItem]) -> Vec<CartEntry> {
    let mut lookup = HashMap::new();
    for item in catalog {
        for variant in &item.variants {
            lookup.insert(
                variant.id.0.as_str(),
                CartEntry {
                    display_name: variant_display_name(item, variant),
                    catalog_variant_id: variant.id.clone(),
                    unit_price_minor_units: variant.price_minor_units,
                },
            );
        }
    }

    candidate_ids.iter().filter_map(|id| lookup.get(id.as_str()).cloned()).collect()
}

/// Best-effort parse of backend output: strips markdown fences, accepts a
/// bare array, an `{"items": [...]}` wrapper, objects with `variant_id`,
/// or bare id strings. Anything else yields no candidates.
fn parse_candidate_ids(raw: &str) -> Vec<String> {
    let unwrapped = unwrap_code_fence(raw);

    let Ok(value) = serde_json::from_str::<Value>(unwrapped) else {
        return Vec::new();
    };

    let array = match value {
        Value::Array(array) => array,
        Value::Object(mut object) => match object.remove("items") {
            Some(Value::Array(array)) => array,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    array
        .into_iter()
        .filter_map(|element| match element {
            Value::String(id) => Some(id),
            Value::Object(object) => match object.get("variant_id") {
                Some(Value::String(id)) => Some(id.clone()),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

fn unwrap_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Skip the info string ("json") on the opening fence line.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use orderly_core::{CatalogItem, CatalogVariant, VariantId};

    use super::{
        entries_for_variant_ids, parse_candidate_ids, CatalogMatchExtractor, ItemExtractor,
        LlmItemExtractor,
    };
    use crate::llm::LlmClient;

    fn catalog_fixture() -> Vec<CatalogItem> {
        vec![
            CatalogItem {
                id: "item-burger".to_string(),
                name: "Burger".to_string(),
                description: None,
                variants: vec![
                    CatalogVariant {
                        id: VariantId("A".to_string()),
                        name: "Classic".to_string(),
                        price_minor_units: 899,
                    },
                    CatalogVariant {
                        id: VariantId("B".to_string()),
                        name: "Cheese".to_string(),
                        price_minor_units: 999,
                    },
                ],
            },
            CatalogItem {
                id: "item-soda".to_string(),
                name: "Soda".to_string(),
                description: None,
                variants: vec![CatalogVariant {
                    id: VariantId("S".to_string()),
                    name: "Regular".to_string(),
                    price_minor_units: 299,
                }],
            },
        ]
    }

    #[tokio::test]
    async fn item_mention_picks_the_first_variant_by_default() {
        let entries =
            CatalogMatchExtractor::new().extract("I'll have the burger", &catalog_fixture()).await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].catalog_variant_id.0, "A");
        assert_eq!(entries[0].display_name, "Burger - Classic");
    }

    #[tokio::test]
    async fn variant_qualified_mention_picks_that_variant() {
        let entries =
            CatalogMatchExtractor::new().extract("one cheese burger please", &catalog_fixture()).await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].catalog_variant_id.0, "B");
        assert_eq!(entries[0].unit_price_minor_units, 999);
    }

    #[tokio::test]
    async fn multiple_items_in_one_utterance_all_match() {
        let entries =
            CatalogMatchExtractor::new().extract("a burger and a soda", &catalog_fixture()).await;

        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn no_mention_yields_an_empty_result_not_an_error() {
        let entries =
            CatalogMatchExtractor::new().extract("something else entirely", &catalog_fixture()).await;
        assert!(entries.is_empty());
    }

    #[test]
    fn unknown_candidate_ids_are_dropped() {
        let catalog = catalog_fixture();
        let entries = entries_for_variant_ids(
            &["A".to_string(), "C".to_string()],
            &catalog,
        );

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].catalog_variant_id.0, "A");
    }

    #[test]
    fn candidate_parsing_tolerates_markdown_fences() {
        let ids = parse_candidate_ids("```json\n[{\"variant_id\": \"A\"}]\n```");
        assert_eq!(ids, vec!["A".to_string()]);
    }

    #[test]
    fn candidate_parsing_tolerates_object_wrappers_and_bare_strings() {
        assert_eq!(
            parse_candidate_ids(r#"{"items": ["A", {"variant_id": "B"}]}"#),
            vec!["A".to_string(), "B".to_string()]
        );
    }

    #[test]
    fn candidate_parsing_returns_empty_for_garbage() {
        assert!(parse_candidate_ids("not json at all").is_empty());
        assert!(parse_candidate_ids("42").is_empty());
        assert!(parse_candidate_ids(r#"{"unexpected": true}"#).is_empty());
    }

    struct ScriptedLlm {
        reply: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            match self.reply {
                Ok(reply) => Ok(reply.to_string()),
                Err(error) => Err(anyhow::anyhow!(error)),
            }
        }
    }

    #[tokio::test]
    async fn llm_extractor_validates_against_the_snapshot() {
        let extractor = LlmItemExtractor::new(Arc::new(ScriptedLlm {
            reply: Ok(r#"[{"variant_id": "A"}, {"variant_id": "C"}]"#),
        }));

        let entries = extractor.extract("a burger and a mystery", &catalog_fixture()).await;

        assert_eq!(entries.len(), 1, "unknown variant C must be dropped");
        assert_eq!(entries[0].catalog_variant_id.0, "A");
    }

    #[tokio::test]
    async fn llm_backend_failure_yields_an_empty_result() {
        let extractor =
            LlmItemExtractor::new(Arc::new(ScriptedLlm { reply: Err("model offline") }));
        let entries = extractor.extract("a burger", &catalog_fixture()).await;
        assert!(entries.is_empty());
    }
}
