use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use orderly_core::{CatalogItem, CatalogVariant, VariantId};

use crate::api::{CatalogApi, CatalogApiError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

impl From<CatalogApiError> for CatalogError {
    fn from(error: CatalogApiError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

/// Read-mostly view over the remote catalog: fetched once on a cold miss,
/// cached for the process lifetime, shared across conversations. Refresh
/// is single-writer; concurrent readers read through the previous
/// snapshot.
pub struct CatalogGateway {
    api: Arc<dyn CatalogApi>,
    allowed_variants: Option<HashSet<String>>,
    cache: RwLock<Option<Arc<[CatalogItem]>>>,
    fetch_guard: Mutex<()>,
}

impl CatalogGateway {
    pub fn new(api: Arc<dyn CatalogApi>, allowed_variants: &[String]) -> Self {
        let allowed_variants = if allowed_variants.is_empty() {
            None
        } else {
            Some(allowed_variants.iter().cloned().collect())
        };
        Self { api, allowed_variants, cache: RwLock::new(None), fetch_guard: Mutex::new(()) }
    }

    /// Cached snapshot of orderable items, fetching on the first call.
    pub async fn list_items(&self) -> Result<Arc<[CatalogItem]>, CatalogError> {
        if let Some(snapshot) = self.cache.read().await.clone() {
            return Ok(snapshot);
        }

        // Single-flight: the first cold reader fetches, late arrivals
        // re-check the cache once the guard is released.
        let _guard = self.fetch_guard.lock().await;
        if let Some(snapshot) = self.cache.read().await.clone() {
            return Ok(snapshot);
        }

        let snapshot = self.fetch_filtered().await?;
        *self.cache.write().await = Some(snapshot.clone());
        info!(
            event_name = "catalog.cache_primed",
            item_count = snapshot.len(),
            "catalog snapshot cached"
        );
        Ok(snapshot)
    }

    /// Operational hook: re-fetch and atomically replace the snapshot.
    pub async fn refresh(&self) -> Result<Arc<[CatalogItem]>, CatalogError> {
        let _guard = self.fetch_guard.lock().await;
        let snapshot = self.fetch_filtered().await?;
        *self.cache.write().await = Some(snapshot.clone());
        info!(
            event_name = "catalog.cache_refreshed",
            item_count = snapshot.len(),
            "catalog snapshot refreshed"
        );
        Ok(snapshot)
    }

    /// Look a variant up in the current snapshot, fetching it cold if
    /// needed. `None` means the id does not resolve against the live
    /// catalog.
    pub async fn resolve_variant(
        &self,
        id: &VariantId,
    ) -> Result<Option<(CatalogItem, CatalogVariant)>, CatalogError> {
        let snapshot = self.list_items().await?;
        for item in snapshot.iter() {
            if let Some(variant) = item.variants.iter().find(|variant| &variant.id == id) {
                return Ok(Some((item.clone(), variant.clone())));
            }
        }
        Ok(None)
    }

    async fn fetch_filtered(&self) -> Result<Arc<[CatalogItem]>, CatalogError> {
        let items = self.api.list_catalog().await.map_err(|error| {
            warn!(event_name = "catalog.fetch_failed", error = %error, "catalog fetch failed");
            CatalogError::from(error)
        })?;
        Ok(self.apply_allow_list(items).into())
    }

    fn apply_allow_list(&self, items: Vec<CatalogItem>) -> Vec<CatalogItem> {
        let Some(allowed) = &self.allowed_variants else {
            return items;
        };

        items
            .into_iter()
            .filter_map(|mut item| {
                item.variants.retain(|variant| allowed.contains(&variant.id.0));
                if item.variants.is_empty() {
                    None
                } else {
                    Some(item)
                }
            })
            .collect()
    }
}
