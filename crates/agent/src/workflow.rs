use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

use orderly_catalog::{CatalogGateway, HttpCatalogClient, OrderSubmitter};
use orderly_core::config::{AppConfig, ClassifierBackend};
use orderly_core::{ConversationState, Intent, Patch, Stage};
use orderly_db::{ConversationStore, StoreError};

use crate::classifier::{EmbeddingClassifier, IntentClassifier, KeywordClassifier};
use crate::embedding::HttpEmbeddingClient;
use crate::extractor::{CatalogMatchExtractor, ItemExtractor};
use crate::handlers::{self, HandlerReply};

/// Result of one processed turn: the sole contract the transport layer
/// (HTTP, CLI, chat protocol) depends on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub response_text: String,
    pub cart_item_count: usize,
}

/// Only infrastructure faults escape a turn; everything else is rendered
/// into the response text. Callers may retry the same input idempotently.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Serializes turns per thread id while leaving distinct threads fully
/// parallel. Locks are created on demand and live for the process.
#[derive(Default)]
pub struct ThreadGate {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ThreadGate {
    pub async fn acquire(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(thread_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// The conversation orchestration core: a flat-star router with a single
/// entry point (classification) and exactly one handler per turn.
pub struct OrderWorkflow {
    classifier: Arc<dyn IntentClassifier>,
    extractor: Arc<dyn ItemExtractor>,
    gateway: Arc<CatalogGateway>,
    submitter: Arc<OrderSubmitter>,
    store: Arc<dyn ConversationStore>,
    gate: ThreadGate,
}

impl OrderWorkflow {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        extractor: Arc<dyn ItemExtractor>,
        gateway: Arc<CatalogGateway>,
        submitter: Arc<OrderSubmitter>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self { classifier, extractor, gateway, submitter, store, gate: ThreadGate::default() }
    }

    /// Process one user turn end to end: load state, resolve the intent,
    /// apply the warn-and-preserve guard, dispatch to exactly one handler,
    /// persist the merged state, and answer.
    pub async fn handle_turn(
        &self,
        thread_id: &str,
        user_text: &str,
    ) -> Result<TurnOutcome, TurnError> {
        let _turn_guard = self.gate.acquire(thread_id).await;

        let mut state = self.store.load(thread_id).await?.unwrap_or_default();

        // Guard 1: the awaiting-name short-circuit sits ahead of
        // classification, so the raw text becomes the candidate name no
        // matter what it says.
        let intent = if state.stage == Stage::AwaitingName {
            Intent::ProvideName
        } else {
            self.classifier.classify(user_text, &[], state.stage).await
        };

        // Guard 2: warn-and-preserve. The warning depends on cart length
        // only, fires for leaving intents, and is cleared on every other
        // turn.
        let warning = (!state.cart.is_empty() && intent.is_leaving())
            .then(|| format!("Note: You have {} item(s) in your cart.", state.cart.len()));

        let reply = self.dispatch(intent, user_text, &state).await;

        let mut delta = reply.delta;
        delta.last_intent = Patch::Set(intent);
        delta.pending_warning = match &warning {
            Some(text) => Patch::Set(text.clone()),
            None => Patch::Clear,
        };

        state.apply(delta);
        self.store.save(thread_id, &state).await?;

        info!(
            event_name = "workflow.turn_completed",
            thread_id = %thread_id,
            intent = intent.as_str(),
            stage = state.stage.as_str(),
            cart_item_count = state.cart.len(),
            "turn completed"
        );

        let response_text = match warning {
            Some(text) => format!("{text}\n\n{}", reply.response),
            None => reply.response,
        };

        Ok(TurnOutcome { response_text, cart_item_count: state.cart.len() })
    }

    /// Assemble the workflow from configuration: HTTP catalog client,
    /// gateway with the configured allow-list, order submitter, and the
    /// configured classifier backend. The deterministic catalog-match
    /// extractor is the primary extraction strategy; the LLM extractor
    /// stays available behind the same trait for callers that wire it.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn ConversationStore>,
    ) -> anyhow::Result<Self> {
        let api = Arc::new(HttpCatalogClient::new(
            config.catalog.base_url.clone(),
            config.catalog.access_token.clone(),
            config.catalog.timeout_secs,
        )?);

        let classifier: Arc<dyn IntentClassifier> = match config.classifier.backend {
            ClassifierBackend::Keyword => Arc::new(KeywordClassifier::new()),
            ClassifierBackend::Embedding => {
                let api_key = config
                    .classifier
                    .api_key
                    .clone()
                    .context("classifier.api_key is required for the embedding backend")?;
                let base_url = config
                    .classifier
                    .base_url
                    .clone()
                    .context("classifier.base_url is required for the embedding backend")?;
                let client = HttpEmbeddingClient::new(
                    base_url,
                    api_key,
                    config.classifier.model.clone(),
                    config.classifier.timeout_secs,
                )?;
                Arc::new(EmbeddingClassifier::new(
                    Arc::new(client),
                    config.classifier.similarity_threshold,
                ))
            }
        };

        Ok(Self::new(
            classifier,
            Arc::new(CatalogMatchExtractor::new()),
            Arc::new(CatalogGateway::new(api.clone(), &config.catalog.allowed_variants)),
            Arc::new(OrderSubmitter::new(api, config.catalog.location_id.clone())),
            store,
        ))
    }

    /// Read-only snapshot for transport-layer queries (e.g. `GET /cart`).
    pub async fn snapshot(&self, thread_id: &str) -> Result<ConversationState, TurnError> {
        Ok(self.store.load(thread_id).await?.unwrap_or_default())
    }

    async fn dispatch(
        &self,
        intent: Intent,
        user_text: &str,
        state: &ConversationState,
    ) -> HandlerReply {
        match intent {
            Intent::ViewMenu => handlers::show_menu(&self.gateway, state).await,
            Intent::AddItem => {
                handlers::add_to_cart(&self.gateway, self.extractor.as_ref(), state, user_text)
                    .await
            }
            Intent::ViewCart => handlers::show_cart(state),
            Intent::Confirm => {
                handlers::begin_confirm(&self.gateway, &self.submitter, state).await
            }
            Intent::ProvideName => {
                handlers::confirm_order(&self.gateway, &self.submitter, state, user_text).await
            }
            Intent::Cancel => handlers::cancel_order(state),
            Intent::Help => handlers::show_help(state),
            Intent::Unknown => handlers::handle_unknown(state),
        }
    }
}
