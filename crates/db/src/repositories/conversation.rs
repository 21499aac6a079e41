use chrono::Utc;
use sqlx::Row;

use orderly_core::{ConversationState, Intent, Stage};

use super::{ConversationStore, StoreError};
use crate::DbPool;

pub struct SqlConversationStore {
    pool: DbPool,
}

impl SqlConversationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationStore for SqlConversationStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>, StoreError> {
        let row = sqlx::query(
            "SELECT stage, last_intent, pending_warning, cart, collected_fields \
             FROM conversation_state WHERE thread_id = ?",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stage_label = row.get::<String, _>("stage");
        let stage = Stage::from_label(&stage_label)
            .ok_or_else(|| StoreError::Decode(format!("unknown stage label `{stage_label}`")))?;

        let last_intent = match row.get::<Option<String>, _>("last_intent") {
            Some(label) => Some(Intent::from_label(&label).ok_or_else(|| {
                StoreError::Decode(format!("unknown intent label `{label}`"))
            })?),
            None => None,
        };

        let cart = serde_json::from_str(&row.get::<String, _>("cart"))
            .map_err(|error| StoreError::Decode(format!("cart column: {error}")))?;
        let collected_fields =
            serde_json::from_str(&row.get::<String, _>("collected_fields"))
                .map_err(|error| StoreError::Decode(format!("collected_fields column: {error}")))?;

        Ok(Some(ConversationState {
            cart,
            stage,
            last_intent,
            pending_warning: row.get::<Option<String>, _>("pending_warning"),
            collected_fields,
        }))
    }

    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<(), StoreError> {
        let cart = serde_json::to_string(&state.cart)
            .map_err(|error| StoreError::Decode(format!("cart column: {error}")))?;
        let collected_fields = serde_json::to_string(&state.collected_fields)
            .map_err(|error| StoreError::Decode(format!("collected_fields column: {error}")))?;

        sqlx::query(
            "INSERT INTO conversation_state \
             (thread_id, stage, last_intent, pending_warning, cart, collected_fields, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(thread_id) DO UPDATE SET \
             stage = excluded.stage, \
             last_intent = excluded.last_intent, \
             pending_warning = excluded.pending_warning, \
             cart = excluded.cart, \
             collected_fields = excluded.collected_fields, \
             updated_at = excluded.updated_at",
        )
        .bind(thread_id)
        .bind(state.stage.as_str())
        .bind(state.last_intent.map(|intent| intent.as_str()))
        .bind(state.pending_warning.as_deref())
        .bind(cart)
        .bind(collected_fields)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
