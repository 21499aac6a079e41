use async_trait::async_trait;
use thiserror::Error;

use orderly_core::ConversationState;

pub mod conversation;
pub mod memory;

pub use conversation::SqlConversationStore;
pub use memory::InMemoryConversationStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable per-thread conversation state. One record per thread id;
/// `save` replaces the whole record. Callers hold the per-thread turn
/// lock while they load, merge, and save, which makes the pair atomic per
/// thread.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>, StoreError>;
    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<(), StoreError>;
}
