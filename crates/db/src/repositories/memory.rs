use std::collections::HashMap;

use tokio::sync::RwLock;

use orderly_core::ConversationState;

use super::{ConversationStore, StoreError};

/// In-memory store for tests and the CLI smoke path.
#[derive(Default)]
pub struct InMemoryConversationStore {
    threads: RwLock<HashMap<String, ConversationState>>,
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>, StoreError> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).cloned())
    }

    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<(), StoreError> {
        let mut threads = self.threads.write().await;
        threads.insert(thread_id.to_string(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use orderly_core::{ConversationState, Stage};

    use crate::repositories::{ConversationStore, InMemoryConversationStore};

    #[tokio::test]
    async fn in_memory_store_round_trip() {
        let store = InMemoryConversationStore::default();
        let state = ConversationState { stage: Stage::Browsing, ..ConversationState::default() };

        store.save("thread-1", &state).await.expect("save");
        let found = store.load("thread-1").await.expect("load");

        assert_eq!(found, Some(state));
        assert_eq!(store.load("thread-2").await.expect("load other"), None);
    }
}
