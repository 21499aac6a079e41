//! Conversation brain - intent classification and turn orchestration
//!
//! This crate is the routing core of the ordering assistant:
//! - Classifies free text into a closed intent vocabulary (`classifier`)
//! - Extracts catalog-validated cart entries from user text (`extractor`)
//! - Runs the per-turn state machine and the warn-and-preserve policy
//!   (`workflow`, `handlers`)
//!
//! # Architecture
//!
//! Every turn re-enters at a single fixed point and runs:
//! 1. **Classification** (`classifier`) - text -> `Intent`, with the
//!    awaiting-name short-circuit resolved ahead of it
//! 2. **Dispatch** (`workflow`) - exactly one handler per turn, no chaining
//! 3. **Merge** - the handler's `StateDelta` is folded into the stored
//!    per-thread state
//!
//! # Safety principle
//!
//! Remote backends (embeddings, LLM extraction) are strictly translators.
//! They never put anything in the cart directly: every candidate is
//! re-validated against the live catalog snapshot, and every backend
//! failure degrades (to `Unknown` or an empty extraction) instead of
//! failing the turn.

pub mod classifier;
pub mod embedding;
pub mod exemplars;
pub mod extractor;
pub mod handlers;
pub mod llm;
pub mod workflow;

pub use classifier::{EmbeddingClassifier, IntentClassifier, KeywordClassifier};
pub use embedding::{EmbeddingClient, HttpEmbeddingClient};
pub use extractor::{CatalogMatchExtractor, ItemExtractor, LlmItemExtractor};
pub use llm::LlmClient;
pub use workflow::{OrderWorkflow, ThreadGate, TurnError, TurnOutcome};
