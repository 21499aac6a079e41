use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::warn;

use orderly_core::{Intent, Stage};

use crate::embedding::{cosine_similarity, EmbeddingClient};
use crate::exemplars::intent_exemplars;

/// Maps raw user text to an intent. Classification is total: backend
/// failures, timeouts, and low-confidence results all degrade to
/// `Intent::Unknown` instead of raising.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, input: &str, history: &[String], stage: Stage) -> Intent;
}

/// Ordered first-match keyword rules. Rule order is part of the contract:
/// specific patterns ("cart", "confirm") are checked before generic ones
/// ("order"), so "what's in my cart" never routes as an add and
/// "place order" never routes as an add.
#[derive(Clone, Debug, Default)]
pub struct KeywordClassifier;

const RULES: &[(Intent, &[&str])] = &[
    (Intent::ViewMenu, &["menu", "options", "what do you have", "what's available"]),
    (Intent::ViewCart, &["cart", "my order", "what did i", "show order"]),
    (Intent::Confirm, &["confirm", "checkout", "done", "that's all", "place order", "submit"]),
    (Intent::Cancel, &["cancel", "nevermind", "forget it", "clear", "start over"]),
    (Intent::AddItem, &["add", "order", "want", "get", "i'll have", "give me"]),
    (Intent::Help, &["help", "how do i", "?"]),
];

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, input: &str, _history: &[String], _stage: Stage) -> Intent {
        let text = input.to_lowercase();
        for (intent, keywords) in RULES {
            if keywords.iter().any(|keyword| text.contains(keyword)) {
                return *intent;
            }
        }
        Intent::Unknown
    }
}

/// Semantic classifier: embeds the user's message and scores it against
/// per-intent exemplar utterances. Exemplar embeddings are computed once
/// per process behind a single-flight cell.
pub struct EmbeddingClassifier {
    client: Arc<dyn EmbeddingClient>,
    threshold: f32,
    exemplar_embeddings: OnceCell<HashMap<Intent, Vec<Vec<f32>>>>,
}

impl EmbeddingClassifier {
    pub fn new(client: Arc<dyn EmbeddingClient>, threshold: f64) -> Self {
        Self { client, threshold: threshold as f32, exemplar_embeddings: OnceCell::new() }
    }

    async fn exemplar_embeddings(&self) -> anyhow::Result<&HashMap<Intent, Vec<Vec<f32>>>> {
        self.exemplar_embeddings
            .get_or_try_init(|| async {
                let mut by_intent = HashMap::new();
                for (intent, utterances) in intent_exemplars() {
                    let mut vectors = Vec::with_capacity(utterances.len());
                    for utterance in utterances {
                        vectors.push(self.client.embed(utterance).await?);
                    }
                    by_intent.insert(intent, vectors);
                }
                Ok(by_intent)
            })
            .await
    }

    async fn classify_inner(&self, input: &str) -> anyhow::Result<Intent> {
        let user_vector = self.client.embed(input).await?;
        let exemplars = self.exemplar_embeddings().await?;

        let mut best: Option<(Intent, f32)> = None;
        for (intent, vectors) in exemplars {
            let score = vectors
                .iter()
                .map(|vector| cosine_similarity(&user_vector, vector))
                .fold(f32::MIN, f32::max);
            if best.map(|(_, best_score)| score > best_score).unwrap_or(true) {
                best = Some((*intent, score));
            }
        }

        Ok(match best {
            Some((intent, score)) if score >= self.threshold => intent,
            _ => Intent::Unknown,
        })
    }
}

#[async_trait]
impl IntentClassifier for EmbeddingClassifier {
    async fn classify(&self, input: &str, _history: &[String], _stage: Stage) -> Intent {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Intent::Unknown;
        }

        match self.classify_inner(trimmed).await {
            Ok(intent) => intent,
            Err(error) => {
                warn!(
                    event_name = "classifier.degraded",
                    error = %error,
                    "embedding backend failed, degrading to unknown"
                );
                Intent::Unknown
            }
        }
    }
}

/// Fail-soft name cleanup for the awaiting-name turn: strips lead-in
/// phrases ("my name is Alex" -> "Alex") and stray punctuation, falling
/// back to the raw trimmed text when cleaning leaves nothing behind.
pub fn extract_candidate_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let lowered = trimmed.to_lowercase();

    const LEAD_INS: &[&str] =
        &["my name is", "the name is", "name is", "this is", "call me", "it's", "its", "i'm", "i am"];

    // Lead-ins must be whole words, so "Itsuki" is not split by "its".
    let mut candidate = trimmed;
    for lead_in in LEAD_INS {
        if lowered.len() > lead_in.len() + 1 && lowered.starts_with(lead_in) {
            let (_, rest) = trimmed.split_at(lead_in.len());
            if rest.starts_with(char::is_whitespace) {
                candidate = rest.trim_start();
                break;
            }
        }
    }

    let cleaned = candidate.trim_matches(|ch: char| ch.is_ascii_punctuation() || ch.is_whitespace());
    if cleaned.is_empty() {
        trimmed.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use orderly_core::{Intent, Stage};

    use super::{extract_candidate_name, EmbeddingClassifier, IntentClassifier, KeywordClassifier};
    use crate::embedding::EmbeddingClient;

    async fn classify(text: &str) -> Intent {
        KeywordClassifier::new().classify(text, &[], Stage::Idle).await
    }

    #[tokio::test]
    async fn keyword_rules_route_common_phrases() {
        assert_eq!(classify("show me the MENU").await, Intent::ViewMenu);
        assert_eq!(classify("I'll have a cheese burger").await, Intent::AddItem);
        assert_eq!(classify("that's all, thanks").await, Intent::Confirm);
        assert_eq!(classify("nevermind").await, Intent::Cancel);
        assert_eq!(classify("how do i use this").await, Intent::Help);
        assert_eq!(classify("xyzzy").await, Intent::Unknown);
    }

    #[tokio::test]
    async fn cart_is_checked_before_the_generic_order_keyword() {
        assert_eq!(classify("what's in my cart?").await, Intent::ViewCart);
        assert_eq!(classify("show order").await, Intent::ViewCart);
    }

    #[tokio::test]
    async fn place_order_routes_to_confirm_not_add() {
        assert_eq!(classify("place order").await, Intent::Confirm);
    }

    #[tokio::test]
    async fn cancel_my_order_routes_to_cancel_not_add() {
        assert_eq!(classify("cancel my order please").await, Intent::Cancel);
    }

    /// Scripted embedding backend: maps known texts to fixed vectors so
    /// cosine scores are deterministic.
    struct ScriptedEmbeddings {
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingClient for ScriptedEmbeddings {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            if self.fail {
                return Err(anyhow::anyhow!("embedding backend offline"));
            }
            // Menu-ish text points along x, everything else along y.
            if text.to_lowercase().contains("menu") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }
    }

    #[tokio::test]
    async fn embedding_classifier_matches_exemplar_direction() {
        let classifier =
            EmbeddingClassifier::new(Arc::new(ScriptedEmbeddings { fail: false }), 0.3);
        let intent = classifier.classify("show me the menu", &[], Stage::Idle).await;
        assert_eq!(intent, Intent::ViewMenu);
    }

    #[tokio::test]
    async fn embedding_backend_failure_degrades_to_unknown() {
        let classifier = EmbeddingClassifier::new(Arc::new(ScriptedEmbeddings { fail: true }), 0.3);
        let intent = classifier.classify("show me the menu", &[], Stage::Idle).await;
        assert_eq!(intent, Intent::Unknown);
    }

    #[tokio::test]
    async fn empty_input_is_unknown_without_touching_the_backend() {
        let classifier = EmbeddingClassifier::new(Arc::new(ScriptedEmbeddings { fail: true }), 0.3);
        let intent = classifier.classify("   ", &[], Stage::Idle).await;
        assert_eq!(intent, Intent::Unknown);
    }

    #[test]
    fn name_cleanup_strips_lead_ins_and_punctuation() {
        assert_eq!(extract_candidate_name("my name is Alex"), "Alex");
        assert_eq!(extract_candidate_name("It's Sam!"), "Sam");
        assert_eq!(extract_candidate_name("  Jordan  "), "Jordan");
        assert_eq!(extract_candidate_name("call me Riley."), "Riley");
    }

    #[test]
    fn name_cleanup_falls_back_to_raw_text() {
        assert_eq!(extract_candidate_name("!!!"), "!!!");
    }
}
