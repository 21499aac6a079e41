use orderly_core::Intent;

/// Example utterances per intent, used by the semantic classifier. The
/// user's message is embedded and compared against every exemplar; an
/// intent's score is its best-matching exemplar.
///
/// `ProvideName` has no exemplars because it is only reachable through the
/// awaiting-name stage short-circuit, and `Unknown` is the fallback, never
/// a match target.
pub fn intent_exemplars() -> Vec<(Intent, Vec<&'static str>)> {
    vec![
        (
            Intent::ViewMenu,
            vec![
                "Show me the menu",
                "What do you have",
                "What's available",
                "What are my options",
                "Can I see what you offer",
                "What drinks do you have",
                "What can I get here",
            ],
        ),
        (
            Intent::AddItem,
            vec![
                "I'll take item 1",
                "Give me the second one",
                "I want number 2",
                "Order the first item please",
                "Can I get a burger",
                "I'd like to have the third option",
                "I'll have the cheese burger",
                "Put in an order for a soda",
                "Add a pizza to my order",
            ],
        ),
        (
            Intent::ViewCart,
            vec![
                "What's in my cart",
                "Show my order",
                "What did I order so far",
                "Can I see my cart",
                "Review my order",
            ],
        ),
        (
            Intent::Confirm,
            vec![
                "Confirm my order",
                "That's all, checkout please",
                "I'm done, place the order",
                "Submit my order",
                "Checkout",
            ],
        ),
        (
            Intent::Cancel,
            vec![
                "Cancel my order",
                "Nevermind, forget it",
                "Clear my cart",
                "Start over",
                "I don't want it anymore",
            ],
        ),
        (
            Intent::Help,
            vec![
                "Help",
                "How do I order",
                "What can you do",
                "How does this work",
                "I'm confused",
            ],
        ),
    ]
}
