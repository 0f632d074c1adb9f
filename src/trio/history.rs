//! Conversation window loading and formatting.
//!
//! [`load_history`] pulls a chat's messages from a [`ChatStore`] in canonical
//! order and applies a [`TruncationPolicy`]. The default policy returns the
//! full history; callers must not rely on the budget being enforced unless they
//! opt into [`TruncationPolicy::KeepLatest`].
//!
//! ```
//! use trio::history::format_history;
//! use trio::model::Message;
//!
//! let history = vec![Message::from_user(1, 1, "hi"), Message::from_agent(1, 2, "hello")];
//! assert_eq!(format_history(&history), "User: hi\nAgent: hello\n");
//! ```

use crate::trio::error::TrioError;
use crate::trio::model::Message;
use crate::trio::store::ChatStore;
use log::debug;
use std::fmt::Write;

/// Default context budget, in approximate tokens.
pub const MAX_CONTEXT_TOKENS: usize = 4000;

/// How a loaded history is fitted into the context budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TruncationPolicy {
    /// Return the whole history regardless of the budget.
    #[default]
    Unbounded,
    /// Keep the longest suffix of messages that fits the budget. The latest
    /// message is always kept, even when it alone exceeds the budget.
    KeepLatest,
}

/// Estimates the number of tokens in a string.
/// Uses an approximate formula: one token per 4 characters.
pub fn estimate_token_count(text: &str) -> usize {
    (text.len() / 4).max(1)
}

fn estimate_message_token_count(message: &Message) -> usize {
    // one token for the sender annotation
    1 + estimate_token_count(&message.content)
}

/// Load a chat's history in chronological order, fitted to `max_tokens`
/// according to `policy`.
///
/// Storage failures propagate as-is; no partial history is returned.
pub async fn load_history(
    store: &dyn ChatStore,
    chat_id: u64,
    max_tokens: usize,
    policy: TruncationPolicy,
) -> Result<Vec<Message>, TrioError> {
    let history = store.load_history(chat_id).await?;
    let window = apply_policy(history, max_tokens, policy);
    debug!(
        "Loaded {} messages for chat {} (budget {} tokens, {:?})",
        window.len(),
        chat_id,
        max_tokens,
        policy
    );
    Ok(window)
}

/// Fit an already-ordered history into the budget.
pub fn apply_policy(
    mut history: Vec<Message>,
    max_tokens: usize,
    policy: TruncationPolicy,
) -> Vec<Message> {
    match policy {
        TruncationPolicy::Unbounded => history,
        TruncationPolicy::KeepLatest => {
            let mut used = 0;
            let mut keep = 0;
            for message in history.iter().rev() {
                let cost = estimate_message_token_count(message);
                if keep > 0 && used + cost > max_tokens {
                    break;
                }
                used += cost;
                keep += 1;
            }
            history.split_off(history.len() - keep)
        }
    }
}

/// Serialize messages as `"<senderType>: <content>\n"` lines.
pub fn format_history(history: &[Message]) -> String {
    let mut formatted = String::new();
    for msg in history {
        // Writing to a String cannot fail.
        let _ = writeln!(formatted, "{}: {}", msg.sender_type, msg.content);
    }
    formatted
}
