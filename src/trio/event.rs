//! Orchestration event system.
//!
//! Provides a callback-based observability layer for both response generators.
//! Implement [`EventHandler`] to receive real-time notifications about session
//! lifecycle, round boundaries, and every agent turn (including failed
//! completion calls, which the reflection protocol otherwise absorbs silently).
//!
//! These events are for operators. The client-facing turn stream is the
//! separate [`AgentResponse`](crate::stream::AgentResponse) channel.
//!
//! # Example
//!
//! ```rust,no_run
//! use trio::event::{EventHandler, OrchestrationEvent};
//! use async_trait::async_trait;
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl EventHandler for Printer {
//!     async fn on_orchestration_event(&self, event: &OrchestrationEvent) {
//!         if let OrchestrationEvent::TurnCompleted { agent_name, converged, .. } = event {
//!             println!("{} answered (converged: {})", agent_name, converged);
//!         }
//!     }
//! }
//! ```

use crate::trio::completion::TokenUsage;
use async_trait::async_trait;
use std::sync::Arc;

/// Events emitted by [`BasicResponseGenerator`](crate::basic::BasicResponseGenerator)
/// and [`ReflectionOrchestrator`](crate::reflection::ReflectionOrchestrator).
///
/// # Event Flow (reflection session)
///
/// ```text
/// SessionStarted
///   └─ RoundStarted { round: 1 }
///       ├─ TurnStarted / TurnCompleted   (agent A)
///       └─ TurnStarted / TurnCompleted   (agent B)
///   └─ RoundCompleted { round: 1 }
///   └─ RoundStarted { round: 2 } ...
/// SessionFinished
/// ```
///
/// A converging turn ends the session without a `RoundCompleted`.
#[derive(Debug, Clone)]
pub enum OrchestrationEvent {
    SessionStarted {
        chat_id: u64,
        /// `"basic"` or `"reflection"`.
        mode: &'static str,
        agent_count: usize,
    },

    RoundStarted {
        chat_id: u64,
        /// 1-based round number.
        round: usize,
    },

    /// Fired before the completion call of one agent turn.
    TurnStarted {
        chat_id: u64,
        agent_id: u64,
        agent_name: String,
        round: usize,
    },

    /// Fired after an agent turn produced text.
    TurnCompleted {
        chat_id: u64,
        agent_id: u64,
        agent_name: String,
        tokens_used: Option<TokenUsage>,
        response_length: usize,
        /// Always `false` in basic mode.
        converged: bool,
    },

    /// The completion call failed. Fatal in basic mode; mapped to an empty,
    /// converging response in reflection mode.
    TurnFailed {
        chat_id: u64,
        agent_id: u64,
        agent_name: String,
        error: String,
    },

    /// Every agent took a non-converging turn in this round.
    RoundCompleted {
        chat_id: u64,
        round: usize,
    },

    SessionFinished {
        chat_id: u64,
        /// Human-readable terminal state, e.g. `"converged"` or
        /// `"aborted: max rounds exceeded"`.
        outcome: String,
        turns: usize,
        total_tokens: usize,
    },
}

/// Receiver for [`OrchestrationEvent`]s. The default implementation ignores
/// everything, so implementors only override what they care about.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_orchestration_event(&self, _event: &OrchestrationEvent) {}
}

/// Forward `event` to `handler` when one is registered.
pub(crate) async fn emit(handler: &Option<Arc<dyn EventHandler>>, event: OrchestrationEvent) {
    if let Some(handler) = handler {
        handler.on_orchestration_event(&event).await;
    }
}
