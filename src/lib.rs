//! # Trio
//!
//! Trio is the orchestration core of a multi-agent group chat: one human talks
//! with up to two AI agents, and the agents answer through a remote
//! [`CompletionProvider`].
//!
//! Every chat runs in one of two modes:
//!
//! * **Default chats** ([`basic`]): each agent answers once, in a freshly
//!   shuffled order. Agents answer sequentially, so every agent sees the
//!   answers of the agents before it. The whole batch is returned (and
//!   committed) at once.
//! * **Reflection chats** ([`reflection`]): the two agents take turns until one
//!   of them agrees with the other, proposes an alternate view, or has nothing
//!   to say. Each turn is streamed to the caller as soon as it exists
//!   ([`stream`]), optionally as Server-Sent Events.
//!
//! Around the two generators the crate provides:
//!
//! * **Storage** ([`store`]): the [`ChatStore`] trait, an in-memory store and
//!   an append-only JSONL store.
//! * **History** ([`history`]): chronological conversation windows fitted to a
//!   token budget.
//! * **Prompts** ([`prompt`]): pure string rendering for both modes.
//! * **Observability** ([`event`]): an [`EventHandler`] callback for every
//!   session, round and turn, on top of `log` records.
//! * **Providers** ([`clients`]): Gemini through its OpenAI-compatible endpoint.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trio::clients::gemini::GeminiProvider;
//! use trio::model::{Agent, Chat, ChatType, User};
//! use trio::store::InMemoryStore;
//! use trio::{ChatService, TrioConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     trio::init_logger();
//!
//!     let config = TrioConfig::from_env();
//!     let store = Arc::new(InMemoryStore::new());
//!     store.insert_chat(
//!         Chat::new(1, 1, "design review", ChatType::Reflection)
//!             .with_agent(Agent::new(1, "Ada"))
//!             .with_agent(Agent::new(2, "Bob")),
//!     )?;
//!
//!     let provider = GeminiProvider::from_config(&std::env::var("GEMINI_API_KEY")?, &config);
//!     let service = ChatService::new(store, Arc::new(provider), config);
//!     let user = User::new(1, "sam", "Sam Doe");
//!
//!     let mut stream = service
//!         .post_reflection_message(1, &user, "Should this be one service or two?")
//!         .await?;
//!     while let Some(turn) = stream.next_event().await {
//!         println!("{}: {}", turn.agent_name, turn.content);
//!     }
//!     println!("{}", stream.finish().await?.outcome);
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming over SSE
//!
//! Any `tokio::io::AsyncWrite` can carry the reflection stream:
//!
//! ```rust,no_run
//! # use trio::stream::{ReflectionStream, SseWriter};
//! # async fn serve(stream: ReflectionStream, socket: tokio::net::TcpStream) -> Result<(), trio::TrioError> {
//! let mut sink = SseWriter::new(socket);
//! let report = stream.forward_to(&mut sink).await?;
//! log::info!("reflection finished: {}", report.outcome);
//! # Ok(())
//! # }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Safe to call from every entry point (binaries, tests); only the first call
/// installs the logger. Verbosity follows `RUST_LOG`.
///
/// ```rust
/// trio::init_logger();
/// trio::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `trio` module.
pub mod trio;

// Re-exporting key items for easier external access.
pub use trio::basic;
pub use trio::clients;
pub use trio::completion;
pub use trio::completion::{Completion, CompletionProvider, ModelClass, TokenUsage};
pub use trio::config;
pub use trio::config::TrioConfig;
pub use trio::error;
pub use trio::error::{ProviderError, TrioError};
pub use trio::event;
pub use trio::event::{EventHandler, OrchestrationEvent};
pub use trio::history;
pub use trio::model;
pub use trio::prompt;
pub use trio::reflection;
pub use trio::reflection::{SessionOutcome, SessionReport};
pub use trio::service;
pub use trio::service::ChatService;
pub use trio::store;
pub use trio::store::ChatStore;
pub use trio::stream;
pub use trio::turn_order;
