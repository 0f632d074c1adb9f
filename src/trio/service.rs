//! Request-level entry points tying the components together.
//!
//! [`ChatService`] owns the store, the provider and the shared turn-order
//! source, and runs one workflow per call:
//!
//! ```text
//! post_message             post_reflection_message        complete
//! ────────────             ───────────────────────        ────────
//! validate chat            validate chat                  call provider (Fast)
//! commit human message     commit human message           log completion
//! load history             load history
//! shuffle agents           shuffle agents
//! BasicResponseGenerator   spawn ReflectionOrchestrator
//! commit agent batch       return ReflectionStream
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trio::clients::gemini::GeminiProvider;
//! use trio::model::{Agent, Chat, ChatType, User};
//! use trio::service::ChatService;
//! use trio::store::InMemoryStore;
//! use trio::TrioConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = TrioConfig::from_env();
//! let store = Arc::new(InMemoryStore::new());
//! store.insert_chat(
//!     Chat::new(1, 1, "dinner", ChatType::Default)
//!         .with_agent(Agent::new(1, "Ada"))
//!         .with_agent(Agent::new(2, "Bob")),
//! )?;
//!
//! let provider = GeminiProvider::from_config(&std::env::var("GEMINI_API_KEY")?, &config);
//! let service = ChatService::new(store, Arc::new(provider), config);
//!
//! let user = User::new(1, "sam", "Sam Doe");
//! let reply = service.post_message(1, &user, "What should I cook?").await?;
//! for message in &reply.data {
//!     println!("agent {}: {}", message.sender_id, message.content);
//! }
//! # Ok(())
//! # }
//! ```

use crate::trio::basic::{BasicRequest, BasicResponseGenerator};
use crate::trio::completion::{Completion, CompletionProvider, ModelClass};
use crate::trio::config::TrioConfig;
use crate::trio::error::TrioError;
use crate::trio::event::EventHandler;
use crate::trio::history::load_history;
use crate::trio::model::{Chat, ChatType, Message, SenderType, User};
use crate::trio::reflection::{ReflectionOrchestrator, ReflectionRequest};
use crate::trio::store::{record_completion_best_effort, ChatStore, CompletionLog};
use crate::trio::stream::{ReflectionStream, StreamEmitter};
use crate::trio::turn_order::TurnOrderSelector;
use log::{error, info};
use std::sync::Arc;

/// Result of a default-chat message: the committed human message and the
/// committed agent answers, in turn order.
#[derive(Debug, Clone)]
pub struct BasicReply {
    pub request_prompt: Message,
    pub data: Vec<Message>,
}

pub struct ChatService {
    store: Arc<dyn ChatStore>,
    provider: Arc<dyn CompletionProvider>,
    turn_order: Arc<TurnOrderSelector>,
    config: TrioConfig,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl ChatService {
    /// Service over `store` and `provider`. The turn-order source is seeded
    /// from `config.rng_seed` when set, from entropy otherwise.
    pub fn new(
        store: Arc<dyn ChatStore>,
        provider: Arc<dyn CompletionProvider>,
        config: TrioConfig,
    ) -> Self {
        let turn_order = match config.rng_seed {
            Some(seed) => TurnOrderSelector::seeded(seed),
            None => TurnOrderSelector::from_entropy(),
        };
        Self {
            store,
            provider,
            turn_order: Arc::new(turn_order),
            config,
            event_handler: None,
        }
    }

    /// Share an existing turn-order source (builder pattern).
    pub fn with_turn_order(mut self, selector: Arc<TurnOrderSelector>) -> Self {
        self.turn_order = selector;
        self
    }

    /// Attach an [`EventHandler`] to every generator this service runs (builder pattern).
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn config(&self) -> &TrioConfig {
        &self.config
    }

    /// Post `content` to a default chat and wait for every agent's answer.
    ///
    /// The human message is committed before generation and stays committed
    /// when generation fails. The agent answers are committed together, only
    /// after all of them were generated.
    pub async fn post_message(
        &self,
        chat_id: u64,
        user: &User,
        content: &str,
    ) -> Result<BasicReply, TrioError> {
        let chat = self.load_owned_chat(chat_id, user, ChatType::Default).await?;
        validate_content(content)?;
        if chat.agents.is_empty() {
            return Err(TrioError::NoAgents);
        }

        let request_prompt = self.commit_human_message(chat_id, user, content).await?;
        let history = self.load_window(chat_id).await?;
        let agents = self.turn_order.shuffle(&chat.agents);

        let mut generator = BasicResponseGenerator::new(Arc::clone(&self.provider))
            .with_completion_log(Arc::clone(&self.store));
        if let Some(handler) = &self.event_handler {
            generator = generator.with_event_handler(Arc::clone(handler));
        }

        let batch = generator
            .generate(BasicRequest {
                chat_id,
                agents: &agents,
                history: &history,
                user_message: content,
                user_name: &user.username,
            })
            .await?;

        let data = self.store.create_messages(batch.messages).await.map_err(|err| {
            error!("Error saving agent responses for chat {}: {}", chat_id, err);
            err
        })?;

        info!(
            "Chat {}: {} agent answers committed ({} tokens)",
            chat_id,
            data.len(),
            batch.total_tokens_used
        );

        Ok(BasicReply {
            request_prompt,
            data,
        })
    }

    /// Post `content` to a reflection chat and start the convergence session.
    ///
    /// Only the human message is committed (plus every turn, when write-ahead
    /// is enabled). Turns are delivered through the returned stream.
    pub async fn post_reflection_message(
        &self,
        chat_id: u64,
        user: &User,
        content: &str,
    ) -> Result<ReflectionStream, TrioError> {
        let chat = self
            .load_owned_chat(chat_id, user, ChatType::Reflection)
            .await?;
        validate_content(content)?;

        self.commit_human_message(chat_id, user, content).await?;
        let history = self.load_window(chat_id).await?;
        let agents = self.turn_order.shuffle(&chat.agents);

        let mut orchestrator = ReflectionOrchestrator::new(Arc::clone(&self.provider))
            .with_max_rounds(self.config.max_reflection_rounds)
            .with_completion_log(Arc::clone(&self.store));
        if self.config.write_ahead {
            orchestrator = orchestrator.with_write_ahead(Arc::clone(&self.store));
        }
        if let Some(handler) = &self.event_handler {
            orchestrator = orchestrator.with_event_handler(Arc::clone(handler));
        }

        Ok(StreamEmitter::spawn(
            orchestrator,
            ReflectionRequest {
                chat_id,
                agents,
                history,
                user_message: content.to_string(),
            },
        ))
    }

    /// Send `text` straight to the fast model on behalf of `user`.
    pub async fn complete(&self, user: &User, text: &str) -> Result<Completion, TrioError> {
        validate_content(text)?;

        let completion = self
            .provider
            .generate(text, ModelClass::Fast)
            .await
            .map_err(|err| TrioError::Provider {
                agent: user.username.clone(),
                message: err.to_string(),
            })?;

        record_completion_best_effort(
            &Some(Arc::clone(&self.store)),
            CompletionLog::new(text, &completion, SenderType::User, user.id),
        )
        .await;

        Ok(completion)
    }

    /// Load `chat_id`, hiding chats of other users, and check it is usable
    /// in `mode`.
    async fn load_owned_chat(
        &self,
        chat_id: u64,
        user: &User,
        mode: ChatType,
    ) -> Result<Chat, TrioError> {
        let chat = self.store.load_chat(chat_id).await?;
        if chat.user_id != user.id {
            return Err(TrioError::ChatNotFound(chat_id));
        }
        chat.validate()?;
        if chat.chat_type != mode {
            return Err(TrioError::Validation(format!(
                "chat {} is a {} chat, not {}",
                chat_id, chat.chat_type, mode
            )));
        }
        Ok(chat)
    }

    async fn commit_human_message(
        &self,
        chat_id: u64,
        user: &User,
        content: &str,
    ) -> Result<Message, TrioError> {
        let mut saved = self
            .store
            .create_messages(vec![Message::from_user(chat_id, user.id, content)])
            .await?;
        saved
            .pop()
            .ok_or_else(|| TrioError::Storage("store returned an empty batch".to_string()))
    }

    async fn load_window(&self, chat_id: u64) -> Result<Vec<Message>, TrioError> {
        load_history(
            self.store.as_ref(),
            chat_id,
            self.config.max_context_tokens,
            self.config.truncation,
        )
        .await
    }
}

fn validate_content(content: &str) -> Result<(), TrioError> {
    if content.trim().is_empty() {
        return Err(TrioError::Validation("message content must not be empty".to_string()));
    }
    Ok(())
}
