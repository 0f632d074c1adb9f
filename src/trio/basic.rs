//! One-shot sequential response generation for default chats.
//!
//! Agents answer in the shuffled order they are given. Each agent's prompt is
//! built from a working copy of the history that already contains the answers
//! of the agents before it, so agent *i+1* is conditioned on agent *i*. The
//! calls are therefore strictly sequential.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trio::basic::{BasicRequest, BasicResponseGenerator};
//! use trio::clients::gemini::GeminiProvider;
//! use trio::model::Agent;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let generator = BasicResponseGenerator::new(Arc::new(GeminiProvider::from_env()?));
//! let agents = vec![Agent::new(1, "Ada"), Agent::new(2, "Bob")];
//!
//! let batch = generator
//!     .generate(BasicRequest {
//!         chat_id: 1,
//!         agents: &agents,
//!         history: &[],
//!         user_message: "What should I cook tonight?",
//!         user_name: "sam",
//!     })
//!     .await?;
//!
//! for msg in &batch.messages {
//!     println!("{}: {}", msg.sender_id, msg.content);
//! }
//! # Ok(())
//! # }
//! ```

use crate::trio::completion::{CompletionProvider, ModelClass};
use crate::trio::error::TrioError;
use crate::trio::event::{emit, EventHandler, OrchestrationEvent};
use crate::trio::model::{Agent, Message, SenderType};
use crate::trio::prompt::BasicPrompt;
use crate::trio::store::{record_completion_best_effort, ChatStore, CompletionLog};
use log::{debug, error};
use std::sync::Arc;

/// Everything one basic-mode invocation needs.
pub struct BasicRequest<'a> {
    pub chat_id: u64,
    /// Agents in turn order, already shuffled.
    pub agents: &'a [Agent],
    /// Chronological history, including the latest human message.
    pub history: &'a [Message],
    pub user_message: &'a str,
    pub user_name: &'a str,
}

/// The finished batch: one unsaved agent message per agent, in turn order.
#[derive(Debug)]
pub struct BasicBatch {
    pub messages: Vec<Message>,
    pub total_tokens_used: usize,
}

/// The agent that agent `index` addresses: the next one in turn order,
/// wrapping to the first when more than one agent takes part.
pub fn counterpart_of(agents: &[Agent], index: usize) -> Option<&Agent> {
    if index + 1 < agents.len() {
        agents.get(index + 1)
    } else if agents.len() > 1 {
        agents.first()
    } else {
        None
    }
}

/// Runs one sequential round over the given agents using the fast model class.
pub struct BasicResponseGenerator {
    provider: Arc<dyn CompletionProvider>,
    completion_log: Option<Arc<dyn ChatStore>>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl BasicResponseGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            completion_log: None,
            event_handler: None,
        }
    }

    /// Record a [`CompletionLog`] per call into `store`, best-effort (builder pattern).
    pub fn with_completion_log(mut self, store: Arc<dyn ChatStore>) -> Self {
        self.completion_log = Some(store);
        self
    }

    /// Attach an [`EventHandler`] (builder pattern).
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Generate one answer per agent.
    ///
    /// # Errors
    ///
    /// Any provider failure, or an empty completion, aborts the whole batch
    /// with [`TrioError::Provider`]; answers generated earlier in the batch are
    /// dropped.
    pub async fn generate(&self, request: BasicRequest<'_>) -> Result<BasicBatch, TrioError> {
        let chat_id = request.chat_id;
        emit(
            &self.event_handler,
            OrchestrationEvent::SessionStarted {
                chat_id,
                mode: "basic",
                agent_count: request.agents.len(),
            },
        )
        .await;

        let mut working_history = request.history.to_vec();
        let mut responses = Vec::with_capacity(request.agents.len());
        let mut total_tokens = 0;

        for (index, agent) in request.agents.iter().enumerate() {
            emit(
                &self.event_handler,
                OrchestrationEvent::TurnStarted {
                    chat_id,
                    agent_id: agent.id,
                    agent_name: agent.name.clone(),
                    round: 1,
                },
            )
            .await;

            let prompt = BasicPrompt {
                agent,
                counterpart: counterpart_of(request.agents, index),
                history: &working_history,
                user_name: request.user_name,
                user_message: request.user_message,
            }
            .render();

            let completion = match self.provider.generate(&prompt, ModelClass::Fast).await {
                Ok(completion) if !completion.text.is_empty() => completion,
                Ok(_) => {
                    let failure = "empty completion".to_string();
                    return Err(self
                        .fail(chat_id, agent, failure, responses.len(), total_tokens)
                        .await);
                }
                Err(err) => {
                    let failure = err.to_string();
                    return Err(self
                        .fail(chat_id, agent, failure, responses.len(), total_tokens)
                        .await);
                }
            };

            total_tokens += completion.usage.total_tokens;
            debug!(
                "Agent '{}' answered in chat {} ({} chars, {} tokens)",
                agent.name,
                chat_id,
                completion.text.len(),
                completion.usage.total_tokens
            );

            record_completion_best_effort(
                &self.completion_log,
                CompletionLog::new(prompt, &completion, SenderType::Agent, agent.id),
            )
            .await;

            emit(
                &self.event_handler,
                OrchestrationEvent::TurnCompleted {
                    chat_id,
                    agent_id: agent.id,
                    agent_name: agent.name.clone(),
                    tokens_used: Some(completion.usage.clone()),
                    response_length: completion.text.len(),
                    converged: false,
                },
            )
            .await;

            let message = Message::from_agent(chat_id, agent.id, completion.text);
            working_history.push(message.clone());
            responses.push(message);
        }

        emit(
            &self.event_handler,
            OrchestrationEvent::SessionFinished {
                chat_id,
                outcome: "completed".to_string(),
                turns: responses.len(),
                total_tokens,
            },
        )
        .await;

        Ok(BasicBatch {
            messages: responses,
            total_tokens_used: total_tokens,
        })
    }

    /// Report a failed turn and close the session.
    async fn fail(
        &self,
        chat_id: u64,
        agent: &Agent,
        message: String,
        turns: usize,
        total_tokens: usize,
    ) -> TrioError {
        error!(
            "Basic generation failed for agent '{}' in chat {}: {}",
            agent.name, chat_id, message
        );
        emit(
            &self.event_handler,
            OrchestrationEvent::TurnFailed {
                chat_id,
                agent_id: agent.id,
                agent_name: agent.name.clone(),
                error: message.clone(),
            },
        )
        .await;
        emit(
            &self.event_handler,
            OrchestrationEvent::SessionFinished {
                chat_id,
                outcome: "failed".to_string(),
                turns,
                total_tokens,
            },
        )
        .await;
        TrioError::Provider {
            agent: agent.name.clone(),
            message,
        }
    }
}
