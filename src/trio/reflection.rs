//! Turn-taking convergence protocol for reflection chats.
//!
//! Agents answer in a fixed shuffled order. Every answer is emitted to the
//! caller as soon as it exists, then checked against the convergence predicate
//! ([`is_converged`]). A converging answer ends the session. When every agent
//! in the order has answered without converging, the round's answers are
//! appended to the working history and the next round starts with the same
//! order.
//!
//! # State machine
//!
//! ```text
//! RoundStart ──► AgentTurn ──► Evaluate ──┬─► Converged
//!     ▲              ▲                    ├─► AgentTurn (next agent, same RoundState)
//!     │              └────────────────────┤
//!     └──── round exhausted ──────────────┤
//!                                         └─► Aborted (max rounds / consumer gone)
//! ```
//!
//! Provider failures never surface as errors here: the failed turn is emitted
//! with empty content, which converges and ends the session.

use crate::trio::completion::{CompletionProvider, ModelClass, TokenUsage};
use crate::trio::config::DEFAULT_MAX_REFLECTION_ROUNDS;
use crate::trio::error::TrioError;
use crate::trio::event::{emit, EventHandler, OrchestrationEvent};
use crate::trio::model::{Agent, Message, SenderType};
use crate::trio::prompt::ReflectionPrompt;
use crate::trio::store::{record_completion_best_effort, ChatStore, CompletionLog};
use crate::trio::stream::AgentResponse;
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Convergence predicate: case-insensitively, the answer starts with
/// `"agree"`, ends with `"alternate"`, or is empty. Surrounding whitespace is
/// trimmed first, so `"  agree"` converges and whitespace-only text counts as
/// empty.
///
/// ```
/// use trio::reflection::is_converged;
///
/// assert!(is_converged("Agree with you"));
/// assert!(is_converged("I disagree, but let's alternate"));
/// assert!(is_converged(""));
/// assert!(is_converged(" \n"));
/// assert!(is_converged("  agree"));
/// assert!(!is_converged("I disagree"));
/// ```
pub fn is_converged(response: &str) -> bool {
    let normalized = response.trim().to_lowercase();
    normalized.is_empty() || normalized.starts_with("agree") || normalized.ends_with("alternate")
}

/// Each agent's latest answer within one reflection session, kept in the order
/// agents first answered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundState {
    entries: Vec<(u64, String)>,
}

impl RoundState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `response` as the latest answer of `agent_id`, replacing an
    /// earlier answer in place.
    pub fn record(&mut self, agent_id: u64, response: impl Into<String>) {
        let response = response.into();
        match self.entries.iter_mut().find(|(id, _)| *id == agent_id) {
            Some(entry) => entry.1 = response,
            None => self.entries.push((agent_id, response)),
        }
    }

    pub fn get(&self, agent_id: u64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| *id == agent_id)
            .map(|(_, response)| response.as_str())
    }

    pub fn entries(&self) -> &[(u64, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Why a session stopped without converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Every allowed round completed without a converging answer.
    MaxRoundsExceeded,
    /// The receiving half of the event channel was dropped.
    ConsumerDisconnected,
}

/// Terminal state of a reflection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// `agent_id` gave a converging answer.
    Converged { agent_id: u64 },
    Aborted(AbortReason),
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::Converged { agent_id } => write!(f, "converged (agent {})", agent_id),
            SessionOutcome::Aborted(AbortReason::MaxRoundsExceeded) => {
                write!(f, "aborted: max rounds exceeded")
            }
            SessionOutcome::Aborted(AbortReason::ConsumerDisconnected) => {
                write!(f, "aborted: consumer disconnected")
            }
        }
    }
}

/// Summary returned once the producer stops.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    /// Rounds started, including the one the session ended in.
    pub rounds: usize,
    /// Agent turns taken, i.e. completion calls made.
    pub turns: usize,
    pub total_tokens_used: usize,
}

/// Everything one reflection session needs. Owned, because the session runs
/// on its own task.
#[derive(Debug, Clone)]
pub struct ReflectionRequest {
    pub chat_id: u64,
    /// Agents in turn order, already shuffled. Fixed for the whole session.
    pub agents: Vec<Agent>,
    /// Chronological history, including the latest human message.
    pub history: Vec<Message>,
    pub user_message: String,
}

/// Drives the convergence protocol with the deliberate model class.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use trio::clients::gemini::GeminiProvider;
/// use trio::model::Agent;
/// use trio::reflection::{ReflectionOrchestrator, ReflectionRequest};
/// use trio::stream::StreamEmitter;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// let orchestrator = ReflectionOrchestrator::new(Arc::new(GeminiProvider::from_env()?))
///     .with_max_rounds(4);
///
/// let mut stream = StreamEmitter::spawn(
///     orchestrator,
///     ReflectionRequest {
///         chat_id: 1,
///         agents: vec![Agent::new(1, "Ada"), Agent::new(2, "Bob")],
///         history: Vec::new(),
///         user_message: "Tabs or spaces?".into(),
///     },
/// );
///
/// while let Some(turn) = stream.next_event().await {
///     println!("{}: {}", turn.agent_name, turn.content);
/// }
/// let report = stream.finish().await?;
/// println!("{}", report.outcome);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ReflectionOrchestrator {
    provider: Arc<dyn CompletionProvider>,
    max_rounds: usize,
    write_ahead: Option<Arc<dyn ChatStore>>,
    completion_log: Option<Arc<dyn ChatStore>>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl ReflectionOrchestrator {
    /// Orchestrator with the default round cap and no persistence.
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            max_rounds: DEFAULT_MAX_REFLECTION_ROUNDS,
            write_ahead: None,
            completion_log: None,
            event_handler: None,
        }
    }

    /// Cap the number of rounds (builder pattern). After `max_rounds` full
    /// rounds without convergence the session ends as
    /// [`AbortReason::MaxRoundsExceeded`]. At least one round always runs.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Persist every turn into `store` right after it is emitted (builder pattern).
    /// Write failures are logged and do not stop the session.
    pub fn with_write_ahead(mut self, store: Arc<dyn ChatStore>) -> Self {
        self.write_ahead = Some(store);
        self
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

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Run one session, sending every turn on `events` as it is produced.
    ///
    /// `events` should be bounded; a full channel suspends the session until
    /// the consumer catches up. Dropping the receiver ends the session at the
    /// next emission.
    ///
    /// # Errors
    ///
    /// Only [`TrioError::NoAgents`]; provider failures end the session as a
    /// convergence instead.
    pub async fn run(
        &self,
        request: ReflectionRequest,
        events: mpsc::Sender<AgentResponse>,
    ) -> Result<SessionReport, TrioError> {
        let ReflectionRequest {
            chat_id,
            agents,
            mut history,
            user_message,
        } = request;

        if agents.is_empty() {
            return Err(TrioError::NoAgents);
        }

        emit(
            &self.event_handler,
            OrchestrationEvent::SessionStarted {
                chat_id,
                mode: "reflection",
                agent_count: agents.len(),
            },
        )
        .await;

        let mut round_state = RoundState::new();
        let mut round = 0;
        let mut turns = 0;
        let mut total_tokens = 0;

        let outcome = 'session: loop {
            if round >= self.max_rounds {
                break SessionOutcome::Aborted(AbortReason::MaxRoundsExceeded);
            }
            round += 1;
            emit(
                &self.event_handler,
                OrchestrationEvent::RoundStarted { chat_id, round },
            )
            .await;

            for agent in &agents {
                let (response, usage) = self
                    .take_turn(chat_id, agent, round, &history, &user_message, &round_state)
                    .await;
                turns += 1;
                total_tokens += usage.as_ref().map(|u| u.total_tokens).unwrap_or(0);
                round_state.record(agent.id, response.clone());

                let converged = is_converged(&response);
                if usage.is_some() {
                    emit(
                        &self.event_handler,
                        OrchestrationEvent::TurnCompleted {
                            chat_id,
                            agent_id: agent.id,
                            agent_name: agent.name.clone(),
                            tokens_used: usage,
                            response_length: response.len(),
                            converged,
                        },
                    )
                    .await;
                }

                let event = AgentResponse {
                    agent_id: agent.id,
                    agent_name: agent.name.clone(),
                    content: response.clone(),
                };
                let delivered = events.send(event).await.is_ok();

                if let Some(store) = &self.write_ahead {
                    let turn = Message::from_agent(chat_id, agent.id, response);
                    if let Err(err) = store.create_messages(vec![turn]).await {
                        warn!("Write-ahead of turn {} in chat {} failed: {}", turns, chat_id, err);
                    }
                }

                if !delivered {
                    info!("Reflection consumer for chat {} went away", chat_id);
                    break 'session SessionOutcome::Aborted(AbortReason::ConsumerDisconnected);
                }

                if converged {
                    break 'session SessionOutcome::Converged { agent_id: agent.id };
                }
            }

            emit(
                &self.event_handler,
                OrchestrationEvent::RoundCompleted { chat_id, round },
            )
            .await;

            for (agent_id, response) in round_state.entries() {
                history.push(Message::from_agent(chat_id, *agent_id, response.clone()));
            }
        };

        debug!(
            "Reflection session for chat {} ended after {} turns: {}",
            chat_id, turns, outcome
        );

        emit(
            &self.event_handler,
            OrchestrationEvent::SessionFinished {
                chat_id,
                outcome: outcome.to_string(),
                turns,
                total_tokens,
            },
        )
        .await;

        Ok(SessionReport {
            outcome,
            rounds: round,
            turns,
            total_tokens_used: total_tokens,
        })
    }

    /// One completion call. A failed call yields an empty answer and no usage.
    async fn take_turn(
        &self,
        chat_id: u64,
        agent: &Agent,
        round: usize,
        history: &[Message],
        user_message: &str,
        round_state: &RoundState,
    ) -> (String, Option<TokenUsage>) {
        emit(
            &self.event_handler,
            OrchestrationEvent::TurnStarted {
                chat_id,
                agent_id: agent.id,
                agent_name: agent.name.clone(),
                round,
            },
        )
        .await;

        let prompt = ReflectionPrompt {
            agent,
            history,
            user_message,
            round_state,
        }
        .render();

        let result = self.provider.generate(&prompt, ModelClass::Deliberate).await;
        match result {
            Ok(completion) => {
                record_completion_best_effort(
                    &self.completion_log,
                    CompletionLog::new(prompt, &completion, SenderType::Agent, agent.id),
                )
                .await;
                (completion.text, Some(completion.usage))
            }
            Err(err) => {
                let message = err.to_string();
                warn!(
                    "Error generating content for agent {} in chat {}: {}",
                    agent.name, chat_id, message
                );
                emit(
                    &self.event_handler,
                    OrchestrationEvent::TurnFailed {
                        chat_id,
                        agent_id: agent.id,
                        agent_name: agent.name.clone(),
                        error: message,
                    },
                )
                .await;
                (String::new(), None)
            }
        }
    }
}
