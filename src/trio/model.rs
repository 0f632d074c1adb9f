//! Chat, agent, message and user records consumed by the orchestration core.
//!
//! Records are created by the surrounding CRUD layer; from the core's
//! perspective they are read-only, except for new [`Message`]s appended by the
//! [`ChatStore`](crate::store::ChatStore).
//!
//! Serialized field names are camelCase so that records round-trip with the
//! JSON the chat frontend already speaks:
//!
//! ```
//! use trio::model::{Message, SenderType};
//!
//! let msg = Message::from_user(7, 1, "hi");
//! let json = serde_json::to_value(&msg).unwrap();
//! assert_eq!(json["senderType"], "User");
//! assert_eq!(json["chatId"], 7);
//! ```

use crate::trio::error::TrioError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum number of traits an agent persona may carry.
pub const MAX_TRAITS: usize = 4;

/// Maximum number of agents in any chat.
pub const MAX_AGENTS: usize = 2;

/// Chat flavour. Selects which response generator serves the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChatType {
    /// Persona-driven chat served by the basic generator. Up to two agents.
    Default,
    /// Convergence-protocol chat. Exactly two agents without persona metadata.
    Reflection,
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatType::Default => write!(f, "DEFAULT"),
            ChatType::Reflection => write!(f, "REFLECTION"),
        }
    }
}

impl FromStr for ChatType {
    type Err = TrioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEFAULT" => Ok(ChatType::Default),
            "REFLECTION" => Ok(ChatType::Reflection),
            other => Err(TrioError::Validation(format!("unknown chat type '{}'", other))),
        }
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SenderType {
    User,
    Agent,
}

impl fmt::Display for SenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderType::User => write!(f, "User"),
            SenderType::Agent => write!(f, "Agent"),
        }
    }
}

impl FromStr for SenderType {
    type Err = TrioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "User" => Ok(SenderType::User),
            "Agent" => Ok(SenderType::Agent),
            other => Err(TrioError::Validation(format!("unknown sender type '{}'", other))),
        }
    }
}

/// The human participant. Only `username` reaches the prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub username: String,
    pub full_name: String,
}

impl User {
    pub fn new(id: u64, username: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            full_name: full_name.into(),
        }
    }
}

/// Persona metadata for agents in default chats.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// Speech register hint (e.g. `"gen-z"`). Stored, not rendered.
    pub lingo: String,
    /// Ordered persona traits, at most [`MAX_TRAITS`].
    pub traits: Vec<String>,
}

/// An AI participant in a chat.
///
/// # Examples
///
/// ```
/// use trio::model::Agent;
///
/// let plain = Agent::new(1, "Ada");
/// assert!(plain.traits().is_empty());
///
/// let witty = Agent::new(2, "Bob").with_metadata("casual", vec!["witty".into(), "brief".into()]);
/// assert_eq!(witty.traits(), &["witty".to_string(), "brief".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AgentMetadata>,
}

impl Agent {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            metadata: None,
        }
    }

    /// Attach persona metadata (builder pattern).
    pub fn with_metadata(mut self, lingo: impl Into<String>, traits: Vec<String>) -> Self {
        self.metadata = Some(AgentMetadata {
            lingo: lingo.into(),
            traits,
        });
        self
    }

    /// Persona traits, or an empty slice when the agent has no metadata.
    pub fn traits(&self) -> &[String] {
        self.metadata
            .as_ref()
            .map(|m| m.traits.as_slice())
            .unwrap_or(&[])
    }
}

/// A single chat message.
///
/// `id` is assigned by the store when the message is committed; messages built
/// during orchestration carry `None` until then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Option<u64>,
    pub external_id: Uuid,
    pub content: String,
    pub sender_type: SenderType,
    /// Resolves to a [`User`] or an [`Agent`] depending on `sender_type`.
    pub sender_id: u64,
    pub chat_id: u64,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn build(chat_id: u64, sender_type: SenderType, sender_id: u64, content: String) -> Self {
        Self {
            id: None,
            external_id: Uuid::new_v4(),
            content,
            sender_type,
            sender_id,
            chat_id,
            created_at: Utc::now(),
        }
    }

    /// A message written by the human participant.
    pub fn from_user(chat_id: u64, user_id: u64, content: impl Into<String>) -> Self {
        Self::build(chat_id, SenderType::User, user_id, content.into())
    }

    /// A message produced by an agent.
    pub fn from_agent(chat_id: u64, agent_id: u64, content: impl Into<String>) -> Self {
        Self::build(chat_id, SenderType::Agent, agent_id, content.into())
    }
}

/// A conversation between one human and up to two agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: u64,
    pub external_id: Uuid,
    pub chat_name: String,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub user_id: u64,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub agents: Vec<Agent>,
}

impl Chat {
    pub fn new(id: u64, user_id: u64, chat_name: impl Into<String>, chat_type: ChatType) -> Self {
        Self {
            id,
            external_id: Uuid::new_v4(),
            chat_name: chat_name.into(),
            chat_type,
            user_id,
            messages: Vec::new(),
            agents: Vec::new(),
        }
    }

    /// Add an agent (builder pattern). Call [`Chat::validate`] afterwards.
    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agents.push(agent);
        self
    }

    /// Check the chat-type invariants.
    ///
    /// # Examples
    ///
    /// ```
    /// use trio::model::{Agent, Chat, ChatType};
    ///
    /// let lonely = Chat::new(1, 1, "r", ChatType::Reflection).with_agent(Agent::new(1, "A"));
    /// assert!(lonely.validate().is_err());
    ///
    /// let pair = lonely.with_agent(Agent::new(2, "B"));
    /// assert!(pair.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), TrioError> {
        if self.agents.len() > MAX_AGENTS {
            return Err(TrioError::Validation(format!(
                "chat {} has {} agents, at most {} are allowed",
                self.id,
                self.agents.len(),
                MAX_AGENTS
            )));
        }

        for agent in &self.agents {
            if agent.traits().len() > MAX_TRAITS {
                return Err(TrioError::Validation(format!(
                    "agent '{}' has {} traits, at most {} are allowed",
                    agent.name,
                    agent.traits().len(),
                    MAX_TRAITS
                )));
            }
        }

        if self.chat_type == ChatType::Reflection {
            if self.agents.len() != MAX_AGENTS {
                return Err(TrioError::Validation(format!(
                    "reflection chat {} needs exactly {} agents, found {}",
                    self.id,
                    MAX_AGENTS,
                    self.agents.len()
                )));
            }
            if let Some(agent) = self.agents.iter().find(|a| a.metadata.is_some()) {
                return Err(TrioError::Validation(format!(
                    "reflection agent '{}' must not carry persona metadata",
                    agent.name
                )));
            }
        }

        Ok(())
    }

    pub fn get_agent(&self, id: u64) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }
}
