//! Per-agent prompt rendering.
//!
//! Both renderings are pure string builders: they never fail and never touch
//! shared state.

use crate::trio::history::format_history;
use crate::trio::model::{Agent, Message};
use crate::trio::reflection::RoundState;

/// Inputs for the persona-driven prompt used by default chats.
pub struct BasicPrompt<'a> {
    pub agent: &'a Agent,
    /// The next agent in turn order, if the chat has another agent.
    pub counterpart: Option<&'a Agent>,
    pub history: &'a [Message],
    pub user_name: &'a str,
    pub user_message: &'a str,
}

impl BasicPrompt<'_> {
    /// Render the prompt.
    ///
    /// ```
    /// use trio::model::Agent;
    /// use trio::prompt::BasicPrompt;
    ///
    /// let ada = Agent::new(1, "Ada").with_metadata("", vec!["curious".into(), "kind".into()]);
    /// let bob = Agent::new(2, "Bob");
    /// let prompt = BasicPrompt {
    ///     agent: &ada,
    ///     counterpart: Some(&bob),
    ///     history: &[],
    ///     user_name: "sam",
    ///     user_message: "hello",
    /// }
    /// .render();
    /// assert!(prompt.contains("You are Ada, an AI agent with the following traits: curious, kind."));
    /// assert!(prompt.contains("another AI agent named Bob with traits: ."));
    /// ```
    pub fn render(&self) -> String {
        let (counterpart_name, counterpart_traits) = match self.counterpart {
            Some(other) => (other.name.as_str(), other.traits().join(", ")),
            None => ("", String::new()),
        };

        format!(
            r#"
You are {name}, an AI agent with the following traits: {traits}.
You are in a group chat with a human user called {user} and another AI agent named {other} with traits: {other_traits}.
Chat History:
{history}

The user's latest message is: "{message}"

Please respond to the user's message and, if appropriate, to the other agent's previous message. Refer to them as @<targetname>.
Use your defined traits to guide your response style and content.
Engage in a natural, flowing conversation while keeping responses as short as possible, and feel free to ask questions or make observations to keep the dialogue engaging.
Remember as much context as you can from previous messages and use them when necessary.
"#,
            name = self.agent.name,
            traits = self.agent.traits().join(", "),
            user = self.user_name,
            other = counterpart_name,
            other_traits = counterpart_traits,
            history = format_history(self.history),
            message = self.user_message,
        )
    }
}

/// Inputs for the convergence-protocol prompt used by reflection chats.
pub struct ReflectionPrompt<'a> {
    pub agent: &'a Agent,
    pub history: &'a [Message],
    pub user_message: &'a str,
    pub round_state: &'a RoundState,
}

impl ReflectionPrompt<'_> {
    /// Render the prompt, appending every other agent's latest answer in turn order.
    ///
    /// ```
    /// use trio::model::Agent;
    /// use trio::prompt::ReflectionPrompt;
    /// use trio::reflection::RoundState;
    ///
    /// let ada = Agent::new(1, "Ada");
    /// let mut state = RoundState::new();
    /// state.record(1, "my own answer");
    /// state.record(2, "use a hash map");
    ///
    /// let prompt = ReflectionPrompt {
    ///     agent: &ada,
    ///     history: &[],
    ///     user_message: "how do I dedupe?",
    ///     round_state: &state,
    /// }
    /// .render();
    /// assert!(prompt.ends_with("\nThe other agent's response: use a hash map"));
    /// assert!(!prompt.contains("my own answer"));
    /// ```
    pub fn render(&self) -> String {
        let mut prompt = format!(
            r#"
You are {name}, a helpful AI agent with freedom to provide responses in the best way you see fit.
You are in a group chat with a human user and another AI agent. Your goal is to collaborate with the other agent to respond to the user's message. Your response has three states depending on your alignment with the other agent's response:
1. You can agree with the other agent's response, in which case you must respond ONLY with the word "agree".
2. You can disagree with the other agent's message, in which case you present your opposing view.
3. You can contribute to the other agent's message, which means that you partially agree with their response and present your own view. You must also end your response with the word "alternate".

If there has been no response to the user's message, you can respond with a solution which you deem fit.
Chat History:
{history}

The user's latest message is: "{message}"
"#,
            name = self.agent.name,
            history = format_history(self.history),
            message = self.user_message,
        );

        for (agent_id, response) in self.round_state.entries() {
            if *agent_id != self.agent.id {
                prompt.push_str("\nThe other agent's response: ");
                prompt.push_str(response);
            }
        }

        prompt
    }
}
