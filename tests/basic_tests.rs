use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use trio::basic::{BasicRequest, BasicResponseGenerator};
use trio::completion::{Completion, CompletionProvider, ModelClass, TokenUsage};
use trio::error::{ProviderError, TrioError};
use trio::event::{EventHandler, OrchestrationEvent};
use trio::model::{Agent, Chat, ChatType, Message, SenderType};
use trio::store::InMemoryStore;

/// Answers from a script, then with numbered replies.
struct MockProvider {
    script: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<(String, ModelClass)>>,
}

impl MockProvider {
    fn new() -> Self {
        Self::scripted(Vec::new())
    }

    fn scripted(script: Vec<Result<&str, &str>>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<(String, ModelClass)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn generate(
        &self,
        prompt: &str,
        model_class: ModelClass,
    ) -> Result<Completion, ProviderError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push((prompt.to_string(), model_class));
            prompts.len()
        };
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("reply-{}", call)));
        match next {
            Ok(text) => Ok(Completion {
                text,
                usage: TokenUsage::new(10, 5),
                model: "mock-fast".to_string(),
            }),
            Err(message) => Err(message.into()),
        }
    }
}

#[derive(Default)]
struct RecordingHandler {
    events: Mutex<Vec<OrchestrationEvent>>,
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn on_orchestration_event(&self, event: &OrchestrationEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn agents() -> Vec<Agent> {
    vec![
        Agent::new(10, "Ada").with_metadata("formal", vec!["precise".into(), "calm".into()]),
        Agent::new(20, "Bob").with_metadata("casual", vec!["witty".into()]),
    ]
}

fn request<'a>(agents: &'a [Agent], history: &'a [Message]) -> BasicRequest<'a> {
    BasicRequest {
        chat_id: 1,
        agents,
        history,
        user_message: "what should I cook?",
        user_name: "sam",
    }
}

#[tokio::test]
async fn test_two_agents_answer_in_turn_order() {
    let provider = Arc::new(MockProvider::new());
    let generator = BasicResponseGenerator::new(provider.clone());
    let agents = agents();
    let history = vec![Message::from_user(1, 1, "what should I cook?")];

    let batch = generator.generate(request(&agents, &history)).await.unwrap();

    assert_eq!(batch.messages.len(), 2);
    assert_eq!(batch.messages[0].sender_id, 10);
    assert_eq!(batch.messages[1].sender_id, 20);
    assert!(batch
        .messages
        .iter()
        .all(|m| m.sender_type == SenderType::Agent && m.chat_id == 1 && m.id.is_none()));
    assert_eq!(batch.messages[0].content, "reply-1");
    assert_eq!(batch.total_tokens_used, 30);

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts.iter().all(|(_, class)| *class == ModelClass::Fast));
}

#[tokio::test]
async fn test_later_agent_sees_earlier_answer() {
    let provider = Arc::new(MockProvider::new());
    let generator = BasicResponseGenerator::new(provider.clone());
    let agents = agents();
    let history = vec![Message::from_user(1, 1, "what should I cook?")];

    generator.generate(request(&agents, &history)).await.unwrap();

    let prompts = provider.prompts();
    let (first, _) = &prompts[0];
    let (second, _) = &prompts[1];

    assert!(first.contains("User: what should I cook?\n"));
    assert!(!first.contains("reply-1"));
    assert!(second.contains("Agent: reply-1\n"));

    assert!(first.contains("You are Ada, an AI agent with the following traits: precise, calm."));
    assert!(first.contains("another AI agent named Bob with traits: witty."));
    // The last agent addresses the first one.
    assert!(second.contains("another AI agent named Ada with traits: precise, calm."));
    assert!(second.contains("a human user called sam"));
}

#[tokio::test]
async fn test_provider_failure_aborts_batch() {
    let provider = Arc::new(MockProvider::scripted(vec![Ok("fine"), Err("quota exceeded")]));
    let store = Arc::new(InMemoryStore::new());
    store
        .insert_chat(Chat::new(1, 1, "c", ChatType::Default))
        .unwrap();
    let generator = BasicResponseGenerator::new(provider).with_completion_log(store.clone());
    let agents = agents();

    let err = generator.generate(request(&agents, &[])).await.unwrap_err();
    match err {
        TrioError::Provider { agent, message } => {
            assert_eq!(agent, "Bob");
            assert!(message.contains("quota exceeded"));
        }
        other => panic!("unexpected error: {}", other),
    }

    // Only the successful call left a completion log.
    let logs = store.completion_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].sender_id, 10);
    assert_eq!(logs[0].total_tokens, 15);
    assert_eq!(logs[0].model, "mock-fast");
}

#[tokio::test]
async fn test_empty_completion_is_a_failure() {
    let provider = Arc::new(MockProvider::scripted(vec![Ok("")]));
    let generator = BasicResponseGenerator::new(provider.clone());
    let agents = agents();

    let err = generator.generate(request(&agents, &[])).await.unwrap_err();
    assert!(matches!(err, TrioError::Provider { ref agent, .. } if agent == "Ada"));
    assert_eq!(provider.prompts().len(), 1);
}

#[tokio::test]
async fn test_single_agent_has_no_counterpart() {
    let provider = Arc::new(MockProvider::new());
    let generator = BasicResponseGenerator::new(provider.clone());
    let solo = vec![Agent::new(10, "Ada")];

    let batch = generator.generate(request(&solo, &[])).await.unwrap();
    assert_eq!(batch.messages.len(), 1);

    let (prompt, _) = &provider.prompts()[0];
    assert!(prompt.contains("You are Ada, an AI agent with the following traits: ."));
    assert!(prompt.contains("another AI agent named  with traits: ."));
}

#[tokio::test]
async fn test_events_follow_turns() {
    let provider = Arc::new(MockProvider::scripted(vec![Ok("first"), Err("boom")]));
    let handler = Arc::new(RecordingHandler::default());
    let generator = BasicResponseGenerator::new(provider).with_event_handler(handler.clone());
    let agents = agents();

    assert!(generator.generate(request(&agents, &[])).await.is_err());

    let events = handler.events.lock().unwrap();
    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            OrchestrationEvent::SessionStarted { .. } => "session_started",
            OrchestrationEvent::TurnStarted { .. } => "turn_started",
            OrchestrationEvent::TurnCompleted { .. } => "turn_completed",
            OrchestrationEvent::TurnFailed { .. } => "turn_failed",
            OrchestrationEvent::SessionFinished { .. } => "session_finished",
            _ => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "session_started",
            "turn_started",
            "turn_completed",
            "turn_started",
            "turn_failed",
            "session_finished"
        ]
    );
    match events.last() {
        Some(OrchestrationEvent::SessionFinished {
            outcome,
            turns,
            total_tokens,
            ..
        }) => {
            assert_eq!(outcome, "failed");
            assert_eq!(*turns, 1);
            assert_eq!(*total_tokens, 15);
        }
        other => panic!("unexpected last event: {:?}", other),
    }
}
