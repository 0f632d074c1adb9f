use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use trio::completion::{Completion, CompletionProvider, ModelClass, TokenUsage};
use trio::error::{ProviderError, TrioError};
use trio::model::{Agent, Chat, ChatType, SenderType, User};
use trio::reflection::{AbortReason, SessionOutcome};
use trio::store::{ChatStore, InMemoryStore};
use trio::{ChatService, TrioConfig};

struct MockProvider {
    script: Mutex<VecDeque<Result<String, String>>>,
    fallback: String,
    calls: Mutex<Vec<(String, ModelClass)>>,
}

impl MockProvider {
    fn new(fallback: &str, script: Vec<Result<&str, &str>>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            fallback: fallback.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn generate(
        &self,
        prompt: &str,
        model_class: ModelClass,
    ) -> Result<Completion, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), model_class));
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()));
        match next {
            Ok(text) => Ok(Completion {
                text,
                usage: TokenUsage::new(8, 4),
                model: format!("mock-{}", model_class),
            }),
            Err(message) => Err(message.into()),
        }
    }
}

fn sam() -> User {
    User::new(1, "sam", "Sam Doe")
}

fn setup(provider: Arc<MockProvider>, config: TrioConfig) -> (Arc<InMemoryStore>, ChatService) {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert_chat(
            Chat::new(1, 1, "dinner", ChatType::Default)
                .with_agent(Agent::new(1, "Ada").with_metadata("", vec!["curious".into()]))
                .with_agent(Agent::new(2, "Bob").with_metadata("", vec!["blunt".into()])),
        )
        .unwrap();
    store
        .insert_chat(
            Chat::new(2, 1, "debate", ChatType::Reflection)
                .with_agent(Agent::new(3, "Cy"))
                .with_agent(Agent::new(4, "Di")),
        )
        .unwrap();
    store
        .insert_chat(Chat::new(3, 1, "empty", ChatType::Default))
        .unwrap();
    store
        .insert_chat(Chat::new(4, 99, "someone else's", ChatType::Default).with_agent(Agent::new(5, "Eve")))
        .unwrap();

    let service = ChatService::new(store.clone(), provider, config);
    (store, service)
}

fn seeded() -> TrioConfig {
    TrioConfig {
        rng_seed: Some(3),
        ..TrioConfig::default()
    }
}

#[tokio::test]
async fn test_post_message_commits_human_and_agents() {
    let provider = Arc::new(MockProvider::new("sounds tasty", vec![]));
    let (store, service) = setup(provider.clone(), seeded());

    let reply = service.post_message(1, &sam(), "pasta or rice?").await.unwrap();

    assert_eq!(reply.request_prompt.sender_type, SenderType::User);
    assert_eq!(reply.request_prompt.content, "pasta or rice?");
    assert!(reply.request_prompt.id.is_some());

    assert_eq!(reply.data.len(), 2);
    let mut speakers: Vec<u64> = reply.data.iter().map(|m| m.sender_id).collect();
    speakers.sort_unstable();
    assert_eq!(speakers, vec![1, 2]);
    assert!(reply.data.iter().all(|m| m.id.is_some()));

    let history = store.load_history(1).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].sender_type, SenderType::User);
    assert_eq!(history[1].sender_id, reply.data[0].sender_id);
    assert_eq!(history[2].sender_id, reply.data[1].sender_id);

    let logs = store.completion_logs();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.model == "mock-fast"));
    assert!(logs[0].prompt.contains("pasta or rice?"));
}

#[tokio::test]
async fn test_provider_failure_keeps_human_message() {
    let provider = Arc::new(MockProvider::new("unused", vec![Ok("first"), Err("rate limited")]));
    let (store, service) = setup(provider, seeded());

    let err = service.post_message(1, &sam(), "hello").await.unwrap_err();
    assert!(matches!(err, TrioError::Provider { .. }));

    let history = store.load_history(1).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].sender_type, SenderType::User);
    assert_eq!(history[0].content, "hello");
}

#[tokio::test]
async fn test_validation_happens_before_any_write() {
    let provider = Arc::new(MockProvider::new("hi", vec![]));
    let (store, service) = setup(provider.clone(), seeded());

    assert!(matches!(
        service.post_message(1, &sam(), "   ").await,
        Err(TrioError::Validation(_))
    ));
    assert!(matches!(
        service.post_message(3, &sam(), "anyone?").await,
        Err(TrioError::NoAgents)
    ));
    assert!(matches!(
        service.post_message(42, &sam(), "hello").await,
        Err(TrioError::ChatNotFound(42))
    ));
    assert!(matches!(
        service.post_message(4, &sam(), "hello").await,
        Err(TrioError::ChatNotFound(4))
    ));
    assert!(matches!(
        service.post_message(2, &sam(), "wrong mode").await,
        Err(TrioError::Validation(_))
    ));
    assert!(matches!(
        service.post_reflection_message(1, &sam(), "wrong mode").await,
        Err(TrioError::Validation(_))
    ));

    assert!(store.load_history(1).await.unwrap().is_empty());
    assert!(store.load_history(2).await.unwrap().is_empty());
    assert!(store.load_history(3).await.unwrap().is_empty());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_reflection_commits_only_the_human_message() {
    let provider = Arc::new(MockProvider::new("I disagree", vec![Ok("Use a queue."), Ok("agree")]));
    let (store, service) = setup(provider, seeded());

    let stream = service
        .post_reflection_message(2, &sam(), "queue or topic?")
        .await
        .unwrap();
    let (turns, report) = stream.collect().await;

    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].content, "Use a queue.");
    assert!(matches!(report.unwrap().outcome, SessionOutcome::Converged { .. }));

    let history = store.load_history(2).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "queue or topic?");

    let logs = store.completion_logs();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.model == "mock-deliberate"));
}

#[tokio::test]
async fn test_reflection_honours_config() {
    let provider = Arc::new(MockProvider::new("I disagree", vec![]));
    let config = TrioConfig {
        max_reflection_rounds: 2,
        write_ahead: true,
        ..seeded()
    };
    let (store, service) = setup(provider, config);

    let (turns, report) = service
        .post_reflection_message(2, &sam(), "queue or topic?")
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(turns.len(), 4);
    assert_eq!(
        report.unwrap().outcome,
        SessionOutcome::Aborted(AbortReason::MaxRoundsExceeded)
    );

    // Human message plus every written-ahead turn.
    let history = store.load_history(2).await.unwrap();
    assert_eq!(history.len(), 5);
    assert!(history[1..].iter().all(|m| m.sender_type == SenderType::Agent));
}

#[tokio::test]
async fn test_seeded_services_shuffle_alike() {
    let first = {
        let (_, service) = setup(Arc::new(MockProvider::new("ok", vec![])), seeded());
        service.post_message(1, &sam(), "a").await.unwrap()
    };
    let second = {
        let (_, service) = setup(Arc::new(MockProvider::new("ok", vec![])), seeded());
        service.post_message(1, &sam(), "a").await.unwrap()
    };

    let order = |reply: &trio::service::BasicReply| -> Vec<u64> {
        reply.data.iter().map(|m| m.sender_id).collect()
    };
    assert_eq!(order(&first), order(&second));
}

#[tokio::test]
async fn test_complete_logs_user_as_sender() {
    let provider = Arc::new(MockProvider::new("42", vec![]));
    let (store, service) = setup(provider, seeded());

    let completion = service.complete(&sam(), "meaning of life?").await.unwrap();
    assert_eq!(completion.text, "42");
    assert_eq!(completion.usage.total_tokens, 12);

    let logs = store.completion_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].sender_type, SenderType::User);
    assert_eq!(logs[0].sender_id, 1);
    assert_eq!(logs[0].prompt, "meaning of life?");
    assert_eq!(logs[0].model, "mock-fast");
}

#[tokio::test]
async fn test_complete_surfaces_provider_errors() {
    let provider = Arc::new(MockProvider::new("unused", vec![Err("bad key")]));
    let (store, service) = setup(provider, seeded());

    let err = service.complete(&sam(), "hello").await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to generate response for sam: bad key");
    assert!(store.completion_logs().is_empty());
}
