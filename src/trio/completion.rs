//! A CompletionProvider is a wrapper around a generative model service.
//! It turns a single prompt into generated text and reports token usage.
//! It does not keep track of the conversation; the orchestrators render the
//! whole context into the prompt on every call.

use crate::trio::error::ProviderError;
use async_trait::async_trait;
use std::fmt;

/// Model class requested by the caller. Providers map each class to a
/// concrete model identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelClass {
    /// Low-latency model, used by the basic generator.
    Fast,
    /// Higher-quality, slower model, used by the reflection protocol.
    Deliberate,
}

impl fmt::Display for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelClass::Fast => write!(f, "fast"),
            ModelClass::Deliberate => write!(f, "deliberate"),
        }
    }
}

/// How many tokens were spent on prompt vs. completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// Result of one successful completion call.
#[derive(Clone, Debug)]
pub struct Completion {
    /// Generated text. May be empty; callers decide what empty means.
    pub text: String,
    pub usage: TokenUsage,
    /// Concrete model identifier that served the call, for completion logs.
    pub model: String,
}

/// Trait defining the interface to a generative model service.
///
/// Implementations must be shareable across tasks: the reflection producer
/// runs on its own tokio task and holds an `Arc<dyn CompletionProvider>`.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use trio::completion::{Completion, CompletionProvider, ModelClass, TokenUsage};
/// use trio::error::ProviderError;
///
/// struct Echo;
///
/// #[async_trait]
/// impl CompletionProvider for Echo {
///     async fn generate(&self, prompt: &str, _class: ModelClass) -> Result<Completion, ProviderError> {
///         Ok(Completion {
///             text: prompt.to_string(),
///             usage: TokenUsage::new(1, 1),
///             model: "echo".into(),
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate text for `prompt` using the model mapped to `model_class`.
    async fn generate(
        &self,
        prompt: &str,
        model_class: ModelClass,
    ) -> Result<Completion, ProviderError>;
}
