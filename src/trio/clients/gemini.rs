use crate::trio::completion::{Completion, CompletionProvider, ModelClass, TokenUsage};
use crate::trio::config::TrioConfig;
use crate::trio::error::ProviderError;
use async_trait::async_trait;
use log::error;
use openai_rust::chat;
use openai_rust2 as openai_rust;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_FAST_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_DELIBERATE_MODEL: &str = "gemini-1.5-pro";

/// Gemini through its OpenAI-compatible chat completions endpoint.
pub struct GeminiProvider {
    client: openai_rust::Client,
    pub fast_model: String,
    pub deliberate_model: String,
}

impl GeminiProvider {
    /// Client with the default base URL and the `gemini-1.5-flash` /
    /// `gemini-1.5-pro` model pair.
    pub fn new(secret_key: &str) -> Self {
        Self::new_with_base_url(secret_key, DEFAULT_BASE_URL)
    }

    /// This function is used to create a GeminiProvider with a custom base URL
    /// The default base URL is "<https://generativelanguage.googleapis.com/v1beta/>"
    pub fn new_with_base_url(secret_key: &str, base_url: &str) -> Self {
        GeminiProvider {
            client: openai_rust::Client::new_with_base_url(secret_key, base_url),
            fast_model: DEFAULT_FAST_MODEL.to_string(),
            deliberate_model: DEFAULT_DELIBERATE_MODEL.to_string(),
        }
    }

    /// Reads the key from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| "GEMINI_API_KEY is not set")?;
        Ok(Self::new(&key))
    }

    /// Client using the model pair named in `config`.
    pub fn from_config(secret_key: &str, config: &TrioConfig) -> Self {
        Self::new(secret_key).with_models(&config.fast_model, &config.deliberate_model)
    }

    /// Override the model identifiers behind each [`ModelClass`] (builder pattern).
    pub fn with_models(mut self, fast: impl Into<String>, deliberate: impl Into<String>) -> Self {
        self.fast_model = fast.into();
        self.deliberate_model = deliberate.into();
        self
    }

    pub fn model_for(&self, model_class: ModelClass) -> &str {
        match model_class {
            ModelClass::Fast => &self.fast_model,
            ModelClass::Deliberate => &self.deliberate_model,
        }
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn generate(
        &self,
        prompt: &str,
        model_class: ModelClass,
    ) -> Result<Completion, ProviderError> {
        let model = self.model_for(model_class).to_string();
        let messages = vec![chat::Message {
            role: "user".to_owned(),
            content: prompt.to_string(),
        }];

        let url_path = Some("/v1beta/chat/completions".to_string());
        let arguments = chat::ChatArguments::new(&model, messages);

        let response = match self.client.create_chat(arguments, url_path).await {
            Ok(response) => response,
            Err(err) => {
                if log::log_enabled!(log::Level::Error) {
                    error!("GeminiProvider::generate error ({}): {}", model, err);
                }
                return Err(err.into());
            }
        };

        let text = response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or("Gemini returned no candidates")?;

        Ok(Completion {
            text,
            usage: TokenUsage {
                input_tokens: response.usage.prompt_tokens as usize,
                output_tokens: response.usage.completion_tokens as usize,
                total_tokens: response.usage.total_tokens as usize,
            },
            model,
        })
    }
}
