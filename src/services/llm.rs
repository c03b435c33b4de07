//! LLM provider boundary
//!
//! The pipeline needs two things from a text-generation provider: raw
//! completion (the post generator's base-model stage) and chat (everything
//! else). [`LlmProvider`] is the seam; [`OpenAiCompatibleClient`] adapts any
//! OpenAI-style `/completions` + `/chat/completions` endpoint to it.
//!
//! The client makes exactly one request per call. Retrying is the caller's
//! job, through [`crate::retry::RetryPolicy`].

use crate::error::{KairosError, Result};
use crate::utils::preview;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Configuration for the text-generation provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API root, without the trailing endpoint path
    pub base_url: String,

    /// Environment variable holding the bearer token
    pub api_key_env: String,

    /// Instruction-tuned model used for chat calls
    pub chat_model: String,

    /// Base model used for raw completions
    pub completion_model: String,

    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: Option<u32>,

    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.hyperbolic.xyz/v1".to_string(),
            api_key_env: "HYPERBOLIC_API_KEY".to_string(),
            chat_model: "meta-llama/Meta-Llama-3.1-70B-Instruct".to_string(),
            completion_model: "meta-llama/Meta-Llama-3.1-405B".to_string(),
            max_tokens: 512,
            temperature: 1.0,
            top_p: 0.95,
            top_k: Some(40),
            request_timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Sampling parameters for chat calls
    pub fn chat_params(&self) -> GenerationParams {
        GenerationParams {
            model: self.chat_model.clone(),
            max_tokens: Some(self.max_tokens),
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            stop: Vec::new(),
        }
    }

    /// Sampling parameters for raw completion calls
    pub fn completion_params(&self) -> GenerationParams {
        GenerationParams {
            model: self.completion_model.clone(),
            ..self.chat_params()
        }
    }
}

/// Sampling parameters for one call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: Option<u32>,
    pub stop: Vec<String>,
}

impl GenerationParams {
    pub fn with_stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = stop.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Text-generation provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Raw completion of `prompt`
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Chat completion over `messages`
    async fn chat(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<String>;
}

/// Client for OpenAI-compatible providers (Hyperbolic, OpenRouter, OpenAI)
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "no_stop_sequences")]
    stop: &'a [String],
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "no_stop_sequences")]
    stop: &'a [String],
    stream: bool,
}

fn no_stop_sequences(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    /// Create a client for `config.base_url` authenticated with `api_key`
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(KairosError::Config(format!(
                "{} not set",
                config.api_key_env
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| KairosError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// POST a JSON body and decode the JSON answer into `R`
    async fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| KairosError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(KairosError::Transport(format!(
                "{} returned status {}: {}",
                endpoint,
                status,
                preview(&error_text, 200)
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| KairosError::Transport(e.to_string()))?;

        serde_json::from_str(&text).map_err(|e| {
            KairosError::MalformedResponse(format!("{} body did not decode: {}", endpoint, e))
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleClient {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let request = CompletionRequest {
            model: &params.model,
            prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            stop: &params.stop,
        };

        let response: CompletionResponse = self.post_json("completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| KairosError::MalformedResponse("completion had no choices".to_string()))
    }

    async fn chat(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<String> {
        let request = ChatRequest {
            model: &params.model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            stop: &params.stop,
            stream: false,
        };

        let response: ChatResponse = self.post_json("chat/completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| KairosError::MalformedResponse("chat had no message content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_api_key() {
        let result = OpenAiCompatibleClient::new(&LlmConfig::default(), String::new());
        match result {
            Err(KairosError::Config(msg)) => assert!(msg.contains("HYPERBOLIC_API_KEY")),
            _ => panic!("expected configuration error"),
        }
    }

    #[test]
    fn test_completion_params_use_base_model() {
        let config = LlmConfig::default();
        let params = config.completion_params().with_stop(["<|im_end|>", "<"]);

        assert_eq!(params.model, config.completion_model);
        assert_eq!(params.stop, vec!["<|im_end|>".to_string(), "<".to_string()]);
        assert_eq!(params.top_k, Some(40));
    }

    #[test]
    fn test_chat_request_shape() {
        let messages = vec![ChatMessage::system("rules"), ChatMessage::user("hi")];
        let params = LlmConfig::default().chat_params();
        let request = ChatRequest {
            model: &params.model,
            messages: &messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            stop: &params.stop,
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["stream"], false);
        // Empty stop list is omitted entirely
        assert!(json.get("stop").is_none());
    }

    #[test]
    fn test_chat_response_without_content_decodes() {
        let body = r#"{"choices":[{"message":{"role":"assistant"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
