//! Short-term memory synthesis
//!
//! Once per cycle the recent posts and external context are compressed into a
//! first-person working summary. The summary lives for one cycle only.

use crate::error::KairosError;
use crate::prompts::{short_term_memory_prompt, SHORT_TERM_USER_MESSAGE};
use crate::retry::RetryPolicy;
use crate::services::{ChatMessage, GenerationParams, LlmProvider};
use crate::types::Post;
use crate::utils::preview;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ShortTermMemorySynthesizer {
    llm: Arc<dyn LlmProvider>,
    params: GenerationParams,
    persona: String,
    retry: RetryPolicy,
}

impl ShortTermMemorySynthesizer {
    pub fn new(llm: Arc<dyn LlmProvider>, params: GenerationParams, persona: impl Into<String>) -> Self {
        Self {
            llm,
            params,
            persona: persona.into(),
            retry: RetryPolicy::short_term_memory(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Produce this cycle's working summary.
    ///
    /// Returns the trimmed provider text, or an empty string when every
    /// attempt failed. Empty means "no short-term memory available".
    pub async fn synthesize(&self, recent_posts: &[Post], external_context: &[String]) -> String {
        let messages = [
            ChatMessage::system(short_term_memory_prompt(
                &self.persona,
                recent_posts,
                external_context,
            )),
            ChatMessage::user(SHORT_TERM_USER_MESSAGE),
        ];

        let messages = &messages;
        let result = self
            .retry
            .run("short-term memory synthesis", |_| async move {
                let response = self.llm.chat(messages, &self.params).await?;
                let trimmed = response.trim();
                if trimmed.is_empty() {
                    return Err(KairosError::MalformedResponse(
                        "empty short-term memory".to_string(),
                    ));
                }
                Ok(trimmed.to_string())
            })
            .await;

        match result {
            Ok(memory) => {
                info!("Short-term memory: {}", preview(&memory, 120));
                memory
            }
            Err(e) => {
                warn!("Short-term memory synthesis gave up: {}", e);
                String::new()
            }
        }
    }
}
