//! Post generation
//!
//! Stage one asks the base model to continue a persona prompt. Its output is
//! raw and often carries several candidates or a stray prefix, so stage two
//! hands it to the chat model with a fixed formatting instruction.

use super::{CycleContext, DecisionEngine};
use crate::error::KairosError;
use crate::prompts::{post_prompt, POST_FORMATTER_INSTRUCTION};
use crate::retry::RetryPolicy;
use crate::services::{ChatMessage, GenerationParams, LlmProvider};
use crate::types::ProposedAction;
use crate::utils::preview;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stop sequences for the completion stage
pub const POST_STOP_SEQUENCES: [&str; 2] = ["<|im_end|>", "<"];

pub struct PostEngine {
    llm: Arc<dyn LlmProvider>,
    completion_params: GenerationParams,
    chat_params: GenerationParams,
    persona: String,
    retry: RetryPolicy,
}

impl PostEngine {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        completion_params: GenerationParams,
        chat_params: GenerationParams,
        persona: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            completion_params: completion_params.with_stop(POST_STOP_SEQUENCES),
            chat_params,
            persona: persona.into(),
            retry: RetryPolicy::decision(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn draft(&self, context: &CycleContext) -> Option<String> {
        let prompt = post_prompt(
            &self.persona,
            &context.external_context,
            &context.short_term_memory,
            &context.long_term_memories,
            &context.recent_posts,
        );

        let prompt = prompt.as_str();
        let result = self
            .retry
            .run("post drafting", |_| async move {
                let text = self.llm.complete(prompt, &self.completion_params).await?;
                non_blank(text, "empty post draft")
            })
            .await;

        match result {
            Ok(draft) => {
                debug!("Post draft: {}", preview(&draft, 120));
                Some(draft)
            }
            Err(e) => {
                warn!("Post drafting gave up: {}", e);
                None
            }
        }
    }

    async fn format(&self, draft: &str) -> Option<String> {
        let messages = [
            ChatMessage::system(POST_FORMATTER_INSTRUCTION),
            ChatMessage::user(draft),
        ];

        let messages = &messages;
        let result = self
            .retry
            .run("post formatting", |_| async move {
                let text = self.llm.chat(messages, &self.chat_params).await?;
                non_blank(text, "empty formatted post")
            })
            .await;

        match result {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Post formatting gave up: {}", e);
                None
            }
        }
    }
}

fn non_blank(text: String, what: &str) -> crate::error::Result<String> {
    if text.trim().is_empty() {
        Err(KairosError::MalformedResponse(what.to_string()))
    } else {
        Ok(text)
    }
}

/// Trim whitespace and one layer of surrounding quotes
pub fn clean_post(text: &str) -> String {
    let trimmed = text.trim();
    let pairs = [('"', '"'), ('\'', '\''), ('\u{201c}', '\u{201d}')];

    for (open, close) in pairs {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

#[async_trait]
impl DecisionEngine for PostEngine {
    fn name(&self) -> &'static str {
        "post"
    }

    async fn decide(&self, context: &CycleContext) -> Vec<ProposedAction> {
        let Some(draft) = self.draft(context).await else {
            return Vec::new();
        };
        let Some(formatted) = self.format(&draft).await else {
            return Vec::new();
        };

        let content = clean_post(&formatted);
        if content.is_empty() {
            return Vec::new();
        }

        info!("Proposing post: {}", preview(&content, 120));
        vec![ProposedAction::Post { content }]
    }
}
