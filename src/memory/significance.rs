//! Significance scoring
//!
//! Rates a candidate memory from 1 to 10 by asking the chat provider. The
//! answer is free text; the first integer anywhere in it is taken and clamped.
//! When every attempt fails the scorer returns [`UNSCORED`].

use crate::error::KairosError;
use crate::prompts::{significance_prompt, SIGNIFICANCE_USER_MESSAGE};
use crate::retry::RetryPolicy;
use crate::services::{ChatMessage, GenerationParams, LlmProvider};
use crate::utils::preview;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Returned when no attempt produced a score.
///
/// Distinct from a genuine low score of 1. Downstream code only ever checks
/// it to skip persistence; nothing else interprets it.
pub const UNSCORED: u8 = 0;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("valid integer regex"));

/// LLM-backed significance scorer
pub struct SignificanceScorer {
    llm: Arc<dyn LlmProvider>,
    params: GenerationParams,
    persona: String,
    retry: RetryPolicy,
}

impl SignificanceScorer {
    pub fn new(llm: Arc<dyn LlmProvider>, params: GenerationParams, persona: impl Into<String>) -> Self {
        Self {
            llm,
            params,
            persona: persona.into(),
            retry: RetryPolicy::significance(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Score `text`: 1..=10 on success, [`UNSCORED`] once retries run out
    pub async fn score(&self, text: &str) -> u8 {
        let messages = [
            ChatMessage::system(significance_prompt(&self.persona, text)),
            ChatMessage::user(SIGNIFICANCE_USER_MESSAGE),
        ];

        let messages = &messages;
        let result = self
            .retry
            .run("significance scoring", |_| async move {
                let response = self.llm.chat(messages, &self.params).await?;
                debug!("Significance response: {}", preview(&response, 80));
                extract_score(&response).ok_or_else(|| {
                    KairosError::MalformedResponse(format!(
                        "no score in response: {}",
                        preview(&response, 80)
                    ))
                })
            })
            .await;

        match result {
            Ok(score) => score,
            Err(e) => {
                warn!("Significance scoring gave up: {}", e);
                UNSCORED
            }
        }
    }
}

/// First integer literal in `response`, clamped into [1, 10].
///
/// Digit runs too long for a `u64` are necessarily above 10 and clamp there.
pub fn extract_score(response: &str) -> Option<u8> {
    let digits = INTEGER.find(response)?.as_str();
    let score = match digits.parse::<u64>() {
        Ok(value) => value.clamp(MIN_SCORE as u64, MAX_SCORE as u64) as u8,
        Err(_) => MAX_SCORE,
    };
    Some(score)
}
