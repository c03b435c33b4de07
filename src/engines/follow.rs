//! Follow candidate selection

use super::{extract_json_array, CycleContext, DecisionEngine};
use crate::error::KairosError;
use crate::prompts::follow_decision_prompt;
use crate::retry::RetryPolicy;
use crate::services::{ChatMessage, GenerationParams, LlmProvider};
use crate::storage::HandleRegistry;
use crate::types::ProposedAction;
use crate::utils::preview;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

static HANDLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z0-9_]{1,15})").expect("valid handle regex"));

#[derive(Debug, Deserialize)]
struct FollowDecision {
    username: String,
    score: f32,
}

/// Handles mentioned in `texts`, without `@`, first occurrence kept.
///
/// Handles are case-insensitive; the spelling seen first wins.
pub fn extract_handles<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut handles = Vec::new();

    for text in texts {
        for capture in HANDLE.captures_iter(text) {
            let handle = &capture[1];
            if seen.insert(handle.to_lowercase()) {
                handles.push(handle.to_string());
            }
        }
    }
    handles
}

pub struct FollowEngine {
    llm: Arc<dyn LlmProvider>,
    params: GenerationParams,
    registry: Arc<dyn HandleRegistry>,
    min_score: f32,
    retry: RetryPolicy,
}

impl FollowEngine {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        params: GenerationParams,
        registry: Arc<dyn HandleRegistry>,
        min_score: f32,
    ) -> Self {
        Self {
            llm,
            params,
            registry,
            min_score,
            retry: RetryPolicy::decision(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Mentioned handles not considered in an earlier cycle
    async fn new_candidates(&self, context: &CycleContext) -> Vec<String> {
        let mentioned = extract_handles(context.scanned_texts());
        if mentioned.is_empty() {
            return Vec::new();
        }

        let unknown = match self.registry.filter_unknown(&mentioned).await {
            Ok(unknown) => unknown,
            Err(e) => {
                warn!("Handle registry unavailable: {}", e);
                return Vec::new();
            }
        };

        if let Err(e) = self.registry.remember(&unknown).await {
            warn!("Failed to record handles: {}", e);
        }
        unknown
    }
}

#[async_trait]
impl DecisionEngine for FollowEngine {
    fn name(&self) -> &'static str {
        "follow"
    }

    async fn decide(&self, context: &CycleContext) -> Vec<ProposedAction> {
        let candidates = self.new_candidates(context).await;
        if candidates.is_empty() {
            debug!("No new handles to consider");
            return Vec::new();
        }

        let messages = [ChatMessage::user(follow_decision_prompt(
            &context.timeline_text(),
            &candidates,
        ))];

        let messages = &messages;
        let result = self
            .retry
            .run("follow decision", |_| async move {
                let response = self.llm.chat(messages, &self.params).await?;
                extract_json_array::<FollowDecision>(&response).ok_or_else(|| {
                    KairosError::MalformedResponse(format!(
                        "no follow array in: {}",
                        preview(&response, 80)
                    ))
                })
            })
            .await;

        let decisions = match result {
            Ok(decisions) => decisions,
            Err(e) => {
                warn!("Follow decision gave up: {}", e);
                return Vec::new();
            }
        };

        let actions: Vec<ProposedAction> = decisions
            .into_iter()
            .filter(|d| d.score >= self.min_score)
            .filter_map(|d| {
                let wanted = d.username.trim().trim_start_matches('@');
                candidates
                    .iter()
                    .find(|c| c.eq_ignore_ascii_case(wanted))
                    .map(|handle| ProposedAction::Follow {
                        handle: handle.clone(),
                        score: d.score,
                    })
            })
            .collect();

        info!(
            "Proposing {} follow(s) from {} candidate(s)",
            actions.len(),
            candidates.len()
        );
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::MockLlmProvider;
    use crate::services::LlmConfig;
    use crate::storage::InMemoryRepository;
    use crate::types::{FeedItem, Post};
    use std::time::Duration;

    fn feed_item(author: &str, text: &str) -> FeedItem {
        FeedItem {
            id: "1".to_string(),
            author: author.to_string(),
            text: text.to_string(),
            likes: 100,
            replies: 10,
            author_followers: 1000,
        }
    }

    fn engine(mock: MockLlmProvider, registry: Arc<InMemoryRepository>) -> FollowEngine {
        FollowEngine::new(
            Arc::new(mock),
            LlmConfig::default().chat_params(),
            registry,
            0.5,
        )
        .with_retry(RetryPolicy::fixed(3, Duration::from_millis(1)))
    }

    #[test]
    fn test_extract_handles_dedupes_in_order() {
        let handles = extract_handles([
            "gm @alice and @Bob",
            "@ALICE again, @carol_99",
            "email me at x@y.com",
        ]);
        assert_eq!(handles, vec!["alice", "Bob", "carol_99", "y"]);
    }

    #[test]
    fn test_extract_handles_caps_length() {
        let handles = extract_handles(["@abcdefghijklmnopqrstu"]);
        assert_eq!(handles, vec!["abcdefghijklmno"]);
    }

    #[tokio::test]
    async fn test_no_handles_skips_llm() {
        let mut mock = MockLlmProvider::new();
        mock.expect_chat().never();

        let context = CycleContext {
            recent_posts: vec![Post::new("1", "no mentions here")],
            ..Default::default()
        };
        let actions = engine(mock, Arc::new(InMemoryRepository::new()))
            .decide(&context)
            .await;
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn test_proposes_scored_candidates() {
        let mut mock = MockLlmProvider::new();
        mock.expect_chat()
            .withf(|messages, _| messages[0].content.contains("alice, bob"))
            .times(1)
            .returning(|_, _| {
                Ok(r#"Here: [{"username": "@Alice", "score": 0.9},
                    {"username": "bob", "score": 0.2},
                    {"username": "mallory", "score": 1.0}]"#
                    .to_string())
            });

        let context = CycleContext {
            feed: vec![feed_item("dave", "shoutout to @alice and @bob")],
            ..Default::default()
        };
        let actions = engine(mock, Arc::new(InMemoryRepository::new()))
            .decide(&context)
            .await;

        assert_eq!(
            actions,
            vec![ProposedAction::Follow {
                handle: "alice".to_string(),
                score: 0.9
            }]
        );
    }

    #[tokio::test]
    async fn test_known_handles_are_not_reconsidered() {
        let registry = Arc::new(InMemoryRepository::new());
        registry.remember(&["alice".to_string()]).await.unwrap();

        let mut mock = MockLlmProvider::new();
        mock.expect_chat()
            .withf(|messages, _| {
                messages[0].content.contains("Twitter usernames:\nbob")
            })
            .times(1)
            .returning(|_, _| Ok("[]".to_string()));

        let context = CycleContext {
            feed: vec![feed_item("dave", "@alice @bob")],
            ..Default::default()
        };
        let engine = engine(mock, registry.clone());
        assert!(engine.decide(&context).await.is_empty());

        // bob is now known too, so a second pass needs no LLM call
        let unknown = registry
            .filter_unknown(&["alice".to_string(), "bob".to_string()])
            .await
            .unwrap();
        assert!(unknown.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_response_is_retried() {
        let mut mock = MockLlmProvider::new();
        let mut calls = 0;
        mock.expect_chat().times(2).returning(move |_, _| {
            calls += 1;
            Ok(if calls == 1 {
                "I would follow alice".to_string()
            } else {
                r#"[{"username": "alice", "score": 0.5}]"#.to_string()
            })
        });

        let context = CycleContext {
            feed: vec![feed_item("dave", "@alice")],
            ..Default::default()
        };
        let actions = engine(mock, Arc::new(InMemoryRepository::new()))
            .decide(&context)
            .await;
        assert_eq!(actions.len(), 1);
    }
}
