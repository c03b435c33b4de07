//! Common test utilities and fakes

#![allow(dead_code)]

use async_trait::async_trait;
use kairos_core::error::{KairosError, Result};
use kairos_core::platform::{NewsSource, SocialPlatform};
use kairos_core::services::{ChatMessage, EmbeddingProvider, GenerationParams, LlmProvider};
use kairos_core::storage::MemoryRepository;
use kairos_core::types::{FeedItem, LongTermMemory, NewMemory, Post};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type ChatFn = Box<dyn Fn(&[ChatMessage]) -> Result<String> + Send + Sync>;
type CompleteFn = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// LLM whose answers are computed from the request by closures
pub struct ScriptedLlm {
    chat: ChatFn,
    complete: CompleteFn,
    pub chat_calls: AtomicUsize,
    pub complete_calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(
        chat: impl Fn(&[ChatMessage]) -> Result<String> + Send + Sync + 'static,
        complete: impl Fn(&str) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            chat: Box::new(chat),
            complete: Box::new(complete),
            chat_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
        }
    }

    /// Route chat calls by the user message the component sends
    pub fn by_purpose(short_term_memory: &str, score: &str, formatted_post: &str) -> Self {
        let stm = short_term_memory.to_string();
        let score = score.to_string();
        let post = formatted_post.to_string();

        Self::new(
            move |messages| {
                let user = messages.last().map(|m| m.content.as_str()).unwrap_or("");
                if user.contains("internal monologue") {
                    Ok(stm.clone())
                } else if user.contains("score") {
                    Ok(score.clone())
                } else {
                    Ok(post.clone())
                }
            },
            |_| Ok("Tweet: a raw draft".to_string()),
        )
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        (self.complete)(prompt)
    }

    async fn chat(&self, messages: &[ChatMessage], _params: &GenerationParams) -> Result<String> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        (self.chat)(messages)
    }
}

/// Deterministic 3-dimensional embedder keyed on a few words
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    /// One axis per topic, plus a small constant so nothing is all-zero
    pub fn vector_for(text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        let axis = |word: &str| if text.contains(word) { 1.0 } else { 0.0 };
        vec![
            axis("market") + 0.1,
            axis("music") + 0.1,
            axis("food") + 0.1,
        ]
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(KairosError::Transport("embeddings returned status 500".to_string()));
        }
        Ok(Self::vector_for(text))
    }

    fn dimensions(&self) -> usize {
        3
    }
}

/// In-memory social platform that records everything sent to it
#[derive(Default)]
pub struct RecordingSocial {
    pub own_posts: Vec<Post>,
    pub timeline: Vec<FeedItem>,
    pub mentions: Vec<FeedItem>,
    pub offline: bool,
    pub posted: Mutex<Vec<String>>,
    pub followed: Mutex<Vec<String>>,
}

impl RecordingSocial {
    pub fn posted(&self) -> Vec<String> {
        self.posted.lock().unwrap().clone()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            Err(KairosError::Transport("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SocialPlatform for RecordingSocial {
    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>> {
        self.check_online()?;
        Ok(self.own_posts.iter().take(limit).cloned().collect())
    }

    async fn post(&self, content: &str) -> Result<String> {
        self.check_online()?;
        let mut posted = self.posted.lock().unwrap();
        posted.push(content.to_string());
        Ok(format!("post-{}", posted.len()))
    }

    async fn reply(&self, content: &str, target_id: &str) -> Result<String> {
        self.post(&format!("re {}: {}", target_id, content)).await
    }

    async fn lookup_user(&self, handle: &str) -> Result<Option<String>> {
        self.check_online()?;
        Ok(Some(format!("id-{}", handle)))
    }

    async fn follow(&self, user_id: &str) -> Result<bool> {
        self.check_online()?;
        self.followed.lock().unwrap().push(user_id.to_string());
        Ok(true)
    }

    async fn timeline(&self) -> Result<Vec<FeedItem>> {
        self.check_online()?;
        Ok(self.timeline.clone())
    }

    async fn notifications(&self) -> Result<Vec<FeedItem>> {
        self.check_online()?;
        Ok(self.mentions.clone())
    }
}

pub struct StaticNews(pub Vec<String>);

#[async_trait]
impl NewsSource for StaticNews {
    async fn search(&self, _query: &str) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Repository whose every operation fails
pub struct BrokenRepository;

#[async_trait]
impl MemoryRepository for BrokenRepository {
    async fn append(&self, _memory: NewMemory) -> Result<LongTermMemory> {
        Err(KairosError::Storage("database is locked".to_string()))
    }

    async fn list_all(&self) -> Result<Vec<LongTermMemory>> {
        Err(KairosError::Storage("database is locked".to_string()))
    }
}

pub fn feed_item(id: &str, author: &str, text: &str) -> FeedItem {
    FeedItem {
        id: id.to_string(),
        author: author.to_string(),
        text: text.to_string(),
        likes: 50,
        replies: 5,
        author_followers: 1000,
    }
}
