//! Action decision engines
//!
//! Each engine looks at the same immutable [`CycleContext`] and proposes zero
//! or more actions. Engines never fail past their boundary: exhausted
//! retries or a broken collaborator mean "no action this cycle".

pub mod follow;
pub mod post;
pub mod transfer;

use crate::prompts::{format_feed, format_posts};
use crate::types::{FeedItem, Post, ProposedAction, RecalledMemory};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

pub use follow::{extract_handles, FollowEngine};
pub use post::{clean_post, PostEngine};
pub use transfer::{extract_addresses, TransferEngine};

/// Everything one cycle knows, built once and shared read-only
#[derive(Debug, Clone, Default)]
pub struct CycleContext {
    pub short_term_memory: String,
    pub recalled: Vec<RecalledMemory>,

    /// `recalled` rendered for prompts
    pub long_term_memories: String,

    pub recent_posts: Vec<Post>,
    pub feed: Vec<FeedItem>,

    /// Feed lines and headlines, one per entry
    pub external_context: Vec<String>,
}

impl CycleContext {
    /// Texts scanned for handles and addresses: feed first, then own posts
    pub fn scanned_texts(&self) -> impl Iterator<Item = &str> {
        self.feed
            .iter()
            .map(|item| item.text.as_str())
            .chain(self.recent_posts.iter().map(|post| post.content.as_str()))
    }

    /// Timeline and own posts rendered for decision prompts
    pub fn timeline_text(&self) -> String {
        format!(
            "{}\n\nMy own recent posts:\n{}",
            format_feed(&self.feed),
            format_posts(&self.recent_posts)
        )
    }
}

/// A per-cycle action proposer
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn decide(&self, context: &CycleContext) -> Vec<ProposedAction>;
}

/// Decode the first `[...]` span in `text` as a JSON array.
///
/// Chat models wrap JSON in prose or code fences; everything outside the
/// outermost brackets is ignored.
pub(crate) fn extract_json_array<T: DeserializeOwned>(text: &str) -> Option<Vec<T>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}
