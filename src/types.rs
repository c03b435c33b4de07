//! Core data types for the Kairos agent pipeline
//!
//! This module defines the records that flow through one pipeline cycle:
//! long-term memories and their recalled projection, the agent's own posts,
//! feed items reduced to text, and the actions the decision engines propose.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Identifier assigned by the memory repository
///
/// Ids increase monotonically, so ordering by id is insertion order. Retrieval
/// relies on that to break similarity ties deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(pub i64);

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted, immutable long-term memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermMemory {
    pub id: MemoryId,
    pub content: String,
    pub embedding: Vec<f32>,
    /// 1-10, or 0 when the memory was never scored
    pub significance_score: f32,
    pub created_at: DateTime<Utc>,
}

/// A memory about to be appended; the repository assigns id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewMemory {
    pub content: String,
    pub embedding: Vec<f32>,
    pub significance_score: f32,
}

/// What retrieval hands back to prompt construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecalledMemory {
    pub content: String,
    pub significance_score: f32,
}

/// One of the agent's own recent posts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            created_at: None,
        }
    }
}

/// Timeline or notification entry reduced to text plus author handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    /// Handle without the leading `@`
    pub author: String,
    pub text: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub replies: u64,
    #[serde(default)]
    pub author_followers: u64,
}

impl FeedItem {
    /// Render the item the way it is fed into prompts
    pub fn as_context_line(&self) -> String {
        format!("New post on my timeline from @{}: {}", self.author, self.text)
    }
}

/// An action a decision engine wants the dispatcher to perform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ProposedAction {
    Post { content: String },
    Reply { content: String, target_id: String },
    Follow { handle: String, score: f32 },
    Transfer { to: String, amount_sol: f64 },
}

impl ProposedAction {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ProposedAction::Post { .. } => "post",
            ProposedAction::Reply { .. } => "reply",
            ProposedAction::Follow { .. } => "follow",
            ProposedAction::Transfer { .. } => "transfer",
        }
    }
}

impl fmt::Display for ProposedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposedAction::Post { content } => write!(f, "I posted: {}", content),
            ProposedAction::Reply { content, target_id } => {
                write!(f, "I replied to {}: {}", target_id, content)
            }
            ProposedAction::Follow { handle, .. } => write!(f, "I followed @{}", handle),
            ProposedAction::Transfer { to, amount_sol } => {
                write!(f, "I sent {} SOL to {}", amount_sol, to)
            }
        }
    }
}

/// Result of dispatching one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action: ProposedAction,
    /// Remote id or signature on success, error text on failure
    pub result: Result<String, String>,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Summary of one executed pipeline cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub actions_proposed: usize,
    pub actions_succeeded: usize,
    /// Score of the memory written back, if one cleared the threshold
    pub stored_significance: Option<u8>,
    pub elapsed: Duration,
}
