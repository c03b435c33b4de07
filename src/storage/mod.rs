//! Storage layer for the Kairos pipeline
//!
//! Provides the persistence collaborator the memory store appends to, plus
//! the registry of social handles the follow engine has already considered.

pub mod codec;
pub mod memory;
pub mod sqlite;

use crate::error::Result;
use crate::types::{LongTermMemory, NewMemory};
use async_trait::async_trait;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

/// Append-only persistence for long-term memories
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    /// Persist a memory; the repository assigns id and timestamp
    async fn append(&self, memory: NewMemory) -> Result<LongTermMemory>;

    /// Every stored memory in insertion order
    async fn list_all(&self) -> Result<Vec<LongTermMemory>>;

    /// Number of stored memories
    async fn count(&self) -> Result<usize> {
        Ok(self.list_all().await?.len())
    }
}

/// Handles the agent has already seen and considered following
#[async_trait]
pub trait HandleRegistry: Send + Sync {
    /// The subset of `handles` not seen before, in input order
    async fn filter_unknown(&self, handles: &[String]) -> Result<Vec<String>>;

    /// Mark `handles` as seen
    async fn remember(&self, handles: &[String]) -> Result<()>;
}
