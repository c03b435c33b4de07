//! In-process repository
//!
//! Used for dry runs and tests. Nothing survives the process.

use super::{HandleRegistry, MemoryRepository};
use crate::error::Result;
use crate::types::{LongTermMemory, MemoryId, NewMemory};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryRepository {
    memories: RwLock<Vec<LongTermMemory>>,
    handles: RwLock<HashSet<String>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryRepository for InMemoryRepository {
    async fn append(&self, memory: NewMemory) -> Result<LongTermMemory> {
        let mut memories = self.memories.write().await;
        let stored = LongTermMemory {
            id: MemoryId(memories.len() as i64 + 1),
            content: memory.content,
            embedding: memory.embedding,
            significance_score: memory.significance_score,
            created_at: Utc::now(),
        };
        memories.push(stored.clone());
        Ok(stored)
    }

    async fn list_all(&self) -> Result<Vec<LongTermMemory>> {
        Ok(self.memories.read().await.clone())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.memories.read().await.len())
    }
}

#[async_trait]
impl HandleRegistry for InMemoryRepository {
    async fn filter_unknown(&self, handles: &[String]) -> Result<Vec<String>> {
        let known = self.handles.read().await;
        Ok(handles
            .iter()
            .filter(|h| !known.contains(&h.to_lowercase()))
            .cloned()
            .collect())
    }

    async fn remember(&self, handles: &[String]) -> Result<()> {
        let mut known = self.handles.write().await;
        known.extend(handles.iter().map(|h| h.to_lowercase()));
        Ok(())
    }
}
