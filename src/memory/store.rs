//! Long-term memory store
//!
//! Retrieval is two-staged: memories are *selected* by cosine similarity to
//! the query and then *presented* ordered by significance. Both orderings are
//! stable, so ties keep insertion order.

use crate::error::{KairosError, Result};
use crate::services::cosine_similarity;
use crate::storage::MemoryRepository;
use crate::types::{LongTermMemory, NewMemory, RecalledMemory};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Default number of memories recalled per query
pub const DEFAULT_TOP_K: usize = 5;

/// Rendered when retrieval finds nothing
pub const NO_RELEVANT_MEMORIES: &str = "No relevant memories found.";

const MEMORIES_HEADER: &str = "Past memories and thoughts:";

/// Significance-weighted long-term memory with embedding retrieval
pub struct MemoryStore {
    repository: Arc<dyn MemoryRepository>,
    /// Expected embedding length; `None` accepts any length on write
    dimensions: Option<usize>,
}

impl MemoryStore {
    pub fn new(repository: Arc<dyn MemoryRepository>) -> Self {
        Self {
            repository,
            dimensions: None,
        }
    }

    /// Reject writes whose embedding is not `dimensions` long
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Append a new immutable memory
    pub async fn store(
        &self,
        content: &str,
        embedding: Vec<f32>,
        significance_score: f32,
    ) -> Result<LongTermMemory> {
        if !(0.0..=10.0).contains(&significance_score) {
            return Err(KairosError::Storage(format!(
                "significance score {} outside [0, 10]",
                significance_score
            )));
        }

        if let Some(expected) = self.dimensions {
            if embedding.len() != expected {
                return Err(KairosError::Storage(format!(
                    "embedding has {} dimensions, store expects {}",
                    embedding.len(),
                    expected
                )));
            }
        }

        let stored = self
            .repository
            .append(NewMemory {
                content: content.to_string(),
                embedding,
                significance_score,
            })
            .await?;

        debug!(
            "Stored memory {} (significance {})",
            stored.id, stored.significance_score
        );
        Ok(stored)
    }

    /// The `top_k` memories most similar to `query_embedding`, most similar
    /// first. Fewer are returned when the store holds fewer.
    pub async fn retrieve_relevant(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RecalledMemory>> {
        let memories = self.repository.list_all().await?;
        let ranked = rank_by_similarity(memories, query_embedding)?;

        debug!(
            "Ranked {} memories, keeping top {}",
            ranked.len(),
            top_k.min(ranked.len())
        );

        Ok(ranked
            .into_iter()
            .take(top_k)
            .map(|(memory, _)| RecalledMemory {
                content: memory.content,
                significance_score: memory.significance_score,
            })
            .collect())
    }

    pub async fn count(&self) -> Result<usize> {
        self.repository.count().await
    }
}

/// Pair every memory with its similarity to `query` and sort descending.
///
/// `sort_by` is stable, so equal similarities keep the repository's
/// insertion order. A stored embedding whose length differs from the query's
/// means the store is corrupt or the provider changed; that is a storage
/// error rather than a silent zero.
pub fn rank_by_similarity(
    memories: Vec<LongTermMemory>,
    query: &[f32],
) -> Result<Vec<(LongTermMemory, f32)>> {
    let mut scored = Vec::with_capacity(memories.len());
    for memory in memories {
        if memory.embedding.len() != query.len() {
            return Err(KairosError::Storage(format!(
                "memory {} has {} dimensions, query has {}",
                memory.id,
                memory.embedding.len(),
                query.len()
            )));
        }
        let similarity = cosine_similarity(query, &memory.embedding);
        scored.push((memory, similarity));
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    Ok(scored)
}

/// Render recalled memories for a prompt, most significant first.
///
/// An empty selection renders an explicit message so prompt construction
/// never silently drops the section.
pub fn format_memories(memories: &[RecalledMemory]) -> String {
    if memories.is_empty() {
        return NO_RELEVANT_MEMORIES.to_string();
    }

    let mut by_significance: Vec<&RecalledMemory> = memories.iter().collect();
    by_significance.sort_by(|a, b| {
        b.significance_score
            .partial_cmp(&a.significance_score)
            .unwrap_or(Ordering::Equal)
    });

    let mut parts = vec![MEMORIES_HEADER.to_string()];
    parts.extend(
        by_significance
            .into_iter()
            .map(|m| m.content.trim())
            .filter(|content| !content.is_empty())
            .map(|content| format!("- {}", content)),
    );

    parts.join("\n")
}
