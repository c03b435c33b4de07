//! One full pipeline cycle
//!
//! gather -> synthesize -> recall -> decide -> dispatch -> remember.
//! Collaborator failures degrade to empty inputs or skipped steps. Only a
//! storage failure aborts the cycle, and the scheduler absorbs that too.

use super::dispatch::{ActionDispatcher, DRY_RUN};
use crate::engines::{CycleContext, DecisionEngine};
use crate::error::Result;
use crate::memory::{format_memories, MemoryStore, ShortTermMemorySynthesizer, SignificanceScorer, UNSCORED};
use crate::platform::{NewsSource, SocialPlatform};
use crate::retry::RetryPolicy;
use crate::services::EmbeddingProvider;
use crate::types::{ActionOutcome, CycleReport, FeedItem, Post, ProposedAction};
use crate::utils::preview;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-cycle knobs
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub top_k: usize,
    pub significance_threshold: u8,
    pub recent_posts_limit: usize,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            top_k: crate::memory::DEFAULT_TOP_K,
            significance_threshold: 7,
            recent_posts_limit: 10,
        }
    }
}

pub struct Pipeline {
    social: Arc<dyn SocialPlatform>,
    news: Option<(Arc<dyn NewsSource>, String)>,
    embedder: Arc<dyn EmbeddingProvider>,
    memory: Arc<MemoryStore>,
    synthesizer: ShortTermMemorySynthesizer,
    scorer: SignificanceScorer,
    engines: Vec<Box<dyn DecisionEngine>>,
    dispatcher: ActionDispatcher,
    settings: CycleSettings,
    embed_retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        social: Arc<dyn SocialPlatform>,
        embedder: Arc<dyn EmbeddingProvider>,
        memory: Arc<MemoryStore>,
        synthesizer: ShortTermMemorySynthesizer,
        scorer: SignificanceScorer,
        dispatcher: ActionDispatcher,
    ) -> Self {
        Self {
            social,
            news: None,
            embedder,
            memory,
            synthesizer,
            scorer,
            engines: Vec::new(),
            dispatcher,
            settings: CycleSettings::default(),
            embed_retry: RetryPolicy::decision(),
        }
    }

    /// Search `source` for `query` every cycle
    pub fn with_news(mut self, source: Arc<dyn NewsSource>, query: impl Into<String>) -> Self {
        self.news = Some((source, query.into()));
        self
    }

    /// Engines run in the order they are added
    pub fn with_engine(mut self, engine: Box<dyn DecisionEngine>) -> Self {
        self.engines.push(engine);
        self
    }

    pub fn with_settings(mut self, settings: CycleSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_embedding_retry(mut self, retry: RetryPolicy) -> Self {
        self.embed_retry = retry;
        self
    }

    pub fn engine_names(&self) -> Vec<&'static str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    /// Run one cycle end to end
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let started = Instant::now();
        let cycle_id = Uuid::new_v4();
        info!("Cycle {} starting", cycle_id);

        let recent_posts = self.recent_posts().await;
        let feed = self.feed().await;
        let headlines = self.headlines().await;

        let external_context: Vec<String> = feed
            .iter()
            .map(FeedItem::as_context_line)
            .chain(headlines)
            .collect();
        debug!(
            "Gathered {} posts, {} feed items, {} context lines",
            recent_posts.len(),
            feed.len(),
            external_context.len()
        );

        let short_term_memory = self
            .synthesizer
            .synthesize(&recent_posts, &external_context)
            .await;

        let recalled = if short_term_memory.is_empty() {
            Vec::new()
        } else {
            match self.embed(&short_term_memory).await {
                Some(query) => {
                    self.memory
                        .retrieve_relevant(&query, self.settings.top_k)
                        .await?
                }
                None => Vec::new(),
            }
        };

        let context = CycleContext {
            long_term_memories: format_memories(&recalled),
            short_term_memory,
            recalled,
            recent_posts,
            feed,
            external_context,
        };

        let mut actions: Vec<ProposedAction> = Vec::new();
        for engine in &self.engines {
            let proposed = engine.decide(&context).await;
            debug!("Engine {} proposed {} action(s)", engine.name(), proposed.len());
            actions.extend(proposed);
        }

        let outcomes = self.dispatcher.dispatch(&actions).await;
        let stored_significance = self.remember(&context.short_term_memory, &outcomes).await?;

        let report = CycleReport {
            cycle_id,
            actions_proposed: actions.len(),
            actions_succeeded: outcomes.iter().filter(|o| o.succeeded()).count(),
            stored_significance,
            elapsed: started.elapsed(),
        };

        info!(
            "Cycle {} finished in {:?}: {}/{} actions succeeded",
            cycle_id, report.elapsed, report.actions_succeeded, report.actions_proposed
        );
        Ok(report)
    }

    /// Publish a one-off post through the dispatcher
    pub async fn announce(&self, content: &str) -> ActionOutcome {
        let action = ProposedAction::Post {
            content: content.to_string(),
        };
        let mut outcomes = self.dispatcher.dispatch(std::slice::from_ref(&action)).await;
        outcomes.pop().unwrap_or(ActionOutcome {
            action,
            result: Err("nothing dispatched".to_string()),
        })
    }

    async fn recent_posts(&self) -> Vec<Post> {
        match self.social.recent_posts(self.settings.recent_posts_limit).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!("Could not fetch recent posts: {}", e);
                Vec::new()
            }
        }
    }

    /// Timeline then mentions, de-duplicated by id
    async fn feed(&self) -> Vec<FeedItem> {
        let timeline = self.social.timeline().await.unwrap_or_else(|e| {
            warn!("Could not fetch timeline: {}", e);
            Vec::new()
        });
        let mentions = self.social.notifications().await.unwrap_or_else(|e| {
            warn!("Could not fetch notifications: {}", e);
            Vec::new()
        });

        let mut seen = HashSet::new();
        timeline
            .into_iter()
            .chain(mentions)
            .filter(|item| seen.insert(item.id.clone()))
            .collect()
    }

    async fn headlines(&self) -> Vec<String> {
        let Some((source, query)) = &self.news else {
            return Vec::new();
        };
        source.search(query).await.unwrap_or_else(|e| {
            warn!("Could not fetch headlines: {}", e);
            Vec::new()
        })
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = &self.embedder;
        let result = self
            .embed_retry
            .run("embedding", |_| async move { embedder.embed(text).await })
            .await;

        match result {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!("Embedding gave up: {}", e);
                None
            }
        }
    }

    /// Score this cycle's experience and persist it when significant
    async fn remember(&self, short_term_memory: &str, outcomes: &[ActionOutcome]) -> Result<Option<u8>> {
        let mut lines: Vec<String> = Vec::new();
        if !short_term_memory.is_empty() {
            lines.push(short_term_memory.to_string());
        }
        // Dry-run outcomes never happened
        lines.extend(
            outcomes
                .iter()
                .filter(|o| o.succeeded() && o.result.as_deref() != Ok(DRY_RUN))
                .map(|o| o.action.to_string()),
        );

        if lines.is_empty() {
            debug!("Nothing to remember this cycle");
            return Ok(None);
        }
        let candidate = lines.join("\n");

        let score = self.scorer.score(&candidate).await;
        if score == UNSCORED || score < self.settings.significance_threshold {
            debug!("Memory scored {}, not stored", score);
            return Ok(None);
        }

        let Some(embedding) = self.embed(&candidate).await else {
            warn!("Dropping significant memory: no embedding");
            return Ok(None);
        };

        self.memory.store(&candidate, embedding, score as f32).await?;
        info!("Remembered ({}): {}", score, preview(&candidate, 80));
        Ok(Some(score))
    }
}
