//! End-to-end cycle tests against in-process fakes

mod common;

use common::{feed_item, BrokenRepository, KeywordEmbedder, RecordingSocial, ScriptedLlm, StaticNews};
use kairos_core::engines::PostEngine;
use kairos_core::error::KairosError;
use kairos_core::pipeline::{ActionDispatcher, CycleSettings, Pipeline, DRY_RUN};
use kairos_core::services::LlmConfig;
use kairos_core::storage::{InMemoryRepository, MemoryRepository};
use kairos_core::types::Post;
use kairos_core::{MemoryStore, RetryPolicy, ShortTermMemorySynthesizer, SignificanceScorer};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn quick() -> RetryPolicy {
    RetryPolicy::fixed(2, Duration::from_millis(1))
}

struct Harness {
    llm: Arc<ScriptedLlm>,
    social: Arc<RecordingSocial>,
    embedder: Arc<KeywordEmbedder>,
    repository: Arc<dyn MemoryRepository>,
    dry_run: bool,
}

impl Harness {
    fn new(llm: ScriptedLlm) -> Self {
        Self {
            llm: Arc::new(llm),
            social: Arc::new(RecordingSocial {
                own_posts: vec![Post::new("1", "the market never sleeps")],
                timeline: vec![feed_item("10", "trader", "market is ripping")],
                mentions: vec![feed_item("10", "trader", "market is ripping")],
                ..Default::default()
            }),
            embedder: Arc::new(KeywordEmbedder::new()),
            repository: Arc::new(InMemoryRepository::new()),
            dry_run: false,
        }
    }

    fn pipeline(&self) -> Pipeline {
        let config = LlmConfig::default();
        let persona = "I am kairos.";

        Pipeline::new(
            self.social.clone(),
            self.embedder.clone(),
            Arc::new(MemoryStore::new(self.repository.clone()).with_dimensions(3)),
            ShortTermMemorySynthesizer::new(self.llm.clone(), config.chat_params(), persona)
                .with_retry(quick()),
            SignificanceScorer::new(self.llm.clone(), config.chat_params(), persona)
                .with_retry(quick()),
            ActionDispatcher::new(self.social.clone()).dry_run(self.dry_run),
        )
        .with_news(Arc::new(StaticNews(vec!["Markets rally".to_string()])), "markets")
        .with_engine(Box::new(
            PostEngine::new(
                self.llm.clone(),
                config.completion_params(),
                config.chat_params(),
                persona,
            )
            .with_retry(quick()),
        ))
        .with_settings(CycleSettings {
            top_k: 5,
            significance_threshold: 7,
            recent_posts_limit: 10,
        })
        .with_embedding_retry(quick())
    }
}

#[tokio::test]
async fn test_significant_cycle_posts_and_remembers() {
    let harness = Harness::new(ScriptedLlm::by_purpose(
        "The market feels euphoric.",
        "8",
        "\"markets only go up\"",
    ));

    let report = harness.pipeline().run_cycle().await.unwrap();

    assert_eq!(report.actions_proposed, 1);
    assert_eq!(report.actions_succeeded, 1);
    assert_eq!(report.stored_significance, Some(8));
    assert_eq!(harness.social.posted(), vec!["markets only go up"]);

    let stored = harness.repository.list_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(
        stored[0].content,
        "The market feels euphoric.\nI posted: markets only go up"
    );
    assert_eq!(stored[0].significance_score, 8.0);
}

#[tokio::test]
async fn test_memory_from_earlier_cycle_is_recalled() {
    let harness = Harness::new(ScriptedLlm::by_purpose(
        "The market feels euphoric.",
        "9",
        "gm",
    ));
    let pipeline = harness.pipeline();

    pipeline.run_cycle().await.unwrap();

    // Second cycle: the draft prompt must carry the stored memory
    let seen_memory = Arc::new(std::sync::Mutex::new(false));
    let flag = seen_memory.clone();
    let llm = ScriptedLlm::new(
        |messages| {
            let user = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            Ok(if user.contains("internal monologue") {
                "Still thinking about the market.".to_string()
            } else if user.contains("score") {
                "2".to_string()
            } else {
                "gm again".to_string()
            })
        },
        move |prompt| {
            if prompt.contains("Past memories and thoughts:\n- The market feels euphoric.") {
                *flag.lock().unwrap() = true;
            }
            Ok("Tweet: gm again".to_string())
        },
    );

    let second = Harness {
        llm: Arc::new(llm),
        social: harness.social.clone(),
        embedder: harness.embedder.clone(),
        repository: harness.repository.clone(),
        dry_run: false,
    };
    let report = second.pipeline().run_cycle().await.unwrap();

    assert!(*seen_memory.lock().unwrap());
    // Score 2 is below the threshold
    assert_eq!(report.stored_significance, None);
    assert_eq!(harness.repository.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_low_score_is_not_stored() {
    let harness = Harness::new(ScriptedLlm::by_purpose("meh", "3", "gm"));
    let report = harness.pipeline().run_cycle().await.unwrap();

    assert_eq!(report.stored_significance, None);
    assert_eq!(harness.repository.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unscored_memory_is_not_stored() {
    let harness = Harness::new(ScriptedLlm::by_purpose("big news", "no idea", "gm"));
    let report = harness.pipeline().run_cycle().await.unwrap();

    assert_eq!(report.stored_significance, None);
    assert_eq!(harness.repository.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_dry_run_records_without_posting() {
    let mut harness = Harness::new(ScriptedLlm::by_purpose("The market", "8", "gm"));
    harness.dry_run = true;

    let report = harness.pipeline().run_cycle().await.unwrap();

    assert_eq!(report.actions_succeeded, 1);
    assert!(harness.social.posted().is_empty());

    // Only the monologue is remembered, not the post that was never sent
    assert_eq!(report.stored_significance, Some(8));
    let stored = harness.repository.list_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "The market");
    assert!(stored.iter().all(|m| !m.content.contains("I posted")));

    let outcome = harness.pipeline().announce("My wallet is abc").await;
    assert_eq!(outcome.result, Ok(DRY_RUN.to_string()));
    assert!(harness.social.posted().is_empty());
}

#[tokio::test]
async fn test_offline_platform_degrades_to_empty_inputs() {
    let mut harness = Harness::new(ScriptedLlm::by_purpose("quiet day", "8", "gm"));
    harness.social = Arc::new(RecordingSocial {
        offline: true,
        ..Default::default()
    });

    let report = harness.pipeline().run_cycle().await.unwrap();

    // The post fails to send, but the monologue itself is still remembered
    assert_eq!(report.actions_proposed, 1);
    assert_eq!(report.actions_succeeded, 0);
    assert_eq!(report.stored_significance, Some(8));
    let stored = harness.repository.list_all().await.unwrap();
    assert_eq!(stored[0].content, "quiet day");
}

#[tokio::test]
async fn test_embedding_failure_skips_recall_and_storage() {
    let mut harness = Harness::new(ScriptedLlm::by_purpose("The market", "9", "gm"));
    harness.embedder = Arc::new(KeywordEmbedder::failing());

    let report = harness.pipeline().run_cycle().await.unwrap();

    assert_eq!(report.actions_succeeded, 1);
    assert_eq!(report.stored_significance, None);
    // Two attempts for the query, two for the memory
    assert_eq!(harness.embedder.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_storage_failure_propagates() {
    let mut harness = Harness::new(ScriptedLlm::by_purpose("The market", "9", "gm"));
    harness.repository = Arc::new(BrokenRepository);

    let result = harness.pipeline().run_cycle().await;
    assert!(matches!(result, Err(KairosError::Storage(_))));
}

#[tokio::test]
async fn test_synthesis_failure_skips_recall() {
    let llm = ScriptedLlm::new(
        |messages| {
            let user = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            if user.contains("internal monologue") {
                Err(KairosError::Transport("status 503".to_string()))
            } else if user.contains("score") {
                Ok("1".to_string())
            } else {
                Ok("gm".to_string())
            }
        },
        |_| Ok("Tweet: gm".to_string()),
    );
    let harness = Harness::new(llm);

    let report = harness.pipeline().run_cycle().await.unwrap();

    assert_eq!(report.actions_succeeded, 1);
    // Empty short-term memory means no query embedding; score 1 stores nothing
    assert_eq!(harness.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.llm.complete_calls.load(Ordering::SeqCst), 1);
}
