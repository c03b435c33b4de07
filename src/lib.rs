//! Kairos - memory and scheduling pipeline for an autonomous social agent
//!
//! Each cycle the agent reads its surroundings, condenses them into a
//! short-term memory, recalls related long-term memories, decides what to do,
//! does it, and keeps whatever turned out to be significant.
//!
//! # Architecture
//!
//! - **Memory**: long-term store with embedding recall, significance scoring,
//!   short-term synthesis
//! - **Engines**: post, follow and transfer decision engines
//! - **Pipeline**: cycle orchestration, action dispatch, activation-window scheduler
//! - **Services / Platform**: LLM, embeddings, social platform, news, wallet
//! - **Storage**: SQLite and in-memory persistence
//!
//! # Example
//!
//! ```ignore
//! use kairos_core::{KairosConfig, Pipeline, PipelineScheduler, ScheduleRanges};
//!
//! let config = KairosConfig::load(None)?;
//! let pipeline = Arc::new(Pipeline::new(social, embedder, memory, synthesizer, scorer, dispatcher));
//! PipelineScheduler::new(pipeline, ScheduleRanges::from(&config.scheduler))
//!     .run_until(async { tokio::signal::ctrl_c().await.ok(); })
//!     .await;
//! ```

pub mod engines;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod platform;
pub mod prompts;
pub mod retry;
pub mod services;
pub mod settings;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{KairosError, Result};
pub use memory::{MemoryStore, ShortTermMemorySynthesizer, SignificanceScorer};
pub use pipeline::{ActionDispatcher, CycleSettings, Pipeline, PipelineScheduler, ScheduleRanges};
pub use retry::RetryPolicy;
pub use settings::KairosConfig;
pub use types::{
    ActionOutcome, CycleReport, FeedItem, LongTermMemory, MemoryId, Post, ProposedAction,
    RecalledMemory,
};
