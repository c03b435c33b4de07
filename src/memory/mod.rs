//! Memory layer: long-term store, significance gate, short-term synthesis

pub mod significance;
pub mod short_term;
pub mod store;

pub use significance::{extract_score, SignificanceScorer, UNSCORED};
pub use short_term::ShortTermMemorySynthesizer;
pub use store::{format_memories, MemoryStore, DEFAULT_TOP_K, NO_RELEVANT_MEMORIES};
