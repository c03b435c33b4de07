// Agent Configuration
//
// Every tunable of the agent lives in one serde struct. Values are layered:
// built-in defaults, then an optional TOML file, then `KAIROS__SECTION__KEY`
// environment variables. Secrets never appear here; each section names the
// environment variable that holds its key.

use crate::error::{KairosError, Result};
use crate::platform::{NewsConfig, SocialConfig, WalletConfig};
use crate::retry::RetryPolicy;
use crate::services::{EmbeddingConfig, LlmConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "KAIROS";

const DEFAULT_PERSONA: &str = "I am Kairos, an autonomous mind living on the timeline. \
I read the news, I remember what matters, and I speak in my own voice: curious, \
dry, a little irreverent, never corporate.";

/// Main agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KairosConfig {
    /// Compute and log actions without executing them
    pub dry_run: bool,

    pub agent: AgentSettings,
    pub scheduler: SchedulerSettings,
    pub memory: MemorySettings,
    pub llm: LlmConfig,
    pub embeddings: EmbeddingConfig,
    pub retry: RetrySettings,
    pub social: SocialConfig,
    pub news: NewsConfig,
    pub wallet: WalletConfig,
    pub engines: EngineSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Persona description embedded in every prompt
    pub persona: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
        }
    }
}

/// Activation-window and in-window jitter ranges, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Upper bound of the random delay before a window opens
    pub activation_delay_max_secs: u64,

    /// Window length is drawn from [window_min_secs, window_max_secs]
    pub window_min_secs: u64,
    pub window_max_secs: u64,

    /// Gap between cycles is drawn from [run_interval_min_secs, run_interval_max_secs]
    pub run_interval_min_secs: u64,
    pub run_interval_max_secs: u64,

    /// Execute one cycle immediately on start
    pub run_on_start: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            activation_delay_max_secs: 30 * 60,
            window_min_secs: 15 * 60,
            window_max_secs: 20 * 60,
            run_interval_min_secs: 30,
            run_interval_max_secs: 180,
            run_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// SQLite database holding long-term memories and known handles
    pub database_path: PathBuf,

    /// Memories recalled per cycle
    pub top_k: usize,

    /// Candidates scoring at or above this are persisted
    pub significance_threshold: u8,

    /// Own posts fed into each cycle
    pub recent_posts_limit: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            top_k: crate::memory::DEFAULT_TOP_K,
            significance_threshold: 7,
            recent_posts_limit: 10,
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kairos")
        .join("kairos.db")
}

/// Attempt budget and pause for one retried operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrySpec {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl RetrySpec {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.attempts, Duration::from_millis(self.delay_ms))
    }
}

impl From<RetryPolicy> for RetrySpec {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            attempts: policy.max_attempts,
            delay_ms: policy.delay.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub significance: RetrySpec,
    pub short_term_memory: RetrySpec,
    pub decision: RetrySpec,
    pub embedding: RetrySpec,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            significance: RetryPolicy::significance().into(),
            short_term_memory: RetryPolicy::short_term_memory().into(),
            decision: RetryPolicy::decision().into(),
            embedding: RetryPolicy::decision().into(),
        }
    }
}

/// Which decision engines run each cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub post: bool,
    pub follow: bool,
    pub transfer: bool,

    /// Follow proposals need at least this score in [0, 1]
    pub min_follow_score: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            post: true,
            follow: true,
            transfer: false,
            min_follow_score: 0.5,
        }
    }
}

impl KairosConfig {
    /// Load defaults, then `path` if given, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(KairosError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(::config::File::from(path));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: KairosConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: KairosConfig =
            toml::from_str(toml_str).map_err(|e| KairosError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| KairosError::Config(e.to_string()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let s = &self.scheduler;

        if s.window_min_secs == 0 {
            return Err(invalid("scheduler: window_min_secs must be greater than 0"));
        }
        if s.window_min_secs > s.window_max_secs {
            return Err(invalid("scheduler: window_min_secs must not exceed window_max_secs"));
        }
        if s.run_interval_min_secs > s.run_interval_max_secs {
            return Err(invalid(
                "scheduler: run_interval_min_secs must not exceed run_interval_max_secs",
            ));
        }

        if !(1..=10).contains(&self.memory.significance_threshold) {
            return Err(invalid("memory: significance_threshold must be between 1 and 10"));
        }

        if self.embeddings.dimensions == 0 {
            return Err(invalid("embeddings: dimensions must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.engines.min_follow_score) {
            return Err(invalid("engines: min_follow_score must be between 0 and 1"));
        }

        if !(0.0..=1.0).contains(&self.wallet.max_transfer_fraction) {
            return Err(invalid("wallet: max_transfer_fraction must be between 0 and 1"));
        }

        if self.wallet.enabled && self.wallet.address.is_empty() {
            return Err(invalid("wallet: address is required when the wallet is enabled"));
        }

        if self.engines.transfer && !self.wallet.enabled {
            return Err(invalid("engines: transfer requires the wallet to be enabled"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> KairosError {
    KairosError::Config(format!("Invalid configuration: {}", message))
}

/// Read a secret from the named environment variable, empty when unset
pub fn resolve_secret(env_var: &str) -> String {
    std::env::var(env_var).unwrap_or_default()
}
