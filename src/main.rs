//! Kairos - autonomous social agent
//!
//! Entry point: loads configuration, wires the collaborators together and
//! runs either the scheduler or a single maintenance command.

use anyhow::Context;
use clap::{Parser, Subcommand};
use kairos_core::{
    engines::{FollowEngine, PostEngine, TransferEngine},
    memory::format_memories,
    pipeline::{ActionDispatcher, CycleSettings, Pipeline, PipelineScheduler, ScheduleRanges},
    platform::{NewsApiClient, SolanaWallet, Wallet, XClient},
    services::{EmbeddingProvider, LlmProvider, OpenAiCompatibleClient, RemoteEmbeddingService},
    settings::resolve_secret,
    storage::SqliteRepository,
    KairosConfig, MemoryStore, ShortTermMemorySynthesizer, SignificanceScorer,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kairos")]
#[command(about = "Memory and scheduling pipeline for an autonomous social agent", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, env = "KAIROS_CONFIG")]
    config: Option<PathBuf>,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Decide actions but do not execute them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until Ctrl-C
    Run,

    /// Run exactly one cycle and exit
    Once,

    /// Show the long-term memories most related to a query
    Recall {
        /// Query text
        query: String,

        /// Number of memories to recall
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Score a piece of text for significance
    Score {
        /// Text to score
        text: String,
    },

    /// Write the default configuration
    InitConfig {
        /// Destination (stdout when omitted)
        path: Option<PathBuf>,
    },
}

/// Long-lived collaborators shared by every command
struct Services {
    llm: Arc<dyn LlmProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    memory: Arc<MemoryStore>,
    repository: Arc<SqliteRepository>,
}

impl Services {
    async fn connect(config: &KairosConfig) -> anyhow::Result<Self> {
        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleClient::new(
            &config.llm,
            resolve_secret(&config.llm.api_key_env),
        )?);

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(RemoteEmbeddingService::new(
            &config.embeddings,
            resolve_secret(&config.embeddings.api_key_env),
        )?);

        let repository = Arc::new(
            SqliteRepository::open(&config.memory.database_path)
                .await
                .with_context(|| {
                    format!(
                        "opening memory database at {}",
                        config.memory.database_path.display()
                    )
                })?,
        );
        let memory = Arc::new(
            MemoryStore::new(repository.clone()).with_dimensions(config.embeddings.dimensions),
        );

        Ok(Self {
            llm,
            embedder,
            memory,
            repository,
        })
    }

    fn scorer(&self, config: &KairosConfig) -> SignificanceScorer {
        SignificanceScorer::new(
            self.llm.clone(),
            config.llm.chat_params(),
            config.agent.persona.clone(),
        )
        .with_retry(config.retry.significance.policy())
    }
}

fn build_pipeline(config: &KairosConfig, services: &Services) -> anyhow::Result<Pipeline> {
    let persona = config.agent.persona.clone();
    let decision_retry = config.retry.decision.policy();

    let social = Arc::new(XClient::new(
        config.social.clone(),
        resolve_secret(&config.social.access_token_env),
    )?);

    let mut dispatcher = ActionDispatcher::new(social.clone()).dry_run(config.dry_run);
    let wallet: Option<Arc<dyn Wallet>> = if config.wallet.enabled {
        let wallet: Arc<dyn Wallet> = Arc::new(SolanaWallet::new(&config.wallet)?);
        dispatcher = dispatcher.with_wallet(wallet.clone(), config.wallet.address.clone());
        Some(wallet)
    } else {
        None
    };

    let synthesizer = ShortTermMemorySynthesizer::new(
        services.llm.clone(),
        config.llm.chat_params(),
        persona.clone(),
    )
    .with_retry(config.retry.short_term_memory.policy());

    let mut pipeline = Pipeline::new(
        social,
        services.embedder.clone(),
        services.memory.clone(),
        synthesizer,
        services.scorer(config),
        dispatcher,
    )
    .with_settings(CycleSettings {
        top_k: config.memory.top_k,
        significance_threshold: config.memory.significance_threshold,
        recent_posts_limit: config.memory.recent_posts_limit,
    })
    .with_embedding_retry(config.retry.embedding.policy());

    if config.news.enabled {
        match NewsApiClient::new(config.news.clone(), resolve_secret(&config.news.api_key_env)) {
            Ok(news) => pipeline = pipeline.with_news(Arc::new(news), config.news.query.clone()),
            Err(e) => warn!("News disabled: {}", e),
        }
    }

    if config.engines.post {
        pipeline = pipeline.with_engine(Box::new(
            PostEngine::new(
                services.llm.clone(),
                config.llm.completion_params(),
                config.llm.chat_params(),
                persona.clone(),
            )
            .with_retry(decision_retry),
        ));
    }

    if config.engines.follow {
        pipeline = pipeline.with_engine(Box::new(
            FollowEngine::new(
                services.llm.clone(),
                config.llm.chat_params(),
                services.repository.clone(),
                config.engines.min_follow_score,
            )
            .with_retry(decision_retry),
        ));
    }

    if config.engines.transfer {
        let wallet = wallet.context("transfer engine requires [wallet] enabled = true")?;
        pipeline = pipeline.with_engine(Box::new(
            TransferEngine::new(
                services.llm.clone(),
                config.llm.chat_params(),
                wallet,
                config.wallet.address.clone(),
                persona,
                config.wallet.max_transfer_fraction,
            )
            .with_retry(decision_retry),
        ));
    }

    info!("Engines enabled: {:?}", pipeline.engine_names());
    Ok(pipeline)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Our crates at the requested level, HTTP plumbing only when it warns
    let filter = EnvFilter::new(format!(
        "kairos={lvl},kairos_core={lvl},hyper=warn,reqwest=warn",
        lvl = level.as_str().to_lowercase()
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // Write logs to stderr, not stdout
        .init();

    debug!("Kairos v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Commands::InitConfig { path } = &cli.command {
        let toml = KairosConfig::default().to_toml()?;
        match path {
            Some(path) => {
                std::fs::write(path, toml)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Wrote default configuration to {}", path.display());
            }
            None => print!("{}", toml),
        }
        return Ok(());
    }

    let mut config = KairosConfig::load(cli.config.as_deref()).context("loading configuration")?;
    config.dry_run |= cli.dry_run;
    if config.dry_run {
        info!("Dry run: actions are logged, not executed");
    }

    let services = Services::connect(&config).await?;

    match cli.command {
        Commands::Run => {
            let pipeline = Arc::new(build_pipeline(&config, &services)?);

            if config.wallet.enabled && config.wallet.announce {
                let outcome = pipeline
                    .announce(&format!("My wallet is {}", config.wallet.address))
                    .await;
                if !outcome.succeeded() {
                    warn!("Wallet announcement failed: {:?}", outcome.result);
                }
            }

            let scheduler =
                PipelineScheduler::new(pipeline, ScheduleRanges::from(&config.scheduler))
                    .run_on_start(config.scheduler.run_on_start);

            let scheduler = scheduler
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Could not listen for Ctrl-C: {}", e);
                        std::future::pending::<()>().await;
                    }
                })
                .await;

            info!("Stopped after {} cycle(s)", scheduler.cycles_run());
        }

        Commands::Once => {
            let pipeline = build_pipeline(&config, &services)?;
            let report = pipeline.run_cycle().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Recall { query, top_k } => {
            let top_k = top_k.unwrap_or(config.memory.top_k);
            let embedding = services
                .embedder
                .embed(&query)
                .await
                .context("embedding query")?;
            let recalled = services.memory.retrieve_relevant(&embedding, top_k).await?;
            println!("{}", format_memories(&recalled));
        }

        Commands::Score { text } => {
            let score = services.scorer(&config).score(&text).await;
            println!("{}", score);
        }

        Commands::InitConfig { .. } => unreachable!("handled before configuration is loaded"),
    }

    Ok(())
}
