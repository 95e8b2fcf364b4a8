//! # Litany Daemon
//!
//! Speech grammar cache for DaemonOS.
//!
//! ## Features
//!
//! - **Grammar Discovery**: Scan a grammar tree for `*.xml` SRGS documents
//! - **Transform Pipeline**: Language gate, hotword substitution, optional wake word
//! - **Example Index**: One sample utterance per rule
//! - **Live Reload**: Rescan and reload the engine when grammars change
//! - **Runtime Composition**: Replace a grammar's rule over IPC, no file needed
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      LITANY DAEMON                           │
//! │  ┌─────────────────┐        ┌─────────────────┐             │
//! │  │ GrammarWatcher  │        │  ControlServer  │ ←── Unix    │
//! │  │ (notify)        │        │  (IPC)          │     Socket  │
//! │  └────────┬────────┘        └────────┬────────┘             │
//! │           │ Reloader                 │ Composer             │
//! │           └────────────┬─────────────┘                      │
//! │               ┌────────┴────────┐                           │
//! │               │  GrammarStore   │  (reload gate)            │
//! │               └────────┬────────┘                           │
//! │               ┌────────┴────────┐                           │
//! │               │  SpeechEngine   │                           │
//! │               └─────────────────┘                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod composer;
mod config;
mod engine;
mod ipc;
mod scanner;
mod store;
mod watcher;

use anyhow::Result;
use clap::{Parser, Subcommand};
use litany_core::{Dialect, Pipeline};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Litany - Speech grammar cache daemon
#[derive(Parser, Debug)]
#[command(name = "litanyd", version, about = "Litany speech grammar daemon for DaemonOS")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "/grimoire/litany/litany.yaml")]
    config: PathBuf,

    /// Grammar directory override
    #[arg(long, env = "LITANY_GRAMMAR_DIR")]
    grammar_dir: Option<PathBuf>,

    /// Language tag override (e.g. fr-FR)
    #[arg(long)]
    language: Option<String>,

    /// Hotword override
    #[arg(long)]
    hotword: Option<String>,

    /// Socket path for IPC
    #[arg(short, long, default_value = "/run/litany/litany.sock")]
    socket: PathBuf,

    /// Do not watch the grammar directory
    #[arg(long)]
    no_watch: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compose a grammar on a running daemon
    Compose {
        /// Grammar name
        name: String,
        /// File holding the rule body
        rule_file: PathBuf,
        /// Use the semantics-ms tag format
        #[arg(long)]
        ms: bool,
    },
}

/// Daemon state
pub struct LitanyDaemon<E: engine::SpeechEngine> {
    pub store: Arc<store::GrammarStore>,
    pub engine: Arc<E>,
    pub composer: composer::Composer<E>,
    pub reloader: Arc<watcher::Reloader<E>>,
    pub started_at: std::time::Instant,
}

/// Snapshot reported over IPC
#[derive(Debug, Serialize)]
pub struct DaemonStatus {
    pub healthy: bool,
    pub grammar_count: usize,
    pub loaded_in_engine: usize,
    pub language: String,
    pub hotword: String,
    pub grammar_dir: PathBuf,
    pub uptime_secs: u64,
}

impl<E: engine::SpeechEngine> LitanyDaemon<E> {
    pub fn new(config: &config::LitanyConfig, engine: E) -> Result<Self> {
        let pipeline = Pipeline::new(&config.language, &config.hotword)?;
        let store = Arc::new(store::GrammarStore::new(pipeline));
        let engine = Arc::new(engine);

        let composer = composer::Composer::new(
            Arc::clone(&store),
            Arc::clone(&engine),
            config.compose.create_missing,
        );
        let reloader = Arc::new(watcher::Reloader::new(
            Arc::clone(&store),
            Arc::clone(&engine),
            config.grammar_dir.clone(),
            config.scan_depth,
        ));

        Ok(Self {
            store,
            engine,
            composer,
            reloader,
            started_at: std::time::Instant::now(),
        })
    }

    /// Get daemon status
    pub async fn status(&self) -> DaemonStatus {
        DaemonStatus {
            healthy: true,
            grammar_count: self.store.len().await,
            loaded_in_engine: self.engine.loaded_grammars().len(),
            language: self.store.pipeline().language().to_string(),
            hotword: self.store.pipeline().hotword().to_string(),
            grammar_dir: self.reloader.root().to_path_buf(),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .init();

    if let Some(Commands::Compose { name, rule_file, ms }) = args.command {
        let rule = tokio::fs::read_to_string(&rule_file).await?;
        let dialect = if ms { Dialect::SemanticsMs } else { Dialect::Semantics };
        let client = ipc::ControlClient::new(&args.socket);
        let result = client.compose(&name, &rule, dialect).await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    info!("Litany Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;
    if let Some(dir) = args.grammar_dir {
        config.grammar_dir = dir;
    }
    if let Some(language) = args.language {
        config.language = language;
    }
    if let Some(hotword) = args.hotword {
        config.hotword = hotword;
    }
    if args.no_watch {
        config.watch.enabled = false;
    }
    info!("Grammar directory: {:?}", config.grammar_dir);
    info!("Language: {}, hotword: {}", config.language, config.hotword);

    // Ensure socket directory exists
    if let Some(socket_dir) = args.socket.parent() {
        tokio::fs::create_dir_all(socket_dir).await?;
    }

    let daemon = Arc::new(LitanyDaemon::new(&config, engine::MemoryEngine::new())?);

    // Initial load
    let report = daemon.reloader.reload().await?;
    info!("Grammar store initialized: {} grammars", daemon.store.len().await);
    if report.failed > 0 {
        warn!("{} grammar files failed to load", report.failed);
    }

    // Start file watcher
    if config.watch.enabled {
        match watcher::GrammarWatcher::new(&config.grammar_dir) {
            Ok(w) => {
                let reloader = Arc::clone(&daemon.reloader);
                tokio::spawn(async move {
                    w.run(reloader).await;
                });
            }
            Err(e) => error!("Failed to watch {:?}: {}", config.grammar_dir, e),
        }
    }

    // Register shutdown handler
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Litany daemon shutting down");
        std::process::exit(0);
    });

    let server = ipc::ControlServer::new(args.socket, daemon);

    info!("Litany daemon ready, listening for connections");
    server.run().await
}
