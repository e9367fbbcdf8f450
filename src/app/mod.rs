//! Headless host application: builds the engine from CLI options, runs its
//! timers until interrupted or a deadline passes, then shuts down cleanly.

pub mod shutdown;
pub mod status;

use crate::app::shutdown::{ShutdownManager, ShutdownReason};
use anyhow::{Context, Result};
use ascension_core::collab::LogIntegrator;
use ascension_core::{Collaborators, Engine, EngineConfig, Host, TokioClock};
use ascension_io::{BackgroundStore, FileStore};
use ascension_observer::{HeuristicNarrator, Herald};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything the command line can change.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    pub config: Option<PathBuf>,
    pub state: PathBuf,
    pub seed: Option<u64>,
    pub autonomous: bool,
    pub duration: Option<Duration>,
}

pub struct App {
    pub host: Host,
    pub config: EngineConfig,
    pub shutdown: ShutdownManager,
    herald: Arc<Herald>,
    duration: Option<Duration>,
}

impl App {
    /// Reads the TOML file if one was given, applies CLI overrides and validates.
    pub fn load_config(options: &AppOptions) -> Result<EngineConfig> {
        let mut config = match &options.config {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                toml::from_str::<EngineConfig>(&content)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => EngineConfig::default(),
        };
        if options.seed.is_some() {
            config.seed = options.seed;
        }
        if options.autonomous {
            config.evolution.autonomous.enabled = true;
        }
        config.validate()?;
        Ok(config)
    }

    /// Must be called inside a tokio runtime.
    pub fn new(options: &AppOptions) -> Result<Self> {
        let config = Self::load_config(options)?;
        let herald = Arc::new(Herald::new(Box::new(HeuristicNarrator)));
        let collaborators = Collaborators {
            store: Box::new(BackgroundStore::new(FileStore::new(&options.state))),
            notifier: Box::new(Arc::clone(&herald)),
            integrator: Box::new(LogIntegrator),
        };
        let engine = Engine::new(&config, collaborators)?;
        let host = Host::new(engine, config.schedule.clone(), Arc::new(TokioClock::default()));
        tracing::info!(
            state = %options.state.display(),
            fingerprint = %config.fingerprint(),
            "Application initialized"
        );
        Ok(Self {
            host,
            config,
            shutdown: ShutdownManager::new(),
            herald,
            duration: options.duration,
        })
    }

    /// Runs until Ctrl-C or the configured duration, logging a status line
    /// and fresh narrations every snapshot poll.
    pub async fn run(&mut self) -> Result<()> {
        self.host.start();

        let deadline = self
            .duration
            .map(|d| tokio::time::Instant::now() + d);
        let mut poll = tokio::time::interval(Duration::from_millis(
            self.config.schedule.snapshot_poll_ms.max(1),
        ));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        while !self.shutdown.is_shutdown_requested() {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    self.shutdown.request(ShutdownReason::Interrupted);
                }
                _ = sleep_until(deadline) => {
                    tracing::info!("Run duration elapsed");
                    self.shutdown.request(ShutdownReason::DeadlineReached);
                }
                _ = poll.tick() => {
                    self.report();
                }
            }
        }

        self.report();
        self.shutdown.cleanup(&self.host)
    }

    fn report(&self) {
        for narration in self.herald.consume_narrations() {
            tracing::info!(kind = ?narration.kind, "{}", narration.text);
        }
        tracing::info!("{}", status::summarize(&self.host.snapshot()));
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
