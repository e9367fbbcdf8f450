//! Graceful shutdown for the headless host.
//!
//! The first recorded [`ShutdownReason`] wins and decides the process exit
//! code; cleanup stops every timer before the final save.

use anyhow::Result;
use ascension_core::Host;
use std::sync::{Mutex, PoisonError};

/// Why the run loop is ending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl-C or SIGINT.
    Interrupted,
    /// `--duration-secs` elapsed.
    DeadlineReached,
    Failed(String),
}

impl ShutdownReason {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::DeadlineReached => 0,
            ShutdownReason::Failed(_) => 1,
            // 128 + SIGINT
            ShutdownReason::Interrupted => 130,
        }
    }
}

pub struct ShutdownManager {
    reason: Mutex<Option<ShutdownReason>>,
    save_on_exit: bool,
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            reason: Mutex::new(None),
            save_on_exit: true,
        }
    }

    /// `--no-save` turns the final world save off.
    pub fn set_save_on_exit(&mut self, save: bool) {
        self.save_on_exit = save;
    }

    /// Records `reason` unless an earlier one is already recorded.
    pub fn request(&self, reason: ShutdownReason) {
        let mut slot = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            tracing::info!(?reason, "Shutdown requested");
            *slot = Some(reason);
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.reason().is_some()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 0 while running and after a clean deadline stop.
    pub fn exit_code(&self) -> i32 {
        self.reason().map_or(0, |r| r.exit_code())
    }

    /// Cancels every controller timer, then saves and flushes the world
    /// state unless saving was turned off.
    pub fn cleanup(&self, host: &Host) -> Result<()> {
        if self.save_on_exit {
            host.shutdown()?;
            tracing::info!("World state saved");
        } else {
            host.stop();
            tracing::info!("Timers stopped, world state not saved");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_manager_exits_cleanly() {
        let manager = ShutdownManager::new();
        assert!(!manager.is_shutdown_requested());
        assert_eq!(manager.reason(), None);
        assert_eq!(manager.exit_code(), 0);
    }

    #[test]
    fn test_first_reason_wins() {
        let manager = ShutdownManager::new();
        manager.request(ShutdownReason::Interrupted);
        manager.request(ShutdownReason::Failed("late".into()));
        assert_eq!(manager.reason(), Some(ShutdownReason::Interrupted));
        assert_eq!(manager.exit_code(), 130);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ShutdownReason::DeadlineReached.exit_code(), 0);
        assert_eq!(ShutdownReason::Failed("io".into()).exit_code(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_without_save_only_stops() {
        use ascension_core::{Collaborators, Engine, EngineConfig, TimerKey, TokioClock};
        use std::sync::Arc;

        let config = EngineConfig {
            seed: Some(2),
            ..Default::default()
        };
        let engine = Engine::new(&config, Collaborators::default()).unwrap();
        let host = Host::new(engine, config.schedule, Arc::new(TokioClock::default()));
        host.start();

        let mut manager = ShutdownManager::new();
        manager.set_save_on_exit(false);
        manager.cleanup(&host).unwrap();
        assert!(!host.is_armed(&TimerKey::Evolution));
    }
}
