use ascension_core::Notifier;
use ascension_data::{EngineEvent, EventKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Narration {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub kind: EventKind,
    pub text: String,
    pub severity: f32,
}

#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, event: &EngineEvent) -> String;
}

pub struct HeuristicNarrator;

#[async_trait]
impl Narrator for HeuristicNarrator {
    async fn narrate(&self, event: &EngineEvent) -> String {
        let severity = event.severity();
        let prefix = if severity > 0.8 {
            "◈"
        } else if severity > 0.5 {
            "◇"
        } else {
            "○"
        };

        let body = match event {
            EngineEvent::PhaseActivated {
                controller,
                automatic: true,
            } => format!("{controller} stirred on its own and began phase 1."),
            EngineEvent::PhaseActivated { controller, .. } => {
                format!("{controller} initiated at phase 1.")
            }
            EngineEvent::PhaseAdvanced {
                controller,
                from,
                to,
            } => format!("{controller} moved from phase {from} to phase {to}."),
            EngineEvent::HiddenPhaseEntered { controller } => {
                format!("{controller} crossed into the hidden phase.")
            }
            EngineEvent::SecretUnlocked { controller } => {
                format!("Something answered inside {controller}. The hidden phase is open.")
            }
            EngineEvent::CycleCompleted {
                controller,
                hidden: true,
            } => format!("{controller} returned from beyond the final phase."),
            EngineEvent::CycleCompleted { controller, .. } => {
                format!("{controller} completed its cycle and fell quiet.")
            }
            EngineEvent::PhaseDeactivated { controller } => format!("{controller} was halted."),
            EngineEvent::CapabilityUnlocked {
                id,
                level,
                autonomous,
            } => {
                let how = if *autonomous { "chose to grow" } else { "was granted" };
                format!("The system {how} {id}, now at level {level}.")
            }
            EngineEvent::TechniqueActivated { id, .. } => format!("Technique {id} engaged."),
            EngineEvent::TechniqueExpired { id } => format!("Technique {id} wound down."),
            EngineEvent::WorldImproved { cycle } => {
                format!("Self-improvement cycle {cycle} complete.")
            }
            EngineEvent::SubsystemsIntegrated {
                evolution_level,
                awareness,
            } => format!(
                "Subsystems integrated at evolution {evolution_level:.2}, awareness {awareness:.2}."
            ),
        };
        format!("{prefix} {body}")
    }
}

/// Notification collaborator that turns engine events into narrations on a
/// background task, keeping a bounded history.
pub struct Herald {
    narrations: Arc<Mutex<VecDeque<Narration>>>,
    pub max_history: usize,
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl Herald {
    /// Spawns the narration task. Must be called inside a tokio runtime.
    pub fn new(narrator: Box<dyn Narrator>) -> Self {
        Self::with_history(narrator, 100)
    }

    pub fn with_history(narrator: Box<dyn Narrator>, max_history: usize) -> Self {
        let narrations = Arc::new(Mutex::new(VecDeque::<Narration>::with_capacity(max_history)));
        let (tx, mut rx) = mpsc::unbounded_channel::<EngineEvent>();

        let narrations_clone = Arc::clone(&narrations);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let text = narrator.narrate(&event).await;
                let narration = Narration {
                    id: Uuid::new_v4(),
                    at: Utc::now(),
                    kind: event.kind(),
                    text,
                    severity: event.severity(),
                };

                let mut list = narrations_clone
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if list.len() >= max_history {
                    if let Some(dropped) = list.pop_front() {
                        tracing::debug!(
                            kind = ?dropped.kind,
                            "Narration history full, dropping oldest"
                        );
                    }
                }
                list.push_back(narration);
            }
            tracing::debug!("Narration queue closed");
        });

        Self {
            narrations,
            max_history,
            tx,
        }
    }

    /// Current history, oldest first.
    #[must_use]
    pub fn narrations(&self) -> Vec<Narration> {
        self.narrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn consume_narrations(&self) -> Vec<Narration> {
        let mut list = self.narrations.lock().unwrap_or_else(PoisonError::into_inner);
        list.drain(..).collect()
    }
}

impl Notifier for Herald {
    fn notify(&self, event: &EngineEvent) -> anyhow::Result<()> {
        self.tx.send(event.clone()).map_err(|_| {
            tracing::debug!(kind = ?event.kind(), "Narration dropped, task stopped");
            anyhow::anyhow!("narration task has stopped")
        })
    }
}
