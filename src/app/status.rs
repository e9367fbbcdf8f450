//! One-line status summaries of an engine snapshot for the headless log.

use ascension_data::{EngineSnapshot, MetricId, PhaseState};

/// Phases, key world metrics, unlocked capabilities and active techniques,
/// e.g. `protocol 3/5 · framework off | awareness 0.12 · evolution 1.04 | caps 1/4 | techs 0`.
pub fn summarize(snapshot: &EngineSnapshot) -> String {
    let phases = snapshot
        .phases
        .iter()
        .map(|p| match p.state {
            PhaseState::Inactive => format!("{} off", p.id),
            PhaseState::Hidden => format!("{} hidden", p.id),
            PhaseState::Phase(n) => format!("{} {}/{}", p.id, n, p.phase_count),
        })
        .collect::<Vec<_>>()
        .join(" · ");
    let unlocked = snapshot.capabilities.iter().filter(|c| c.unlocked).count();
    let active = snapshot.techniques.iter().filter(|t| t.active).count();
    format!(
        "{phases} | awareness {:.2} · evolution {:.2} | caps {unlocked}/{} | techs {active}{}",
        snapshot.metrics.get(MetricId::Awareness),
        snapshot.metrics.get(MetricId::EvolutionLevel),
        snapshot.capabilities.len(),
        if snapshot.autonomous { " | autonomous" } else { "" },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascension_core::{Collaborators, Engine, EngineConfig};

    #[test]
    fn test_summary_of_fresh_engine() {
        let config = EngineConfig {
            seed: Some(1),
            ..Default::default()
        };
        let mut engine = Engine::new(&config, Collaborators::default()).unwrap();
        engine.activate_phase("protocol", 0).unwrap();
        let line = summarize(&engine.snapshot(0));
        assert!(line.starts_with("framework off · protocol 1/5"));
        assert!(line.contains("awareness 0.10"));
        assert!(line.ends_with("caps 0/4 | techs 0"));
    }
}
