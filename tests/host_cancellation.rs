use ascension_lib::model::clock::TokioClock;
use ascension_lib::model::gate::Condition;
use ascension_lib::model::observer::{HeuristicNarrator, Herald};
use ascension_lib::model::persistence::MemoryStore;
use ascension_lib::model::phase::PhaseConfig;
use ascension_lib::model::scheduler::{Host, TimerKey};
use ascension_lib::model::state::{EventKind, MetricId, PhaseState};
use ascension_lib::model::walker::{Drift, WalkRule};
use ascension_lib::model::{Collaborators, Engine, EngineConfig};
use std::sync::Arc;
use std::time::Duration;

fn secret_protocol() -> PhaseConfig {
    let mut config = PhaseConfig::new("protocol", 5, 60);
    config.hidden_duration_secs = Some(90);
    config.hidden_condition = Some(Condition::All {
        conditions: vec![
            Condition::PhaseAtLeast { phase: 3 },
            Condition::Above {
                metric: MetricId::Consciousness,
                threshold: 60.0,
            },
        ],
    });
    config.vitals =
        vec![WalkRule::new(MetricId::Consciousness, Drift::symmetric(0.0)).starting_at(90.0)];
    config
}

fn host_with(config: &EngineConfig, collaborators: Collaborators) -> Host {
    let engine = Engine::new(config, collaborators).expect("Failed to create engine");
    Host::new(engine, config.schedule.clone(), Arc::new(TokioClock::default()))
}

fn ticks(host: &Host) -> u64 {
    host.with_engine(|engine, _| engine.metrics().tick_count())
}

#[tokio::test(start_paused = true)]
async fn test_timed_run_through_hidden_phase_is_narrated() {
    let config = EngineConfig {
        seed: Some(21),
        phases: vec![secret_protocol()],
        ..Default::default()
    };
    let herald = Arc::new(Herald::new(Box::new(HeuristicNarrator)));
    let host = host_with(
        &config,
        Collaborators {
            notifier: Box::new(Arc::clone(&herald)),
            ..Default::default()
        },
    );

    host.activate_phase("protocol").unwrap();
    tokio::time::sleep(Duration::from_secs(420)).await;

    let snapshot = host.snapshot();
    let phase = snapshot.phase("protocol").unwrap();
    assert_eq!(phase.state, PhaseState::Inactive);
    assert_eq!(phase.runs_completed, 1);
    assert!(phase.hidden_unlocked);

    let kinds: Vec<EventKind> = herald.narrations().iter().map(|n| n.kind).collect();
    assert_eq!(kinds.first(), Some(&EventKind::PhaseActivated));
    assert!(kinds.contains(&EventKind::SecretUnlocked));
    assert!(kinds.contains(&EventKind::HiddenPhaseEntered));
    assert_eq!(kinds.last(), Some(&EventKind::CycleCompleted));

    host.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_final_until_restarted() {
    let config = EngineConfig {
        seed: Some(4),
        ..Default::default()
    };
    let host = host_with(&config, Collaborators::default());

    host.start();
    tokio::time::sleep(Duration::from_secs(10)).await;
    host.stop();
    assert!(!host.is_armed(&TimerKey::Evolution));
    assert!(!host.is_armed(&TimerKey::Monitor("property_matrix".into())));

    let stopped_at = ticks(&host);
    assert!(stopped_at > 0);
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(ticks(&host), stopped_at);

    host.start();
    assert!(host.is_armed(&TimerKey::Phase("protocol".into())));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(ticks(&host) > stopped_at);
    host.stop();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_saves_the_world() {
    let store = MemoryStore::new();
    let config = EngineConfig {
        seed: Some(8),
        ..Default::default()
    };
    let host = host_with(
        &config,
        Collaborators {
            store: Box::new(store.clone()),
            ..Default::default()
        },
    );

    host.start();
    tokio::time::sleep(Duration::from_secs(5)).await;
    let saves = store.save_count();
    host.shutdown().unwrap();

    assert_eq!(store.save_count(), saves + 1);
    let world = host.with_engine(|engine, _| engine.world().clone());
    assert_eq!(store.saved(), Some(world));
}

#[tokio::test(start_paused = true)]
async fn test_interleaved_toggles_settle_on_last_call() {
    let config = EngineConfig {
        seed: Some(13),
        ..Default::default()
    };
    let host = Arc::new(host_with(&config, Collaborators::default()));

    let mut tasks = Vec::new();
    for i in 0..20 {
        let host = Arc::clone(&host);
        tasks.push(tokio::spawn(async move {
            host.set_autonomous(i % 2 == 0);
            tokio::time::sleep(Duration::from_millis(i * 250)).await;
            host.set_autonomous(i % 3 == 0);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    host.set_autonomous(false);
    assert!(!host.is_armed(&TimerKey::Autonomous));
    let autonomous = host.with_engine(|e, _| e.metrics().counter("evolution.autonomous"));
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(
        host.with_engine(|e, _| e.metrics().counter("evolution.autonomous")),
        autonomous
    );
    assert!(!host.snapshot().autonomous);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_tick_after_deactivate_under_contention() {
    let mut config = EngineConfig {
        seed: Some(99),
        ..Default::default()
    };
    config.schedule.phase_tick_ms = 1;
    let host = host_with(&config, Collaborators::default());

    for _ in 0..5 {
        host.activate_phase("protocol").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        host.deactivate_phase("protocol").unwrap();

        let counted = host.with_engine(|e, _| e.metrics().counter("phase.protocol.ticks"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            host.with_engine(|e, _| e.metrics().counter("phase.protocol.ticks")),
            counted
        );
        assert_eq!(
            host.snapshot().phase("protocol").unwrap().state,
            PhaseState::Inactive
        );
    }
}
