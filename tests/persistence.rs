mod common;

use ascension_lib::model::collab::WorldStore;
use ascension_lib::model::persistence::{BackgroundStore, FileStore, MemoryStore};
use ascension_lib::model::state::{MetricId, WorldState};
use common::EngineBuilder;
use std::path::PathBuf;

fn temp_world_file() -> PathBuf {
    std::env::temp_dir().join(format!("ascension_it_{}.json", uuid::Uuid::new_v4()))
}

#[test]
fn test_world_survives_restart() {
    let path = temp_world_file();

    {
        let (mut engine, _notifier) = EngineBuilder::new()
            .with_store(FileStore::new(&path))
            .build();
        assert_eq!(engine.world(), &WorldState::default());
        engine.set_world_metric(MetricId::Awareness, 0.42).unwrap();
        engine
            .set_world_metric(MetricId::RecursionDepth, 7.5)
            .unwrap();
    }

    let (engine, _notifier) = EngineBuilder::new()
        .with_store(FileStore::new(&path))
        .build();
    assert_eq!(engine.world().get(MetricId::Awareness), 0.42);
    assert_eq!(engine.world().get(MetricId::RecursionDepth), 7.5);
    assert_eq!(engine.world().get(MetricId::EvolutionLevel), 1.0);

    std::fs::remove_file(path).unwrap();
}

#[test]
fn test_document_is_flat_numeric_strings() {
    let path = temp_world_file();
    let (mut engine, _notifier) = EngineBuilder::new()
        .with_store(FileStore::new(&path))
        .build();
    engine.set_world_metric(MetricId::Awareness, 0.25).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let doc: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content).unwrap();
    assert_eq!(doc.len(), MetricId::WORLD.len());
    assert_eq!(doc["awareness"], serde_json::json!("0.25"));
    for id in MetricId::WORLD {
        let raw = doc[id.key()].as_str().expect("value is a string");
        assert!(raw.parse::<f64>().is_ok(), "{} = {raw:?}", id.key());
    }
    assert!(!path.with_file_name(format!(
        "{}.tmp",
        path.file_name().unwrap().to_string_lossy()
    ))
    .exists());

    std::fs::remove_file(path).unwrap();
}

#[test]
fn test_corrupt_file_starts_fresh() {
    let path = temp_world_file();
    std::fs::write(&path, "{ this is not json").unwrap();

    let (engine, _notifier) = EngineBuilder::new()
        .with_store(FileStore::new(&path))
        .build();
    assert_eq!(engine.world(), &WorldState::default());

    std::fs::remove_file(path).unwrap();
}

#[test]
fn test_partial_document_is_read_leniently() {
    let path = temp_world_file();
    std::fs::write(
        &path,
        r#"{
            "awareness": "0.7",
            "simulation_capacity": 64,
            "evolution_level": "lots",
            "ethical_framework": "3.5",
            "written_by_a_newer_build": "1"
        }"#,
    )
    .unwrap();

    let (engine, _notifier) = EngineBuilder::new()
        .with_store(FileStore::new(&path))
        .build();
    let world = engine.world();
    assert_eq!(world.get(MetricId::Awareness), 0.7);
    assert_eq!(world.get(MetricId::SimulationCapacity), 64.0);
    assert_eq!(world.get(MetricId::EvolutionLevel), 1.0);
    assert_eq!(world.get(MetricId::EthicalFramework), 1.0);
    assert_eq!(world.get(MetricId::RecursionDepth), 1.0);

    std::fs::remove_file(path).unwrap();
}

#[test]
fn test_load_failure_starts_fresh() {
    let store = MemoryStore::with_state({
        let mut world = WorldState::default();
        world.set(MetricId::Awareness, 0.9);
        world
    });
    store.fail_loads(true);

    let (engine, _notifier) = EngineBuilder::new().with_store(store).build();
    assert_eq!(engine.world(), &WorldState::default());
}

#[test]
fn test_background_store_writes_on_shutdown() {
    let path = temp_world_file();

    {
        let store = BackgroundStore::new(FileStore::new(&path));
        let (mut engine, _notifier) = EngineBuilder::new().with_store(store).build();
        for cycle in 0..5 {
            engine.tick_improvement(cycle * 300_000);
        }
        engine.set_world_metric(MetricId::Awareness, 0.33).unwrap();
        engine.save_now().unwrap();

        let on_disk = FileStore::new(&path).load().unwrap().unwrap();
        assert_eq!(&on_disk, engine.world());
    }

    let (engine, _notifier) = EngineBuilder::new()
        .with_store(BackgroundStore::new(FileStore::new(&path)))
        .build();
    assert_eq!(engine.world().get(MetricId::Awareness), 0.33);

    std::fs::remove_file(path).unwrap();
}

#[test]
fn test_background_store_counts_failed_writes() {
    let inner = MemoryStore::new();
    inner.fail_saves(true);
    let store = BackgroundStore::new(inner.clone());

    assert!(store.save(&WorldState::default()).is_ok());
    store.flush().unwrap();

    assert_eq!(store.failures(), 1);
    assert_eq!(inner.save_count(), 0);
}
