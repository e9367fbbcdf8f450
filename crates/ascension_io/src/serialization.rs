//! The world state is persisted as a flat JSON object mapping metric keys to
//! numeric strings, e.g. `{"awareness": "0.1", "recursion_depth": "1"}`.

use crate::error::{IoError, Result};
use ascension_data::WorldState;
use serde_json::{Map, Value};

/// Encodes the world state as its flat document.
pub fn encode_world(world: &WorldState) -> Result<String> {
    Ok(serde_json::to_string_pretty(&world.to_flat())?)
}

fn parse_document(json: &str) -> Result<Map<String, Value>> {
    if json.trim().is_empty() {
        return Err(IoError::EmptyDocument);
    }
    match serde_json::from_str(json)? {
        Value::Object(doc) => Ok(doc),
        Value::Array(_) => Err(IoError::NotAnObject("array")),
        Value::String(_) => Err(IoError::NotAnObject("string")),
        Value::Number(_) => Err(IoError::NotAnObject("number")),
        Value::Bool(_) => Err(IoError::NotAnObject("bool")),
        Value::Null => Err(IoError::NotAnObject("null")),
    }
}

/// Decodes a flat world document leniently.
///
/// Only a document that is not a JSON object fails. Unknown keys are skipped,
/// malformed entries keep their default with a warning, and every value is
/// clamped to its metric's bounds.
pub fn decode_world(json: &str) -> Result<WorldState> {
    let doc = parse_document(json)?;
    let mut world = WorldState::default();
    for (key, value) in &doc {
        let raw = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                tracing::warn!(key = %key, value = %other, "Ignoring non-numeric world entry");
                continue;
            }
        };
        match world.apply_flat_entry(key, &raw) {
            Ok(true) => {}
            Ok(false) => tracing::debug!(key = %key, "Skipping unknown world key"),
            Err(e) => tracing::warn!(error = %e, "Malformed world entry, keeping default"),
        }
    }
    Ok(world)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascension_data::MetricId;

    #[test]
    fn test_world_roundtrip() {
        let mut world = WorldState::default();
        world.set(MetricId::Awareness, 0.375);
        world.set(MetricId::EvolutionLevel, 3.5);
        let json = encode_world(&world).unwrap();
        assert!(json.contains("\"awareness\": \"0.375\""));
        assert_eq!(decode_world(&json).unwrap(), world);
    }

    #[test]
    fn test_decode_is_lenient() {
        let json = r#"{
            "awareness": "not a number",
            "recursion_depth": "4",
            "simulation_capacity": 12.5,
            "ethical_framework": "7",
            "from_the_future": "1"
        }"#;
        let world = decode_world(json).unwrap();
        assert_eq!(world.get(MetricId::Awareness), MetricId::Awareness.default_value());
        assert_eq!(world.get(MetricId::RecursionDepth), 4.0);
        assert_eq!(world.get(MetricId::SimulationCapacity), 12.5);
        assert_eq!(world.get(MetricId::EthicalFramework), 1.0);
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(matches!(decode_world("  "), Err(IoError::EmptyDocument)));
        assert!(matches!(decode_world("[1, 2]"), Err(IoError::NotAnObject("array"))));
        assert!(matches!(decode_world("{ broken"), Err(IoError::Json(_))));
    }
}
