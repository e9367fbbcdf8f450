use super::metric::{MetricId, MetricSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted top-level aggregate of slow-moving metrics.
///
/// Every [`MetricId::WORLD`] metric is always present; writes are clamped to the
/// metric's default bounds so no reader can observe an out-of-range value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorldState {
    values: BTreeMap<MetricId, f64>,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            values: MetricId::WORLD
                .into_iter()
                .map(|id| (id, id.default_value()))
                .collect(),
        }
    }
}

impl WorldState {
    #[must_use]
    pub fn get(&self, id: MetricId) -> f64 {
        self.values
            .get(&id)
            .copied()
            .unwrap_or_else(|| id.default_value())
    }

    /// Writes a clamped value and returns what was stored. Non-world metrics are ignored.
    pub fn set(&mut self, id: MetricId, value: f64) -> f64 {
        if !id.is_world() {
            return self.get(id);
        }
        let clamped = id.default_bounds().clamp(value);
        self.values.insert(id, clamped);
        clamped
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricId, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    /// Flat, human-readable `{key -> numeric string}` form used by persistence.
    #[must_use]
    pub fn to_flat(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(id, v)| (id.key().to_string(), v.to_string()))
            .collect()
    }

    /// Applies one flat entry.
    ///
    /// Returns `Ok(false)` for keys that are not world metrics so callers can
    /// skip entries written by newer builds.
    pub fn apply_flat_entry(&mut self, key: &str, raw: &str) -> anyhow::Result<bool> {
        let Some(id) = MetricId::from_key(key).filter(MetricId::is_world) else {
            return Ok(false);
        };
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("metric {key}: cannot parse {raw:?}: {e}"))?;
        anyhow::ensure!(value.is_finite(), "metric {key}: non-finite value {raw:?}");
        self.set(id, value);
        Ok(true)
    }
}

impl MetricSource for WorldState {
    fn metric(&self, id: MetricId) -> Option<f64> {
        self.values.get(&id).copied()
    }
}
