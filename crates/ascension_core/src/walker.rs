//! Bounded random walks for scalar metrics.
//!
//! A [`MetricWalker`] draws `delta ~ U[-down, +up]`, scales it by a bias hint,
//! adds it to the current value and clamps the result into its bounds. An
//! asymmetric drift (`up > down`) makes a metric trend upward; couplings make
//! the trend depend on other metrics (`scale = Π (1 + source / divisor)`).

use crate::error::{EngineError, Result};
use ascension_data::{Bounds, MetricId, MetricSource};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Uniform step distribution over `[-down, +up]`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Drift {
    pub down: f64,
    pub up: f64,
}

impl Drift {
    #[must_use]
    pub const fn symmetric(amplitude: f64) -> Self {
        Self {
            down: amplitude,
            up: amplitude,
        }
    }

    #[must_use]
    pub const fn upward(up: f64) -> Self {
        Self { down: 0.0, up }
    }
}

/// Makes a metric's step grow with another metric: factor `1 + source / divisor`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Coupling {
    pub source: MetricId,
    pub divisor: f64,
}

/// Declarative description of one walked metric, as found in config files.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WalkRule {
    pub metric: MetricId,
    pub drift: Drift,
    #[serde(default)]
    pub couplings: Vec<Coupling>,
    /// Overrides [`MetricId::default_bounds`].
    #[serde(default)]
    pub bounds: Option<Bounds>,
    /// Overrides [`MetricId::default_value`] for panel vitals.
    #[serde(default)]
    pub initial: Option<f64>,
}

impl WalkRule {
    #[must_use]
    pub fn new(metric: MetricId, drift: Drift) -> Self {
        Self {
            metric,
            drift,
            couplings: Vec::new(),
            bounds: None,
            initial: None,
        }
    }

    #[must_use]
    pub fn coupled(mut self, source: MetricId, divisor: f64) -> Self {
        self.couplings.push(Coupling { source, divisor });
        self
    }

    #[must_use]
    pub fn starting_at(mut self, initial: f64) -> Self {
        self.initial = Some(initial);
        self
    }

    #[must_use]
    pub fn within(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    #[must_use]
    pub fn effective_bounds(&self) -> Bounds {
        self.bounds.unwrap_or_else(|| self.metric.default_bounds())
    }
}

/// Stateless step function for one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricWalker {
    bounds: Bounds,
    drift: Drift,
    couplings: Vec<Coupling>,
}

impl MetricWalker {
    /// Fails with `ContractViolation` on malformed bounds or drift.
    pub fn new(bounds: Bounds, drift: Drift) -> Result<Self> {
        if !bounds.is_valid() {
            return Err(EngineError::contract(format!(
                "metric bounds [{}, {}] are not a valid range",
                bounds.min, bounds.max
            )));
        }
        if !(drift.down.is_finite() && drift.up.is_finite() && drift.down >= 0.0 && drift.up >= 0.0)
        {
            return Err(EngineError::contract(format!(
                "drift [-{}, +{}] must be finite and non-negative",
                drift.down, drift.up
            )));
        }
        Ok(Self {
            bounds,
            drift,
            couplings: Vec::new(),
        })
    }

    pub fn from_rule(rule: &WalkRule) -> Result<Self> {
        let mut walker = Self::new(rule.effective_bounds(), rule.drift)?;
        for c in &rule.couplings {
            if !(c.divisor.is_finite() && c.divisor != 0.0) {
                return Err(EngineError::contract(format!(
                    "coupling of {} on {} has divisor {}",
                    rule.metric, c.source, c.divisor
                )));
            }
            walker.couplings.push(*c);
        }
        Ok(walker)
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Product of all coupling factors; metrics missing from `source` count as 0.
    #[must_use]
    pub fn growth_scale(&self, source: &dyn MetricSource) -> f64 {
        self.couplings
            .iter()
            .map(|c| 1.0 + source.metric(c.source).unwrap_or(0.0) / c.divisor)
            .product::<f64>()
            .max(0.0)
    }

    /// One walk step. `bias` multiplies the drawn delta.
    pub fn step<R: Rng + ?Sized>(&self, value: f64, bias: f64, rng: &mut R) -> f64 {
        let delta = if self.drift.down == 0.0 && self.drift.up == 0.0 {
            0.0
        } else {
            rng.gen_range(-self.drift.down..=self.drift.up)
        };
        let bias = if bias.is_finite() { bias } else { 1.0 };
        self.bounds.clamp(value + delta * bias)
    }
}

/// A typed bag of walked metrics, e.g. one panel's vitals.
#[derive(Debug, Clone, Default)]
pub struct MetricSet {
    entries: BTreeMap<MetricId, (MetricWalker, f64)>,
}

impl MetricSet {
    pub fn from_rules(rules: &[WalkRule]) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for rule in rules {
            let walker = MetricWalker::from_rule(rule)?;
            let initial = walker
                .bounds()
                .clamp(rule.initial.unwrap_or_else(|| rule.metric.default_value()));
            if entries.insert(rule.metric, (walker, initial)).is_some() {
                return Err(EngineError::contract(format!(
                    "metric {} declared twice in one set",
                    rule.metric
                )));
            }
        }
        Ok(Self { entries })
    }

    #[must_use]
    pub fn get(&self, id: MetricId) -> Option<f64> {
        self.entries.get(&id).map(|(_, v)| *v)
    }

    /// Overwrites a value, clamped. Returns `None` for metrics not in the set.
    pub fn set(&mut self, id: MetricId, value: f64) -> Option<f64> {
        let (walker, v) = self.entries.get_mut(&id)?;
        *v = walker.bounds().clamp(value);
        Some(*v)
    }

    #[must_use]
    pub fn values(&self) -> BTreeMap<MetricId, f64> {
        self.entries.iter().map(|(k, (_, v))| (*k, *v)).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Steps every metric once.
    ///
    /// Couplings read the values from before this step, looking in the set
    /// itself first and then in `fallback`.
    pub fn step_all<R: Rng + ?Sized>(
        &mut self,
        bias: f64,
        fallback: &dyn MetricSource,
        rng: &mut R,
    ) {
        let before = Layered {
            top: self.values(),
            bottom: fallback,
        };
        let mut next = Vec::with_capacity(self.entries.len());
        for (id, (walker, value)) in &self.entries {
            let scale = walker.growth_scale(&before);
            next.push((*id, walker.step(*value, bias * scale, rng)));
        }
        for (id, v) in next {
            if let Some((_, slot)) = self.entries.get_mut(&id) {
                *slot = v;
            }
        }
    }
}

impl MetricSource for MetricSet {
    fn metric(&self, id: MetricId) -> Option<f64> {
        self.get(id)
    }
}

/// Looks metrics up in `top`, then `bottom`.
pub(crate) struct Layered<'a, T: MetricSource> {
    pub top: T,
    pub bottom: &'a dyn MetricSource,
}

impl<T: MetricSource> MetricSource for Layered<'_, T> {
    fn metric(&self, id: MetricId) -> Option<f64> {
        self.top.metric(id).or_else(|| self.bottom.metric(id))
    }
}
