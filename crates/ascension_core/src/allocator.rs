//! Fixed resource pool split across competing consumers.
//!
//! Invariant: shares are non-negative and sum to 1 (within 1e-9) after
//! construction and after every successful [`ResourceAllocator::set_share`].

use crate::error::{EngineError, Result};
use ascension_data::PoolSnapshot;
use serde::{Deserialize, Serialize};

pub const SUM_TOLERANCE: f64 = 1e-9;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Share {
    pub name: String,
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceAllocator {
    id: String,
    shares: Vec<Share>,
}

impl ResourceAllocator {
    /// Equal split across `names`.
    pub fn equal<S: AsRef<str>>(id: impl Into<String>, names: &[S]) -> Result<Self> {
        let weighted: Vec<(String, f64)> = names
            .iter()
            .map(|n| (n.as_ref().to_string(), 1.0))
            .collect();
        Self::weighted(id, weighted)
    }

    /// Split proportional to `weights`, normalized to sum to 1.
    pub fn weighted(id: impl Into<String>, weights: Vec<(String, f64)>) -> Result<Self> {
        let id = id.into();
        if weights.is_empty() {
            return Err(EngineError::contract(format!("pool {id:?} has no shares")));
        }
        if weights.iter().any(|(_, w)| !w.is_finite() || *w < 0.0) {
            return Err(EngineError::contract(format!(
                "pool {id:?} has a negative or non-finite weight"
            )));
        }
        for (i, (name, _)) in weights.iter().enumerate() {
            if weights[..i].iter().any(|(other, _)| other == name) {
                return Err(EngineError::contract(format!(
                    "pool {id:?} declares share {name:?} twice"
                )));
            }
        }
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Err(EngineError::contract(format!(
                "pool {id:?} weights sum to zero"
            )));
        }
        let shares = weights
            .into_iter()
            .map(|(name, w)| Share {
                name,
                fraction: w / total,
            })
            .collect();
        Ok(Self { id, shares })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    #[must_use]
    pub fn share(&self, name: &str) -> Option<f64> {
        self.shares
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.fraction)
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.shares.iter().map(|s| s.fraction).sum()
    }

    /// Sets `name` to `fraction` and rescales every other share proportionally
    /// so the pool still sums to 1.
    ///
    /// Out-of-range input is rejected with `InvalidShare`, not clamped. When all
    /// other shares are zero the remainder is split equally among them. A
    /// single-share pool only accepts 1.
    pub fn set_share(&mut self, name: &str, fraction: f64) -> Result<()> {
        let invalid = || EngineError::InvalidShare {
            pool: self.id.clone(),
            share: name.to_string(),
            value: fraction,
        };
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(invalid());
        }
        let idx = self
            .shares
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| EngineError::unknown("share", format!("{}/{}", self.id, name)))?;
        let others = self.shares.len() - 1;
        if others == 0 {
            if (fraction - 1.0).abs() > SUM_TOLERANCE {
                return Err(invalid());
            }
            self.shares[idx].fraction = 1.0;
            return Ok(());
        }

        let remaining = 1.0 - fraction;
        let others_sum: f64 = self
            .shares
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, s)| s.fraction)
            .sum();

        for (i, share) in self.shares.iter_mut().enumerate() {
            if i == idx {
                share.fraction = fraction;
            } else if others_sum > 0.0 {
                share.fraction = share.fraction * remaining / others_sum;
            } else {
                share.fraction = remaining / others as f64;
            }
        }
        tracing::debug!(pool = %self.id, share = name, fraction, "Share rebalanced");
        Ok(())
    }

    #[must_use]
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            id: self.id.clone(),
            shares: self
                .shares
                .iter()
                .map(|s| (s.name.clone(), s.fraction))
                .collect(),
        }
    }
}
