//! Run configuration for the differential value iteration driver.

use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How a sweep visits states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRule {
    /// Synchronous: every state reads the previous complete vector.
    #[default]
    Jacobi,
    /// In place: later states see values already updated in this sweep.
    GaussSeidel,
}

/// What is subtracted from the value vector after every sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Centering {
    #[default]
    ReferenceState,
    SpanMidpoint,
    /// Plain undiscounted value iteration. Values drift without bound.
    Disabled,
}

/// Which state serves as the reference under [`Centering::ReferenceState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSelection {
    /// Always `reference_state`.
    #[default]
    Fixed,
    /// The state with the largest residual in the current sweep.
    MaxResidual,
    /// The state with the smallest residual in the current sweep.
    MinResidual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DviConfig {
    pub update_rule: UpdateRule,
    pub centering: Centering,
    pub reference_state: usize,
    pub reference_selection: ReferenceSelection,
    /// Span-seminorm residual below which a run has converged.
    pub tolerance: f64,
    pub max_sweeps: usize,
    /// Relaxation factor alpha in (0, 1].
    pub step_size: f64,
    /// Damping beta in [0, 1] of the running gain fed back into the sweep.
    pub gain_step_size: f64,
    pub divergence_threshold: f64,
    /// Gauss-Seidel visiting order; ascending state index when absent.
    pub sweep_order: Option<Vec<usize>>,
    /// Compute Jacobi sweeps on the rayon pool.
    pub parallel: bool,
}

impl Default for DviConfig {
    fn default() -> Self {
        Self {
            update_rule: UpdateRule::default(),
            centering: Centering::default(),
            reference_state: 0,
            reference_selection: ReferenceSelection::default(),
            tolerance: 1e-8,
            max_sweeps: 10_000,
            step_size: 1.0,
            gain_step_size: 0.25,
            divergence_threshold: f64::MAX,
            sweep_order: None,
            parallel: false,
        }
    }
}

impl DviConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| Error::Io {
            operation: format!("read config '{}'", path.display()),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Checks the settings that do not depend on a model.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.) {
            return Err(Error::invalid_configuration(format!(
                "tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }
        if self.max_sweeps == 0 {
            return Err(Error::invalid_configuration("max_sweeps must be at least 1"));
        }
        if !(self.step_size > 0. && self.step_size <= 1.) {
            return Err(Error::invalid_configuration(format!(
                "step_size must be in (0, 1], got {}",
                self.step_size
            )));
        }
        if !(0. ..=1.).contains(&self.gain_step_size) {
            return Err(Error::invalid_configuration(format!(
                "gain_step_size must be in [0, 1], got {}",
                self.gain_step_size
            )));
        }
        if self.divergence_threshold.is_nan() || self.divergence_threshold <= 0. {
            return Err(Error::invalid_configuration(format!(
                "divergence_threshold must be positive, got {}",
                self.divergence_threshold
            )));
        }

        Ok(())
    }

    /// Checks the settings that refer to states of a model with `n_s` states.
    pub fn validate_for(&self, n_s: usize) -> Result<()> {
        self.validate()?;

        if self.centering == Centering::ReferenceState && self.reference_state >= n_s {
            return Err(Error::invalid_configuration(format!(
                "reference_state {} is out of range for {} states",
                self.reference_state, n_s
            )));
        }

        if let Some(order) = &self.sweep_order {
            let mut seen = vec![false; n_s];
            for &s in order {
                if s >= n_s || seen[s] {
                    return Err(Error::invalid_configuration(format!(
                        "sweep_order must be a permutation of 0..{n_s}, got {order:?}"
                    )));
                }
                seen[s] = true;
            }
            if order.len() != n_s {
                return Err(Error::invalid_configuration(format!(
                    "sweep_order must be a permutation of 0..{n_s}, got {order:?}"
                )));
            }
        }

        Ok(())
    }
}
