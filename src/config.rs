//! Fit configuration and the fallback policy
//!
//! `FitConfig` can be built in code with the `with_*` methods or loaded from a
//! JSON document in which every field is optional.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::estimate::cumulative_from;
use crate::types::{PerState, StateParameters};

/// Default number of decimal places in exported float literals
pub const DEFAULT_PRECISION: usize = 6;

/// Largest precision that still round-trips through a 32-bit float literal
pub const MAX_PRECISION: usize = 9;

/// Default include guard of the generated header
pub const DEFAULT_HEADER_GUARD: &str = "SMM_PARAMETERS_H";

/// Tolerance for probability vectors that must sum to one
const PROB_SUM_TOLERANCE: f64 = 1e-6;

/// Parameters substituted for a state that has no observations.
///
/// The default numbers have no statistical derivation; they are kept as-is
/// because deployed runtimes were tuned against them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FallbackFields")]
pub struct FallbackPolicy {
    pub mean_dwell: f64,
    pub rate: f64,
    pub transition_probs: PerState<f64>,
    pub cumulative_probs: PerState<f64>,
}

impl FallbackPolicy {
    /// Mean dwell 2.0 s, next action 0.6 / 0.2 / 0.2.
    pub const DEFAULT: FallbackPolicy = FallbackPolicy {
        mean_dwell: 2.0,
        rate: 0.5,
        transition_probs: PerState::new(0.6, 0.2, 0.2),
        cumulative_probs: PerState::new(0.6, 0.8, 1.0),
    };

    /// Build a custom policy; the rate and cumulative table are derived.
    pub fn new(mean_dwell: f64, transition_probs: PerState<f64>) -> Result<Self, ComputeError> {
        if !mean_dwell.is_finite() || mean_dwell <= 0.0 {
            return Err(ComputeError::InvalidConfig(format!(
                "fallback mean_dwell must be finite and positive, got {mean_dwell}"
            )));
        }

        check_distribution(&transition_probs)
            .map_err(|msg| ComputeError::InvalidConfig(format!("fallback {msg}")))?;

        Ok(Self {
            mean_dwell,
            rate: 1.0 / mean_dwell,
            cumulative_probs: cumulative_from(&transition_probs),
            transition_probs,
        })
    }

    /// The parameter record this policy stands in for.
    pub fn to_parameters(&self) -> StateParameters {
        StateParameters {
            mean_dwell: self.mean_dwell,
            rate: self.rate,
            transition_probs: self.transition_probs,
            cumulative_probs: self.cumulative_probs,
            sample_size: 0,
        }
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Serialized form of a custom fallback policy
#[derive(Deserialize)]
struct FallbackFields {
    mean_dwell: f64,
    transition_probs: PerState<f64>,
}

impl TryFrom<FallbackFields> for FallbackPolicy {
    type Error = ComputeError;

    fn try_from(fields: FallbackFields) -> Result<Self, Self::Error> {
        FallbackPolicy::new(fields.mean_dwell, fields.transition_probs)
    }
}

/// Options for a fitting run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Reject unrecognized action tokens instead of treating them as gaps
    pub strict_actions: bool,
    /// Parameters used for states without observations
    pub fallback: FallbackPolicy,
    /// Decimal places of exported float literals
    pub precision: usize,
    /// Include guard of the generated C header
    pub header_guard: String,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            strict_actions: false,
            fallback: FallbackPolicy::DEFAULT,
            precision: DEFAULT_PRECISION,
            header_guard: DEFAULT_HEADER_GUARD.to_string(),
        }
    }
}

impl FitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: FitConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_strict_actions(mut self, strict: bool) -> Self {
        self.strict_actions = strict;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_header_guard(mut self, guard: impl Into<String>) -> Self {
        self.header_guard = guard.into();
        self
    }

    /// Check precision bounds and that the header guard is a C identifier.
    pub fn validate(&self) -> Result<(), ComputeError> {
        if !(1..=MAX_PRECISION).contains(&self.precision) {
            return Err(ComputeError::InvalidConfig(format!(
                "precision must be in 1..={MAX_PRECISION}, got {}",
                self.precision
            )));
        }

        if !is_c_identifier(&self.header_guard) {
            return Err(ComputeError::InvalidConfig(format!(
                "header_guard must be a C identifier, got {:?}",
                self.header_guard
            )));
        }

        Ok(())
    }
}

/// Check that `probs` is a categorical distribution over the three actions.
pub(crate) fn check_distribution(probs: &PerState<f64>) -> Result<(), String> {
    let mut sum = 0.0;
    for (action, &p) in probs.iter() {
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(format!("probability for {action} must be in [0, 1], got {p}"));
        }
        sum += p;
    }
    if (sum - 1.0).abs() > PROB_SUM_TOLERANCE {
        return Err(format!("probabilities sum to {sum}, expected 1.0"));
    }
    Ok(())
}

fn is_c_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
