//! Fitting pipeline orchestration
//!
//! This module provides the public API for model fitting. It orchestrates the
//! full pipeline from an event log to an exported parameter table.

use serde::Serialize;
use tracing::info;

use crate::config::FitConfig;
use crate::encoder::{ParameterTable, ParameterTableEncoder};
use crate::error::ComputeError;
use crate::estimate::estimate_with;
use crate::extract::{extract_with_summary, ExtractionSummary};
use crate::report::ModelReport;
use crate::schema::{EventFormat, EventLogAdapter};
use crate::types::{Action, Event, PerState, StateParameters};

/// Result of a fitting run
#[derive(Debug, Clone, Serialize)]
pub struct FittedModel {
    /// Per-state parameters in table order
    pub parameters: PerState<StateParameters>,
    /// What the extractor kept and dropped
    pub summary: ExtractionSummary,
}

impl FittedModel {
    /// True when at least one state was filled in by the fallback policy
    pub fn has_fallback_states(&self) -> bool {
        self.parameters.iter().any(|(_, p)| p.is_fallback())
    }

    /// States filled in by the fallback policy
    pub fn fallback_states(&self) -> Vec<Action> {
        self.parameters
            .iter()
            .filter(|(_, p)| p.is_fallback())
            .map(|(state, _)| state)
            .collect()
    }

    pub fn report(&self) -> ModelReport {
        ModelReport::from_parameters(&self.parameters)
    }
}

/// Fit ordered events with default settings.
pub fn fit_events(events: &[Event]) -> FittedModel {
    ModelFitter::new().fit(events)
}

/// Convert an event log to the C header table (stateless, one-shot).
///
/// # Arguments
/// * `input` - Raw event log text
/// * `format` - Encoding of `input`
///
/// # Returns
/// Header file contents
///
/// # Example
/// ```ignore
/// let header = fit_to_header(csv, EventFormat::Csv)?;
/// ```
pub fn fit_to_header(input: &str, format: EventFormat) -> Result<String, ComputeError> {
    let fitter = ModelFitter::new();
    let model = fitter.fit_text(input, format)?;
    Ok(fitter.encode_header(&model))
}

/// Fitter bound to a validated configuration.
pub struct ModelFitter {
    config: FitConfig,
    encoder: ParameterTableEncoder,
}

impl Default for ModelFitter {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelFitter {
    /// Create a fitter with the default configuration
    pub fn new() -> Self {
        let config = FitConfig::default();
        Self {
            encoder: ParameterTableEncoder::from_config(&config),
            config,
        }
    }

    /// Create a fitter with a custom configuration
    pub fn with_config(config: FitConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            encoder: ParameterTableEncoder::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Parse, validate and order an event log
    pub fn load_events(&self, input: &str, format: EventFormat) -> Result<Vec<Event>, ComputeError> {
        let raw = EventLogAdapter::parse(input, format)?;
        EventLogAdapter::to_events(&raw, self.config.strict_actions)
    }

    /// Fit ordered events
    pub fn fit(&self, events: &[Event]) -> FittedModel {
        // Stage 1: Extract observations per previous-action state
        let (groups, summary) = extract_with_summary(events);

        // Stage 2: Estimate parameters
        let parameters = estimate_with(&groups, &self.config.fallback);

        info!(
            events = events.len(),
            observations = summary.observations,
            "fitted semi-Markov model"
        );

        FittedModel {
            parameters,
            summary,
        }
    }

    /// Load and fit an event log
    pub fn fit_text(&self, input: &str, format: EventFormat) -> Result<FittedModel, ComputeError> {
        let events = self.load_events(input, format)?;
        Ok(self.fit(&events))
    }

    /// Render the C header for a fitted model
    pub fn encode_header(&self, model: &FittedModel) -> String {
        self.encoder.encode_header(&model.parameters)
    }

    /// Parameter table with producer metadata
    pub fn encode_table(&self, model: &FittedModel) -> ParameterTable {
        self.encoder.encode(&model.parameters)
    }

    /// Render the pretty-printed JSON table for a fitted model
    pub fn encode_json(&self, model: &FittedModel) -> Result<String, ComputeError> {
        self.encoder.encode_to_json(&model.parameters)
    }
}
