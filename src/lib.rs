//! smm-fit - Semi-Markov behavioral model fitting
//!
//! Fits a three-state semi-Markov model of short-video viewing behavior from a
//! timestamped event log and exports the parameters as a C header of float
//! constants for embedded runtimes: event log → transition extraction →
//! parameter estimation → header encoding.
//!
//! ## Modules
//!
//! - **Fitting**: [`extract`] and [`estimate`] turn ordered events into per-state parameters
//! - **Input**: [`schema`] parses CSV, NDJSON and JSON event logs
//! - **Output**: [`encoder`] writes the C header and JSON parameter table, [`report`] the statistics
//! - **Simulation**: [`simulate`] samples synthetic event logs from a fitted table

pub mod config;
pub mod encoder;
pub mod error;
pub mod estimate;
pub mod extract;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod simulate;
pub mod types;

pub use config::{FallbackPolicy, FitConfig};
pub use encoder::{ParameterTable, ParameterTableEncoder};
pub use error::ComputeError;
pub use estimate::{estimate, estimate_with};
pub use extract::{extract, ExtractionSummary};
pub use pipeline::{fit_events, fit_to_header, FittedModel, ModelFitter};
pub use report::ModelReport;
pub use simulate::{simulate_events, SemiMarkovSampler};
pub use types::{Action, Event, Observation, PerState, StateObservationGroup, StateParameters};

// Schema exports
pub use schema::{EventFormat, EventLogAdapter, RawEvent, SCHEMA_VERSION};

/// Crate version embedded in exported parameter tables
pub const SMM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exported parameter tables
pub const PRODUCER_NAME: &str = "smm-fit";
