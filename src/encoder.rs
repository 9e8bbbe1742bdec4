//! Parameter table encoder
//!
//! Encodes fitted per-state parameters as a C header of float constants for
//! the embedded runtime, or as a JSON document for tooling. Constant names and
//! the per-state order (SCROLL, LIKE, DUBIOUS) are part of the runtime contract.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{check_distribution, FitConfig, DEFAULT_HEADER_GUARD, DEFAULT_PRECISION};
use crate::error::ComputeError;
use crate::types::{Action, PerState, StateParameters};
use crate::{PRODUCER_NAME, SMM_VERSION};

/// Current JSON table format version
pub const TABLE_FORMAT_VERSION: &str = "smm.parameters.v1";

/// Producer metadata embedded in JSON tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// JSON form of a fitted parameter table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    pub format_version: String,
    pub producer: TableProducer,
    pub computed_at_utc: String,
    pub states: PerState<StateParameters>,
}

impl ParameterTable {
    /// Parse a JSON table previously written by [`ParameterTableEncoder::encode_to_json`]
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let table: ParameterTable = serde_json::from_str(json)?;
        if table.format_version != TABLE_FORMAT_VERSION {
            return Err(ComputeError::ParseError(format!(
                "unsupported table format {:?}, expected {:?}",
                table.format_version, TABLE_FORMAT_VERSION
            )));
        }
        table.validate()?;
        Ok(table)
    }

    /// Check that every state can drive the sampler: positive finite dwell
    /// parameters, a probability distribution, and a monotone cumulative
    /// table ending at exactly 1.0.
    pub fn validate(&self) -> Result<(), ComputeError> {
        for (state, p) in self.states.iter() {
            check_state(p)
                .map_err(|msg| ComputeError::InvalidTable(format!("state {state}: {msg}")))?;
        }
        Ok(())
    }
}

fn check_state(p: &StateParameters) -> Result<(), String> {
    if !p.mean_dwell.is_finite() || p.mean_dwell <= 0.0 {
        return Err(format!(
            "mean_dwell must be finite and positive, got {}",
            p.mean_dwell
        ));
    }
    if !p.rate.is_finite() || p.rate <= 0.0 {
        return Err(format!("rate must be finite and positive, got {}", p.rate));
    }
    check_distribution(&p.transition_probs)?;

    let mut prev = 0.0;
    for (action, &cum) in p.cumulative_probs.iter() {
        if !cum.is_finite() || cum < prev || cum > 1.0 {
            return Err(format!(
                "cumulative probability for {action} must be in [{prev}, 1], got {cum}"
            ));
        }
        prev = cum;
    }
    if p.cumulative_probs[Action::DubiousScroll] != 1.0 {
        return Err(format!(
            "last cumulative probability must be exactly 1.0, got {}",
            p.cumulative_probs[Action::DubiousScroll]
        ));
    }
    Ok(())
}

/// Parameter table encoder
pub struct ParameterTableEncoder {
    instance_id: String,
    precision: usize,
    header_guard: String,
}

impl Default for ParameterTableEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterTableEncoder {
    /// Create a new encoder with a unique instance ID and default formatting
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            precision: DEFAULT_PRECISION,
            header_guard: DEFAULT_HEADER_GUARD.to_string(),
        }
    }

    /// Create an encoder using the formatting options of `config`
    pub fn from_config(config: &FitConfig) -> Self {
        Self {
            precision: config.precision,
            header_guard: config.header_guard.clone(),
            ..Self::new()
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    /// Render the C header consumed by the embedded runtime.
    pub fn encode_header(&self, params: &PerState<StateParameters>) -> String {
        let guard = &self.header_guard;
        let mut out = String::new();

        out.push_str("// Semi-Markov Model Parameters with State Memory\n");
        out.push_str("// Auto-generated from interaction data\n\n");
        out.push_str(&format!("#ifndef {guard}\n#define {guard}\n\n"));

        out.push_str("// State definitions\n");
        for action in Action::ALL {
            out.push_str(&format!(
                "#define STATE_AFTER_{} {}\n",
                action.const_name(),
                action.as_index()
            ));
        }
        out.push_str("\n// Action definitions\n");
        for action in Action::ALL {
            out.push_str(&format!(
                "#define ACTION_{} {}\n",
                action.as_str().to_uppercase(),
                action.as_index()
            ));
        }
        out.push('\n');

        for (state, p) in params.iter() {
            out.push_str(&self.state_block(state, p));
        }

        out.push_str("\n// Lookup arrays for efficient state-dependent parameter access\n");
        out.push_str(&lookup_array("MEAN_DWELL_BY_STATE", "MEAN_DWELL_AFTER"));
        out.push('\n');
        out.push_str(&lookup_array("DWELL_RATE_BY_STATE", "DWELL_RATE_AFTER"));
        out.push('\n');
        out.push_str(&lookup_array(
            "CUM_PROB_SCROLL_BY_STATE",
            "CUM_PROB_SCROLL_AFTER",
        ));
        out.push('\n');
        out.push_str(&lookup_array("CUM_PROB_LIKE_BY_STATE", "CUM_PROB_LIKE_AFTER"));
        out.push_str(&format!("\n#endif // {guard}\n"));

        out
    }

    fn state_block(&self, state: Action, p: &StateParameters) -> String {
        let s = state.const_name();
        let mut block = format!("\n// Parameters for WATCHING_AFTER_{s} state\n");

        if p.is_fallback() {
            block.push_str("// No observations: fallback defaults\n");
        } else {
            block.push_str(&format!("// Fitted from {} transitions\n", p.sample_size));
        }

        block.push_str(&self.constant(&format!("MEAN_DWELL_AFTER_{s}"), p.mean_dwell));
        block.push_str(&self.constant(&format!("DWELL_RATE_AFTER_{s}"), p.rate));
        block.push('\n');
        for (action, &prob) in p.transition_probs.iter() {
            let name = format!("PROB_{}_AFTER_{s}", action.const_name());
            block.push_str(&self.constant(&name, prob));
        }
        block.push('\n');
        for (action, &cum) in p.cumulative_probs.iter() {
            let name = format!("CUM_PROB_{}_AFTER_{s}", action.const_name());
            block.push_str(&self.constant(&name, cum));
        }

        block
    }

    fn constant(&self, name: &str, value: f64) -> String {
        format!(
            "const float {name} = {value:.prec$}f;\n",
            prec = self.precision
        )
    }

    /// Build the JSON table structure
    pub fn encode(&self, params: &PerState<StateParameters>) -> ParameterTable {
        ParameterTable {
            format_version: TABLE_FORMAT_VERSION.to_string(),
            producer: TableProducer {
                name: PRODUCER_NAME.to_string(),
                version: SMM_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            states: params.clone(),
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(&self, params: &PerState<StateParameters>) -> Result<String, ComputeError> {
        let table = self.encode(params);
        serde_json::to_string_pretty(&table).map_err(ComputeError::JsonError)
    }
}

fn lookup_array(array: &str, prefix: &str) -> String {
    let entries: Vec<String> = Action::ALL
        .iter()
        .map(|state| format!("    {prefix}_{}", state.const_name()))
        .collect();
    format!("const float {array}[3] = {{\n{}\n}};\n", entries.join(",\n"))
}
