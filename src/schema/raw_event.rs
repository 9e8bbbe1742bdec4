//! Event log record definition
//!
//! A record is a timestamp in seconds plus a free-form action token. The token
//! is classified against the action alphabet only when records are turned
//! into [`Event`](crate::types::Event)s.

use serde::{Deserialize, Serialize};

use crate::types::Action;

/// Name of the accepted event log schema
pub const SCHEMA_VERSION: &str = "smm.event_log.v1";

/// CSV column holding the timestamp in seconds
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// CSV column holding the action token
pub const EVENT_COLUMN: &str = "event";

/// One row of an event log, before classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Seconds on the recording clock
    pub timestamp: f64,
    /// Action token, e.g. `scroll`, `like`, `dubious_scroll`
    #[serde(alias = "action")]
    pub event: String,
}

impl RawEvent {
    pub fn new(timestamp: f64, event: impl Into<String>) -> Self {
        Self {
            timestamp,
            event: event.into(),
        }
    }

    /// Classified action, `None` for tokens outside the alphabet
    pub fn action(&self) -> Option<Action> {
        Action::parse_token(&self.event)
    }

    /// Check that the timestamp is finite and the token is present.
    ///
    /// Unknown tokens are not a validation failure here; whether they are
    /// rejected depends on the loader's strictness.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.timestamp.is_finite() {
            return Err(ValidationError::NonFiniteTimestamp(self.timestamp));
        }
        if self.event.trim().is_empty() {
            return Err(ValidationError::EmptyEvent);
        }
        Ok(())
    }
}

/// Validation errors for single records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Timestamp is not finite: {0}")]
    NonFiniteTimestamp(f64),

    #[error("Event token is empty")]
    EmptyEvent,

    #[error("Unknown action token: {0:?}")]
    UnknownAction(String),
}
