//! Core data types for semi-Markov model fitting
//!
//! This module defines the action alphabet, the event and observation records
//! that flow into the estimator, and the per-state parameter records it emits.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use crate::error::ComputeError;

/// User interaction captured in the event log.
///
/// The discriminants fix the table order consumed by the embedded runtime:
/// Scroll = 0, Like = 1, DubiousScroll = 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Action {
    Scroll = 0,
    Like = 1,
    DubiousScroll = 2,
}

impl Action {
    /// All actions in table order.
    pub const ALL: [Action; 3] = [Self::Scroll, Self::Like, Self::DubiousScroll];

    /// Zero-based table index (matches the `#[repr(u8)]` discriminant).
    pub fn as_index(self) -> usize {
        self as usize
    }

    /// Canonical lowercase token as it appears in event logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Scroll => "scroll",
            Action::Like => "like",
            Action::DubiousScroll => "dubious_scroll",
        }
    }

    /// Short uppercase name used in generated constant identifiers.
    pub fn const_name(self) -> &'static str {
        match self {
            Action::Scroll => "SCROLL",
            Action::Like => "LIKE",
            Action::DubiousScroll => "DUBIOUS",
        }
    }

    /// Classify a raw token. Surrounding whitespace and case are ignored.
    pub fn parse_token(token: &str) -> Option<Action> {
        let normalized = token.trim().to_ascii_lowercase();
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::parse_token(s).ok_or_else(|| ComputeError::UnknownAction(s.trim().to_string()))
    }
}

/// A timestamped interaction event.
///
/// `action` is `None` when the loader saw a token outside the action alphabet.
/// Such an event keeps its slot in the sequence, so no transition is ever
/// recorded across it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Seconds on an arbitrary but monotone clock
    pub timestamp: f64,
    /// Classified action, if recognized
    pub action: Option<Action>,
}

impl Event {
    /// Event with a recognized action
    pub fn new(timestamp: f64, action: Action) -> Self {
        Self {
            timestamp,
            action: Some(action),
        }
    }

    /// Event whose token was not recognized
    pub fn unrecognized(timestamp: f64) -> Self {
        Self {
            timestamp,
            action: None,
        }
    }
}

/// One `(previous action, dwell time, next action)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub prev: Action,
    /// Strictly positive seconds between the two events
    pub dwell: f64,
    pub next: Action,
}

/// Fixed mapping from each action to a value.
///
/// Every state is always present; there is no implicit insertion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerState<T> {
    values: [T; 3],
}

impl<T> PerState<T> {
    /// Build from values in table order.
    pub const fn new(scroll: T, like: T, dubious_scroll: T) -> Self {
        Self {
            values: [scroll, like, dubious_scroll],
        }
    }

    /// Build by evaluating `f` for each action in table order.
    pub fn from_fn(mut f: impl FnMut(Action) -> T) -> Self {
        Self {
            values: [
                f(Action::Scroll),
                f(Action::Like),
                f(Action::DubiousScroll),
            ],
        }
    }

    pub fn get(&self, action: Action) -> &T {
        &self.values[action.as_index()]
    }

    pub fn get_mut(&mut self, action: Action) -> &mut T {
        &mut self.values[action.as_index()]
    }

    /// Iterate `(action, value)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (Action, &T)> {
        Action::ALL.into_iter().zip(self.values.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(Action, &T) -> U) -> PerState<U> {
        PerState::from_fn(|action| f(action, self.get(action)))
    }

    /// Values in table order.
    pub fn as_array(&self) -> &[T; 3] {
        &self.values
    }
}

impl<T> Index<Action> for PerState<T> {
    type Output = T;

    fn index(&self, action: Action) -> &T {
        self.get(action)
    }
}

impl<T> IndexMut<Action> for PerState<T> {
    fn index_mut(&mut self, action: Action) -> &mut T {
        self.get_mut(action)
    }
}

impl<T: Serialize> Serialize for PerState<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        for (action, value) in self.iter() {
            map.serialize_entry(action.as_str(), value)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for PerState<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Keyed<T> {
            scroll: T,
            like: T,
            dubious_scroll: T,
        }

        let keyed = Keyed::deserialize(deserializer)?;
        Ok(PerState::new(keyed.scroll, keyed.like, keyed.dubious_scroll))
    }
}

/// Observations that share a previous-action state.
///
/// `dwell_times[i]` and `next_actions[i]` describe the same observation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateObservationGroup {
    dwell_times: Vec<f64>,
    next_actions: Vec<Action>,
}

impl StateObservationGroup {
    pub(crate) fn push(&mut self, dwell: f64, next: Action) {
        self.dwell_times.push(dwell);
        self.next_actions.push(next);
    }

    pub fn dwell_times(&self) -> &[f64] {
        &self.dwell_times
    }

    pub fn next_actions(&self) -> &[Action] {
        &self.next_actions
    }

    pub fn len(&self) -> usize {
        self.dwell_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dwell_times.is_empty()
    }
}

/// Fitted parameters for one previous-action state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateParameters {
    /// Mean dwell time in seconds
    pub mean_dwell: f64,
    /// Exponential dwell rate, `1 / mean_dwell`
    pub rate: f64,
    /// Next-action distribution
    pub transition_probs: PerState<f64>,
    /// Prefix sums of `transition_probs` in table order; the last entry is exactly 1.0
    pub cumulative_probs: PerState<f64>,
    /// Number of observations behind the estimate, 0 when the fallback was used
    pub sample_size: usize,
}

impl StateParameters {
    /// True when these parameters came from the fallback policy.
    pub fn is_fallback(&self) -> bool {
        self.sample_size == 0
    }
}
