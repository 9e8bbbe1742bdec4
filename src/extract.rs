//! Transition extraction
//!
//! Walks an ordered event sequence and groups `(previous action, dwell time,
//! next action)` observations by previous action.

use serde::Serialize;
use tracing::debug;

use crate::types::{Event, Observation, PerState, StateObservationGroup};

/// Counts describing what the extractor kept and dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    /// Adjacent pairs examined
    pub pairs: usize,
    /// Pairs skipped because either endpoint was unrecognized
    pub skipped_unrecognized: usize,
    /// Pairs skipped because the dwell time was zero or negative
    pub skipped_non_positive: usize,
    /// Observations recorded across all states
    pub observations: usize,
}

/// Group observations by previous-action state.
///
/// Expects at least two events sorted by timestamp; the loader enforces both.
/// Shorter input simply yields empty groups.
pub fn extract(events: &[Event]) -> PerState<StateObservationGroup> {
    extract_with_summary(events).0
}

/// Same as [`extract`], also reporting how many pairs were discarded and why.
pub fn extract_with_summary(
    events: &[Event],
) -> (PerState<StateObservationGroup>, ExtractionSummary) {
    let mut groups: PerState<StateObservationGroup> = PerState::default();
    let mut summary = ExtractionSummary::default();

    for pair in events.windows(2) {
        summary.pairs += 1;
        match observe(&pair[0], &pair[1]) {
            Pairing::Observed(obs) => {
                groups[obs.prev].push(obs.dwell, obs.next);
                summary.observations += 1;
            }
            Pairing::Unrecognized => summary.skipped_unrecognized += 1,
            Pairing::NonPositiveDwell => summary.skipped_non_positive += 1,
        }
    }

    debug!(
        pairs = summary.pairs,
        observations = summary.observations,
        skipped_unrecognized = summary.skipped_unrecognized,
        skipped_non_positive = summary.skipped_non_positive,
        "extracted transitions"
    );

    (groups, summary)
}

/// Observations in sequence order, without grouping.
pub fn observations(events: &[Event]) -> impl Iterator<Item = Observation> + '_ {
    events
        .windows(2)
        .filter_map(|pair| match observe(&pair[0], &pair[1]) {
            Pairing::Observed(obs) => Some(obs),
            _ => None,
        })
}

enum Pairing {
    Observed(Observation),
    Unrecognized,
    NonPositiveDwell,
}

fn observe(prev: &Event, curr: &Event) -> Pairing {
    let (Some(prev_action), Some(next_action)) = (prev.action, curr.action) else {
        return Pairing::Unrecognized;
    };

    let dwell = curr.timestamp - prev.timestamp;
    if dwell.is_nan() || dwell <= 0.0 {
        return Pairing::NonPositiveDwell;
    }

    Pairing::Observed(Observation {
        prev: prev_action,
        dwell,
        next: next_action,
    })
}
