//! Parameter estimation
//!
//! Turns per-state observation groups into dwell-rate and next-action
//! parameters. States without observations receive the fallback policy.

use tracing::debug;

use crate::config::FallbackPolicy;
use crate::types::{Action, PerState, StateObservationGroup, StateParameters};

/// Estimate parameters for every state using [`FallbackPolicy::DEFAULT`].
pub fn estimate(groups: &PerState<StateObservationGroup>) -> PerState<StateParameters> {
    estimate_with(groups, &FallbackPolicy::DEFAULT)
}

/// Estimate parameters for every state with an explicit fallback policy.
pub fn estimate_with(
    groups: &PerState<StateObservationGroup>,
    fallback: &FallbackPolicy,
) -> PerState<StateParameters> {
    groups.map(|state, group| {
        if group.is_empty() {
            debug!(state = %state, "no observations for state, using fallback parameters");
        }
        estimate_state(group, fallback)
    })
}

/// Estimate parameters for a single state.
pub fn estimate_state(group: &StateObservationGroup, fallback: &FallbackPolicy) -> StateParameters {
    if group.is_empty() {
        return fallback.to_parameters();
    }

    let n = group.len();
    let mean_dwell = group.dwell_times().iter().sum::<f64>() / n as f64;
    // Every recorded dwell time is strictly positive, so the mean is too.
    debug_assert!(mean_dwell > 0.0, "mean dwell must be positive");
    let rate = 1.0 / mean_dwell;

    let mut counts = PerState::<usize>::default();
    for &next in group.next_actions() {
        counts[next] += 1;
    }
    // No smoothing: an action never observed keeps probability 0.0.
    let transition_probs = counts.map(|_, &count| count as f64 / n as f64);
    let cumulative_probs = cumulative_from(&transition_probs);

    StateParameters {
        mean_dwell,
        rate,
        transition_probs,
        cumulative_probs,
        sample_size: n,
    }
}

/// Prefix sums in table order, with the final entry pinned to exactly 1.0
/// so inverse-CDF sampling never falls outside the unit interval.
pub(crate) fn cumulative_from(probs: &PerState<f64>) -> PerState<f64> {
    let scroll = probs[Action::Scroll];
    // Rounding in the middle sum must not overshoot the pinned last entry.
    let like = (scroll + probs[Action::Like]).min(1.0);
    PerState::new(scroll, like, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;
    use crate::types::Event;
    use proptest::prelude::*;

    const EPS: f64 = 1e-12;

    fn sample_events() -> Vec<Event> {
        vec![
            Event::new(0.0, Action::Scroll),
            Event::new(2.0, Action::Scroll),
            Event::new(5.0, Action::Like),
            Event::new(7.0, Action::Scroll),
        ]
    }

    #[test]
    fn test_estimate_worked_example() {
        let params = estimate(&extract(&sample_events()));
        let scroll = &params[Action::Scroll];

        assert_eq!(scroll.sample_size, 2);
        assert!((scroll.mean_dwell - 2.5).abs() < EPS);
        assert!((scroll.rate - 0.4).abs() < EPS);
        assert!((scroll.transition_probs[Action::Scroll] - 0.5).abs() < EPS);
        assert!((scroll.transition_probs[Action::Like] - 0.5).abs() < EPS);
        assert_eq!(scroll.transition_probs[Action::DubiousScroll], 0.0);
        assert!((scroll.cumulative_probs[Action::Scroll] - 0.5).abs() < EPS);
        assert!((scroll.cumulative_probs[Action::Like] - 1.0).abs() < EPS);
        assert_eq!(scroll.cumulative_probs[Action::DubiousScroll], 1.0);

        let like = &params[Action::Like];
        assert_eq!(like.sample_size, 1);
        assert!((like.mean_dwell - 2.0).abs() < EPS);
        assert_eq!(like.transition_probs.as_array(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_state_uses_fallback() {
        let params = estimate(&extract(&sample_events()));
        let dubious = &params[Action::DubiousScroll];

        assert_eq!(dubious.mean_dwell, 2.0);
        assert_eq!(dubious.rate, 0.5);
        assert_eq!(dubious.transition_probs.as_array(), &[0.6, 0.2, 0.2]);
        assert_eq!(dubious.cumulative_probs.as_array(), &[0.6, 0.8, 1.0]);
        assert_eq!(dubious.sample_size, 0);
        assert!(dubious.is_fallback());
    }

    #[test]
    fn test_custom_fallback_policy() {
        let fallback = FallbackPolicy::new(10.0, PerState::new(0.0, 0.0, 1.0)).unwrap();
        let params = estimate_with(&PerState::default(), &fallback);

        for (_, state) in params.iter() {
            assert_eq!(state.mean_dwell, 10.0);
            assert_eq!(state.rate, 0.1);
            assert_eq!(state.transition_probs.as_array(), &[0.0, 0.0, 1.0]);
            assert_eq!(state.cumulative_probs.as_array(), &[0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_final_cumulative_is_pinned() {
        // Thirds do not sum to exactly 1.0 in binary floating point.
        let probs = PerState::new(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
        let cum = cumulative_from(&probs);
        assert_eq!(cum[Action::DubiousScroll], 1.0);
        assert!(cum[Action::Scroll] <= cum[Action::Like]);
        assert!(cum[Action::Like] <= cum[Action::DubiousScroll]);
    }

    #[test]
    fn test_estimate_is_repeatable() {
        let events = sample_events();
        let first = estimate(&extract(&events));
        let second = estimate(&extract(&events));
        assert_eq!(first, second);
    }

    fn arb_events() -> impl Strategy<Value = Vec<Event>> {
        let step = (0.0f64..10.0, prop::option::weighted(0.9, 0usize..3));
        prop::collection::vec(step, 2..200).prop_map(|steps| {
            let mut t = 0.0;
            steps
                .into_iter()
                .map(|(gap, action)| {
                    t += gap;
                    Event {
                        timestamp: t,
                        action: action.map(|i| Action::ALL[i]),
                    }
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_parameters_are_well_formed(events in arb_events()) {
            let params = estimate(&extract(&events));

            for (_, state) in params.iter() {
                let probs = state.transition_probs.as_array();
                let sum: f64 = probs.iter().sum();
                prop_assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
                prop_assert!((sum - 1.0).abs() < 1e-9);

                let cum = state.cumulative_probs.as_array();
                prop_assert!(cum[0] <= cum[1] && cum[1] <= cum[2]);
                prop_assert_eq!(cum[2], 1.0);

                prop_assert!(state.mean_dwell > 0.0);
                prop_assert!((state.rate * state.mean_dwell - 1.0).abs() < 1e-9);
            }
        }

        #[test]
        fn prop_sample_sizes_match_observations(events in arb_events()) {
            let groups = extract(&events);
            let params = estimate(&groups);
            for (state, group) in groups.iter() {
                prop_assert_eq!(params[state].sample_size, group.len());
            }
        }
    }
}
