//! Semi-Markov simulation from a fitted parameter table.
//!
//! Samples the model the way the embedded runtime does: an exponential dwell
//! time for the current state, clamped to the runtime's bounds, followed by an
//! inverse-CDF draw over the state's cumulative next-action table.

use rand::Rng;

use crate::types::{Action, Event, PerState, StateParameters};

/// Upper bound on a sampled dwell time, in seconds
pub const MAX_DWELL_SEC: f64 = 30.0;

/// Lower bound on a sampled dwell time, in seconds
pub const MIN_DWELL_SEC: f64 = 0.1;

/// Draws dwell times and next actions from fitted parameters.
#[derive(Debug, Clone, Copy)]
pub struct SemiMarkovSampler<'a> {
    params: &'a PerState<StateParameters>,
}

impl<'a> SemiMarkovSampler<'a> {
    pub fn new(params: &'a PerState<StateParameters>) -> Self {
        Self { params }
    }

    /// Exponential dwell time for `state`, clamped to
    /// [`MIN_DWELL_SEC`, `MAX_DWELL_SEC`].
    pub fn sample_dwell(&self, state: Action, rng: &mut impl Rng) -> f64 {
        let u: f64 = rng.random();
        // 1 - u lies in (0, 1], so the logarithm is finite.
        let dwell = -(1.0 - u).ln() / self.params[state].rate;
        dwell.clamp(MIN_DWELL_SEC, MAX_DWELL_SEC)
    }

    /// Next action for `state` by inverse CDF over the cumulative table.
    pub fn sample_next(&self, state: Action, rng: &mut impl Rng) -> Action {
        let u: f64 = rng.random();
        let cum = &self.params[state].cumulative_probs;
        if u < cum[Action::Scroll] {
            Action::Scroll
        } else if u < cum[Action::Like] {
            Action::Like
        } else {
            Action::DubiousScroll
        }
    }

    /// One dwell-then-act step from `state`.
    pub fn step(&self, state: Action, rng: &mut impl Rng) -> (f64, Action) {
        let dwell = self.sample_dwell(state, rng);
        let next = self.sample_next(state, rng);
        (dwell, next)
    }
}

/// Simulate an event log of `n_events` events starting with `initial` at t = 0.
pub fn simulate_events(
    params: &PerState<StateParameters>,
    initial: Action,
    n_events: usize,
    rng: &mut impl Rng,
) -> Vec<Event> {
    let sampler = SemiMarkovSampler::new(params);
    let mut events = Vec::with_capacity(n_events);
    if n_events == 0 {
        return events;
    }

    let mut t = 0.0;
    let mut state = initial;
    events.push(Event::new(t, state));

    for _ in 1..n_events {
        let (dwell, next) = sampler.step(state, rng);
        t += dwell;
        state = next;
        events.push(Event::new(t, state));
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::{cumulative_from, estimate};
    use crate::extract::extract;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn state(mean_dwell: f64, probs: [f64; 3]) -> StateParameters {
        let transition_probs = PerState::new(probs[0], probs[1], probs[2]);
        StateParameters {
            mean_dwell,
            rate: 1.0 / mean_dwell,
            cumulative_probs: cumulative_from(&transition_probs),
            transition_probs,
            sample_size: 100,
        }
    }

    fn model() -> PerState<StateParameters> {
        PerState::new(
            state(2.5, [0.5, 0.3, 0.2]),
            state(1.0, [0.7, 0.1, 0.2]),
            state(4.0, [0.3, 0.3, 0.4]),
        )
    }

    #[test]
    fn test_seeded_simulation_is_reproducible() {
        let params = model();
        let a = simulate_events(&params, Action::Scroll, 500, &mut StdRng::seed_from_u64(7));
        let b = simulate_events(&params, Action::Scroll, 500, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_simulation_shape() {
        let params = model();
        let events = simulate_events(&params, Action::Like, 100, &mut StdRng::seed_from_u64(1));

        assert_eq!(events.len(), 100);
        assert_eq!(events[0], Event::new(0.0, Action::Like));
        for pair in events.windows(2) {
            let gap = pair[1].timestamp - pair[0].timestamp;
            assert!(gap >= MIN_DWELL_SEC - 1e-9 && gap <= MAX_DWELL_SEC + 1e-9);
        }

        assert!(simulate_events(&params, Action::Like, 0, &mut StdRng::seed_from_u64(1)).is_empty());
    }

    #[test]
    fn test_dwell_samples_are_clamped() {
        // Very slow and very fast states push samples against both bounds.
        let params = PerState::new(
            state(1000.0, [1.0, 0.0, 0.0]),
            state(0.001, [1.0, 0.0, 0.0]),
            state(1.0, [1.0, 0.0, 0.0]),
        );
        let sampler = SemiMarkovSampler::new(&params);
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..1_000 {
            let slow = sampler.sample_dwell(Action::Scroll, &mut rng);
            let fast = sampler.sample_dwell(Action::Like, &mut rng);
            assert!((MIN_DWELL_SEC..=MAX_DWELL_SEC).contains(&slow));
            assert_eq!(fast, MIN_DWELL_SEC);
        }
    }

    #[test]
    fn test_next_action_frequencies() {
        let params = model();
        let sampler = SemiMarkovSampler::new(&params);
        let mut rng = StdRng::seed_from_u64(42);
        let n = 20_000;

        let mut counts = PerState::<usize>::default();
        for _ in 0..n {
            counts[sampler.sample_next(Action::DubiousScroll, &mut rng)] += 1;
        }

        for (action, &count) in counts.iter() {
            let freq = count as f64 / n as f64;
            let expected = params[Action::DubiousScroll].transition_probs[action];
            assert!(
                (freq - expected).abs() < 0.02,
                "{action} frequency {freq}, expected ~{expected}"
            );
        }
    }

    #[test]
    fn test_zero_probability_action_never_drawn() {
        let params = PerState::new(
            state(1.0, [0.5, 0.5, 0.0]),
            state(1.0, [1.0, 0.0, 0.0]),
            state(1.0, [0.0, 0.0, 1.0]),
        );
        let sampler = SemiMarkovSampler::new(&params);
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..5_000 {
            assert_ne!(sampler.sample_next(Action::Scroll, &mut rng), Action::DubiousScroll);
            assert_eq!(sampler.sample_next(Action::Like, &mut rng), Action::Scroll);
            assert_eq!(
                sampler.sample_next(Action::DubiousScroll, &mut rng),
                Action::DubiousScroll
            );
        }
    }

    #[test]
    fn test_refit_recovers_parameters() {
        let params = model();
        let events = simulate_events(&params, Action::Scroll, 30_000, &mut StdRng::seed_from_u64(2024));
        let refit = estimate(&extract(&events));

        for (state, fitted) in refit.iter() {
            let truth = &params[state];
            assert!(fitted.sample_size > 1_000, "{state} visited too rarely");
            assert!(
                (fitted.mean_dwell - truth.mean_dwell).abs() < 0.25,
                "{state} mean dwell {} vs {}",
                fitted.mean_dwell,
                truth.mean_dwell
            );
            for (action, &p) in fitted.transition_probs.iter() {
                assert!(
                    (p - truth.transition_probs[action]).abs() < 0.04,
                    "P({action} | {state}) = {p}"
                );
            }
        }
    }
}
