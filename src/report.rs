//! Human-readable statistics and behavioral insights
//!
//! Summarizes fitted parameters per state and derives a few comparisons
//! between states that are useful when eyeballing a new recording.

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use crate::types::{Action, PerState, StateParameters};

/// Per-state summary line items
#[derive(Debug, Clone, Serialize)]
pub struct StateSummary {
    pub state: Action,
    pub sample_size: usize,
    pub mean_dwell: f64,
    pub transition_probs: PerState<f64>,
    /// True when the state had no observations and used the fallback policy
    pub fallback: bool,
}

/// Comparisons between states
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Insight {
    /// Mean dwell after a like is shorter than after a scroll
    QuickScrollAfterLike { after_like: f64, after_scroll: f64 },
    /// Mean dwell after a dubious scroll is longer than after a scroll
    SecondChanceAfterDubious { after_dubious: f64, after_scroll: f64 },
    /// P(scroll | like) exceeds P(scroll | scroll)
    HigherScrollAfterLike { after_like: f64, after_scroll: f64 },
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insight::QuickScrollAfterLike { .. } => {
                write!(f, "Users watch LESS after liking (quick scroll pattern)")
            }
            Insight::SecondChanceAfterDubious { .. } => {
                write!(f, "Users watch MORE after dubious scroll (second chance)")
            }
            Insight::HigherScrollAfterLike {
                after_like,
                after_scroll,
            } => write!(
                f,
                "Higher scroll probability after LIKE ({after_like:.2} vs {after_scroll:.2})"
            ),
        }
    }
}

/// Statistics and insights for a fitted model
#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub states: Vec<StateSummary>,
    pub mean_dwell: PerState<f64>,
    pub insights: Vec<Insight>,
}

impl ModelReport {
    pub fn from_parameters(params: &PerState<StateParameters>) -> Self {
        let states = params
            .iter()
            .map(|(state, p)| StateSummary {
                state,
                sample_size: p.sample_size,
                mean_dwell: p.mean_dwell,
                transition_probs: p.transition_probs,
                fallback: p.is_fallback(),
            })
            .collect();

        Self {
            states,
            mean_dwell: params.map(|_, p| p.mean_dwell),
            insights: derive_insights(params),
        }
    }

    /// States that had no observations
    pub fn fallback_states(&self) -> Vec<Action> {
        self.states
            .iter()
            .filter(|s| s.fallback)
            .map(|s| s.state)
            .collect()
    }

    /// Emit the report through `tracing` at info level.
    pub fn log(&self) {
        for state in self.fallback_states() {
            warn!(state = %state, "state had no observations; exported parameters are fallback defaults");
        }
        for line in self.lines() {
            info!("{line}");
        }
    }

    fn lines(&self) -> Vec<String> {
        let mut lines = vec!["=== Semi-Markov Model Results ===".to_string()];

        for s in &self.states {
            lines.push(format!("--- After {} ---", s.state.as_str().to_uppercase()));
            lines.push(format!("Sample size: {} transitions", s.sample_size));
            lines.push(format!("Mean dwell time: {:.3} seconds", s.mean_dwell));
            lines.push("Next action probabilities:".to_string());
            for (action, p) in s.transition_probs.iter() {
                lines.push(format!("  {action}: {p:.3}"));
            }
        }

        lines.push("=== Behavioral Insights ===".to_string());
        lines.push("Mean dwell time by previous action:".to_string());
        for (state, dwell) in self.mean_dwell.iter() {
            lines.push(format!("  After {}: {:.2}s", state.const_name(), dwell));
        }
        for insight in &self.insights {
            lines.push(format!("  → {insight}"));
        }

        lines
    }
}

impl fmt::Display for ModelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

fn derive_insights(params: &PerState<StateParameters>) -> Vec<Insight> {
    let scroll = &params[Action::Scroll];
    let like = &params[Action::Like];
    let dubious = &params[Action::DubiousScroll];

    let mut insights = Vec::new();

    if like.mean_dwell < scroll.mean_dwell {
        insights.push(Insight::QuickScrollAfterLike {
            after_like: like.mean_dwell,
            after_scroll: scroll.mean_dwell,
        });
    }
    if dubious.mean_dwell > scroll.mean_dwell {
        insights.push(Insight::SecondChanceAfterDubious {
            after_dubious: dubious.mean_dwell,
            after_scroll: scroll.mean_dwell,
        });
    }

    let scroll_after_like = like.transition_probs[Action::Scroll];
    let scroll_after_scroll = scroll.transition_probs[Action::Scroll];
    if scroll_after_like > scroll_after_scroll {
        insights.push(Insight::HigherScrollAfterLike {
            after_like: scroll_after_like,
            after_scroll: scroll_after_scroll,
        });
    }

    insights
}
