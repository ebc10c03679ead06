//! Curve state classification and edge-triggered transition detection.
//!
//! The tracker is stateless between calls: batch scans keep their running
//! state on the stack, and incremental checks take the prior state as an
//! argument and hand back an updated copy.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{CurveError, CurveState, PairedPoint, TrackedPairState, TransitionEvent};

/// How a point with equal long and short yields is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiePolicy {
    /// A tie is no observation; the running state is kept.
    #[default]
    Hold,
    /// A tie counts as a normal curve.
    Normal,
}

impl FromStr for TiePolicy {
    type Err = CurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hold" => Ok(TiePolicy::Hold),
            "normal" => Ok(TiePolicy::Normal),
            other => Err(CurveError::InvalidData(format!(
                "unknown tie policy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// State assumed before the first point of a historical scan.
    pub initial_state: CurveState,
    pub tie_policy: TiePolicy,
    /// Compare the first point of a scan against `initial_state`. Off by
    /// default: the first point only ever seeds the comparison.
    pub evaluate_first_point: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            initial_state: CurveState::Normal,
            tie_policy: TiePolicy::Hold,
            evaluate_first_point: false,
        }
    }
}

/// What an incremental check concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    /// First check for the pair; baseline recorded, nothing emitted.
    Baseline,
    /// Newer data, same state as before.
    Unchanged,
    /// Newer data with a different state; an event was emitted.
    Transition,
    /// Data not newer than the last check; nothing changed.
    Stale,
    /// Newer data that could not be classified (tie under `TiePolicy::Hold`).
    Indeterminate,
}

/// Result of [`CurveStateTracker::check_latest`].
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub updated: TrackedPairState,
    pub event: Option<TransitionEvent>,
    pub status: CheckStatus,
}

#[derive(Debug, Clone, Default)]
pub struct CurveStateTracker {
    config: TrackerConfig,
}

impl CurveStateTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Classify one pair of yields. `None` means no usable observation.
    pub fn classify(&self, long_value: f64, short_value: f64) -> Option<CurveState> {
        if !long_value.is_finite() || !short_value.is_finite() {
            return None;
        }
        if short_value > long_value {
            Some(CurveState::Inverted)
        } else if long_value > short_value {
            Some(CurveState::Normal)
        } else {
            match self.config.tie_policy {
                TiePolicy::Hold => None,
                TiePolicy::Normal => Some(CurveState::Normal),
            }
        }
    }

    pub fn classify_point(&self, point: &PairedPoint) -> Option<CurveState> {
        self.classify(point.long_value, point.short_value)
    }

    /// Per-point classification, same order as the input.
    pub fn classify_points(&self, points: &[PairedPoint]) -> Vec<Option<CurveState>> {
        points.iter().map(|p| self.classify_point(p)).collect()
    }

    /// Historical scan: one event per state boundary, in input order.
    pub fn scan_transitions(&self, points: &[PairedPoint], pair_name: &str) -> Vec<TransitionEvent> {
        let skip = if self.config.evaluate_first_point { 0 } else { 1 };
        let mut current = self.config.initial_state;
        let mut events = Vec::new();

        for point in points.iter().skip(skip) {
            let Some(observed) = self.classify_point(point) else {
                continue;
            };
            if observed != current {
                events.push(TransitionEvent {
                    pair_name: pair_name.to_string(),
                    date: point.date,
                    from_state: current,
                    to_state: observed,
                    long_value: point.long_value,
                    short_value: point.short_value,
                });
                current = observed;
            }
        }

        events
    }

    /// Incremental check of the newest point against persisted state.
    pub fn check_latest(&self, latest: &PairedPoint, prior: &TrackedPairState) -> CheckOutcome {
        if prior.last_check_date.is_some_and(|last| last >= latest.date) {
            return CheckOutcome {
                updated: prior.clone(),
                event: None,
                status: CheckStatus::Stale,
            };
        }

        let Some(current) = self.classify_point(latest) else {
            return CheckOutcome {
                updated: TrackedPairState {
                    pair_name: prior.pair_name.clone(),
                    previous_state: prior.previous_state,
                    last_check_date: Some(latest.date),
                },
                event: None,
                status: CheckStatus::Indeterminate,
            };
        };

        let (event, status) = match prior.previous_state {
            None => (None, CheckStatus::Baseline),
            Some(previous) if previous == current => (None, CheckStatus::Unchanged),
            Some(previous) => (
                Some(TransitionEvent {
                    pair_name: prior.pair_name.clone(),
                    date: latest.date,
                    from_state: previous,
                    to_state: current,
                    long_value: latest.long_value,
                    short_value: latest.short_value,
                }),
                CheckStatus::Transition,
            ),
        };

        CheckOutcome {
            updated: TrackedPairState {
                pair_name: prior.pair_name.clone(),
                previous_state: Some(current),
                last_check_date: Some(latest.date),
            },
            event,
            status,
        }
    }
}
