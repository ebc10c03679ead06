use chrono::NaiveDate;
use curve_core::{
    CheckOutcome, CheckStatus, CurveError, CurveState, CurveStateTracker, Frequency,
    ObservationSource, PairedPoint, SeriesAligner, SeriesPair, TrackedPairState, TransitionEvent,
    TransitionKind,
};
use notification_service::{Alert, DeliveryReport, NotificationService};
use serde::Serialize;

use crate::state_store::StateDocument;

/// Full-history scan of one pair.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub pair: SeriesPair,
    pub points: Vec<PairedPoint>,
    pub states: Vec<Option<CurveState>>,
    pub events: Vec<TransitionEvent>,
}

impl ScanReport {
    pub fn inversions(&self) -> impl Iterator<Item = &TransitionEvent> {
        self.events.iter().filter(|e| e.kind() == TransitionKind::Inversion)
    }

    pub fn disinversions(&self) -> impl Iterator<Item = &TransitionEvent> {
        self.events.iter().filter(|e| e.kind() == TransitionKind::Disinversion)
    }

    /// Most recent classifiable state in the scanned range.
    pub fn latest_state(&self) -> Option<CurveState> {
        self.states.iter().rev().find_map(|s| *s)
    }
}

/// What happened to one pair during an incremental run.
#[derive(Debug, Clone)]
pub enum PairOutcome {
    Checked {
        pair_name: String,
        status: CheckStatus,
        event: Option<TransitionEvent>,
        delivery: Option<DeliveryReport>,
    },
    Skipped {
        pair_name: String,
        error: CurveError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<PairOutcome>,
}

impl RunSummary {
    pub fn events(&self) -> impl Iterator<Item = &TransitionEvent> {
        self.outcomes.iter().filter_map(|o| match o {
            PairOutcome::Checked { event, .. } => event.as_ref(),
            PairOutcome::Skipped { .. } => None,
        })
    }

    pub fn checked(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PairOutcome::Checked { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.checked()
    }
}

/// Drives the data source and the tracker for configured pairs.
pub struct CurveMonitor<S> {
    source: S,
    tracker: CurveStateTracker,
    frequency: Frequency,
    recent_window: usize,
}

impl<S: ObservationSource> CurveMonitor<S> {
    pub fn new(source: S, tracker: CurveStateTracker, frequency: Frequency, recent_window: usize) -> Self {
        Self {
            source,
            tracker,
            frequency,
            recent_window: recent_window.max(1),
        }
    }

    pub fn tracker(&self) -> &CurveStateTracker {
        &self.tracker
    }

    /// Newest date for which both legs have a usable value.
    pub async fn latest_point(&self, pair: &SeriesPair) -> Result<PairedPoint, CurveError> {
        let (long, short) = tokio::try_join!(
            self.source.fetch_recent(&pair.long_series, self.frequency, self.recent_window),
            self.source.fetch_recent(&pair.short_series, self.frequency, self.recent_window),
        )?;

        let points = SeriesAligner::for_pair(pair).align(&long, &short)?;
        points.last().copied().ok_or_else(|| {
            CurveError::DataUnavailable(format!("no recent paired point for {}", pair.name))
        })
    }

    pub async fn check_pair(
        &self,
        pair: &SeriesPair,
        prior: &TrackedPairState,
    ) -> Result<CheckOutcome, CurveError> {
        let latest = self.latest_point(pair).await?;
        tracing::debug!(
            "{}: latest {} long={:.2} short={:.2}",
            pair.name,
            latest.date,
            latest.long_value,
            latest.short_value
        );
        Ok(self.tracker.check_latest(&latest, prior))
    }

    /// Incremental run over every pair. Failures are recovered per pair and
    /// never stop the remaining pairs; `document` receives every update.
    pub async fn check_pairs(
        &self,
        pairs: &[SeriesPair],
        document: &mut StateDocument,
        notifier: &NotificationService,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        for pair in pairs {
            let prior = document.get(&pair.name);

            let outcome = match self.check_pair(pair, &prior).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Error fetching latest data for {}: {}", pair.name, e);
                    summary.outcomes.push(PairOutcome::Skipped {
                        pair_name: pair.name.clone(),
                        error: e,
                    });
                    continue;
                }
            };

            match outcome.status {
                CheckStatus::Stale => {
                    tracing::info!("{}: no new data since {:?}", pair.name, prior.last_check_date)
                }
                CheckStatus::Baseline => tracing::info!(
                    "{}: baseline recorded ({:?})",
                    pair.name,
                    outcome.updated.previous_state
                ),
                CheckStatus::Indeterminate => {
                    tracing::info!("{}: yields equal, state kept", pair.name)
                }
                CheckStatus::Unchanged | CheckStatus::Transition => {}
            }

            let delivery = match &outcome.event {
                Some(event) => {
                    tracing::info!("{}", event);
                    Some(notifier.send_alert_async(&Alert::from_event(event)).await)
                }
                None => None,
            };

            summary.outcomes.push(PairOutcome::Checked {
                pair_name: pair.name.clone(),
                status: outcome.status,
                event: outcome.event,
                delivery,
            });
            document.put(outcome.updated);
        }

        summary
    }

    /// Historical scan of one pair from `start`.
    pub async fn scan_pair(&self, pair: &SeriesPair, start: NaiveDate) -> Result<ScanReport, CurveError> {
        let (long, short) = tokio::try_join!(
            self.source.fetch_series(&pair.long_series, start, self.frequency),
            self.source.fetch_series(&pair.short_series, start, self.frequency),
        )?;

        let points = SeriesAligner::for_pair(pair).align(&long, &short)?;
        let states = self.tracker.classify_points(&points);
        let events = self.tracker.scan_transitions(&points, &pair.name);

        tracing::info!(
            "{}: {} aligned points, {} transitions",
            pair.name,
            points.len(),
            events.len()
        );

        Ok(ScanReport {
            pair: pair.clone(),
            points,
            states,
            events,
        })
    }
}
