use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{CurveError, Frequency, RawObservation};

/// Remote provider of yield observations.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Full history from `start` onward, ascending by date.
    async fn fetch_series(
        &self,
        series_id: &str,
        start: NaiveDate,
        frequency: Frequency,
    ) -> Result<Vec<RawObservation>, CurveError>;

    /// The newest `limit` observations, ascending by date.
    async fn fetch_recent(
        &self,
        series_id: &str,
        frequency: Frequency,
        limit: usize,
    ) -> Result<Vec<RawObservation>, CurveError>;
}
