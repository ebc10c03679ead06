//! Series alignment.
//!
//! Two independently fetched series are repaired (missing interior values are
//! linearly interpolated by sequence position) and then inner-joined on date.

use crate::{CurveError, Observation, PairedPoint, RawObservation, SeriesPair};

/// Joins a long-maturity and a short-maturity series into paired points.
#[derive(Debug, Clone, Copy)]
pub struct SeriesAligner<'a> {
    long_label: &'a str,
    short_label: &'a str,
}

impl Default for SeriesAligner<'static> {
    fn default() -> Self {
        Self::new("long series", "short series")
    }
}

impl<'a> SeriesAligner<'a> {
    /// Labels only show up in error messages.
    pub fn new(long_label: &'a str, short_label: &'a str) -> Self {
        Self {
            long_label,
            short_label,
        }
    }

    pub fn for_pair(pair: &'a SeriesPair) -> Self {
        Self::new(&pair.long_series, &pair.short_series)
    }

    /// Repair both series and keep only the dates present in each.
    pub fn align(
        &self,
        long: &[RawObservation],
        short: &[RawObservation],
    ) -> Result<Vec<PairedPoint>, CurveError> {
        let long = interpolate_missing(long);
        if long.is_empty() {
            return Err(CurveError::DataUnavailable(format!(
                "{} has no usable observations",
                self.long_label
            )));
        }

        let short = interpolate_missing(short);
        if short.is_empty() {
            return Err(CurveError::DataUnavailable(format!(
                "{} has no usable observations",
                self.short_label
            )));
        }

        let points = inner_join(&long, &short);
        if points.is_empty() {
            return Err(CurveError::NoOverlap {
                long: self.long_label.to_string(),
                short: self.short_label.to_string(),
            });
        }

        Ok(points)
    }
}

/// Align two raw series with generic labels.
pub fn align(
    long: &[RawObservation],
    short: &[RawObservation],
) -> Result<Vec<PairedPoint>, CurveError> {
    SeriesAligner::default().align(long, short)
}

/// Sort by date, drop duplicate dates (last one wins) and fill interior gaps.
///
/// A gap is filled from its nearest valid neighbours weighted by index
/// distance, so a weekend between two readings counts the same as an
/// overnight gap. Gaps without a valid neighbour on both sides are dropped.
/// Non-finite values are treated as missing.
pub fn interpolate_missing(raw: &[RawObservation]) -> Vec<Observation> {
    let mut sorted: Vec<RawObservation> = raw.to_vec();
    sorted.sort_by_key(|o| o.date);

    let mut series: Vec<RawObservation> = Vec::with_capacity(sorted.len());
    for obs in sorted {
        match series.last_mut() {
            Some(last) if last.date == obs.date => *last = obs,
            _ => series.push(obs),
        }
    }

    let values: Vec<Option<f64>> = series
        .iter()
        .map(|o| o.value.filter(|v| v.is_finite()))
        .collect();

    let mut repaired = Vec::with_capacity(series.len());
    let mut prev_valid: Option<usize> = None;

    for (i, obs) in series.iter().enumerate() {
        if let Some(v) = values[i] {
            prev_valid = Some(i);
            repaired.push(Observation::new(obs.date, v));
            continue;
        }

        let Some(p) = prev_valid else {
            continue;
        };
        let Some(n) = (i + 1..values.len()).find(|&j| values[j].is_some()) else {
            // Trailing gap: nothing after this point can be resolved either.
            break;
        };

        let (vp, vn) = match (values[p], values[n]) {
            (Some(vp), Some(vn)) => (vp, vn),
            _ => continue,
        };
        let weight = (i - p) as f64 / (n - p) as f64;
        repaired.push(Observation::new(obs.date, vp + (vn - vp) * weight));
    }

    repaired
}

/// Merge-join two date-sorted, date-unique series.
pub fn inner_join(long: &[Observation], short: &[Observation]) -> Vec<PairedPoint> {
    let mut points = Vec::with_capacity(long.len().min(short.len()));
    let (mut i, mut j) = (0, 0);

    while i < long.len() && j < short.len() {
        let (l, s) = (&long[i], &short[j]);
        match l.date.cmp(&s.date) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                points.push(PairedPoint::new(l.date, l.value, s.value));
                i += 1;
                j += 1;
            }
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn raw(d: u32, v: Option<f64>) -> RawObservation {
        RawObservation::new(day(d), v)
    }

    #[test]
    fn test_interior_gap_uses_position_not_calendar_time() {
        // Day 1 -> day 2 is one day, day 2 -> day 11 is nine days; the repaired
        // value still sits halfway between the neighbours.
        let series = vec![raw(1, Some(4.0)), raw(2, None), raw(11, Some(5.0))];
        let repaired = interpolate_missing(&series);

        assert_eq!(repaired.len(), 3);
        assert_eq!(repaired[1].date, day(2));
        assert_relative_eq!(repaired[1].value, 4.5, epsilon = 1e-12);
    }

    #[test]
    fn test_run_of_gaps_is_spread_evenly() {
        let series = vec![
            raw(1, Some(1.0)),
            raw(2, None),
            raw(3, None),
            raw(4, None),
            raw(5, Some(3.0)),
        ];
        let values: Vec<f64> = interpolate_missing(&series).iter().map(|o| o.value).collect();

        assert_eq!(values.len(), 5);
        assert_relative_eq!(values[1], 1.5, epsilon = 1e-12);
        assert_relative_eq!(values[2], 2.0, epsilon = 1e-12);
        assert_relative_eq!(values[3], 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_edge_gaps_are_dropped() {
        let series = vec![
            raw(1, None),
            raw(2, Some(2.0)),
            raw(3, Some(f64::NAN)),
            raw(4, Some(4.0)),
            raw(5, None),
        ];
        let repaired = interpolate_missing(&series);

        let dates: Vec<NaiveDate> = repaired.iter().map(|o| o.date).collect();
        assert_eq!(dates, vec![day(2), day(3), day(4)]);
        assert_relative_eq!(repaired[1].value, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unsorted_input_and_duplicate_dates() {
        let series = vec![raw(3, Some(3.0)), raw(1, Some(1.0)), raw(3, Some(3.3))];
        let repaired = interpolate_missing(&series);

        assert_eq!(repaired.len(), 2);
        assert_eq!(repaired[0].date, day(1));
        assert_relative_eq!(repaired[1].value, 3.3, epsilon = 1e-12);
    }

    #[test]
    fn test_align_keeps_only_common_dates() {
        let long: Vec<RawObservation> = [1, 2, 3, 5].iter().map(|&d| raw(d, Some(4.0))).collect();
        let short: Vec<RawObservation> = [2, 3, 4, 5].iter().map(|&d| raw(d, Some(3.0))).collect();

        let points = align(&long, &short).unwrap();
        let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();

        assert_eq!(dates, vec![day(2), day(3), day(5)]);
        assert!(points.iter().all(|p| p.long_value == 4.0 && p.short_value == 3.0));
    }

    #[test]
    fn test_align_empty_series_is_data_unavailable() {
        let long = vec![raw(1, None), raw(2, None)];
        let short = vec![raw(1, Some(1.0))];

        match align(&long, &short) {
            Err(CurveError::DataUnavailable(msg)) => assert!(msg.contains("long series")),
            other => panic!("expected DataUnavailable, got {:?}", other),
        }
        assert!(matches!(
            align(&short, &[]),
            Err(CurveError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_align_disjoint_dates_is_no_overlap() {
        let pair = SeriesPair::new("10Y vs 2Y", "DGS10", "DGS2");
        let long = vec![raw(1, Some(4.0)), raw(2, Some(4.1))];
        let short = vec![raw(3, Some(3.0))];

        let err = SeriesAligner::for_pair(&pair).align(&long, &short).unwrap_err();
        assert_eq!(
            err,
            CurveError::NoOverlap {
                long: "DGS10".to_string(),
                short: "DGS2".to_string()
            }
        );
    }
}
