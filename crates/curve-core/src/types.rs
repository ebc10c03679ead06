use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CurveError;

/// Observation as delivered by a data source, before missing values are repaired.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub date: NaiveDate,
    #[serde(default)]
    pub value: Option<f64>,
}

impl RawObservation {
    pub fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Self { date, value }
    }

    pub fn missing(date: NaiveDate) -> Self {
        Self { date, value: None }
    }
}

/// A single valid yield reading for one series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

impl From<Observation> for RawObservation {
    fn from(obs: Observation) -> Self {
        RawObservation::new(obs.date, Some(obs.value))
    }
}

/// Long and short yields observed on the same date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairedPoint {
    pub date: NaiveDate,
    pub long_value: f64,
    pub short_value: f64,
}

impl PairedPoint {
    pub fn new(date: NaiveDate, long_value: f64, short_value: f64) -> Self {
        Self {
            date,
            long_value,
            short_value,
        }
    }

    /// Long minus short, in percentage points. Negative while inverted.
    pub fn spread(&self) -> f64 {
        self.long_value - self.short_value
    }
}

/// Binary shape of a two-maturity curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveState {
    /// Long yield above short yield
    #[default]
    Normal,
    /// Short yield above long yield
    Inverted,
}

impl CurveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurveState::Normal => "normal",
            CurveState::Inverted => "inverted",
        }
    }
}

impl fmt::Display for CurveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurveState {
    type Err = CurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(CurveState::Normal),
            "inverted" => Ok(CurveState::Inverted),
            other => Err(CurveError::InvalidData(format!(
                "unknown curve state '{}'",
                other
            ))),
        }
    }
}

/// Direction of a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    Inversion,
    Disinversion,
}

impl TransitionKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransitionKind::Inversion => "Inversion",
            TransitionKind::Disinversion => "Disinversion",
        }
    }
}

/// Emitted exactly once per state boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub pair_name: String,
    pub date: NaiveDate,
    pub from_state: CurveState,
    pub to_state: CurveState,
    pub long_value: f64,
    pub short_value: f64,
}

impl TransitionEvent {
    pub fn kind(&self) -> TransitionKind {
        match self.to_state {
            CurveState::Inverted => TransitionKind::Inversion,
            CurveState::Normal => TransitionKind::Disinversion,
        }
    }

    pub fn spread(&self) -> f64 {
        self.long_value - self.short_value
    }
}

impl fmt::Display for TransitionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} detected for {} on {}",
            self.kind().label(),
            self.pair_name,
            self.date.format("%Y-%m-%d")
        )
    }
}

/// Per-pair state carried between incremental runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedPairState {
    pub pair_name: String,
    #[serde(default)]
    pub previous_state: Option<CurveState>,
    #[serde(default)]
    pub last_check_date: Option<NaiveDate>,
}

impl TrackedPairState {
    /// State for a pair that has never been checked.
    pub fn unset(pair_name: impl Into<String>) -> Self {
        Self {
            pair_name: pair_name.into(),
            previous_state: None,
            last_check_date: None,
        }
    }
}

/// Two series whose ordering is monitored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPair {
    pub name: String,
    pub long_series: String,
    pub short_series: String,
}

impl SeriesPair {
    pub fn new(
        name: impl Into<String>,
        long_series: impl Into<String>,
        short_series: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            long_series: long_series.into(),
            short_series: short_series.into(),
        }
    }
}

/// Observation frequency understood by FRED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Semiannual,
    Annual,
}

impl Frequency {
    /// Short code used in FRED query strings.
    pub fn code(&self) -> &'static str {
        match self {
            Frequency::Daily => "d",
            Frequency::Weekly => "w",
            Frequency::Biweekly => "bw",
            Frequency::Monthly => "m",
            Frequency::Quarterly => "q",
            Frequency::Semiannual => "sa",
            Frequency::Annual => "a",
        }
    }
}

impl FromStr for Frequency {
    type Err = CurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "d" | "daily" => Ok(Frequency::Daily),
            "w" | "weekly" => Ok(Frequency::Weekly),
            "bw" | "biweekly" => Ok(Frequency::Biweekly),
            "m" | "monthly" => Ok(Frequency::Monthly),
            "q" | "quarterly" => Ok(Frequency::Quarterly),
            "sa" | "semiannual" => Ok(Frequency::Semiannual),
            "a" | "annual" => Ok(Frequency::Annual),
            other => Err(CurveError::InvalidData(format!(
                "unknown frequency '{}'",
                other
            ))),
        }
    }
}
