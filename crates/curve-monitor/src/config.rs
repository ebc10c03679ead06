use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use curve_core::{CurveState, Frequency, SeriesPair, TiePolicy, TrackerConfig};
use fred_client::{FredConfig, DEFAULT_BASE_URL};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Pairs monitored when `YIELDWATCH_PAIRS` is not set.
pub const DEFAULT_PAIRS: &str = "DGS10:DGS2:10Y vs 2Y;DGS30:DGS3MO:30Y vs 3M";

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub fred_api_key: Option<String>,
    pub fred_base_url: String,
    pub fred_requests_per_minute: usize,
    pub fred_timeout_secs: u64,

    pub pairs: Vec<SeriesPair>,
    pub frequency: Frequency,
    /// Where incremental state is persisted between runs
    pub state_file: PathBuf,
    /// First date fetched by historical scans
    pub start_date: NaiveDate,
    /// Observations fetched per series for an incremental check
    pub recent_window: usize,

    pub tracker: TrackerConfig,
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            fred_api_key: get("FRED_API_KEY"),
            fred_base_url: get("FRED_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            fred_requests_per_minute: get("FRED_RATE_LIMIT")
                .unwrap_or_else(|| "120".to_string())
                .parse()
                .context("FRED_RATE_LIMIT must be a positive integer")?,
            fred_timeout_secs: get("FRED_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .parse()
                .context("FRED_TIMEOUT_SECS must be a positive integer")?,

            pairs: parse_pairs(&get("YIELDWATCH_PAIRS").unwrap_or_else(|| DEFAULT_PAIRS.to_string()))?,
            frequency: get("YIELDWATCH_FREQUENCY")
                .unwrap_or_else(|| "d".to_string())
                .parse()?,
            state_file: get("YIELDWATCH_STATE_FILE")
                .unwrap_or_else(|| "yield_curve_state.json".to_string())
                .into(),
            start_date: NaiveDate::parse_from_str(
                &get("YIELDWATCH_START_DATE").unwrap_or_else(|| "2000-01-01".to_string()),
                "%Y-%m-%d",
            )
            .context("YIELDWATCH_START_DATE must be YYYY-MM-DD")?,
            recent_window: get("YIELDWATCH_RECENT_WINDOW")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .context("YIELDWATCH_RECENT_WINDOW must be a positive integer")?,

            tracker: TrackerConfig {
                initial_state: get("YIELDWATCH_INITIAL_STATE")
                    .map(|s| s.parse::<CurveState>())
                    .transpose()?
                    .unwrap_or_default(),
                tie_policy: get("YIELDWATCH_TIE_POLICY")
                    .map(|s| s.parse::<TiePolicy>())
                    .transpose()?
                    .unwrap_or_default(),
                evaluate_first_point: get("YIELDWATCH_EVALUATE_FIRST_POINT")
                    .unwrap_or_else(|| "false".to_string())
                    .parse()
                    .context("YIELDWATCH_EVALUATE_FIRST_POINT must be true or false")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pairs.is_empty() {
            bail!("At least one series pair must be configured");
        }

        let mut seen = HashSet::new();
        for pair in &self.pairs {
            if !seen.insert(pair.name.as_str()) {
                bail!("Duplicate pair name '{}'", pair.name);
            }
            if pair.long_series == pair.short_series {
                bail!("Pair '{}' compares {} with itself", pair.name, pair.long_series);
            }
        }

        if self.recent_window == 0 {
            bail!("YIELDWATCH_RECENT_WINDOW must be at least 1");
        }
        if self.fred_requests_per_minute == 0 {
            bail!("FRED_RATE_LIMIT must be at least 1");
        }

        Ok(())
    }

    /// Client settings; fails when no API key is configured.
    pub fn fred_config(&self) -> Result<FredConfig> {
        let api_key = self
            .fred_api_key
            .clone()
            .context("FRED_API_KEY must be set to fetch observations")?;

        Ok(FredConfig {
            base_url: self.fred_base_url.clone(),
            requests_per_minute: self.fred_requests_per_minute,
            timeout: Duration::from_secs(self.fred_timeout_secs),
            ..FredConfig::new(api_key)
        })
    }

    pub fn find_pair(&self, name: &str) -> Option<&SeriesPair> {
        self.pairs.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// Parse `LONG:SHORT[:NAME]` entries separated by `;`.
///
/// The name defaults to `LONG vs SHORT`.
pub fn parse_pairs(list: &str) -> Result<Vec<SeriesPair>> {
    list.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':').map(str::trim);
            let long = parts.next().filter(|s| !s.is_empty());
            let short = parts.next().filter(|s| !s.is_empty());
            let (Some(long), Some(short)) = (long, short) else {
                bail!("Invalid pair '{}', expected LONG:SHORT[:NAME]", entry);
            };
            let name = parts
                .next()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} vs {}", long, short));
            Ok(SeriesPair::new(name, long, short))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<MonitorConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MonitorConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.pairs.len(), 2);
        assert_eq!(config.pairs[0], SeriesPair::new("10Y vs 2Y", "DGS10", "DGS2"));
        assert_eq!(config.pairs[1], SeriesPair::new("30Y vs 3M", "DGS30", "DGS3MO"));
        assert_eq!(config.frequency, Frequency::Daily);
        assert_eq!(config.state_file, PathBuf::from("yield_curve_state.json"));
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        assert_eq!(config.tracker, TrackerConfig::default());
        assert!(config.fred_api_key.is_none());
        assert!(config.fred_config().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("FRED_API_KEY", "abc"),
            ("YIELDWATCH_PAIRS", "DGS10:DGS3MO"),
            ("YIELDWATCH_FREQUENCY", "monthly"),
            ("YIELDWATCH_INITIAL_STATE", "inverted"),
            ("YIELDWATCH_TIE_POLICY", "normal"),
            ("YIELDWATCH_EVALUATE_FIRST_POINT", "true"),
            ("FRED_RATE_LIMIT", "60"),
        ])
        .unwrap();

        assert_eq!(config.pairs, vec![SeriesPair::new("DGS10 vs DGS3MO", "DGS10", "DGS3MO")]);
        assert_eq!(config.frequency, Frequency::Monthly);
        assert_eq!(config.tracker.initial_state, CurveState::Inverted);
        assert_eq!(config.tracker.tie_policy, TiePolicy::Normal);
        assert!(config.tracker.evaluate_first_point);

        let fred = config.fred_config().unwrap();
        assert_eq!(fred.api_key, "abc");
        assert_eq!(fred.requests_per_minute, 60);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config_from(&[("YIELDWATCH_PAIRS", "DGS10")]).is_err());
        assert!(config_from(&[("YIELDWATCH_PAIRS", "A:B:x;C:D:x")]).is_err());
        assert!(config_from(&[("YIELDWATCH_PAIRS", "DGS2:DGS2")]).is_err());
        assert!(config_from(&[("YIELDWATCH_RECENT_WINDOW", "0")]).is_err());
        assert!(config_from(&[("YIELDWATCH_START_DATE", "01/01/2000")]).is_err());
        assert!(config_from(&[("YIELDWATCH_INITIAL_STATE", "flat")]).is_err());
    }

    #[test]
    fn test_find_pair_ignores_case() {
        let config = config_from(&[]).unwrap();
        assert!(config.find_pair("10y VS 2y").is_some());
        assert!(config.find_pair("5Y vs 2Y").is_none());
    }

    #[test]
    fn test_parse_pairs_skips_blank_entries() {
        let pairs = parse_pairs(" DGS10 : DGS2 : 10s2s ;; ").unwrap();
        assert_eq!(pairs, vec![SeriesPair::new("10s2s", "DGS10", "DGS2")]);
    }
}
