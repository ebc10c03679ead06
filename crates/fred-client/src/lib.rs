use async_trait::async_trait;
use chrono::NaiveDate;
use curve_core::{CurveError, Frequency, ObservationSource, RawObservation};
use reqwest::Client;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// FRED caps a single observations request at 100k rows.
const PAGE_LIMIT: usize = 100_000;

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }
            let Some(&oldest) = ts.front() else {
                ts.push_back(now);
                return;
            };

            // Wait until the oldest request falls out of the window
            let sleep_dur =
                (oldest + self.window).duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for FRED API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Connection settings for the FRED API.
#[derive(Debug, Clone)]
pub struct FredConfig {
    pub api_key: String,
    pub base_url: String,
    /// FRED allows 120 requests per minute per key.
    pub requests_per_minute: usize,
    pub timeout: Duration,
    /// Pause before retrying a 429 response.
    pub retry_delay: Duration,
}

impl FredConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            requests_per_minute: 120,
            timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(15),
        }
    }
}

#[derive(Clone)]
pub struct FredClient {
    config: FredConfig,
    client: Client,
    rate_limiter: RateLimiter,
}

impl FredClient {
    pub fn new(config: FredConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            rate_limiter: RateLimiter::new(config.requests_per_minute, Duration::from_secs(60)),
            config,
            client,
        }
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, CurveError> {
        let request = builder.build().map_err(|e| CurveError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request.try_clone()
                .ok_or_else(|| CurveError::ApiError("Cannot clone request".to_string()))?;
            let response = self.client.execute(req_clone).await
                .map_err(|e| CurveError::ApiError(e.without_url().to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait = self.config.retry_delay;
            tracing::warn!(
                "FRED 429 rate limited, waiting {:.1}s before retry {}/3",
                wait.as_secs_f64(),
                attempt + 1
            );
            tokio::time::sleep(wait).await;
        }

        Err(CurveError::ApiError("Rate limited by FRED after 3 retries".to_string()))
    }

    /// Fetch one page of `/series/observations`.
    async fn fetch_page(
        &self,
        series_id: &str,
        params: &[(&'static str, String)],
    ) -> Result<ObservationsPage, CurveError> {
        let url = format!("{}/series/observations", self.config.base_url.trim_end_matches('/'));

        let response = self.send_request(
            self.client
                .get(&url)
                .query(&[
                    ("series_id", series_id),
                    ("api_key", self.config.api_key.as_str()),
                    ("file_type", "json"),
                ])
                .query(params)
        ).await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CurveError::ApiError(e.without_url().to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<FredErrorResponse>(&body)
                .map(|e| e.error_message)
                .unwrap_or(body);
            return Err(CurveError::ApiError(format!(
                "{}: HTTP {}: {}",
                series_id, status, detail
            )));
        }

        parse_observations_page(&body)
    }

    /// Full history of a series from `start` onward.
    pub async fn get_observations(
        &self,
        series_id: &str,
        start: NaiveDate,
        frequency: Frequency,
    ) -> Result<Vec<RawObservation>, CurveError> {
        let mut observations = Vec::new();
        let mut offset = 0usize;

        loop {
            let mut params = history_query(start, frequency);
            params.push(("offset", offset.to_string()));
            let page = self.fetch_page(series_id, &params).await?;

            let fetched = page.observations.len();
            observations.extend(page.observations);
            offset += fetched;

            if fetched == 0 || offset >= page.count {
                break;
            }
            tracing::debug!("{}: fetched {}/{} observations", series_id, offset, page.count);
        }

        tracing::debug!("{}: {} observations since {}", series_id, observations.len(), start);
        Ok(observations)
    }

    /// The newest `limit` observations, returned oldest first.
    pub async fn get_recent(
        &self,
        series_id: &str,
        frequency: Frequency,
        limit: usize,
    ) -> Result<Vec<RawObservation>, CurveError> {
        let page = self.fetch_page(series_id, &recent_query(frequency, limit)).await?;
        let mut observations = page.observations;
        observations.reverse();
        Ok(observations)
    }
}

#[async_trait]
impl ObservationSource for FredClient {
    async fn fetch_series(
        &self,
        series_id: &str,
        start: NaiveDate,
        frequency: Frequency,
    ) -> Result<Vec<RawObservation>, CurveError> {
        self.get_observations(series_id, start, frequency).await
    }

    async fn fetch_recent(
        &self,
        series_id: &str,
        frequency: Frequency,
        limit: usize,
    ) -> Result<Vec<RawObservation>, CurveError> {
        self.get_recent(series_id, frequency, limit).await
    }
}

fn history_query(start: NaiveDate, frequency: Frequency) -> Vec<(&'static str, String)> {
    vec![
        ("observation_start", start.format("%Y-%m-%d").to_string()),
        ("frequency", frequency.code().to_string()),
        ("sort_order", "asc".to_string()),
        ("limit", PAGE_LIMIT.to_string()),
    ]
}

fn recent_query(frequency: Frequency, limit: usize) -> Vec<(&'static str, String)> {
    vec![
        ("frequency", frequency.code().to_string()),
        ("sort_order", "desc".to_string()),
        ("limit", limit.clamp(1, PAGE_LIMIT).to_string()),
    ]
}

/// Parse an observations payload. Non-numeric values (FRED uses ".") become `None`.
pub fn parse_observations(body: &str) -> Result<Vec<RawObservation>, CurveError> {
    parse_observations_page(body).map(|page| page.observations)
}

fn parse_observations_page(body: &str) -> Result<ObservationsPage, CurveError> {
    let response: ObservationsResponse = serde_json::from_str(body)
        .map_err(|e| CurveError::ApiError(format!("Malformed FRED payload: {}", e)))?;

    let Some(entries) = response.observations else {
        let reason = response
            .error_message
            .unwrap_or_else(|| "response has no observations".to_string());
        return Err(CurveError::ApiError(reason));
    };

    let observations = entries
        .into_iter()
        .map(|entry| {
            let date = NaiveDate::parse_from_str(&entry.date, "%Y-%m-%d")
                .map_err(|e| CurveError::InvalidData(format!("bad date '{}': {}", entry.date, e)))?;
            let value = entry.value.trim().parse::<f64>().ok().filter(|v| v.is_finite());
            Ok(RawObservation::new(date, value))
        })
        .collect::<Result<Vec<_>, CurveError>>()?;

    Ok(ObservationsPage {
        count: response.count.unwrap_or(observations.len()),
        observations,
    })
}

struct ObservationsPage {
    count: usize,
    observations: Vec<RawObservation>,
}

// Response structures
#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    observations: Option<Vec<ObservationEntry>>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObservationEntry {
    date: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct FredErrorResponse {
    error_message: String,
}
