use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset. The leading `warn` keeps warnings from
/// every crate, including failed alert deliveries.
pub const DEFAULT_LOG_FILTER: &str =
    "warn,yieldwatch=info,curve_monitor=info,notification_service=info,fred_client=warn";

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Open `path` for appending, creating it and its parent directories.
pub fn log_file_writer(path: &Path) -> Result<Mutex<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    Ok(Mutex::new(file))
}

/// Install the global subscriber: stdout by default, or `log_file` when
/// given (cron runs), JSON lines when `RUST_LOG_FORMAT=json`.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter());
    match (log_file, json_logging) {
        (Some(path), true) => builder
            .json()
            .with_ansi(false)
            .with_writer(log_file_writer(path)?)
            .init(),
        (Some(path), false) => builder
            .with_ansi(false)
            .with_writer(log_file_writer(path)?)
            .init(),
        (None, true) => builder.json().init(),
        (None, false) => builder.init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    fn under_default_filter(check: impl FnOnce() -> bool) -> bool {
        let subscriber = tracing_subscriber::registry().with(EnvFilter::new(DEFAULT_LOG_FILTER));
        tracing::subscriber::with_default(subscriber, check)
    }

    #[test]
    fn test_default_filter_keeps_notification_failures() {
        assert!(under_default_filter(|| tracing::enabled!(
            target: "notification_service",
            Level::WARN
        )));
        // LogNotifier's alert line.
        assert!(under_default_filter(|| tracing::enabled!(
            target: "notification_service",
            Level::INFO
        )));
    }

    #[test]
    fn test_default_filter_levels() {
        assert!(under_default_filter(|| tracing::enabled!(target: "curve_monitor::monitor", Level::INFO)));
        assert!(under_default_filter(|| tracing::enabled!(target: "yieldwatch", Level::INFO)));
        assert!(under_default_filter(|| tracing::enabled!(target: "fred_client", Level::WARN)));
        assert!(!under_default_filter(|| tracing::enabled!(target: "fred_client", Level::INFO)));
        assert!(under_default_filter(|| tracing::enabled!(target: "hyper", Level::WARN)));
        assert!(!under_default_filter(|| tracing::enabled!(target: "hyper", Level::INFO)));
    }

    #[test]
    fn test_log_file_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("yield_curve.log");

        for message in ["first run", "second run"] {
            let subscriber = tracing_subscriber::fmt()
                .with_ansi(false)
                .with_writer(log_file_writer(&path).unwrap())
                .finish();
            tracing::subscriber::with_default(subscriber, || {
                tracing::warn!(target: "notification_service", "{}", message)
            });
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let first = contents.find("first run").unwrap();
        let second = contents.find("second run").unwrap();
        assert!(first < second);
        assert!(contents.contains("WARN"));
    }
}
