use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use crate::{Alert, NotificationChannel, NotificationError};

/// Pops a desktop notification through the platform's notifier command
/// (`notify-send` on Linux/BSD, `osascript` on macOS). `timeout_secs` is both
/// the popup's expiry and the deadline for the notifier command itself.
pub struct DesktopNotifier {
    timeout_secs: u32,
}

impl DesktopNotifier {
    pub fn new(timeout_secs: u32) -> Self {
        Self { timeout_secs }
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_secs.max(1)))
    }

    fn command(&self, alert: &Alert) -> Result<Command, NotificationError> {
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                applescript_quote(&alert.message),
                applescript_quote(&alert.title)
            );
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(script);
            Ok(cmd)
        } else if cfg!(unix) {
            let mut cmd = Command::new("notify-send");
            cmd.arg("--app-name=yieldwatch")
                .arg(format!("--expire-time={}", self.timeout_secs.saturating_mul(1000)))
                .arg(&alert.title)
                .arg(&alert.message);
            Ok(cmd)
        } else {
            Err(NotificationError::Config(
                "desktop notifications are not supported on this platform".into(),
            ))
        }
    }
}

fn applescript_quote(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[async_trait]
impl NotificationChannel for DesktopNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let mut cmd = self.command(alert)?;
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.deadline(), cmd.output())
            .await
            .map_err(|_| NotificationError::Desktop("notifier command timed out".into()))?
            .map_err(|e| NotificationError::Desktop(format!("failed to run notifier: {}", e)))?;

        if !output.status.success() {
            return Err(NotificationError::Desktop(format!(
                "notifier exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "desktop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_follows_configured_timeout() {
        assert_eq!(DesktopNotifier::new(3).deadline(), Duration::from_secs(3));
        assert_eq!(DesktopNotifier::new(0).deadline(), Duration::from_secs(1));
    }

    #[test]
    fn test_applescript_quote() {
        assert_eq!(applescript_quote(r#"say "hi" \ bye"#), r#"say \"hi\" \\ bye"#);
    }
}
