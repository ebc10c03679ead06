use crate::{Alert, AlertType};

pub struct EmailTemplate;

struct Fields<'a> {
    label: &'static str,
    color: &'static str,
    pair_name: &'a str,
    date: String,
    long_value: f64,
    short_value: f64,
}

impl<'a> Fields<'a> {
    fn of(alert: &'a Alert) -> Self {
        match &alert.alert_type {
            AlertType::Inversion {
                pair_name,
                date,
                long_value,
                short_value,
            } => Fields {
                label: "INVERSION",
                color: "#ef4444",
                pair_name,
                date: date.format("%Y-%m-%d").to_string(),
                long_value: *long_value,
                short_value: *short_value,
            },
            AlertType::Disinversion {
                pair_name,
                date,
                long_value,
                short_value,
            } => Fields {
                label: "DISINVERSION",
                color: "#22c55e",
                pair_name,
                date: date.format("%Y-%m-%d").to_string(),
                long_value: *long_value,
                short_value: *short_value,
            },
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

impl EmailTemplate {
    /// Plain-text body for clients that do not render HTML.
    pub fn render_plain(alert: &Alert) -> String {
        let f = Fields::of(alert);
        format!(
            "{}\n\nPair:   {}\nDate:   {}\nLong:   {:.2}%\nShort:  {:.2}%\nSpread: {:+.2}\n\nSent at {} UTC\n",
            alert.message,
            f.pair_name,
            f.date,
            f.long_value,
            f.short_value,
            f.long_value - f.short_value,
            alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
        )
    }

    pub fn render(alert: &Alert) -> String {
        let f = Fields::of(alert);
        let spread = f.long_value - f.short_value;
        let body_content = format!(
            r#"<div style="background:{color};color:#fff;padding:12px 20px;border-radius:8px 8px 0 0;font-size:18px;font-weight:700;">{label} &mdash; {pair}</div>
<table style="width:100%;border-collapse:collapse;">
  <tr><td style="padding:8px 12px;color:#94a3b8;">Pair</td><td style="padding:8px 12px;font-weight:600;">{pair}</td></tr>
  <tr style="background:#f8fafc;"><td style="padding:8px 12px;color:#94a3b8;">Date</td><td style="padding:8px 12px;font-weight:600;">{date}</td></tr>
  <tr><td style="padding:8px 12px;color:#94a3b8;">Long yield</td><td style="padding:8px 12px;font-weight:600;">{long:.2}%</td></tr>
  <tr style="background:#f8fafc;"><td style="padding:8px 12px;color:#94a3b8;">Short yield</td><td style="padding:8px 12px;font-weight:600;">{short:.2}%</td></tr>
  <tr><td style="padding:8px 12px;color:#94a3b8;">Spread</td><td style="padding:8px 12px;font-weight:600;color:{color};">{spread:+.2}</td></tr>
</table>"#,
            color = f.color,
            label = f.label,
            pair = escape(f.pair_name),
            date = f.date,
            long = f.long_value,
            short = f.short_value,
        );

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:0;background:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="background:#f1f5f9;padding:32px 0;">
  <tr><td align="center">
    <table width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden;box-shadow:0 1px 3px rgba(0,0,0,0.1);">
      <tr><td>
        {body_content}
      </td></tr>
      <tr><td style="padding:16px 20px;border-top:1px solid #e2e8f0;">
        <p style="margin:0;color:#94a3b8;font-size:12px;">
          {msg}
          <br>Sent at {ts} UTC
        </p>
      </td></tr>
    </table>
    <p style="color:#94a3b8;font-size:11px;margin-top:16px;">yieldwatch</p>
  </td></tr>
</table>
</body>
</html>"#,
            msg = escape(&alert.message),
            ts = alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}
