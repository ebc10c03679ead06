use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate};
use curve_core::{SeriesPair, TransitionEvent};
use plotters::prelude::*;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::monitor::ScanReport;

const DISINVERSION_GREEN: RGBColor = RGBColor(0, 128, 0);

/// Plain-text listing of a scan, one block per transition kind.
pub fn render_text(report: &ScanReport) -> String {
    let pair = &report.pair;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} ({} vs {}): {} points",
        pair.name,
        pair.long_series,
        pair.short_series,
        report.points.len()
    );
    if let (Some(first), Some(last)) = (report.points.first(), report.points.last()) {
        let _ = writeln!(out, "Range: {} to {}", first.date, last.date);
    }
    if let Some(state) = report.latest_state() {
        let _ = writeln!(out, "Latest state: {}", state);
    }

    write_events(&mut out, "Inversion Dates", pair, report.inversions());
    write_events(&mut out, "Disinversion Dates", pair, report.disinversions());
    out
}

fn write_events<'a>(
    out: &mut String,
    heading: &str,
    pair: &SeriesPair,
    events: impl Iterator<Item = &'a TransitionEvent>,
) {
    let _ = writeln!(out, "\n{}:", heading);
    let mut any = false;
    for event in events {
        any = true;
        let _ = writeln!(
            out,
            "  {}  {} {:>6.2}  {} {:>6.2}  spread {:>+6.2}",
            event.date,
            pair.long_series,
            event.long_value,
            pair.short_series,
            event.short_value,
            event.spread()
        );
    }
    if !any {
        let _ = writeln!(out, "  (none)");
    }
}

pub fn to_json(reports: &[ScanReport]) -> Result<String> {
    serde_json::to_string_pretty(reports).map_err(|e| anyhow!("Failed to serialize scan: {}", e))
}

pub async fn write_json(path: &Path, reports: &[ScanReport]) -> Result<()> {
    let json = to_json(reports)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))
}

#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub title: String,
    pub size: (u32, u32),
    pub long_color: RGBColor,
    pub short_color: RGBColor,
    pub inversion_color: RGBColor,
    pub disinversion_color: RGBColor,
    /// Inversions are filled circles, disinversions filled squares.
    pub marker_size: i32,
}

impl ChartStyle {
    pub fn for_pair(pair: &SeriesPair) -> Self {
        Self {
            title: format!("{} Treasury Yield Curve with Inversions and Disinversions", pair.name),
            size: (1200, 720),
            long_color: BLUE,
            short_color: RED,
            inversion_color: BLACK,
            disinversion_color: DISINVERSION_GREEN,
            marker_size: 5,
        }
    }
}

/// Chart output path for `pair`. With several pairs the pair name is
/// appended to the file stem so charts don't overwrite each other.
pub fn chart_path(base: &Path, pair: &SeriesPair, multiple: bool) -> PathBuf {
    if !multiple {
        return base.to_path_buf();
    }

    let slug: String = pair
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chart".to_string());
    let ext = base
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "svg".to_string());

    base.with_file_name(format!("{}-{}.{}", stem, slug, ext))
}

/// Render both legs with transition markers to an SVG file.
pub async fn render_svg(path: &Path, report: &ScanReport, style: &ChartStyle) -> Result<PathBuf> {
    if report.points.is_empty() {
        return Err(anyhow!("No data to chart for {}", report.pair.name));
    }

    let path = path.to_path_buf();
    let report = report.clone();
    let style = style.clone();

    let written = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
        draw_svg(&path, &report, &style)?;
        Ok(path)
    })
    .await??;

    Ok(written)
}

fn draw_svg(path: &Path, report: &ScanReport, style: &ChartStyle) -> Result<()> {
    let Some(origin) = report.points.first().map(|p| p.date) else {
        return Err(anyhow!("No data to chart"));
    };
    let x = |date: NaiveDate| (date - origin).num_days();
    let x_max = report.points.last().map(|p| x(p.date)).unwrap_or(0).max(1);
    let (y_min, y_max) = yield_range(report);

    let root = SVGBackend::new(path, style.size).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| anyhow!("Chart render failed: {}", e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&style.title, ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0i64..x_max, y_min..y_max)
        .map_err(|e| anyhow!("Chart layout failed: {}", e))?;

    let date_label = |offset: &i64| (origin + Duration::days(*offset)).format("%Y-%m").to_string();
    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Yield (%)")
        .x_label_formatter(&date_label)
        .draw()
        .map_err(|e| anyhow!("Chart mesh failed: {}", e))?;

    let long_color = style.long_color;
    chart
        .draw_series(LineSeries::new(
            report.points.iter().map(|p| (x(p.date), p.long_value)),
            long_color.stroke_width(2),
        ))
        .map_err(|e| anyhow!("Chart render failed: {}", e))?
        .label(format!("{} Yield", report.pair.long_series))
        .legend(move |(lx, ly)| PathElement::new(vec![(lx, ly), (lx + 20, ly)], long_color.stroke_width(2)));

    let short_color = style.short_color;
    chart
        .draw_series(LineSeries::new(
            report.points.iter().map(|p| (x(p.date), p.short_value)),
            short_color.stroke_width(2),
        ))
        .map_err(|e| anyhow!("Chart render failed: {}", e))?
        .label(format!("{} Yield", report.pair.short_series))
        .legend(move |(lx, ly)| PathElement::new(vec![(lx, ly), (lx + 20, ly)], short_color.stroke_width(2)));

    let size = style.marker_size;
    let inversion_color = style.inversion_color;
    chart
        .draw_series(
            report
                .inversions()
                .map(|e| Circle::new((x(e.date), e.short_value), size, inversion_color.filled())),
        )
        .map_err(|e| anyhow!("Chart render failed: {}", e))?
        .label("Inversion Points")
        .legend(move |(lx, ly)| Circle::new((lx + 10, ly), size, inversion_color.filled()));

    let disinversion_color = style.disinversion_color;
    chart
        .draw_series(report.disinversions().map(|e| {
            EmptyElement::at((x(e.date), e.short_value))
                + Rectangle::new([(-size, -size), (size, size)], disinversion_color.filled())
        }))
        .map_err(|e| anyhow!("Chart render failed: {}", e))?
        .label("Disinversion Points")
        .legend(move |(lx, ly)| {
            Rectangle::new([(lx + 10 - size, ly - size), (lx + 10 + size, ly + size)], disinversion_color.filled())
        });

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| anyhow!("Chart legend failed: {}", e))?;

    root.present()
        .map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))?;
    Ok(())
}

/// Padded min/max over both legs.
fn yield_range(report: &ScanReport) -> (f64, f64) {
    let values = report
        .points
        .iter()
        .flat_map(|p| [p.long_value, p.short_value]);
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    let pad = ((hi - lo) * 0.05).max(0.25);
    (lo - pad, hi + pad)
}
