use serde::Serialize;

use crate::distance::Split;
use crate::predictor::Prediction;

/// Effort levels shown in the table, in percent of a maximal effort.
pub const EFFORTS: [u32; 6] = [100, 95, 90, 85, 80, 75];

/// Time for running at `effort` percent of the 100% time.
pub fn effort_time(base: f64, effort: u32) -> f64 {
    base / (effort as f64 / 100.0)
}

/// Format seconds as `12.34s`, `M:SS.ss` or `H:MM:SS.ss`.
///
/// Rounds to hundredths first, so 119.996 carries over to `2:00.00`.
pub fn format_time(seconds: f64) -> String {
    let hundredths = (seconds.max(0.0) * 100.0).round() as u64;
    let secs = (hundredths % 6000) as f64 / 100.0;

    if hundredths < 6000 {
        format!("{:.2}s", secs)
    } else if hundredths < 360_000 {
        format!("{}:{:05.2}", hundredths / 6000, secs)
    } else {
        let mins = (hundredths / 6000) % 60;
        format!("{}:{:02}:{:05.2}", hundredths / 360_000, mins, secs)
    }
}

fn format_cell(seconds: Option<f64>) -> String {
    seconds.map(format_time).unwrap_or_else(|| "-".to_string())
}

/// One line of the effort table.
#[derive(Debug, Clone, Serialize)]
pub struct EffortRow {
    pub distance: &'static str,
    pub meters: f64,
    pub synthetic: bool,
    /// Times for each entry of [`EFFORTS`], `None` when the split is unknown.
    pub efforts: Vec<Option<f64>>,
    /// The row of the distance the user entered.
    pub is_base: bool,
}

pub fn effort_rows(prediction: &Prediction) -> Vec<EffortRow> {
    let base = Split::from(prediction.distance);
    prediction
        .iter()
        .map(|(split, time)| EffortRow {
            distance: split.label(),
            meters: split.meters(),
            synthetic: split.is_synthetic(),
            efforts: EFFORTS
                .iter()
                .map(|effort| time.map(|t| effort_time(t, *effort)))
                .collect(),
            is_base: split == base,
        })
        .collect()
}

/// Plain-text effort table, the queried distance marked with `>`.
pub fn render_table(prediction: &Prediction) -> String {
    let mut out = String::new();
    let width = 11;

    out.push_str(&format!("  {:<12}", "Distance"));
    for effort in EFFORTS {
        out.push_str(&format!("{:>width$}", format!("{}%", effort), width = width));
    }
    out.push('\n');
    out.push_str(&"-".repeat(14 + width * EFFORTS.len()));
    out.push('\n');

    for row in effort_rows(prediction) {
        let marker = if row.is_base { '>' } else { ' ' };
        out.push_str(&format!("{} {:<12}", marker, row.distance));
        for time in &row.efforts {
            out.push_str(&format!("{:>width$}", format_cell(*time), width = width));
        }
        out.push('\n');
    }

    out
}

#[derive(Debug, Serialize)]
struct JsonReport {
    distance: &'static str,
    time: f64,
    convention: &'static str,
    generated_at: chrono::DateTime<chrono::Utc>,
    efforts: [u32; 6],
    splits: Vec<EffortRow>,
}

pub fn render_json(prediction: &Prediction, convention: &'static str) -> serde_json::Result<String> {
    let report = JsonReport {
        distance: prediction.distance.label(),
        time: prediction.time,
        convention,
        generated_at: chrono::Utc::now(),
        efforts: EFFORTS,
        splits: effort_rows(prediction),
    };
    serde_json::to_string(&report)
}

#[derive(Debug, Serialize)]
struct JsonError<'a> {
    error: &'a str,
}

pub fn render_error_json(message: &str) -> serde_json::Result<String> {
    serde_json::to_string(&JsonError { error: message })
}
