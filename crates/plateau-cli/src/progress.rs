//! Progress bar and value formatting for the CLI

use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use plateau_core::{Metric, RoundProgress};

/// Progress bar over the round budget
pub fn round_bar(max_rounds: usize, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(max_rounds as u64);
    pb.set_style(round_style());
    pb
}

fn round_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  [{bar:40.cyan/blue}] round {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}

/// Message shown next to the bar after a round
pub fn round_message(progress: &RoundProgress, metric: Metric) -> String {
    let verdict = match progress.verdict {
        Some(true) => ", steady",
        Some(false) => ", not steady",
        None => "",
    };
    format!(
        "{} (window {}/{}{})",
        format_value(progress.value, metric),
        progress.window_len,
        progress.window_capacity,
        verdict
    )
}

/// Format a dependent-variable value with its unit
pub fn format_value(value: f64, metric: Metric) -> String {
    match metric {
        Metric::ReadBandwidth | Metric::WriteBandwidth | Metric::TotalBandwidth => {
            // Values are KiB/s
            let bytes = (value.max(0.0) * 1024.0) as u64;
            format!("{}/s", format_size(bytes, BINARY))
        }
        Metric::MeanReadLatency | Metric::MeanWriteLatency => format!("{:.1} µs", value),
        Metric::ReadIops | Metric::WriteIops | Metric::TotalIops => format!("{:.0} IOPS", value),
    }
}
