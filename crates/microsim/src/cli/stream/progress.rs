//! Progress bar and end-of-run summary.

use indicatif::{ProgressBar, ProgressStyle};
use microsim_core::{StreamOutcome, StreamReport};

/// Bar whose length is set once the catalog is built.
pub fn create_progress_bar(hidden: bool) -> anyhow::Result<ProgressBar> {
    if hidden {
        return Ok(ProgressBar::hidden());
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("##-"),
    );
    pb.set_message("cataloging...");
    Ok(pb)
}

/// Print a summary table to stderr.
pub fn print_summary(report: &StreamReport, dry_run: bool) {
    let stats = &report.stats;
    let secs = stats.elapsed.as_secs_f64();
    let throughput = if secs > 0.0 {
        stats.bytes as f64 / 1_000_000.0 / secs
    } else {
        0.0
    };
    let status = match report.outcome {
        StreamOutcome::Completed => "completed",
        StreamOutcome::Cancelled => "cancelled",
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("    Stream {}", report.stream_id);
    eprintln!("  ====================================");
    if dry_run {
        eprintln!("    Prepared:     {:>8}  (dry run)", stats.dry);
    } else {
        eprintln!("    Sent:         {:>8}", stats.sent);
    }
    if stats.failed > 0 {
        eprintln!("    Failed:       {:>8}", stats.failed);
    }
    if stats.skipped > 0 {
        eprintln!("    Skipped:      {:>8}", stats.skipped);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Catalogued:   {:>8}", stats.total);
    eprintln!("    Status:       {:>8}", status);
    eprintln!("    Duration:     {:>7.1}s", secs);
    if !dry_run {
        eprintln!("    Throughput:   {:>7.1} MB/sec", throughput);
    }
    eprintln!("  ====================================");
}
