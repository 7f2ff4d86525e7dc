//! The `vadimage optimize` command.

use clap::Args;
use std::path::Path;
use std::sync::Arc;
use vadimage_core::{
    CancellationToken, Config, ContentCache, DryRunReport, Pipeline, Progress, RunSummary,
};

/// Failures listed individually before the rest are summarized.
const MAX_LISTED_FAILURES: usize = 10;

/// Arguments for the `optimize` command.
#[derive(Args, Debug, Default)]
pub struct OptimizeArgs {
    /// Report what would be generated without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Ignore existing cache entries and rebuild every variant
    #[arg(long)]
    pub no_cache: bool,

    /// Number of source files processed in parallel (overrides config)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Keep variants local even when upload is enabled in config
    #[arg(long)]
    pub no_upload: bool,
}

/// Execute the optimize command.
pub async fn execute(args: OptimizeArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = Config::load(config_path)?;
    apply_args(&mut config, &args)?;

    let cache = if args.no_cache {
        tracing::info!("Ignoring cache, every variant will be rebuilt");
        ContentCache::empty(config.cache_path())
    } else {
        ContentCache::load_or_empty(config.cache_path())
    };
    tracing::debug!("Cache {:?} has {} entries", cache.path(), cache.len());

    let pipeline = Pipeline::new(config, Arc::new(cache))?;

    if args.dry_run {
        let report = pipeline.dry_run().await?;
        print_dry_run(&report);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, finishing in-flight variants (Ctrl-C again to abort)");
                cancel.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            }
        });
    }

    let pb = create_progress_bar();
    let progress = {
        let pb = pb.clone();
        Progress::new().with_callback(move |snapshot| {
            pb.set_length(snapshot.total as u64);
            pb.set_position(snapshot.completed as u64);
            pb.set_message(format!("{} files active", snapshot.active_files));
        })
    };

    let summary = pipeline
        .with_progress(progress)
        .with_cancellation(cancel)
        .run()
        .await?;
    pb.finish_and_clear();

    print_summary(&summary);
    print_failures(&summary);

    if summary.failed > 0 {
        anyhow::bail!("{} of {} variants failed", summary.failed, summary.planned);
    }
    if summary.cancelled > 0 {
        anyhow::bail!(
            "Run cancelled with {} variants not processed",
            summary.cancelled
        );
    }
    Ok(())
}

fn apply_args(config: &mut Config, args: &OptimizeArgs) -> anyhow::Result<()> {
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 {
            anyhow::bail!("--concurrency must be at least 1");
        }
        config.processing.concurrency = concurrency;
    }
    if args.no_upload {
        config.upload.enabled = false;
    }
    Ok(())
}

/// Create a progress bar; the length is set once the run is planned.
fn create_progress_bar() -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb.set_message("discovering...");
    pb
}

fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let elapsed = summary.elapsed.as_secs_f64();
    let rate = if elapsed > 0.0 {
        summary.produced as f64 / elapsed
    } else {
        0.0
    };

    let mut lines = vec![
        format!("    Images:       {:>8}", summary.files),
        format!("    Produced:     {:>8}", summary.produced),
    ];
    if summary.uploaded > 0 {
        lines.push(format!("    Uploaded:     {:>8}", summary.uploaded));
    }
    if summary.skipped > 0 {
        lines.push(format!("    Cached:       {:>8}", summary.skipped));
    }
    if summary.failed > 0 {
        lines.push(format!("    Failed:       {:>8}", summary.failed));
    }
    if summary.cancelled > 0 {
        lines.push(format!("    Cancelled:    {:>8}", summary.cancelled));
    }
    lines.push("  ------------------------------------".to_string());
    lines.push(format!("    Total:        {:>8}", summary.planned));
    lines.push(format!("    Duration:     {:>7.1}s", elapsed));
    lines.push(format!("    Rate:         {:>7.1} variants/sec", rate));
    lines.push(format!("    Peak files:   {:>8}", summary.peak_active_files));
    lines
}

/// Print a formatted summary table after a run.
fn print_summary(summary: &RunSummary) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    for line in summary_lines(summary) {
        eprintln!("{line}");
    }
    eprintln!("  ====================================");
}

fn print_failures(summary: &RunSummary) {
    if summary.failures.is_empty() {
        return;
    }
    eprintln!();
    for failure in summary.failures.iter().take(MAX_LISTED_FAILURES) {
        eprintln!(
            "  [{}] {} ({}): {}",
            failure.kind,
            failure.source.display(),
            failure.spec,
            failure.message
        );
    }
    if summary.failures.len() > MAX_LISTED_FAILURES {
        eprintln!(
            "  ... and {} more (run with --verbose for details)",
            summary.failures.len() - MAX_LISTED_FAILURES
        );
    }
}

fn print_dry_run(report: &DryRunReport) {
    println!("Images:      {}", report.files);
    println!("Variants:    {}", report.planned);
    println!("Cached:      {}", report.cached);
    println!("To generate: {}", report.pending);
    if report.unreadable > 0 {
        println!("Unreadable:  {}", report.unreadable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_summary_lines_hide_zero_rows() {
        let summary = RunSummary {
            files: 2,
            planned: 8,
            produced: 8,
            elapsed: Duration::from_secs(2),
            ..Default::default()
        };
        let lines = summary_lines(&summary);
        assert!(lines.iter().any(|l| l.contains("Produced:") && l.ends_with('8')));
        assert!(lines.iter().any(|l| l.contains("4.0 variants/sec")));
        assert!(!lines.iter().any(|l| l.contains("Failed:")));
        assert!(!lines.iter().any(|l| l.contains("Cached:")));
    }

    #[test]
    fn test_summary_lines_show_failures_and_cancellation() {
        let summary = RunSummary {
            planned: 6,
            produced: 2,
            failed: 1,
            cancelled: 3,
            ..Default::default()
        };
        let lines = summary_lines(&summary);
        assert!(lines.iter().any(|l| l.contains("Failed:") && l.ends_with('1')));
        assert!(lines.iter().any(|l| l.contains("Cancelled:") && l.ends_with('3')));
    }

    #[test]
    fn test_apply_args_overrides() {
        let mut config = Config::default();
        config.upload.enabled = true;
        let args = OptimizeArgs {
            concurrency: Some(2),
            no_upload: true,
            ..Default::default()
        };
        apply_args(&mut config, &args).unwrap();
        assert_eq!(config.processing.concurrency, 2);
        assert!(!config.upload.enabled);
    }

    #[test]
    fn test_apply_args_rejects_zero_concurrency() {
        let mut config = Config::default();
        let args = OptimizeArgs {
            concurrency: Some(0),
            ..Default::default()
        };
        assert!(apply_args(&mut config, &args).is_err());
    }
}
