//! Benchmark command handlers

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use bsub_client::{JobLifecycle, WaitOptions};
use bsub_core::bench::{BenchDiff, BenchResult, BenchResultSet, diff, format_change};

use crate::bench::{BenchProgress, Harness, discover};
use crate::config::Config;

const RULE_WIDTH: usize = 80;

/// `bench` runs a benchmark; `bench diff` compares two stored runs
#[derive(Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct BenchCommands {
    #[command(subcommand)]
    command: Option<BenchSubcommand>,

    #[command(flatten)]
    run: BenchRunArgs,
}

#[derive(Subcommand)]
enum BenchSubcommand {
    /// Compare two benchmark result files
    Diff {
        /// Baseline result file
        baseline: PathBuf,
        /// Candidate result file
        candidate: PathBuf,
    },
}

#[derive(Args)]
struct BenchRunArgs {
    /// Job type to benchmark
    #[arg(long = "type", default_value = "pdf_extract")]
    job_type: String,

    /// Directory containing the input files
    #[arg(long, default_value = "tests/data")]
    dir: PathBuf,

    /// File name pattern (`*` and `?` wildcards)
    #[arg(long, default_value = "*.pdf")]
    pattern: String,

    /// Seconds between status checks
    #[arg(
        short = 't',
        long,
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval: u64,

    /// Give up waiting on a single job after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print the result set as JSON
    #[arg(long)]
    json: bool,

    /// Also write the result set as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Handle bench commands
pub async fn handle_bench_command(
    command: BenchCommands,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<()> {
    match command.command {
        Some(BenchSubcommand::Diff {
            baseline,
            candidate,
        }) => diff_files(&baseline, &candidate),
        None => run(command.run, config, cancel).await,
    }
}

async fn run(args: BenchRunArgs, config: &Config, cancel: &CancellationToken) -> Result<()> {
    let files = discover(&args.dir, &args.pattern)?;
    let lifecycle = JobLifecycle::new(config.job_client()?);
    let wait = WaitOptions {
        interval: Duration::from_secs(args.interval),
        timeout: args.timeout.map(Duration::from_secs),
    };
    let quiet = args.json;

    if !quiet {
        println!(
            "{}",
            format!(
                "Benchmarking {} file(s) with job type: {}",
                files.len(),
                args.job_type
            )
            .bold()
        );
        println!("{}", "=".repeat(RULE_WIDTH).dimmed());
    }

    let set = Harness::new(&lifecycle, wait, cancel)
        .run(&files, &args.job_type, |progress| {
            if !quiet {
                print_progress(progress);
            }
        })
        .await;

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&set)?;
        std::fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !quiet {
            println!("\n{} Results saved to {}", "✓".green(), path.display());
        }
    }

    if quiet {
        println!("{}", serde_json::to_string_pretty(&set)?);
    } else {
        print_summary(&set);
    }

    check_completed(&set, cancel)
}

/// A run cut short by an interrupt still fails once its partial results are out
fn check_completed(set: &BenchResultSet, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        bail!("Benchmark interrupted after {} file(s)", set.total_files());
    }
    Ok(())
}

fn print_progress(progress: &BenchProgress<'_>) {
    match progress {
        BenchProgress::Started { file, size } => {
            println!("\nProcessing: {} ({})", file.cyan(), format_bytes(*size));
        }
        BenchProgress::Submitted { job_id, submit_ms } => {
            println!("  Job ID:      {}", job_id.to_string().dimmed());
            println!("  Submit time: {}ms", submit_ms);
        }
        BenchProgress::Recorded(result) => {
            if result.status.is_success() {
                println!("  Status:      {}", result.status.as_str().green());
                println!("  Total time:  {}ms", result.total_ms);
            } else {
                println!("  Status:      {}", result.status.as_str().red());
                if let Some(error) = &result.error {
                    println!("  Error:       {}", error);
                }
            }
        }
    }
}

fn print_summary(set: &BenchResultSet) {
    println!("\n{}", "=".repeat(RULE_WIDTH).dimmed());
    println!("{}", "SUMMARY".bold());
    println!("{}", "=".repeat(RULE_WIDTH).dimmed());
    println!(
        "{:<30} {:>10} {:>10} {:>10}  {}",
        "File", "Size", "Submit", "Total", "Status"
    );
    println!("{}", "-".repeat(RULE_WIDTH).dimmed());

    for result in set.results() {
        print_result_row(result);
    }

    println!("{}", "-".repeat(RULE_WIDTH).dimmed());
    println!("Successful:  {}/{}", set.successful(), set.total_files());
    if set.total_files() > 0 {
        println!("Avg Submit:  {}ms", set.avg_submit_ms());
        println!("Avg Total:   {}ms", set.avg_total_ms());
        println!(
            "{}",
            format!("Avg Total (successful only): {}ms", set.avg_success_total_ms()).dimmed()
        );
    }
}

fn print_result_row(result: &BenchResult) {
    let file = truncate(&result.file, 30);
    let size = format_bytes(result.size);

    if result.status.is_success() {
        println!(
            "{:<30} {:>10} {:>8}ms {:>8}ms  {}",
            file,
            size,
            result.submit_ms,
            result.total_ms,
            result.status.as_str().green()
        );
    } else {
        let status = match &result.error {
            Some(error) => format!("{}: {}", result.status, error),
            None => result.status.to_string(),
        };
        println!(
            "{:<30} {:>10} {:>10} {:>10}  {}",
            file,
            size,
            "-",
            "-",
            status.red()
        );
    }
}

fn read_result_set(path: &Path) -> Result<BenchResultSet> {
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

fn diff_files(baseline: &Path, candidate: &Path) -> Result<()> {
    let baseline_set = read_result_set(baseline)?;
    let candidate_set = read_result_set(candidate)?;
    let report = diff(&baseline_set, &candidate_set);

    println!(
        "Comparing: {} vs {}",
        display_name(baseline).cyan(),
        display_name(candidate).cyan()
    );
    print_diff(&report);
    Ok(())
}

fn print_diff(report: &BenchDiff) {
    println!(
        "Job types: {} vs {}\n",
        report.baseline_job_type, report.candidate_job_type
    );
    println!(
        "{}",
        format!(
            "{:<40} {:>20} {:>20} {:>12}",
            "Filename", report.baseline_job_type, report.candidate_job_type, "Diff (%)"
        )
        .bold()
    );
    println!("{}", "-".repeat(95).dimmed());

    for row in &report.rows {
        print_diff_row(&row.label, row.baseline_ms, row.candidate_ms, row.change);
    }

    println!("{}", "-".repeat(95).dimmed());
    let summary = &report.summary;
    print_diff_row(
        &summary.label,
        summary.baseline_ms,
        summary.candidate_ms,
        summary.change,
    );
}

fn print_diff_row(label: &str, baseline_ms: u64, candidate_ms: Option<u64>, change: Option<f64>) {
    let candidate = candidate_ms
        .map(|ms| format!("{}ms", ms))
        .unwrap_or_else(|| "-".to_string());
    let change_str = format!("{:>12}", format_change(change));
    let change_colored = match change {
        Some(pct) if pct > 0.0 => change_str.red(),
        Some(pct) if pct < 0.0 => change_str.green(),
        _ => change_str.normal(),
    };

    println!(
        "{:<40} {:>20} {:>20} {}",
        label,
        format!("{}ms", baseline_ms),
        candidate,
        change_colored
    );
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Human-readable size using binary units
fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{}B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let suffix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1}{}B", bytes as f64 / div as f64, suffix)
}
