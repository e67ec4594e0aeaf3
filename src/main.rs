use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{info, warn};
use windcurve::discovery::{self, DiscoveryConfig};
use windcurve::export::{export_tables, ExportFormat};
use windcurve::run_stats::{write_run_stats, RunStats};
use windcurve::scheduler::{default_concurrency, MAX_CONCURRENCY};
use windcurve::{process_batch, FileInput, NumericPolicy, Scheduler, SchedulerConfig};

#[derive(Parser, Debug)]
#[command(name = "windcurve")]
#[command(about = "Power-curve aggregator for wind-turbine simulation output files")]
#[command(version)]
struct Args {
    /// Root directory to scan for simulation output files
    root_dir: PathBuf,

    /// Extension of the output files to process
    #[arg(long, default_value = "out")]
    extension: String,

    /// Files processed concurrently (default: CPU count, at most 16)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Read chunk size in bytes
    #[arg(long, default_value_t = 1 << 20)]
    chunk_size: usize,

    /// Header token that marks the header row
    #[arg(long, default_value = "Time")]
    marker_column: String,

    /// Lines scanned for the header row before a file is rejected
    #[arg(long, default_value_t = 1000)]
    header_search_lines: usize,

    /// Minimum interval between progress updates
    #[arg(long, default_value_t = 200)]
    progress_interval_ms: u32,

    /// Leave unparseable values out of the means instead of counting them as 0
    #[arg(long)]
    exclude_invalid_numbers: bool,

    /// Walk the directory tree with multiple threads
    #[arg(long)]
    parallel_discovery: bool,

    /// Directory for the exported tables (default: root_dir)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Export formats
    #[arg(long = "format", value_enum, default_values_t = [ExportFormat::Csv, ExportFormat::Txt])]
    formats: Vec<ExportFormat>,

    /// Suppress console progress bars
    #[arg(long)]
    no_progress: bool,

    /// Stats output file path
    #[arg(long, default_value = "run_stats.json")]
    stats_out: PathBuf,
}

impl Args {
    fn scheduler_config(&self) -> SchedulerConfig {
        let concurrency_limit = self
            .concurrency
            .map(|n| n.clamp(1, MAX_CONCURRENCY))
            .unwrap_or_else(default_concurrency);
        SchedulerConfig {
            concurrency_limit,
            chunk_size: self.chunk_size,
            marker_column: self.marker_column.clone(),
            progress_interval_ms: self.progress_interval_ms,
            header_search_lines: self.header_search_lines,
            numeric_policy: if self.exclude_invalid_numbers {
                NumericPolicy::Exclude
            } else {
                NumericPolicy::ZeroFill
            },
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // WHY: JSON logs go to stderr so stdout stays a readable run summary
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();
    let run_start = SystemTime::now();

    info!("Starting windcurve");
    info!(?args, "Parsed CLI arguments");

    if !args.root_dir.exists() {
        anyhow::bail!("Root directory does not exist: {}", args.root_dir.display());
    }
    if !args.root_dir.is_dir() {
        anyhow::bail!("Root path is not a directory: {}", args.root_dir.display());
    }

    // WHY: exports and the stats file default to root_dir; a rerun must not read them back in
    let mut discovery_config = DiscoveryConfig {
        extension: args.extension.clone(),
        ..Default::default()
    };
    if let Some(stats_name) = args.stats_out.file_name() {
        discovery_config
            .excluded_names
            .push(stats_name.to_string_lossy().into_owned());
    }
    info!("Starting file discovery in: {}", args.root_dir.display());
    let discovered = if args.parallel_discovery {
        discovery::collect_discovered_files_parallel(&args.root_dir, discovery_config).await?
    } else {
        discovery::collect_discovered_files(&args.root_dir, discovery_config).await?
    };

    let (valid, invalid): (Vec<_>, Vec<_>) = discovered.into_iter().partition(|f| f.error.is_none());
    for file in &invalid {
        if let Some(ref error) = file.error {
            warn!("Issue with {}: {}", file.path.display(), error);
        }
    }

    println!("windcurve v{} - File discovery complete", env!("CARGO_PKG_VERSION"));
    println!("Found {} files matching *.{}", valid.len() + invalid.len(), args.extension);

    if valid.is_empty() {
        anyhow::bail!("No *.{} files found under {}", args.extension, args.root_dir.display());
    }

    let inputs: Vec<FileInput> = valid.iter().map(|f| FileInput::from_path(&f.path)).collect();

    let mut scheduler = Scheduler::new(args.scheduler_config());
    let progress_bar = if args.no_progress {
        None
    } else {
        let bar = ProgressBar::new(inputs.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {wide_msg}")?,
        );
        let handle = bar.clone();
        scheduler = scheduler.with_progress(move |update| {
            handle.set_position(update.files_completed as u64);
            if let Some(name) = &update.currently_processing_name {
                handle.set_message(name.clone());
            }
        });
        Some(bar)
    };

    let token = scheduler.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight files");
            token.cancel();
        }
    });

    let output = process_batch(&scheduler, inputs).await?;
    if let Some(bar) = progress_bar {
        bar.finish_and_clear();
    }

    let output_dir = args.output_dir.clone().unwrap_or_else(|| args.root_dir.clone());
    let written = export_tables(&output_dir, &output.files, &output.groups, &args.formats)?;

    let stats = RunStats::from_report(&output.report, output.groups.len(), run_start);
    write_run_stats(&args.stats_out, &stats).await?;

    println!("Processing complete:");
    println!("  Summarized: {} files", stats.files_processed);
    if stats.files_failed > 0 {
        println!("  Failed: {} files", stats.files_failed);
        for failure in output.report.failures() {
            println!("    {}: {}", failure.file_name, failure.error.as_deref().unwrap_or("unknown error"));
        }
    }
    if output.report.cancelled {
        println!("  Cancelled: {} files not started", stats.files_not_started);
    }
    println!("  Power curve groups: {}", output.groups.len());
    for path in &written {
        println!("  Wrote {}", path.display());
    }
    println!("  Run stats: {}", args.stats_out.display());

    info!(
        "Run completed: {} summarized, {} failed, {} groups",
        stats.files_processed, stats.files_failed, stats.groups
    );
    Ok(())
}
