//! The `glimpse scan` command.

use clap::{Args, ValueEnum};
use glimpse_core::config::RemoteClassifierConfig;
use glimpse_core::{
    classify, Config, Glimpse, GlimpseError, ImageRecord, OutputFormat as CoreOutputFormat,
    PipelineError, PipelineReport, Progress, RecordWriter,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Supported output formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// One JSON array
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl From<OutputFormat> for CoreOutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => CoreOutputFormat::Json,
            OutputFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}

/// Arguments for the `scan` command.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(required = true)]
    pub dir: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Number of parallel workers (default: CPU count minus two)
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Images handed to the worker pool at once
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: Option<u64>,

    /// Thumbnail width in pixels (must not exceed thumbnail.max_source_dimension)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_width: Option<u32>,

    /// Remote classifier endpoint (overrides the config file)
    #[arg(long, env = "GLIMPSE_CLASSIFIER_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Print only the summary, no records
    #[arg(long)]
    pub summary_only: bool,
}

/// Execute the scan command.
pub async fn execute(args: ScanArgs, mut config: Config) -> anyhow::Result<()> {
    apply_overrides(&args, &mut config);
    config.validate()?;

    let classifiers = classify::factory_from_config(&config.classifier)?;
    let glimpse = Glimpse::open(config, Arc::from(classifiers))?;

    let progress = create_progress_bar()?;
    let on_progress = |p: Progress| {
        progress.set_length(p.total as u64);
        progress.set_position(p.processed as u64);
        progress.set_message(format!("batch {}/{}", p.batch, p.batches));
    };

    let start = Instant::now();
    let result = glimpse.scan(&args.dir, Some(&on_progress)).await;
    progress.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(GlimpseError::Pipeline(PipelineError::Persist { records, source })) => {
            // Don't lose the work: emit what was computed, then fail.
            if !args.summary_only {
                write_records(&args, &records)?;
            }
            anyhow::bail!("Scan finished but results could not be saved: {source}");
        }
        Err(e) => return Err(e.into()),
    };

    if !args.summary_only {
        write_records(&args, &report.records)?;
    }
    print_summary(&report, start.elapsed());
    Ok(())
}

fn apply_overrides(args: &ScanArgs, config: &mut Config) {
    if let Some(parallel) = args.parallel {
        config.workers.parallel_workers = parallel;
    }
    if let Some(batch_size) = args.batch_size {
        config.pipeline.batch_size = batch_size as usize;
    }
    if let Some(max_width) = args.max_width {
        config.thumbnail.max_width = max_width;
    }
    if let Some(endpoint) = &args.endpoint {
        let remote = config
            .classifier
            .remote
            .get_or_insert_with(RemoteClassifierConfig::default);
        remote.endpoint = endpoint.clone();
    }
}

fn write_records(args: &ScanArgs, records: &[ImageRecord]) -> anyhow::Result<()> {
    match &args.output {
        Some(path) => {
            let file = BufWriter::new(File::create(path)?);
            let count = RecordWriter::new(file, args.format.into(), false).write_records(records)?;
            tracing::info!("Wrote {count} record(s) to {:?}", path);
        }
        None => {
            let stdout = std::io::stdout().lock();
            RecordWriter::new(stdout, args.format.into(), true).write_records(records)?;
        }
    }
    Ok(())
}

/// Create the progress bar driven by pipeline progress reports.
fn create_progress_bar() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )?
            .progress_chars("##-"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("scanning...");
    Ok(pb)
}

/// Print a formatted summary table to stderr.
fn print_summary(report: &PipelineReport, elapsed: Duration) {
    let classified = report.records.len() - report.unclassified;
    let rate = if elapsed.as_secs_f64() > 0.0 {
        report.processed as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Images:       {:>8}", report.records.len());
    eprintln!("    Reused:       {:>8}", report.reused);
    eprintln!("    Processed:    {:>8}", report.processed);
    eprintln!("    Classified:   {:>8}", classified);
    if report.unclassified > 0 {
        eprintln!("    Unclassified: {:>8}", report.unclassified);
    }
    if !report.failed_paths.is_empty() {
        eprintln!("    Failed:       {:>8}", report.failed_paths.len());
    }
    if !report.missing.is_empty() {
        eprintln!("    Missing:      {:>8}", report.missing.len());
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Session:      {:>8}", report.session.0);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("  ====================================");
}
