//! # CLI Module
//!
//! Command-line interface for the food-log cache.
//!
//! ## Usage
//! ```bash
//! # Fill the caches for one patient from a window export
//! foodlog-cache fill patient-123 --export window.json
//!
//! # Batch mode with the eligibility gate and precomputed summaries
//! foodlog-cache fill patient-123 --export window.json \
//!     --summaries summaries.json --check-eligibility
//!
//! # Inspect cache coverage for a set of food logs
//! foodlog-cache status F1 F2 F3
//!
//! # Cache statistics / full reset
//! foodlog-cache stats
//! foodlog-cache clear --yes
//! ```

mod export;

use food_log_cache::core::batch::{BatchFillOrchestrator, FillReport, FillWindow};
use food_log_cache::core::store::{CacheStatusProbe, ImageCacheStore, SummaryCacheStore};
use food_log_cache::error::Result;
use food_log_cache::events::{Event, EventChannel, FillEvent};
use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use export::{ExportSource, LocalFileDownloader, PrecomputedAnalyzer, WindowExport};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::thread;

/// Food-Log Cache - Never pay for the same download or analysis twice
#[derive(Parser, Debug)]
#[command(name = "foodlog-cache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Cache database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fill the image and summary caches for one patient
    Fill {
        /// Patient to fill for
        patient_id: String,

        /// Window export file (JSON snapshot of the patient's food logs)
        #[arg(short, long)]
        export: PathBuf,

        /// Precomputed summaries file (food-log id -> summary JSON)
        #[arg(short, long)]
        summaries: Option<PathBuf>,

        /// Window length in days, ending now
        #[arg(short, long, default_value = "30")]
        days: i64,

        /// Apply the active-patient eligibility gate before filling
        #[arg(long)]
        check_eligibility: bool,

        /// Directory downloaded image blobs land in
        #[arg(long)]
        image_dir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Report cache coverage for a set of food-log ids
    Status {
        /// Food-log ids to probe
        #[arg(required = true)]
        food_log_ids: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Show cache statistics
    Stats,

    /// Delete every cached image row and summary
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let db_path = cli.db.unwrap_or_else(|| {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("food-log-cache")
            .join("cache.db")
    });

    match cli.command {
        Commands::Fill {
            patient_id,
            export,
            summaries,
            days,
            check_eligibility,
            image_dir,
            output,
        } => run_fill(
            db_path,
            patient_id,
            export,
            summaries,
            days,
            check_eligibility,
            image_dir,
            output,
        ),
        Commands::Status {
            food_log_ids,
            output,
        } => run_status(db_path, food_log_ids, output),
        Commands::Stats => run_stats(db_path),
        Commands::Clear { yes } => run_clear(db_path, yes),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_fill(
    db_path: PathBuf,
    patient_id: String,
    export_path: PathBuf,
    summaries_path: Option<PathBuf>,
    days: i64,
    check_eligibility: bool,
    image_dir: Option<PathBuf>,
    output: OutputFormat,
) -> Result<()> {
    let term = Term::stderr();

    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("Food-Log Cache").bold().cyan(),
            style("fill").dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let export = WindowExport::load(&export_path)?;
    let analyzer: Box<PrecomputedAnalyzer> = match summaries_path {
        Some(path) => Box::new(PrecomputedAnalyzer::load(&path)?),
        None => Box::new(PrecomputedAnalyzer::empty()),
    };

    let image_dir = image_dir.unwrap_or_else(|| {
        db_path
            .parent()
            .map(|p| p.join("food_log_images"))
            .unwrap_or_else(|| PathBuf::from("./food_log_images"))
    });

    let orchestrator = BatchFillOrchestrator::builder()
        .db_path(&db_path)
        .image_dir(image_dir)
        .source(Box::new(ExportSource::new(export)))
        .downloader(Box::new(LocalFileDownloader))
        .analyzer(analyzer)
        .build()?;

    let (sender, receiver) = EventChannel::new();

    // Progress bar for pretty output
    let progress = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        let mut processed = 0u64;
        for event in receiver.iter() {
            match event {
                Event::Fill(FillEvent::Started { total_entries, .. }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.set_length(total_entries as u64);
                        pb.set_message("filling");
                    }
                }
                Event::Fill(FillEvent::EntryProcessed { food_log_id, .. }) => {
                    processed += 1;
                    if let Some(ref pb) = progress_clone {
                        pb.set_position(processed);
                        pb.set_message(food_log_id);
                    }
                }
                Event::Fill(FillEvent::EntryFailed { food_log_id, .. }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.set_message(format!("{food_log_id} failed"));
                    }
                }
                Event::Fill(FillEvent::Completed { .. })
                | Event::Fill(FillEvent::EligibilitySkipped { .. }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.finish_and_clear();
                    }
                }
            }
        }
    });

    let window = FillWindow::trailing_days(days);
    let report =
        orchestrator.fill_for_patient_with_events(&patient_id, &window, check_eligibility, &sender);

    drop(sender);
    event_thread.join().ok();

    let report = report?;

    match output {
        OutputFormat::Pretty => print_pretty_report(&term, &report),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        ),
    }

    Ok(())
}

fn print_pretty_report(term: &Term, report: &FillReport) {
    term.write_line("").ok();

    if let Some(reason) = report.skipped {
        term.write_line(&format!(
            "{} Patient {} skipped: {}",
            style("⊘").yellow().bold(),
            style(&report.patient_id).cyan(),
            style(reason).yellow()
        ))
        .ok();
        return;
    }

    term.write_line(&format!("{} Fill Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} food logs in window ({:.1}s)",
        style(report.total_entries).cyan(),
        report.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} images downloaded, {} already cached",
        style(report.total_images).cyan(),
        style(report.cached_images).dim()
    ))
    .ok();
    term.write_line(&format!(
        "  {} summaries analyzed, {} already cached",
        style(report.total_summaries).cyan(),
        style(report.cached_summaries).dim()
    ))
    .ok();

    if report.fully_cached {
        term.write_line(&format!(
            "  {} window was already fully cached",
            style("✓").green()
        ))
        .ok();
    }

    if !report.errors.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!(
            "{}",
            style(format!("{} entries failed:", report.errors.len()))
                .red()
                .bold()
        ))
        .ok();
        for error in &report.errors {
            term.write_line(&format!("  {} {}", style("✗").red(), error))
                .ok();
        }
    }
}

fn run_status(db_path: PathBuf, food_log_ids: Vec<String>, output: OutputFormat) -> Result<()> {
    let probe = CacheStatusProbe::open(&db_path)?;
    let status = probe.check_status(&food_log_ids)?;

    match output {
        OutputFormat::Pretty => {
            let term = Term::stdout();
            term.write_line(&format!(
                "  {} of {} food logs have a cached image",
                style(status.cached_images).cyan(),
                status.total_food_logs
            ))
            .ok();
            term.write_line(&format!(
                "  {} of {} food logs have a cached summary",
                style(status.cached_summaries).cyan(),
                status.total_food_logs
            ))
            .ok();
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&status).unwrap_or_default()
        ),
    }

    Ok(())
}

fn run_stats(db_path: PathBuf) -> Result<()> {
    let stats = ImageCacheStore::open(&db_path)?.stats()?;

    let term = Term::stdout();
    term.write_line(&format!(
        "  {} cached images ({})",
        style(stats.image_count).cyan(),
        format_bytes(stats.total_image_bytes)
    ))
    .ok();
    term.write_line(&format!(
        "  {} cached summaries",
        style(stats.summary_count).cyan()
    ))
    .ok();
    term.write_line(&format!("  database: {}", style(db_path.display()).dim()))
        .ok();

    Ok(())
}

fn run_clear(db_path: PathBuf, yes: bool) -> Result<()> {
    let term = Term::stderr();

    if !yes {
        term.write_line(&format!(
            "{} This deletes every cached image row and summary. Re-run with --yes to confirm.",
            style("!").yellow().bold()
        ))
        .ok();
        return Ok(());
    }

    let store = SummaryCacheStore::open(&db_path)?;
    store.clear_all()?;

    term.write_line(&format!("{} Cache cleared", style("✓").green().bold()))
        .ok();
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
