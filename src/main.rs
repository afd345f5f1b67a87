use chrono::Local;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rentalgap::analyzer::Analysis;
use rentalgap::config::{DEFAULT_BUFFER_MAX, DEFAULT_BUFFER_STEP};
use rentalgap::ingest::{self, RawRow};
use rentalgap::report::{self, AnalysisReport};
use rentalgap::{AnalysisConfig, AnalysisError, Analyzer, BufferSweep, ImpactAssumptions, RentalBatch, Scope};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rentalgap")]
#[command(author, version, about = "Measure how late returns collide with the next rental and size a minimum buffer")]
struct Args {
    /// Rental table (.csv, .json) or a directory of them
    path: PathBuf,

    /// TOML config file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output report file (.html, .json, anything else is CSV)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for auto-generated reports
    #[arg(long, default_value = "rentalgap-reports")]
    report_dir: PathBuf,

    /// Don't auto-generate a report
    #[arg(long)]
    no_report: bool,

    /// Don't prompt to open the report
    #[arg(long)]
    no_open: bool,

    /// Also write the dashboard tables (CSV) into this directory
    #[arg(long)]
    tables_dir: Option<PathBuf>,

    /// Number of parallel workers (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Explicit buffer values to sweep, in minutes (e.g. 0,30,60)
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    buffers: Option<Vec<i64>>,

    /// Sweep step in minutes (default: 15)
    #[arg(long, allow_negative_numbers = true)]
    buffer_step: Option<i64>,

    /// Largest swept buffer in minutes (default: 180)
    #[arg(long, allow_negative_numbers = true)]
    buffer_max: Option<i64>,

    /// Buffer used for per-link flags and business impact (default: 60)
    #[arg(short = 'b', long, allow_negative_numbers = true)]
    selected_buffer: Option<i64>,

    /// Restrict to one checkin type: all, mobile, connect, paper
    #[arg(long)]
    scope: Option<Scope>,

    /// Cascade bucket edges on previous delay, in minutes (e.g. 100,500,1000)
    #[arg(long, value_delimiter = ',')]
    cascade_edges: Option<Vec<i64>>,

    /// Mean daily rental price; enables the business impact estimate
    #[arg(long)]
    daily_price: Option<f64>,

    /// Mean rental duration in days (default: 1.5)
    #[arg(long)]
    rental_days: Option<f64>,

    /// Share of masked rentals counted as lost revenue (default: 0.6)
    #[arg(long)]
    loss_rate: Option<f64>,

    /// Show detailed output and info logs
    #[arg(short, long)]
    verbose: bool,

    /// Only show summary
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();

    // RUST_LOG wins; otherwise warnings only, info with -v
    let default_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("\x1b[31mError:\x1b[0m {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> rentalgap::Result<()> {
    // Set up thread pool
    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok();
    }

    let config = build_config(args)?;
    config.validate()?;

    let files = ingest::discover(&args.path)?;

    if !args.quiet {
        eprintln!("\x1b[1mRentalgap - Delay & Buffer Analysis\x1b[0m");
        eprintln!("{}", "─".repeat(70));
        eprintln!("Found {} rental table(s)\n", files.len());
    }

    let batch = load_batch(&files, args.quiet)?;
    let analysis = Analyzer::with_config(config).analyze(&batch.rentals)?;

    if !args.quiet {
        print_ingestion(&batch);
        print_lateness(&analysis);
        print_sweep(&analysis);
        print_cascade(&analysis);
        if args.verbose {
            print_overview(&analysis);
        }
    }
    print_verdict(&analysis);

    let report = AnalysisReport::new(batch.summary, analysis);

    if let Some(ref dir) = args.tables_dir {
        let written = report::export_tables(dir, &report)?;
        if !args.quiet {
            eprintln!("\n\x1b[32mTables saved: {} ({} files)\x1b[0m", dir.display(), written.len());
        }
    }

    // Determine report path
    let report_path = if let Some(ref output) = args.output {
        Some(output.clone())
    } else if !args.no_report {
        std::fs::create_dir_all(&args.report_dir)
            .map_err(|e| AnalysisError::io(&args.report_dir, e))?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!("rentalgap_report_{}.html", timestamp);
        Some(args.report_dir.join(filename))
    } else {
        None
    };

    if let Some(ref output_path) = report_path {
        report::generate(output_path, &report)?;
        info!(path = %output_path.display(), "wrote report");
        if !args.quiet {
            eprintln!("\n\x1b[32mReport saved: {}\x1b[0m", output_path.display());
        }

        if !args.no_open && !args.quiet {
            eprint!("\nOpen report? [Y/n] ");
            io::stderr().flush().ok();

            let mut input = String::new();
            if io::stdin().read_line(&mut input).is_ok() {
                let input = input.trim().to_lowercase();
                if input.is_empty() || input == "y" || input == "yes" {
                    if let Err(e) = open::that(output_path) {
                        eprintln!("Failed to open report: {}", e);
                    }
                }
            }
        }
    }

    if !args.quiet {
        eprintln!("\n\x1b[90mAnalysis complete.\x1b[0m");
    }
    Ok(())
}

/// Config file (or defaults), then flag overrides.
fn build_config(args: &Args) -> rentalgap::Result<AnalysisConfig> {
    let mut config = match args.config {
        Some(ref path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };

    if let Some(ref buffers) = args.buffers {
        config.buffers = BufferSweep::new(buffers.iter().copied())?.values().to_vec();
    } else if args.buffer_step.is_some() || args.buffer_max.is_some() {
        let sweep = BufferSweep::stepped(
            args.buffer_step.unwrap_or(DEFAULT_BUFFER_STEP),
            args.buffer_max.unwrap_or(DEFAULT_BUFFER_MAX),
        )?;
        config.buffers = sweep.values().to_vec();
    }
    if let Some(b) = args.selected_buffer {
        config.selected_buffer = b;
    }
    if let Some(scope) = args.scope {
        config.scope = scope;
    }
    if let Some(ref edges) = args.cascade_edges {
        config.cascade_edges = edges.clone();
    }

    if let Some(price) = args.daily_price {
        let mut impact = config.impact.take().unwrap_or_else(|| ImpactAssumptions::new(price));
        impact.mean_daily_price = price;
        config.impact = Some(impact);
    }
    if let Some(ref mut impact) = config.impact {
        if let Some(days) = args.rental_days {
            impact.rental_days = days;
        }
        if let Some(rate) = args.loss_rate {
            impact.loss_rate = rate;
        }
    } else if args.rental_days.is_some() || args.loss_rate.is_some() {
        return Err(AnalysisError::config(
            "--rental-days / --loss-rate need --daily-price (or an [impact] section)",
        ));
    }

    Ok(config)
}

fn load_batch(files: &[PathBuf], quiet: bool) -> rentalgap::Result<RentalBatch> {
    let pb = if !quiet && files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    } else {
        None
    };

    let mut rows: Vec<RawRow> = Vec::new();
    for file in files {
        rows.extend(ingest::read_source(file)?);
        if let Some(ref pb) = pb {
            pb.inc(1);
            pb.set_message(file.display().to_string());
        }
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    Ok(RentalBatch::from_rows(&rows))
}

fn print_ingestion(batch: &RentalBatch) {
    let s = &batch.summary;
    eprintln!("\x1b[1mIngestion:\x1b[0m");
    eprintln!("  Rows read:   {}", s.rows_read);
    eprintln!("  Rentals:     {}", s.rentals);
    if s.excluded > 0 {
        eprintln!("  \x1b[33mExcluded:\x1b[0m    {}", s.excluded);
        for (reason, count) in &s.by_reason {
            eprintln!("    {:<28} {}", reason, count);
        }
    }
}

fn print_lateness(analysis: &Analysis) {
    let l = &analysis.lateness;
    eprintln!("\n\x1b[1mLateness ({} rentals, scope {}):\x1b[0m", l.total, analysis.config.scope);
    eprintln!(
        "  \x1b[32mEarly:\x1b[0m {}   On time: {}   \x1b[31mLate:\x1b[0m {}   \x1b[90mUnreported:\x1b[0m {} ({:.1}%)",
        l.early,
        l.on_time,
        l.late,
        l.unreported,
        l.unreported_rate * 100.0
    );
    if let Some(ref late) = l.late_stats {
        eprintln!(
            "  Late returns: median {:.0} min, Q3 {:.0} min, {} outlier(s) above {:.0} min",
            late.median, late.q3, late.outliers, late.upper_fence
        );
        eprintln!(
            "  Over 60 min: {:.1}% of late, {:.1}% of known",
            l.long_delay_share_of_late * 100.0,
            l.long_delay_share_of_known * 100.0
        );
    }
}

fn print_sweep(analysis: &Analysis) {
    let links = &analysis.link_summary;
    eprintln!(
        "\n\x1b[1mChains:\x1b[0m {} links over {} vehicle(s), {} evaluable, \x1b[31m{} conflict(s)\x1b[0m, {} overlapping schedule(s)",
        links.links, links.chained_vehicles, links.evaluable, links.conflicts, links.overlapping
    );

    eprintln!("\n\x1b[1mBuffer sweep:\x1b[0m");
    println!(
        "{:>8}  {:>8}  {:>8}  {:>9}  {:>9}  {:>8}  {:>10}",
        "BUFFER", "MASKED", "MASKED%", "REMAINING", "RESOLVED", "AVOIDED", "EFFICIENCY"
    );
    for p in &analysis.roi.points {
        let c = &p.overall;
        let marker = if p.buffer_minutes == analysis.selected.buffer_minutes {
            "\x1b[36m*\x1b[0m"
        } else {
            " "
        };
        println!(
            "{}{:>6}m  {:>8}  {:>7.1}%  {:>9}  {:>9}  {:>8}  {:>10}",
            marker,
            p.buffer_minutes,
            c.links_masked,
            c.masking_rate * 100.0,
            c.conflicts_remaining,
            c.conflicts_resolved,
            c.conflicts_avoided,
            c.resolution_efficiency
                .map(|e| format!("{:.2}", e))
                .unwrap_or_else(|| "-".to_string())
        );
    }
}

fn print_cascade(analysis: &Analysis) {
    eprintln!("\n\x1b[1mNext-rental cancellation by previous delay:\x1b[0m");
    for b in &analysis.cascade.buckets {
        let rate = b
            .cancellation_rate
            .map(|r| format!("{:.1}%", r * 100.0))
            .unwrap_or_else(|| "-".to_string());
        eprintln!("  {:<12} n={:<6} canceled={:<5} rate={}", b.label, b.links, b.next_canceled, rate);
    }
    let p = &analysis.propagation;
    if p.pairs > 0 {
        eprintln!(
            "  Next rental late after a known return: {:.1}% of {} pair(s)",
            p.next_late_share * 100.0,
            p.pairs
        );
    }
}

fn print_overview(analysis: &Analysis) {
    eprintln!("\n\x1b[1mCheckouts by checkin type:\x1b[0m");
    for b in &analysis.overview.checkout_by_checkin {
        let parts: Vec<String> = b
            .outcomes
            .iter()
            .map(|(outcome, share)| format!("{} {:.1}%", outcome, share.share * 100.0))
            .collect();
        eprintln!("  {:<8} {:>6} rentals  {}", b.checkin_type, b.rentals, parts.join("  "));
    }
}

fn print_verdict(analysis: &Analysis) {
    let s = &analysis.selected;
    let c = &s.overall;
    eprintln!("\n{}", "─".repeat(70));
    eprintln!("\x1b[1mAt {} min buffer:\x1b[0m", s.buffer_minutes);
    eprintln!("  \x1b[33m◐ Masked:\x1b[0m    {} link(s) ({:.1}%)", c.links_masked, c.masking_rate * 100.0);
    eprintln!(
        "  \x1b[32m✓ Resolved:\x1b[0m  {} of {} conflict(s)",
        c.conflicts_resolved, c.conflicts_without_buffer
    );
    eprintln!("  \x1b[31m✗ Remaining:\x1b[0m {}", c.conflicts_remaining);
    if let Some(ref impact) = analysis.impact {
        eprintln!(
            "  Revenue at risk: {:.0} of {:.0} ({:.1}%)",
            impact.lost_revenue,
            impact.baseline_revenue,
            impact.revenue_share_affected * 100.0
        );
    }
}
