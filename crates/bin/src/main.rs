//! macropanel CLI binary.
//!
//! Downloads the raw series, builds the monthly panel and writes it with its
//! event calendar and run summary.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use macropanel::data::{CsvDirectorySource, Downloader, FredClient, YahooQuoteProvider};
use macropanel::output::{ExportFormat, Exporter, annotate, default_events, preview};
use macropanel::panel::SeriesRole;
use macropanel::{DEFAULT_SETTINGS_FILE, Pipeline, Settings};
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "macropanel")]
#[command(about = "Monthly macro-financial panel builder", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file
    #[arg(long, short, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    /// Verbose logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download raw series from Yahoo Finance and FRED
    Download {
        /// Only these series keys
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        /// First date to request (defaults to the panel start)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last date to request (defaults to the panel end)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Build the monthly panel from the raw tables
    Build {
        /// Rows shown from each end of the panel
        #[arg(long, default_value = "5")]
        preview: usize,

        /// Build and report without writing files
        #[arg(long)]
        dry_run: bool,

        /// Output format (json or text)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// List the configured series
    Series,

    /// List the policy events
    Events {
        /// Print as CSV
        #[arg(long)]
        csv: bool,
    },

    /// Write the default settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!(error = %e, "could not read .env");
        }
    }

    if let Commands::Init { force } = cli.command {
        return write_default_settings(&cli.config, force);
    }

    let settings = Settings::load(&cli.config)?;
    match cli.command {
        Commands::Download { only, start, end } => download(&settings, &only, start, end).await?,
        Commands::Build {
            preview,
            dry_run,
            format,
        } => build(settings, preview, dry_run, &format)?,
        Commands::Series => list_series(&settings),
        Commands::Events { csv } => list_events(&settings, csv)?,
        Commands::Init { .. } => {}
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: logging already initialized");
    }
}

fn write_default_settings(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!("{} exists, use --force to overwrite", path.display()).into());
    }
    std::fs::write(path, Settings::default().to_toml()?)?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn download(
    settings: &Settings,
    only: &[String],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = start.unwrap_or(settings.panel.date_range.start);
    let end = end.unwrap_or(settings.panel.date_range.end);
    let descriptors: Vec<_> = settings
        .panel
        .series
        .iter()
        .filter(|d| only.is_empty() || only.contains(&d.key))
        .cloned()
        .collect();
    if descriptors.is_empty() {
        return Err(format!("no configured series match {}", only.join(", ")).into());
    }

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║{:^62}║", "DOWNLOADING RAW SERIES");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
    println!("Period: {} to {}", start, end);
    println!("Target: {}\n", settings.paths.raw_dir.display());

    let delay = Duration::from_millis(settings.download.rate_limit_ms);
    let mut downloader = Downloader::new(&settings.paths.raw_dir, start, end)
        .with_yahoo(YahooQuoteProvider::with_rate_limit(delay)?)
        .with_progress(true);
    match FredClient::from_env(&settings.download.fred_api_key_env) {
        Ok(client) => downloader = downloader.with_fred(client.with_rate_limit(delay)),
        Err(e) => println!("FRED series will be skipped: {}\n", e),
    }

    let report = downloader.run(&descriptors).await;
    println!("\n{}", report);
    if report.succeeded() == 0 {
        return Err("no series could be downloaded".into());
    }
    Ok(())
}

fn build(
    settings: Settings,
    rows: usize,
    dry_run: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    let source = CsvDirectorySource::new(&settings.paths.raw_dir, &settings.paths.external_dir);
    let pipeline = Pipeline::new(settings);

    let built = pipeline.build(&source)?;
    if format == "text" {
        println!("\nLoaded series:");
        print!("{}", built.load);
    }

    if dry_run {
        if format == "json" {
            println!("{}", built.missing.export_to_string(ExportFormat::PrettyJson)?);
        } else {
            println!("\n{}", built.missing);
            println!("\n{}", preview(&built.panel, rows));
        }
        return Ok(());
    }

    let summary = pipeline.persist(&built, started)?;
    match format {
        "json" => println!("{}", summary.export_to_string(ExportFormat::PrettyJson)?),
        _ => {
            println!("{}", summary.to_ascii_table());
            println!("\n{}", preview(&built.panel, rows));
        }
    }
    Ok(())
}

fn list_series(settings: &Settings) {
    let panel = &settings.panel;
    println!(
        "\n{:<14} {:<14} {:<10} {:<12} {:<16} {:<6} {}",
        "Key", "Column", "Role", "Provider", "Code", "Agg", "File"
    );
    println!("{}", "-".repeat(98));
    for desc in &panel.series {
        let code: String = desc.source.code().chars().take(16).collect();
        println!(
            "{:<14} {:<14} {:<10} {:<12} {:<16} {:<6} {}",
            desc.key,
            desc.column,
            desc.role.to_string(),
            desc.source.provider(),
            code,
            desc.aggregation.to_string(),
            desc.file
        );
    }
    println!("\nJoin order: {}", panel.join_order.join(" -> "));
    let quarterly: Vec<&str> = panel
        .series_with_role(SeriesRole::Quarterly)
        .map(|d| d.key.as_str())
        .collect();
    if !quarterly.is_empty() {
        println!("Interpolated: {}", quarterly.join(", "));
    }
    println!(
        "Range: {} to {}",
        panel.date_range.start, panel.date_range.end
    );
    println!("\nDerivations:");
    for rule in &panel.derivations {
        println!("  {}", rule);
    }
}

fn list_events(settings: &Settings, csv: bool) -> Result<(), Box<dyn std::error::Error>> {
    let events = if settings.events.is_empty() {
        default_events()
    } else {
        settings.events.clone()
    };
    let annotations = annotate(&[], &events);
    if csv {
        print!("{}", annotations.export_to_string(ExportFormat::Csv)?);
        return Ok(());
    }
    println!("\n{:<22} {:<12} {:<26} {:<8} {}", "Event", "Date", "Category", "Color", "Label");
    println!("{}", "-".repeat(76));
    for a in &annotations {
        println!(
            "{:<22} {:<12} {:<26} {:<8} {}",
            a.name,
            a.date.to_string(),
            a.category.to_string(),
            a.color,
            if a.headline { "✓" } else { "" }
        );
    }
    Ok(())
}
