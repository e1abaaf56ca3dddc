//! Statedash CLI - derive dashboard data from tidy state CSV files
//!
//! # Main Commands
//!
//! ```bash
//! statedash serve --static-dir web          # Start HTTP server (port 3000)
//! statedash correlate --year 2024           # Correlation matrix as JSON
//! statedash config                          # Print the effective manifest
//! ```
//!
//! # Data Commands
//!
//! ```bash
//! statedash parse data/PopulationDataClean.csv
//! statedash series -d population -s Utah,Ohio --from 2015
//! statedash aggregate
//! statedash change -d jobs -s Texas --baseline 2012
//! statedash compare
//! statedash snapshot -d median_income --year 2020 -s Utah
//! statedash bubble -x median_income -y housing_prices
//! ```

use clap::{Args, Parser, Subcommand};
use statedash::{
    bubble_view, comparison, correlation, heatmap_table, line_view, load_catalog, map_view, normalize,
    format_delimiter, parse_bytes, state_changes, ColumnMapping, DashboardConfig, DatasetCatalog, Selection, YearRange,
};
use std::fs;
use std::path::{Path, PathBuf};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "statedash")]
#[command(about = "Derive dashboard data from tidy US-state CSV files", long_about = None)]
struct Cli {
    /// Dataset manifest (JSON); STATEDASH_CONFIG or built-in defaults otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the manifest's data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Dataset and state selection
#[derive(Args)]
struct SelectionArgs {
    /// Metric name
    #[arg(short, long)]
    dataset: String,

    /// Comma-separated states (default: all)
    #[arg(short, long, value_delimiter = ',')]
    states: Vec<String>,
}

impl SelectionArgs {
    fn selection(&self) -> Selection {
        Selection::new(self.dataset.clone()).with_states(self.states.iter().map(|s| s.trim().to_string()))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output its raw records as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Per-state time series of one metric
    Series {
        #[command(flatten)]
        selection: SelectionArgs,

        /// First year (inclusive)
        #[arg(long)]
        from: Option<i32>,

        /// Last year (inclusive)
        #[arg(long)]
        to: Option<i32>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Yearly aggregate of every metric (heatmap table)
    Aggregate {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Per-state change from a baseline year
    Change {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Baseline year (default: from manifest)
        #[arg(short, long)]
        baseline: Option<i32>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Change from a baseline year of each metric's aggregate
    Compare {
        #[arg(short, long)]
        baseline: Option<i32>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Correlation matrix between all metrics
    Correlate {
        /// Only pair observations of this year
        #[arg(short, long)]
        year: Option<i32>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Map snapshot of one metric for one year
    Snapshot {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Snapshot year (default: comparison year from manifest)
        #[arg(short, long)]
        year: Option<i32>,

        /// Start year of the per-state change (default: baseline year)
        #[arg(long)]
        from: Option<i32>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Bubble chart points pairing two metrics
    Bubble {
        /// Metric on the x axis
        #[arg(short)]
        x: String,

        /// Metric on the y axis
        #[arg(short)]
        y: String,

        #[arg(long)]
        year: Option<i32>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective manifest
    Config,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Directory with the dashboard's HTML/JS, served as fallback
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult {
    let config = effective_config(cli.config.as_deref(), cli.data_dir)?;

    match cli.command {
        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, delimiter, output.as_deref()),

        Commands::Config => {
            println!("{}", config.to_json()?);
            Ok(())
        }

        Commands::Serve { port, static_dir } => {
            let catalog = load_catalog(&config)?;
            statedash::server::start_server(catalog, config, port, static_dir).await?;
            Ok(())
        }

        command => {
            let catalog = load_catalog(&config)?;
            cmd_view(&catalog, command)
        }
    }
}

fn effective_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<DashboardConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(p) => DashboardConfig::from_file(p)?,
        None => DashboardConfig::from_env()?,
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

fn cmd_parse(input: &Path, delimiter: Option<char>, output: Option<&Path>) -> CliResult {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let bytes = fs::read(input)?;
    let result = parse_bytes(&bytes, delimiter, &ColumnMapping::default())?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(result.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", result.headers.join(", "));
    for bad in &result.malformed {
        eprintln!("   ⚠️  line {}: {}", bad.line, bad.message);
    }

    let normalized = normalize(&result.records);
    eprintln!("✅ Parsed {} records", result.records.len());
    eprintln!("   {}", normalized.summary());
    for rejected in normalized.rejected.iter().take(5) {
        let line = result.lines.get(rejected.row).copied().unwrap_or_default();
        eprintln!("   ❌ line {}: {}", line, rejected.reason);
    }

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_view(catalog: &DatasetCatalog, command: Commands) -> CliResult {
    match command {
        Commands::Series {
            selection,
            from,
            to,
            output,
        } => {
            let series = line_view(catalog, &selection.selection(), YearRange::from_bounds(from, to)?)?;
            eprintln!("📈 {} series", series.len());
            write_json(&series, output.as_deref())
        }

        Commands::Aggregate { output } => {
            let table = heatmap_table(catalog);
            eprintln!("📊 {} aggregate rows", table.len());
            write_json(&table, output.as_deref())
        }

        Commands::Change {
            selection,
            baseline,
            output,
        } => {
            let result = state_changes(catalog, &selection.selection(), baseline)?;
            report_undefined(&result.undefined);
            write_json(&result, output.as_deref())
        }

        Commands::Compare { baseline, output } => {
            let result = comparison(catalog, baseline);
            report_undefined(&result.undefined);
            write_json(&result, output.as_deref())
        }

        Commands::Correlate { year, output } => {
            let matrix = correlation(catalog, year)?;
            for entry in matrix.entries.iter().filter(|e| e.metric_x < e.metric_y) {
                eprintln!("   {} × {}: {:.3}", entry.metric_x, entry.metric_y, entry.coefficient);
            }
            write_json(&matrix, output.as_deref())
        }

        Commands::Snapshot {
            selection,
            year,
            from,
            output,
        } => {
            let mut selection = selection.selection();
            selection.year = year;
            let view = map_view(catalog, &selection, from)?;
            for line in &view.descriptions {
                eprintln!("   {}", line);
            }
            write_json(&view, output.as_deref())
        }

        Commands::Bubble { x, y, year, output } => {
            let points = bubble_view(catalog, &x, &y, year)?;
            eprintln!("🫧 {} points", points.len());
            write_json(&points, output.as_deref())
        }

        Commands::Parse { .. } | Commands::Config | Commands::Serve { .. } => Ok(()),
    }
}

fn report_undefined(undefined: &[statedash::transform::UndefinedBaseline]) {
    for entry in undefined {
        eprintln!("   ⚠️  {}: {}", entry.entity, entry.reason);
    }
}

fn write_json<T: serde::Serialize>(value: &T, path: Option<&Path>) -> CliResult {
    let json = serde_json::to_string_pretty(value)?;
    write_output(&json, path)
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
