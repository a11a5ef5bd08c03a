//! adsb-table: build a per-aircraft table from timestamped ADS-B frame logs.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use adsb_core::config::{self, Config};
use adsb_core::{AircraftTable, BatchDriver, BatchStats};

mod output;

#[derive(Parser)]
#[command(
    name = "adsb-table",
    version,
    about = "Fuse ADS-B frame logs into a per-aircraft Parquet table"
)]
struct Cli {
    /// More logging (-v debug, -vv trace). RUST_LOG overrides this.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode `<timestamp> <hex>` files and write the aircraft table
    Run {
        /// Input files or directories (`-` reads stdin)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output Parquet file [default: from config, else adsb_data.parquet]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum seconds between even and odd CPR frames
        #[arg(long, env = "ADSB_PAIR_WINDOW")]
        pair_window: Option<f64>,

        /// File name filter for directory inputs, e.g. "?????"
        #[arg(long)]
        pattern: Option<String>,

        /// Print rows as JSON lines instead of writing Parquet
        #[arg(long)]
        json: bool,

        /// Print a per-aircraft summary table
        #[arg(long)]
        summary: bool,
    },

    /// Manage ~/.adsb-table/config.yaml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            inputs,
            output,
            pair_window,
            pattern,
            json,
            summary,
        } => cmd_run(RunArgs {
            inputs,
            output,
            pair_window,
            pattern,
            json,
            summary,
        }),
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => cmd_config_init(force),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Logs go to stderr so stdout stays clean for `--json`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

struct RunArgs {
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    pair_window: Option<f64>,
    pattern: Option<String>,
    json: bool,
    summary: bool,
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let config = config::load_config();

    let pair_window = args.pair_window.unwrap_or(config.fusion.pair_window);
    anyhow::ensure!(
        pair_window > 0.0,
        "pair window must be positive, got {pair_window}"
    );
    let pattern = args.pattern.or(config.input.pattern);

    let mut driver = BatchDriver::with_window(pair_window);

    if reads_stdin(&args.inputs)? {
        info!(pair_window, "reading frames from stdin");
        driver
            .process_reader(io::stdin().lock())
            .context("reading stdin")?;
    } else {
        driver.process_inputs(&args.inputs, pattern.as_deref())?;
    }

    if args.json {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for row in driver.rows() {
            writeln!(out, "{}", serde_json::to_string(row)?)?;
        }
    }

    let (table, stats) = driver.finish();

    if !args.json {
        let path = args
            .output
            .unwrap_or_else(|| PathBuf::from(&config.output.path));
        output::write_parquet(&table, &path, config.output.compression)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {} rows to {}", table.len(), path.display());
    }

    let stats_table = stats_table(&stats);
    if args.json {
        eprintln!("{stats_table}");
    } else {
        println!();
        println!("{stats_table}");
    }

    if args.summary {
        let summary = summary_table(&table);
        if args.json {
            eprintln!("{summary}");
        } else {
            println!();
            println!("{summary}");
        }
    }

    Ok(())
}

/// `-` selects stdin and must be the only input.
fn reads_stdin(inputs: &[PathBuf]) -> Result<bool> {
    let is_stdin = |p: &PathBuf| p.as_path() == Path::new("-");
    match inputs {
        [only] if is_stdin(only) => Ok(true),
        _ if inputs.iter().any(is_stdin) => {
            anyhow::bail!("`-` (stdin) cannot be combined with other inputs")
        }
        _ => Ok(false),
    }
}

fn cmd_config_init(force: bool) -> Result<()> {
    let path = config::config_file();
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    let path = config::save_config(&Config::default())?;
    println!("Config written to {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let path = config::config_file();
    if path.exists() {
        println!("# {}", path.display());
    } else {
        println!("# {} (not found, showing defaults)", path.display());
    }
    print!("{}", config::serialize_config(&config::load_config()));
    Ok(())
}

fn stats_table(stats: &BatchStats) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Counter", "Value"]);

    let rows: [(&str, u64); 19] = [
        ("Sources", stats.sources),
        ("Lines read", stats.lines_read),
        ("Blank lines", stats.blank_lines),
        ("Recovered timestamps", stats.recovered_timestamps),
        ("Skipped: bad timestamp", stats.skipped.bad_timestamp),
        ("Skipped: bad hex", stats.skipped.bad_hex),
        ("Skipped: malformed", stats.skipped.malformed),
        ("Frames", stats.frames),
        ("Identification", stats.identification),
        ("Airborne position", stats.airborne_position),
        ("Airborne velocity", stats.airborne_velocity),
        ("Unhandled", stats.unhandled),
        ("Fusion attempts", stats.fusion_attempts),
        ("Stale pairs", stats.stale_pairs),
        ("Ambiguous pairs", stats.ambiguous_pairs),
        ("Velocity misses", stats.velocity_misses),
        ("Callsign misses", stats.callsign_misses),
        ("Rows emitted", stats.rows_emitted),
        ("Aircraft", stats.aircraft),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    table
}

/// Latest emitted row per aircraft, busiest first.
fn summary_table(rows: &AircraftTable) -> Table {
    // aircraft -> (row count, index of latest row)
    let mut latest: HashMap<&str, (usize, usize)> = HashMap::new();
    for (i, ac) in rows.aircraft.iter().enumerate() {
        let entry = latest.entry(ac.as_str()).or_insert((0, i));
        entry.0 += 1;
        entry.1 = i;
    }

    let mut sorted: Vec<_> = latest.into_iter().collect();
    sorted.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.0.cmp(b.0)));

    let mut table = Table::new();
    table.set_header(vec![
        "ICAO", "Callsign", "Alt (km)", "GS (kts)", "AS (kts)", "Hdg", "VRate", "Lat", "Lon",
        "Rows",
    ]);

    let num = |v: Option<f64>, prec: usize| {
        v.map(|x| format!("{x:.prec$}"))
            .unwrap_or_else(|| "-".into())
    };

    for (icao, (count, i)) in sorted {
        table.add_row(vec![
            Cell::new(icao),
            Cell::new(rows.callsign[i].as_deref().unwrap_or("-")),
            Cell::new(num(rows.altitude[i], 3)),
            Cell::new(num(rows.ground_speed[i], 0)),
            Cell::new(num(rows.air_speed[i], 0)),
            Cell::new(num(rows.heading[i], 1)),
            Cell::new(
                rows.vertical_rate[i]
                    .map(|v| format!("{v:+}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(num(rows.latitude[i], 4)),
            Cell::new(num(rows.longitude[i], 4)),
            Cell::new(count),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::try_parse_from([
            "adsb-table",
            "-vv",
            "run",
            "a",
            "b",
            "-o",
            "x.parquet",
            "--pair-window",
            "2.5",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run {
                inputs,
                output,
                pair_window,
                json,
                summary,
                ..
            } => {
                assert_eq!(inputs, vec![PathBuf::from("a"), PathBuf::from("b")]);
                assert_eq!(output, Some(PathBuf::from("x.parquet")));
                assert_eq!(pair_window, Some(2.5));
                assert!(json);
                assert!(!summary);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_input() {
        assert!(Cli::try_parse_from(["adsb-table", "run"]).is_err());
    }

    #[test]
    fn test_stdin_must_be_only_input() {
        let paths = |names: &[&str]| names.iter().map(PathBuf::from).collect::<Vec<_>>();
        assert!(reads_stdin(&paths(&["-"])).unwrap());
        assert!(!reads_stdin(&paths(&["a", "b"])).unwrap());

        let err = reads_stdin(&paths(&["-", "a"])).unwrap_err();
        assert!(err.to_string().contains("stdin"));
        assert!(reads_stdin(&paths(&["a", "-"])).is_err());
    }

    #[test]
    fn test_summary_uses_latest_row() {
        let rows = AircraftTable {
            timestamp: vec![1.0, 2.0, 3.0],
            aircraft: vec!["aaaaaa".into(), "bbbbbb".into(), "aaaaaa".into()],
            callsign: vec![None, None, Some("TEST".into())],
            longitude: vec![Some(1.0); 3],
            latitude: vec![Some(2.0); 3],
            altitude: vec![None; 3],
            ground_speed: vec![None; 3],
            air_speed: vec![None; 3],
            heading: vec![None; 3],
            vertical_rate: vec![None, None, Some(-64.0)],
        };
        let rendered = summary_table(&rows).to_string();
        assert!(rendered.contains("TEST"));
        assert!(rendered.contains("-64"));
        assert!(rendered.find("aaaaaa").unwrap() < rendered.find("bbbbbb").unwrap());
    }

    #[test]
    fn test_stats_table_lists_counters() {
        let stats = BatchStats {
            rows_emitted: 42,
            ..Default::default()
        };
        let rendered = stats_table(&stats).to_string();
        assert!(rendered.contains("Rows emitted"));
        assert!(rendered.contains("42"));
    }
}
