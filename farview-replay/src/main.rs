//! farview trace replay — entry point.
//!
//! ```text
//! farview-replay trace.json              Replay a recorded trace
//! farview-replay --json trace.json       Emit decision rows as JSON
//! farview-replay --synth 10 trace.json   Write a synthetic trace and exit
//! farview-replay --gen-config           Dump default config and exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use farview_replay::config::ReplayConfig;
use farview_replay::trace::{ReplayRow, load_trace, replay, synthetic_trace};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "farview-replay",
    about = "Replay recorded network traces through the stream quality pipeline"
)]
struct Cli {
    /// Trace file (JSON array of interval samples).
    trace: Option<PathBuf>,

    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "farview-replay.toml")]
    config: PathBuf,

    /// Emit decision rows as JSON instead of a table.
    #[arg(long)]
    json: bool,

    /// Write a synthetic degrade-and-recover trace of N ticks per phase
    /// to the trace path and exit.
    #[arg(long, value_name = "N")]
    synth: Option<usize>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ReplayConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = ReplayConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let trace_path = cli
        .trace
        .ok_or("missing trace path (see --help; use --synth N to create one)")?;

    if let Some(ticks) = cli.synth {
        let samples = synthetic_trace(ticks);
        let file = std::fs::File::create(&trace_path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &samples)?;
        info!(
            "wrote {} synthetic samples to {}",
            samples.len(),
            trace_path.display()
        );
        return Ok(());
    }

    let samples = load_trace(&trace_path)?;
    info!(
        "replaying {} samples from {}",
        samples.len(),
        trace_path.display()
    );

    let rows = replay(&config, &samples)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_table(&rows);
    }

    Ok(())
}

// ── Output ───────────────────────────────────────────────────────

fn print_table(rows: &[ReplayRow]) {
    println!(
        "{:>5}  {:>6}  {:>6}  {:<9}  {:>10}  {:<14}  flags",
        "tick", "score", "smooth", "level", "bitrate", "settings"
    );
    for row in rows {
        let flags = format!(
            "{}{}",
            if row.bitrate_changed { "B" } else { "" },
            if row.level_changed { "Q" } else { "" },
        );
        println!(
            "{:>5}  {:>6.3}  {:>6.3}  {:<9}  {:>7.1} Mb  {:<14}  {}",
            row.tick,
            row.quality_score,
            row.smoothed_score,
            row.level.to_string(),
            row.bitrate as f64 / 1e6,
            format!(
                "{}x{}@{}",
                row.settings.width, row.settings.height, row.settings.fps
            ),
            flags,
        );
    }

    let bitrate_changes = rows.iter().filter(|r| r.bitrate_changed).count();
    let level_changes = rows.iter().filter(|r| r.level_changed).count();
    println!(
        "\n{} ticks, {} bitrate changes, {} level transitions",
        rows.len(),
        bitrate_changes,
        level_changes
    );
}
