//! `zonetab` — compile timezonedb.com CSV tables into an embeddable artifact.
//!
//! ```text
//! zonetab --zones csv/zone.csv --transitions csv/timezone.csv \
//!         --mode default --format rust --output src/zones.rs
//! ```
//!
//! Logs go to stderr (filter with `ZONETAB_LOG`); the artifact goes to
//! `--output`, or to stdout when no output path is given. Nothing is
//! written unless the whole compilation succeeds.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::info;
use zonetab::{
    compile, load_transitions, load_zones, render, write_artifact, ArtifactFormat,
    CompileOptions, HistoryMode, TimeScale,
};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "zonetab", version)]
#[command(about = "Compile timezonedb CSV tables into embeddable zone and rule tables")]
struct Args {
    /// Zone table (zone_id,country_code,zone_name)
    #[arg(long, value_name = "PATH")]
    zones: PathBuf,

    /// Transition table (zone_id,abbreviation,time_start,gmt_offset,dst)
    #[arg(long, value_name = "PATH")]
    transitions: PathBuf,

    /// History retention: all, default (since the epoch) or current (last 365 days)
    #[arg(short, long, default_value_t = HistoryMode::Default)]
    mode: HistoryMode,

    /// Tick unit for rule start times: seconds, millis, micros or nanos
    #[arg(short, long, default_value_t = TimeScale::Seconds)]
    scale: TimeScale,

    /// Artifact format: rust, json or binary
    #[arg(short, long, default_value_t = ArtifactFormat::Rust)]
    format: ArtifactFormat,

    /// Artifact path; stdout when omitted
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// "Now" anchor in Unix seconds for --mode current; defaults to the system clock
    #[arg(long, value_name = "UNIX_SECONDS", allow_hyphen_values = true)]
    now: Option<i64>,

    /// Print zone, abbreviation and rule counts to stderr
    #[arg(long)]
    summary: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_tracing(args.verbose);

    let now = args.now.unwrap_or_else(|| Utc::now().timestamp());
    info!(mode = %args.mode, scale = %args.scale, format = %args.format, now, "starting compilation");

    let zones = load_zones(&args.zones)
        .with_context(|| format!("reading zone table {}", args.zones.display()))?;
    let transitions = load_transitions(&args.transitions)
        .with_context(|| format!("reading transition table {}", args.transitions.display()))?;
    info!(zones = zones.len(), transitions = transitions.len(), "loaded source tables");

    let options = CompileOptions::new(now)
        .with_mode(args.mode)
        .with_scale(args.scale);
    let db = compile(zones, transitions, options).context("compiling timezone database")?;
    let bytes = render(&db, args.format).context("rendering artifact")?;

    match &args.output {
        Some(path) => {
            write_artifact(path, &bytes)
                .with_context(|| format!("writing artifact {}", path.display()))?;
            info!(path = %path.display(), "artifact written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes).context("writing artifact to stdout")?;
            stdout.flush()?;
        }
    }

    if args.summary {
        eprintln!("{}", db.summary());
    }

    Ok(())
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("ZONETAB_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("zonetab=debug")
        } else {
            EnvFilter::new("zonetab=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
