mod cache;
mod config;
mod energy;
mod error;
mod experiments;
mod report;
mod simulator;
mod trace;
mod writeback;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use config::SimConfig;
use experiments::run_sweep;
use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use trace::TraceFile;

/// Replays memory traces through a split L1 / K-way L2 / DRAM hierarchy and
/// reports hit counts, energy and average access time per L2 associativity.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Trace files (`<op> <hex-address>` per line); defaults to every
    /// `.din` file in --trace-dir
    traces: Vec<PathBuf>,

    /// Directory scanned for `.din` traces when none are given
    #[arg(long, default_value = "Spec_Benchmark")]
    trace_dir: PathBuf,

    /// TOML file overriding the built-in hierarchy parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// L2 associativities to sweep, e.g. `--assoc 2,4,8`
    #[arg(long = "assoc", value_delimiter = ',')]
    associativities: Vec<usize>,

    /// Trials per (trace, associativity) pair
    #[arg(long)]
    trials: Option<usize>,

    /// Seed for victim selection; trial `t` uses `seed + t`
    #[arg(long)]
    seed: Option<u64>,

    /// Use one L1 array for instructions and data
    #[arg(long)]
    unified_l1: bool,

    /// Do not queue write-backs of evicted lines
    #[arg(long)]
    no_write_back: bool,

    /// Append the report to this file instead of printing it
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only print per-configuration averages
    #[arg(long)]
    summary_only: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            _ => "trace",
        }
    }

    fn sim_config(&self) -> Result<SimConfig> {
        let mut cfg = match &self.config {
            Some(path) => SimConfig::load(path)
                .with_context(|| format!("Unable to load config {}", path.display()))?,
            None => SimConfig::default(),
        };
        if !self.associativities.is_empty() {
            cfg.associativities = self.associativities.clone();
        }
        if let Some(trials) = self.trials {
            cfg.trials = trials;
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if self.unified_l1 {
            cfg.split_l1 = false;
        }
        if self.no_write_back {
            cfg.write_back = false;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level()))
        .init();
    run_experiments(&args)
}

fn run_experiments(args: &Args) -> Result<()> {
    let config = args.sim_config()?;
    if args.print_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }
    let trace_paths = if args.traces.is_empty() {
        default_trace_paths(&args.trace_dir)?
    } else {
        args.traces.clone()
    };
    if trace_paths.is_empty() {
        bail!("No trace files given and none found in {}", args.trace_dir.display());
    }
    let traces = load_traces(&trace_paths)?;

    log::info!(
        "Loaded {} trace files; L1 {} ({} B line), L2 {} KiB, DRAM {} GiB",
        traces.len(),
        if config.split_l1 { "split" } else { "unified" },
        config.line_size,
        config.l2_size / 1024,
        config.dram_size >> 30
    );

    let results = run_sweep(&traces, &config)?;

    match &args.output {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Unable to open report file {}", path.display()))?;
            let mut out = BufWriter::new(file);
            report::write_report(&mut out, &results, args.summary_only)
                .and_then(|()| out.flush())
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            log::info!("Report appended to {}", path.display());
        }
        None => {
            let mut out = io::stdout().lock();
            report::write_report(&mut out, &results, args.summary_only)
                .context("Failed to write report")?;
        }
    }

    println!("\n== Summary ==");
    for scenario in &results {
        println!("  {scenario}");
    }
    Ok(())
}

fn load_traces(paths: &[PathBuf]) -> Result<Vec<TraceFile>> {
    paths
        .iter()
        .map(|path| {
            TraceFile::load(path)
                .with_context(|| format!("Unable to load trace file {}", path.display()))
        })
        .collect()
}

fn default_trace_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("Unable to read trace dir {}", dir.display()))?
        .filter_map(|entry| {
            entry.ok().and_then(|e| {
                let path = e.path();
                (path.extension().and_then(|ext| ext.to_str()) == Some("din")).then_some(path)
            })
        })
        .collect();
    entries.sort();
    Ok(entries)
}
