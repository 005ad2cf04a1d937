//! ragwatch - run deadlock detection over a graph description
//!
//! Usage:
//!   ragwatch graph.json
//!   ragwatch banker.json --matrices --mode multi
//!   ragwatch graph.json --pretty --no-trace
//!
//! Exit status: 0 safe, 2 deadlocked, 1 on error.

use anyhow::Context;
use clap::Parser;
use ragwatch_core::config::{DetectionMode, DetectorConfig};
use ragwatch_core::graph::{BankerMatrices, GraphDescription};
use ragwatch_core::{detect, logging};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ragwatch")]
#[command(about = "Deadlock detection over resource allocation graphs", long_about = None)]
#[command(version)]
struct Cli {
    /// Graph description (JSON)
    input: PathBuf,

    /// Input holds allocation/max/total matrices instead of edge lists
    #[arg(long)]
    matrices: bool,

    /// Detector: auto, single, multi
    #[arg(long)]
    mode: Option<DetectionMode>,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,

    /// Only record the final verdict event
    #[arg(long)]
    no_trace: bool,
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = DetectorConfig::from_env().context("loading configuration")?;
    logging::init(&config.logging)?;

    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if cli.no_trace {
        config.trace.capture = false;
    }

    let description = if cli.matrices {
        BankerMatrices::from_path(&cli.input)
            .and_then(|m| m.to_description())
            .with_context(|| format!("reading matrices from {}", cli.input.display()))?
    } else {
        GraphDescription::from_path(&cli.input)
            .with_context(|| format!("reading graph from {}", cli.input.display()))?
    };

    let graph = description.build().context("building graph")?;
    let report = detect(&graph, &config)?;

    let json = if cli.pretty {
        report.to_json_pretty()?
    } else {
        report.to_json()?
    };
    println!("{}", json);

    Ok(report.verdict.is_deadlocked())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(2),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
