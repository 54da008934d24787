//! copslam: closed-form pose-chain optimizer.
//!
//! Reads a g2o-style vertex/edge file, distributes every loop-closure
//! correction along its chain segment, and writes the optimized graph
//! back out. The heavy lifting lives in the `chain` crate; this binary
//! is argument handling, logging, and timing.

use anyhow::{Context, Result};
use chain::{Method, OptimizeConfig};
use clap::Parser;
use graph::{parse_graph, write_graph};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "copslam")]
#[command(about = "Closed-form pose-chain SLAM back-end")]
#[command(version)]
struct Args {
    /// Input graph file (g2o-style vertices and edges)
    input: PathBuf,

    /// Output file for the optimized graph
    output: PathBuf,

    /// Optimization method: one-pass (monolithic), two-pass
    /// (stratified), or no-scale (two-pass, scale drift untouched)
    #[arg(default_value = "two-pass")]
    method: String,

    /// Damping for distributed corrections; 1.0 applies each
    /// correction in full
    #[arg(long, default_value_t = 1.0)]
    global_normalizer: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let (method, ignore_scale) = match args.method.as_str() {
        "one-pass" => (Method::OnePass, false),
        "two-pass" => (Method::TwoPass, false),
        "no-scale" => (Method::TwoPass, true),
        other => {
            warn!(method = other, "Unknown method, using two-pass");
            (Method::TwoPass, false)
        }
    };

    info!(input = %args.input.display(), "Reading pose graph");
    let mut chain = parse_graph(&args.input)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;
    info!(
        space = ?chain.solution_space(),
        poses = chain.len(),
        closures = chain.closures().len(),
        "Parsed pose graph"
    );

    let config = OptimizeConfig {
        method,
        ignore_scale,
        global_normalizer: args.global_normalizer,
    };
    info!(?method, ignore_scale, "Starting optimization");
    let started = Instant::now();
    chain.optimize(&config);
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Optimization finished (file I/O not included)"
    );

    write_graph(&args.output, &chain)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(output = %args.output.display(), "Wrote optimized graph");

    Ok(())
}
