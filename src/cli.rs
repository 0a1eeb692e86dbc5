//! Command-line interface.
//!
//! - `paleo-recon run --config paleo.toml --method cps --out figures/`
//! - `paleo-recon fetch --original`
//! - `paleo-recon view --config paleo.toml`

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::RunConfig;
use crate::data::model::ReconMethod;

/// Reproduce proxy-based temperature reconstructions and their figures.
#[derive(Parser, Debug)]
#[command(name = "paleo-recon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconstruct, write tables and figures
    Run {
        /// TOML run configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Proxy network file (.parquet, .json, .csv or .nc)
        #[arg(short, long)]
        network: Option<PathBuf>,

        /// Instrumental temperature CSV
        #[arg(short, long)]
        target: Option<PathBuf>,

        /// Published reconstruction CSV to compare against
        #[arg(short, long)]
        reference: Option<PathBuf>,

        #[arg(short, long, value_enum)]
        method: Option<ReconMethod>,

        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Download the Mann et al. (2008) proxy network into the data home
    Fetch {
        /// Fetch the original (not infilled) network
        #[arg(long)]
        original: bool,

        /// Data directory; defaults to $PALEOCLIMATE_DATA or ~/paleoclimate_data
        #[arg(long)]
        data_home: Option<PathBuf>,

        /// Fail instead of downloading when the file is not cached
        #[arg(long)]
        no_download: bool,
    },

    /// Open the interactive proxy network viewer
    View {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

/// Configuration for `run`: the config file (if any) with flags on top.
pub fn run_config(
    config: Option<PathBuf>,
    network: Option<PathBuf>,
    target: Option<PathBuf>,
    reference: Option<PathBuf>,
    method: Option<ReconMethod>,
    out: Option<PathBuf>,
) -> Result<RunConfig> {
    let mut run = RunConfig::load_or_default(config.as_deref())?;
    if network.is_some() {
        run.data.network = network;
    }
    if target.is_some() {
        run.data.target = target;
    }
    if reference.is_some() {
        run.data.reference = reference;
    }
    if let Some(method) = method {
        run.reconstruction.method = method;
    }
    if let Some(out) = out {
        run.output.dir = out;
    }
    Ok(run)
}
