//! Writes a synthetic proxy network with its instrumental target and the
//! true temperature it was drawn from, for trying out `paleo-recon run`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use paleo_recon::data::loader::{write_network_parquet, write_temperature};
use paleo_recon::data::synthetic::{SyntheticConfig, generate};

#[derive(Parser, Debug)]
#[command(about = "Generate a synthetic proxy network")]
struct Args {
    /// Output directory
    #[arg(default_value = "sample_data")]
    out: PathBuf,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 24)]
    proxies: usize,

    /// Noise standard deviation added to each proxy
    #[arg(long, default_value_t = 0.5)]
    noise: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = SyntheticConfig {
        seed: args.seed,
        n_proxies: args.proxies,
        noise: args.noise,
        ..SyntheticConfig::default()
    };
    let syn = generate(&cfg);

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;
    let network = args.out.join("network.parquet");
    let instrumental = args.out.join("instrumental.csv");
    let truth = args.out.join("truth.csv");

    write_network_parquet(&network, &syn.series)?;
    write_temperature(&instrumental, &syn.instrumental, "anomaly")?;
    write_temperature(&truth, &syn.truth, "anomaly")?;

    println!(
        "Wrote {} proxies ({}..={}) to {}, target to {}, truth to {}",
        syn.series.len(),
        cfg.start,
        cfg.end,
        network.display(),
        instrumental.display(),
        truth.display()
    );
    Ok(())
}
