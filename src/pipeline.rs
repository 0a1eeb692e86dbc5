//! The reproduction run: load → filter → reconstruct → write tables and
//! figures → optionally check against a published series.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::config::{DataConfig, RunConfig};
use crate::data::datasets::{self, Mann2008};
use crate::data::filter::{filter_from_config, filtered_indices};
use crate::data::loader;
use crate::data::model::{NestSummary, ProxyNetwork, ReconMethod};
use crate::recon::verify::{self, ReferenceCheck};
use crate::recon::{reconstruct, screening};
use crate::render;

pub const RECONSTRUCTION_CSV: &str = "reconstruction.csv";
pub const SUMMARY_JSON: &str = "summary.json";
pub const RECONSTRUCTION_PNG: &str = "reconstruction.png";
pub const SITE_MAP_PNG: &str = "site_map.png";

/// What a run produced; also written as `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub network: PathBuf,
    pub method: ReconMethod,
    pub records_loaded: usize,
    pub records_used: usize,
    pub span: (i32, i32),
    pub nests: Vec<NestSummary>,
    pub reference: Option<ReferenceCheck>,
    pub outputs: Vec<PathBuf>,
}

pub fn run(config: &RunConfig) -> Result<RunReport> {
    let settings = config.reconstruction.settings();
    let network_path = resolve_network(&config.data)?;
    let network = loader::load_network(&network_path)?;
    let records_loaded = network.len();

    let network = apply_filter(network, config);
    let target_path = config
        .data
        .target
        .as_deref()
        .context("No instrumental target configured (set data.target or pass --target)")?;
    let target = loader::load_temperature(target_path)?;

    let network = match config.reconstruction.screening {
        Some(threshold) => {
            let kept = screening::screen(&network, &target, settings.calibration, threshold);
            network.subset(&kept)
        }
        None => network,
    };

    log::info!(
        "Reconstructing with {} from {} of {} records",
        settings.method,
        network.len(),
        records_loaded
    );
    let recon = reconstruct(&network, &target, &settings).context("Reconstruction failed")?;

    let out = &config.output.dir;
    fs::create_dir_all(out).with_context(|| format!("creating output dir {}", out.display()))?;
    let mut outputs = Vec::new();

    let csv_path = out.join(RECONSTRUCTION_CSV);
    loader::write_reconstruction(&csv_path, &recon)?;
    outputs.push(csv_path);

    let reference = config
        .data
        .reference
        .as_deref()
        .map(loader::load_temperature)
        .transpose()?;
    let check = reference.as_ref().map(|r| {
        verify::compare_to_reference(
            &recon.as_series(),
            r,
            config.reconstruction.reference_tolerance,
        )
    });

    let size = config.output.figure_size();
    let figure = render::reconstruction_figure(
        &recon,
        config.output.smoothing,
        Some(&target),
        reference.as_ref(),
        size,
    );
    let png = out.join(RECONSTRUCTION_PNG);
    render::save_png(&figure, &png)?;
    outputs.push(png);

    let png = out.join(SITE_MAP_PNG);
    render::save_png(&render::site_map_figure(&network, size), &png)?;
    outputs.push(png);

    let summary_path = out.join(SUMMARY_JSON);
    outputs.push(summary_path.clone());
    let report = RunReport {
        network: network_path,
        method: recon.method,
        records_loaded,
        records_used: network.len(),
        span: (
            recon.years.first().copied().unwrap_or_default(),
            recon.years.last().copied().unwrap_or_default(),
        ),
        nests: recon.nests.clone(),
        reference: check,
        outputs,
    };
    write_summary(&summary_path, &report)?;

    if let Some(check) = &report.reference {
        log::info!(
            "Reference: {} common years, RMSE {:.4}, max |diff| {:.4}, r {:.3}",
            check.overlap,
            check.rmse,
            check.max_abs_diff,
            check.correlation
        );
        if !check.within_tolerance {
            bail!(
                "Reconstruction differs from the reference by {:.6} (tolerance {})",
                check.max_abs_diff,
                check.tolerance
            );
        }
    }
    Ok(report)
}

/// Network file from the config, or the local copy of a named dataset.
pub fn resolve_network(data: &DataConfig) -> Result<PathBuf> {
    if let Some(path) = &data.network {
        return Ok(path.clone());
    }
    let Some(name) = &data.dataset else {
        bail!("No proxy network configured (set data.network or data.dataset)");
    };
    let dataset = Mann2008::from_name(name)
        .with_context(|| format!("Unknown dataset '{name}'"))?;
    let home = datasets::data_home(data.data_home.as_deref())?;
    datasets::fetch(dataset, &home, data.download_if_missing)
}

fn apply_filter(network: ProxyNetwork, config: &RunConfig) -> ProxyNetwork {
    if config.filter.is_empty() {
        return network;
    }
    let kept = filtered_indices(&network, &filter_from_config(&config.filter));
    log::info!("Filter kept {} of {} records", kept.len(), network.len());
    network.subset(&kept)
}

fn write_summary(path: &Path, report: &RunReport) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
