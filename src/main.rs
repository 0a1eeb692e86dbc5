use anyhow::{Result, anyhow};
use eframe::egui;

use paleo_recon::app::PaleoReconApp;
use paleo_recon::cli::{self, Cli, Commands};
use paleo_recon::config::RunConfig;
use paleo_recon::data::datasets::{self, Mann2008};
use paleo_recon::pipeline;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = dispatch(Cli::parse_args()) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            config,
            network,
            target,
            reference,
            method,
            out,
        } => {
            let config = cli::run_config(config, network, target, reference, method, out)?;
            let report = pipeline::run(&config)?;
            log::info!(
                "{} reconstruction {}..={} from {} records",
                report.method,
                report.span.0,
                report.span.1,
                report.records_used
            );
            for path in &report.outputs {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::Fetch {
            original,
            data_home,
            no_download,
        } => {
            let dataset = if original {
                Mann2008::Original
            } else {
                Mann2008::Infilled
            };
            let home = datasets::data_home(data_home.as_deref())?;
            let path = datasets::fetch(dataset, &home, !no_download)?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::View { config } => view(RunConfig::load_or_default(config.as_deref())?),
    }
}

fn view(config: RunConfig) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "paleo-recon – Proxy Network Viewer",
        options,
        Box::new(|_cc| Ok(Box::new(PaleoReconApp::new(config)))),
    )
    .map_err(|e| anyhow!("Viewer failed: {e}"))
}
