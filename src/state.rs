use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::color::ColorMap;
use crate::config::RunConfig;
use crate::data::filter::{FilterState, filter_from_config, filtered_indices, init_filter_state};
use crate::data::loader;
use crate::data::model::{MetadataValue, ProxyNetwork, Reconstruction, TemperatureSeries};
use crate::pipeline;
use crate::recon::{reconstruct, screening};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    Series,
    Map,
    Reconstruction,
}

/// The full viewer state, independent of rendering.
#[derive(Default)]
pub struct AppState {
    pub config: RunConfig,

    /// Loaded network (None until the user opens a file).
    pub network: Option<ProxyNetwork>,
    pub network_path: Option<PathBuf>,

    /// Per-column filter selections.
    pub filters: FilterState,

    /// Indices of records passing the current filters (cached).
    pub visible_indices: Vec<usize>,

    /// Which metadata column is used for colouring.
    pub color_column: Option<String>,
    pub color_map: Option<ColorMap>,

    pub view: View,

    /// Instrumental target for the reconstruction tab.
    pub target: Option<TemperatureSeries>,
    /// Last reconstruction of the visible records.
    pub reconstruction: Option<Reconstruction>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    /// State for `config`, opening its network and target when they are
    /// available locally.
    pub fn new(config: RunConfig) -> Self {
        let mut state = AppState {
            config,
            ..Default::default()
        };

        let mut data = state.config.data.clone();
        data.download_if_missing = false;
        if data.network.is_some() || data.dataset.is_some() {
            match pipeline::resolve_network(&data) {
                Ok(path) => state.open_network(&path),
                Err(e) => state.report(e),
            }
        }
        if let Some(path) = state.config.data.target.clone() {
            state.open_target(&path);
        }
        state
    }

    pub fn open_network(&mut self, path: &Path) {
        match loader::load_network(path) {
            Ok(network) => {
                log::info!(
                    "Loaded {} records with columns {:?}",
                    network.len(),
                    network.column_names
                );
                self.network_path = Some(path.to_path_buf());
                self.set_network(network);
            }
            Err(e) => self.report(e),
        }
    }

    pub fn open_target(&mut self, path: &Path) {
        match loader::load_temperature(path) {
            Ok(target) => {
                self.target = Some(target);
                self.config.data.target = Some(path.to_path_buf());
                self.reconstruction = None;
            }
            Err(e) => self.report(e),
        }
    }

    /// Ingest a newly loaded network, initialise filters and colour.
    pub fn set_network(&mut self, network: ProxyNetwork) {
        self.filters = init_filter_state(&network);
        self.filters.extend(filter_from_config(&self.config.filter));
        self.network = Some(network);
        self.refilter();

        self.color_column = Some("type".to_string());
        self.rebuild_color_map();
        self.reconstruction = None;
        self.status_message = None;
    }

    /// Rebuild the colour map from the current `color_column`.
    pub fn rebuild_color_map(&mut self) {
        self.color_map = match (&self.network, &self.color_column) {
            (Some(net), Some(col)) => net
                .unique_values
                .get(col)
                .map(|vals| ColorMap::new(col, vals)),
            _ => None,
        };
    }

    /// Recompute `visible_indices` after a filter change.
    pub fn refilter(&mut self) {
        if let Some(net) = &self.network {
            self.visible_indices = filtered_indices(net, &self.filters);
        }
    }

    pub fn set_color_column(&mut self, col: String) {
        self.color_column = Some(col);
        self.rebuild_color_map();
    }

    /// Toggle a single metadata value in a column's filter.
    pub fn toggle_filter_value(&mut self, column: &str, value: &MetadataValue) {
        let selected = self.filters.entry(column.to_string()).or_default();
        if !selected.remove(value) {
            selected.insert(value.clone());
        }
        self.refilter();
    }

    pub fn select_all(&mut self, column: &str) {
        if let Some(all_vals) = self
            .network
            .as_ref()
            .and_then(|net| net.unique_values.get(column))
        {
            self.filters.insert(column.to_string(), all_vals.clone());
            self.refilter();
        }
    }

    pub fn select_none(&mut self, column: &str) {
        self.filters.insert(column.to_string(), BTreeSet::new());
        self.refilter();
    }

    /// Reconstruct from the visible records against the loaded target.
    pub fn run_reconstruction(&mut self) {
        match self.try_reconstruct() {
            Ok(recon) => {
                self.status_message = None;
                self.reconstruction = Some(recon);
                self.view = View::Reconstruction;
            }
            Err(e) => self.report(e),
        }
    }

    fn try_reconstruct(&self) -> Result<Reconstruction> {
        let network = self
            .network
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No proxy network loaded"))?;
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No instrumental target loaded"))?;
        let settings = self.config.reconstruction.settings();

        let mut visible = network.subset(&self.visible_indices);
        if let Some(threshold) = self.config.reconstruction.screening {
            let kept = screening::screen(&visible, target, settings.calibration, threshold);
            visible = visible.subset(&kept);
        }
        Ok(reconstruct(&visible, target, &settings)?)
    }

    fn report(&mut self, e: anyhow::Error) {
        log::error!("{e:#}");
        self.status_message = Some(format!("Error: {e:#}"));
    }
}
