//! NetCDF-3 proxy networks as distributed by the NOAA Paleoclimatology
//! Reconstructions Network (e.g. the Mann et al. 2008 PNAS proxy set).
//!
//! Expected variables:
//! * `time`        – years, dimension `time`
//! * `lat`, `lon`  – site coordinates, dimension `site`
//! * `data_type`   – proxy type code per site (9000 = tree ring, ...)
//! * `proxy_data`  – measurements, dimensions `(time, site)`
//! * `site_name`   – optional, `(site, strlen)` characters

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use netcdf3::{DataVector, FileReader};

use super::model::{ProxyNetwork, ProxySeries};

/// Values at or below this are fill values in the NOAA archives.
const MISSING_SENTINEL: f64 = -9990.0;

pub fn load_netcdf(path: &Path) -> Result<ProxyNetwork> {
    let mut reader = FileReader::open(path)
        .map_err(|e| anyhow!("{e:?}"))
        .with_context(|| format!("opening NetCDF file {}", path.display()))?;

    let mut read_f64 = |name: &str| -> Result<Vec<f64>> {
        let data = reader
            .read_var(name)
            .map_err(|e| anyhow!("{e:?}"))
            .with_context(|| format!("reading variable '{name}'"))?;
        Ok(to_f64(data))
    };

    let time = read_f64("time")?;
    let lat = read_f64("lat")?;
    let lon = read_f64("lon")?;
    let codes = read_f64("data_type")?;
    let proxy_data = read_f64("proxy_data")?;

    let n_sites = lat.len();
    if lon.len() != n_sites || codes.len() != n_sites {
        bail!(
            "site variables disagree: {} lat, {} lon, {} data_type",
            n_sites,
            lon.len(),
            codes.len()
        );
    }
    if proxy_data.len() != time.len() * n_sites {
        bail!(
            "proxy_data has {} values, expected time ({}) × site ({})",
            proxy_data.len(),
            time.len(),
            n_sites
        );
    }

    let names = reader
        .read_var("site_name")
        .ok()
        .map(|data| decode_names(data, n_sites))
        .unwrap_or_default();

    let series = (0..n_sites)
        .map(|site| {
            let value = (0..time.len())
                .map(|t| {
                    let v = proxy_data[t * n_sites + site];
                    if v.is_finite() && v > MISSING_SENTINEL {
                        v
                    } else {
                        f64::NAN
                    }
                })
                .collect();
            ProxySeries {
                name: names
                    .get(site)
                    .filter(|n| !n.is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("site-{site}")),
                lat: lat[site],
                lon: lon[site],
                code: codes[site].round() as i64,
                time: time.clone(),
                value,
                metadata: BTreeMap::new(),
            }
        })
        .collect();

    Ok(ProxyNetwork::from_series(series))
}

fn to_f64(data: DataVector) -> Vec<f64> {
    match data {
        DataVector::I8(v) => v.into_iter().map(f64::from).collect(),
        DataVector::U8(v) => v.into_iter().map(f64::from).collect(),
        DataVector::I16(v) => v.into_iter().map(f64::from).collect(),
        DataVector::I32(v) => v.into_iter().map(f64::from).collect(),
        DataVector::F32(v) => v.into_iter().map(f64::from).collect(),
        DataVector::F64(v) => v,
    }
}

/// Split a `(site, strlen)` character block into trimmed names.
fn decode_names(data: DataVector, n_sites: usize) -> Vec<String> {
    let bytes: Vec<u8> = match data {
        DataVector::U8(v) => v,
        DataVector::I8(v) => v.into_iter().map(|b| b as u8).collect(),
        _ => return Vec::new(),
    };
    if n_sites == 0 || bytes.len() % n_sites != 0 {
        return Vec::new();
    }
    decode_fixed_width(&bytes, bytes.len() / n_sites)
}

fn decode_fixed_width(bytes: &[u8], width: usize) -> Vec<String> {
    if width == 0 {
        return Vec::new();
    }
    bytes
        .chunks(width)
        .map(|chunk| {
            String::from_utf8_lossy(chunk)
                .trim_end_matches('\0')
                .trim()
                .to_string()
        })
        .collect()
}
