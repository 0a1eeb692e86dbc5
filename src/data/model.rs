use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ReconError, ReconResult};

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a metadata column
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value attached to a proxy record.
/// Using `BTreeMap` / `BTreeSet` downstream so `MetadataValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date string kept as text.
    Date(String),
    Null,
}

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn rank(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
                Date(_) => 5,
            }
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) | (Date(a), Date(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl std::hash::Hash for MetadataValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MetadataValue::String(s) | MetadataValue::Date(s) => s.hash(state),
            MetadataValue::Integer(i) => i.hash(state),
            MetadataValue::Float(f) => f.to_bits().hash(state),
            MetadataValue::Bool(b) => b.hash(state),
            MetadataValue::Null => {}
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:.4}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Date(d) => write!(f, "{d}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Interpret a textual cell (CSV field, config entry) as the narrowest type.
    pub fn guess(s: &str) -> Self {
        if s.is_empty() {
            return MetadataValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return MetadataValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return MetadataValue::Float(f);
        }
        if s == "true" || s == "false" {
            return MetadataValue::Bool(s == "true");
        }
        MetadataValue::String(s.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ProxyType – decoded proxy data-type code
// ---------------------------------------------------------------------------

/// Proxy family decoded from the NOAA data-type code (e.g. 9000 = tree ring).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProxyType {
    /// Luterbacher gridded European reconstructions.
    Luterbacher,
    TreeRing,
    Sediment,
    Documentary,
    Speleothem,
    Coral,
    /// Maximum latewood density.
    Mxd,
    IceCore,
    Unknown(i64),
}

impl ProxyType {
    pub fn from_code(code: i64) -> Self {
        match code {
            2000 => ProxyType::Luterbacher,
            3000 | 9000 => ProxyType::TreeRing,
            3001 | 4000 | 4001 => ProxyType::Sediment,
            5000 | 5001 => ProxyType::Documentary,
            6000 | 6001 => ProxyType::Speleothem,
            7000 | 7001 => ProxyType::Coral,
            7500 => ProxyType::Mxd,
            8000 | 8001 => ProxyType::IceCore,
            other => ProxyType::Unknown(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProxyType::Luterbacher => "Luterbacher",
            ProxyType::TreeRing => "Tree ring",
            ProxyType::Sediment => "Sediment",
            ProxyType::Documentary => "Documentary",
            ProxyType::Speleothem => "Speleothem",
            ProxyType::Coral => "Coral",
            ProxyType::Mxd => "MXD",
            ProxyType::IceCore => "Ice core",
            ProxyType::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Thousands digit of a data-type code, clamped to the documented 2..=9 range.
/// Drives marker shape (number of sides) and palette slot.
pub fn family_of(code: i64) -> u8 {
    (code / 1000).clamp(2, 9) as u8
}

// ---------------------------------------------------------------------------
// ProxySeries / ProxyRecord
// ---------------------------------------------------------------------------

/// A proxy series as read from disk, on its own time stamps.
#[derive(Debug, Clone, Default)]
pub struct ProxySeries {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub code: i64,
    /// Time stamps in calendar years (may be fractional).
    pub time: Vec<f64>,
    /// Measured values, same length as `time`.
    pub value: Vec<f64>,
    pub metadata: BTreeMap<String, MetadataValue>,
}

/// One proxy site aligned onto the network's annual axis.
#[derive(Debug, Clone)]
pub struct ProxyRecord {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub code: i64,
    /// One value per network year; `NaN` marks a missing year.
    pub values: Vec<f64>,
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl ProxyRecord {
    pub fn new(name: String, lat: f64, lon: f64, code: i64, values: Vec<f64>) -> Self {
        let mut record = ProxyRecord {
            name,
            lat,
            lon,
            code,
            values,
            metadata: BTreeMap::new(),
        };
        record.insert_standard_metadata();
        record
    }

    pub fn proxy_type(&self) -> ProxyType {
        ProxyType::from_code(self.code)
    }

    pub fn family(&self) -> u8 {
        family_of(self.code)
    }

    fn insert_standard_metadata(&mut self) {
        let hemisphere = if self.lat >= 0.0 {
            MetadataValue::String("NH".into())
        } else if self.lat < 0.0 {
            MetadataValue::String("SH".into())
        } else {
            MetadataValue::Null
        };
        self.metadata.insert(
            "type".into(),
            MetadataValue::String(self.proxy_type().name().into()),
        );
        self.metadata
            .insert("code".into(), MetadataValue::Integer(self.code));
        self.metadata.insert("hemisphere".into(), hemisphere);
    }
}

// ---------------------------------------------------------------------------
// ProxyNetwork – the complete loaded network
// ---------------------------------------------------------------------------

/// All proxy records on a shared, contiguous annual axis, with pre-computed
/// metadata column indices.
#[derive(Debug, Clone, Default)]
pub struct ProxyNetwork {
    pub years: Vec<i32>,
    pub records: Vec<ProxyRecord>,
    /// Ordered list of metadata column names.
    pub column_names: Vec<String>,
    /// For each metadata column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<MetadataValue>>,
}

/// Time stamps beyond this many years from zero are fill values, not dates.
const MAX_ABS_YEAR: f64 = 100_000.0;

fn plausible_year(t: f64) -> bool {
    t.is_finite() && t.abs() <= MAX_ABS_YEAR
}

impl ProxyNetwork {
    /// Align series with arbitrary time stamps onto one annual axis.
    ///
    /// Time stamps are rounded to the nearest year and several values falling
    /// into the same year are averaged. The axis spans the earliest to the
    /// latest year holding a finite value in any series.
    pub fn from_series(series: Vec<ProxySeries>) -> Self {
        let finite_years = series.iter().flat_map(|s| {
            s.time
                .iter()
                .zip(&s.value)
                .filter(|(&t, v)| plausible_year(t) && v.is_finite())
                .map(|(t, _)| t.round() as i32)
        });
        let (first, last) = finite_years.fold((i32::MAX, i32::MIN), |(lo, hi), y| {
            (lo.min(y), hi.max(y))
        });
        let years: Vec<i32> = if first <= last {
            (first..=last).collect()
        } else {
            Vec::new()
        };

        let records = series
            .into_iter()
            .map(|s| {
                let mut sums = vec![0.0; years.len()];
                let mut counts = vec![0u32; years.len()];
                let mut rejected = 0usize;
                for (&t, &v) in s.time.iter().zip(&s.value) {
                    if !v.is_finite() {
                        continue;
                    }
                    if !plausible_year(t) {
                        rejected += 1;
                        continue;
                    }
                    let idx = (t.round() as i32 - first) as usize;
                    sums[idx] += v;
                    counts[idx] += 1;
                }
                if rejected > 0 {
                    log::warn!(
                        "Record '{}': {rejected} values with time stamps outside ±{MAX_ABS_YEAR} ignored",
                        s.name
                    );
                }
                let values = sums
                    .iter()
                    .zip(&counts)
                    .map(|(&sum, &n)| if n == 0 { f64::NAN } else { sum / n as f64 })
                    .collect();

                let mut record = ProxyRecord {
                    name: s.name,
                    lat: s.lat,
                    lon: s.lon,
                    code: s.code,
                    values,
                    metadata: s.metadata,
                };
                record.insert_standard_metadata();
                record
            })
            .collect();

        Self::index(years, records)
    }

    /// Build from records that are already aligned on `years`.
    pub fn from_records(years: Vec<i32>, records: Vec<ProxyRecord>) -> ReconResult<Self> {
        if let Some(bad) = records.iter().find(|r| r.values.len() != years.len()) {
            return Err(ReconError::ShapeMismatch {
                expected: years.len(),
                got: bad.values.len(),
            });
        }
        Ok(Self::index(years, records))
    }

    fn index(years: Vec<i32>, records: Vec<ProxyRecord>) -> Self {
        let mut column_names_set: BTreeSet<String> = BTreeSet::new();
        let mut unique_values: BTreeMap<String, BTreeSet<MetadataValue>> = BTreeMap::new();

        for rec in &records {
            for (col, val) in &rec.metadata {
                column_names_set.insert(col.clone());
                unique_values
                    .entry(col.clone())
                    .or_default()
                    .insert(val.clone());
            }
        }
        ProxyNetwork {
            years,
            records,
            column_names: column_names_set.into_iter().collect(),
            unique_values,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First and last year of the shared axis.
    pub fn span(&self) -> Option<(i32, i32)> {
        Some((*self.years.first()?, *self.years.last()?))
    }

    pub fn year_index(&self, year: i32) -> Option<usize> {
        let first = *self.years.first()?;
        let idx = usize::try_from(year - first).ok()?;
        (idx < self.years.len()).then_some(idx)
    }

    /// First and last year with a finite value for record `idx`.
    pub fn coverage(&self, idx: usize) -> Option<(i32, i32)> {
        let values = &self.records.get(idx)?.values;
        let first = values.iter().position(|v| v.is_finite())?;
        let last = values.iter().rposition(|v| v.is_finite())?;
        Some((self.years[first], self.years[last]))
    }

    /// Slice of record `idx` over `start..=end`, `None` when outside the axis.
    pub fn window(&self, idx: usize, start: i32, end: i32) -> Option<&[f64]> {
        let a = self.year_index(start)?;
        let b = self.year_index(end)?;
        self.records.get(idx)?.values.get(a..=b)
    }

    /// Whether record `idx` has no missing value over `start..=end`.
    pub fn complete_over(&self, idx: usize, start: i32, end: i32) -> bool {
        self.window(idx, start, end)
            .is_some_and(|w| w.iter().all(|v| v.is_finite()))
    }

    /// A new network holding only the records at `indices`, same axis.
    pub fn subset(&self, indices: &[usize]) -> Self {
        let records = indices
            .iter()
            .filter_map(|&i| self.records.get(i).cloned())
            .collect();
        Self::index(self.years.clone(), records)
    }
}

// ---------------------------------------------------------------------------
// TemperatureSeries – instrumental target or published reconstruction
// ---------------------------------------------------------------------------

/// An annual temperature series, sorted by year. Years may have gaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemperatureSeries {
    pub years: Vec<i32>,
    pub values: Vec<f64>,
}

impl TemperatureSeries {
    /// Sorts by year; the last of several values for one year wins.
    pub fn new(pairs: impl IntoIterator<Item = (i32, f64)>) -> Self {
        let sorted: BTreeMap<i32, f64> = pairs.into_iter().collect();
        TemperatureSeries {
            years: sorted.keys().copied().collect(),
            values: sorted.values().copied().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn span(&self) -> Option<(i32, i32)> {
        Some((*self.years.first()?, *self.years.last()?))
    }

    pub fn value_at(&self, year: i32) -> Option<f64> {
        self.years
            .binary_search(&year)
            .ok()
            .map(|i| self.values[i])
    }

    /// `(year, value)` pairs inside `start..=end`.
    pub fn window(&self, start: i32, end: i32) -> Vec<(i32, f64)> {
        self.years
            .iter()
            .zip(&self.values)
            .filter(|&(&y, _)| y >= start && y <= end)
            .map(|(&y, &v)| (y, v))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Reconstruction – output of the statistical transform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReconMethod {
    /// Principal-component regression.
    #[default]
    Pcr,
    /// Composite plus scale.
    Cps,
}

impl fmt::Display for ReconMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconMethod::Pcr => f.write_str("PCR"),
            ReconMethod::Cps => f.write_str("CPS"),
        }
    }
}

/// Fit diagnostics of one nest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestSummary {
    /// First year reconstructed by this nest.
    pub start: i32,
    pub n_proxies: usize,
    /// Retained principal components (1 for CPS).
    pub n_components: usize,
    pub calibration_r2: f64,
    pub validation_re: Option<f64>,
    pub validation_ce: Option<f64>,
    /// Residual standard error used for the uncertainty band.
    pub sigma: f64,
}

/// Reconstructed temperature with its uncertainty band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconstruction {
    pub method: ReconMethod,
    pub years: Vec<i32>,
    pub values: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    /// Start year of the nest each value came from.
    pub nest_of: Vec<i32>,
    pub nests: Vec<NestSummary>,
}

impl Reconstruction {
    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn as_series(&self) -> TemperatureSeries {
        TemperatureSeries {
            years: self.years.clone(),
            values: self.values.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(name: &str, code: i64, time: &[f64], value: &[f64]) -> ProxySeries {
        ProxySeries {
            name: name.into(),
            lat: -10.0,
            lon: 20.0,
            code,
            time: time.to_vec(),
            value: value.to_vec(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn proxy_codes_decode_to_families() {
        assert_eq!(ProxyType::from_code(9000), ProxyType::TreeRing);
        assert_eq!(ProxyType::from_code(3000), ProxyType::TreeRing);
        assert_eq!(ProxyType::from_code(7500), ProxyType::Mxd);
        assert_eq!(ProxyType::from_code(8001), ProxyType::IceCore);
        assert_eq!(ProxyType::from_code(1234), ProxyType::Unknown(1234));
        assert_eq!(family_of(7500), 7);
        assert_eq!(family_of(2000), 2);
        assert_eq!(family_of(12000), 9);
    }

    #[test]
    fn series_align_on_common_axis() {
        let net = ProxyNetwork::from_series(vec![
            series("a", 9000, &[1000.0, 1001.0, 1002.0], &[1.0, 2.0, 3.0]),
            series("b", 7000, &[1001.2, 1000.9, 1004.0], &[4.0, 6.0, 8.0]),
        ]);
        assert_eq!(net.years, vec![1000, 1001, 1002, 1003, 1004]);
        assert_eq!(net.records[0].values[..3], [1.0, 2.0, 3.0]);
        assert!(net.records[0].values[3].is_nan());
        // 1001.2 and 1000.9 both round to 1001 and are averaged
        assert_eq!(net.records[1].values[1], 5.0);
        assert!(net.records[1].values[0].is_nan());
        assert_eq!(net.coverage(1), Some((1001, 1004)));
        assert!(net.complete_over(0, 1000, 1002));
        assert!(!net.complete_over(0, 1000, 1003));
        assert!(!net.complete_over(0, 990, 1002));
    }

    #[test]
    fn fill_time_stamps_are_ignored() {
        let net = ProxyNetwork::from_series(vec![series(
            "a",
            9000,
            &[1990.0, 1e12, 1991.0, -9.99e36],
            &[1.0, 2.0, 3.0, 4.0],
        )]);
        assert_eq!(net.years, vec![1990, 1991]);
        assert_eq!(net.records[0].values, vec![1.0, 3.0]);
    }

    #[test]
    fn standard_metadata_is_indexed() {
        let net = ProxyNetwork::from_series(vec![
            series("a", 9000, &[1.0], &[1.0]),
            series("b", 7000, &[1.0], &[1.0]),
        ]);
        assert!(net.column_names.contains(&"hemisphere".to_string()));
        let types = &net.unique_values["type"];
        assert!(types.contains(&MetadataValue::String("Coral".into())));
        assert!(types.contains(&MetadataValue::String("Tree ring".into())));
        assert_eq!(
            net.records[0].metadata["hemisphere"],
            MetadataValue::String("SH".into())
        );
    }

    #[test]
    fn from_records_rejects_ragged_rows() {
        let rec = ProxyRecord::new("x".into(), 0.0, 0.0, 9000, vec![1.0]);
        let err = ProxyNetwork::from_records(vec![1, 2], vec![rec]).unwrap_err();
        assert_eq!(err, ReconError::ShapeMismatch { expected: 2, got: 1 });
    }

    #[test]
    fn temperature_series_sorts_and_windows() {
        let t = TemperatureSeries::new([(1852, 0.2), (1850, 0.0), (1851, 0.1)]);
        assert_eq!(t.years, vec![1850, 1851, 1852]);
        assert_eq!(t.value_at(1851), Some(0.1));
        assert_eq!(t.value_at(1900), None);
        assert_eq!(t.window(1851, 1860), vec![(1851, 0.1), (1852, 0.2)]);
    }

    #[test]
    fn metadata_guess_picks_narrowest_type() {
        assert_eq!(MetadataValue::guess("12"), MetadataValue::Integer(12));
        assert_eq!(MetadataValue::guess("1.5"), MetadataValue::Float(1.5));
        assert_eq!(MetadataValue::guess("true"), MetadataValue::Bool(true));
        assert_eq!(MetadataValue::guess(""), MetadataValue::Null);
        assert_eq!(
            MetadataValue::guess("Coral"),
            MetadataValue::String("Coral".into())
        );
    }
}
