use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Float64Builder, Int32Array,
    Int64Array, LargeListArray, ListArray, ListBuilder, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::model::{MetadataValue, ProxyNetwork, ProxySeries, Reconstruction, TemperatureSeries};

/// Columns with a fixed meaning; every other column becomes metadata.
const RESERVED: [&str; 6] = ["time", "value", "name", "lat", "lon", "code"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a proxy network from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – `time` and `value` list columns, one row per site (recommended)
/// * `.json`    – `[{ "time": [...], "value": [...], "name": ..., ...meta }, ...]`
/// * `.csv`     – columns `time` and `value` containing semicolon-separated floats
/// * `.nc`      – NetCDF-3 network in the NOAA reconstruction-network layout
pub fn load_network(path: &Path) -> Result<ProxyNetwork> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let network = match ext.as_str() {
        "parquet" | "pq" => ProxyNetwork::from_series(load_parquet(path)?),
        "json" => ProxyNetwork::from_series(load_json(path)?),
        "csv" => ProxyNetwork::from_series(load_csv(path)?),
        "nc" => super::netcdf::load_netcdf(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    log::info!(
        "Loaded {} proxy records from {} spanning {:?}",
        network.len(),
        path.display(),
        network.span()
    );
    Ok(network)
}

/// Load an annual temperature series from a two-column CSV.
///
/// The header is required. The year column is the one named `year` (or the
/// first column); the value column is the first other column. Rows with an
/// empty or non-finite value are skipped.
pub fn load_temperature(path: &Path) -> Result<TemperatureSeries> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening temperature CSV {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();
    if headers.len() < 2 {
        bail!("temperature CSV needs a year and a value column, got {headers:?}");
    }

    let year_idx = headers.iter().position(|h| h == "year").unwrap_or(0);
    let value_idx = (0..headers.len())
        .find(|&i| i != year_idx)
        .context("temperature CSV has no value column")?;

    let mut pairs = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let year_text = record.get(year_idx).unwrap_or("").trim();
        let year = year_text
            .parse::<f64>()
            .with_context(|| format!("Row {row_no}: year '{year_text}' is not a number"))?;
        let value_text = record.get(value_idx).unwrap_or("").trim();
        if value_text.is_empty() {
            continue;
        }
        let value = value_text
            .parse::<f64>()
            .with_context(|| format!("Row {row_no}: '{value_text}' is not a number"))?;
        if value.is_finite() {
            pairs.push((year.round() as i32, value));
        }
    }

    let series = TemperatureSeries::new(pairs);
    log::info!(
        "Loaded {} temperature values from {} spanning {:?}",
        series.len(),
        path.display(),
        series.span()
    );
    Ok(series)
}

#[derive(Serialize)]
struct ReconstructionRow {
    year: i32,
    value: f64,
    lower: f64,
    upper: f64,
    nest: i32,
}

/// Write a reconstruction as CSV `year,value,lower,upper,nest`.
pub fn write_reconstruction(path: &Path, recon: &Reconstruction) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for i in 0..recon.len() {
        writer.serialize(ReconstructionRow {
            year: recon.years[i],
            value: recon.values[i],
            lower: recon.lower[i],
            upper: recon.upper[i],
            nest: recon.nest_of[i],
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Write an annual series as CSV `year,<column>`.
pub fn write_temperature(path: &Path, series: &TemperatureSeries, column: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["year", column])?;
    for (year, value) in series.years.iter().zip(&series.values) {
        writer.write_record([year.to_string(), value.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   {
///     "time": [1000, 1001, ...],
///     "value": [0.12, 0.14, ...],
///     "name": "norway_tr",
///     "lat": 68.3, "lon": 18.5, "code": 9000,
///     "archive": "itrdb"
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Vec<ProxySeries>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut series = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let time = json_array_to_f64(obj.get("time"), i, "time")?;
        let value = json_array_to_f64(obj.get("value"), i, "value")?;

        let mut metadata = BTreeMap::new();
        for (key, val) in obj {
            if RESERVED.contains(&key.as_str()) {
                continue;
            }
            metadata.insert(key.clone(), json_to_metadata(val));
        }

        series.push(build_series(
            i,
            obj.get("name").map(json_to_metadata),
            obj.get("lat").map(json_to_metadata),
            obj.get("lon").map(json_to_metadata),
            obj.get("code").map(json_to_metadata),
            time,
            value,
            metadata,
        )?);
    }

    Ok(series)
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| match v {
            JsonValue::Null => Ok(f64::NAN),
            other => other
                .as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number")),
        })
        .collect()
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one row per site.
/// `time` and `value` columns contain semicolon-separated floats:
///   `"1000;1001;1002"`, `"0.12;0.14;NaN"`
/// All other non-reserved columns are treated as metadata.
fn load_csv(path: &Path) -> Result<Vec<ProxySeries>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let position = |name: &str| headers.iter().position(|h| h == name);
    let time_idx = position("time").context("CSV missing 'time' column")?;
    let value_idx = position("value").context("CSV missing 'value' column")?;
    let (name_idx, lat_idx, lon_idx, code_idx) =
        (position("name"), position("lat"), position("lon"), position("code"));

    let mut series = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).map(MetadataValue::guess);

        let time = parse_semicolon_floats(record.get(time_idx).unwrap_or(""), row_no, "time")?;
        let value = parse_semicolon_floats(record.get(value_idx).unwrap_or(""), row_no, "value")?;

        let mut metadata = BTreeMap::new();
        for (col_idx, text) in record.iter().enumerate() {
            let col_name = &headers[col_idx];
            if RESERVED.contains(&col_name.as_str()) {
                continue;
            }
            metadata.insert(col_name.clone(), MetadataValue::guess(text));
        }

        series.push(build_series(
            row_no,
            cell(name_idx),
            cell(lat_idx),
            cell(lon_idx),
            cell(code_idx),
            time,
            value,
            metadata,
        )?);
    }

    Ok(series)
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file containing a proxy network.
///
/// Expected schema:
/// - `time`: List<Float64> or LargeList<Float64> – time stamps per site
/// - `value`: List<Float64> or LargeList<Float64> – measurements per site
/// - `name`, `lat`, `lon`, `code`: optional scalar site columns
/// - Any other columns are treated as metadata (strings, ints, floats, bools)
fn load_parquet(path: &Path) -> Result<Vec<ProxySeries>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut series = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let n_rows = batch.num_rows();

        let time_idx = schema
            .index_of("time")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'time' column"))?;
        let value_idx = schema
            .index_of("value")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'value' column"))?;
        let scalar = |name: &str, row: usize| {
            schema
                .index_of(name)
                .ok()
                .map(|i| extract_metadata_value(batch.column(i), row))
        };

        let meta_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| !RESERVED.contains(&f.name().as_str()))
            .map(|(i, f)| (i, f.name().clone()))
            .collect();

        for row in 0..n_rows {
            let row_no = series.len();
            let time = extract_f64_list(batch.column(time_idx), row)
                .with_context(|| format!("Row {row_no}: failed to read 'time'"))?;
            let value = extract_f64_list(batch.column(value_idx), row)
                .with_context(|| format!("Row {row_no}: failed to read 'value'"))?;

            let mut metadata = BTreeMap::new();
            for (col_idx, col_name) in &meta_cols {
                let cell = extract_metadata_value(batch.column(*col_idx), row);
                metadata.insert(col_name.clone(), cell);
            }

            series.push(build_series(
                row_no,
                scalar("name", row),
                scalar("lat", row),
                scalar("lon", row),
                scalar("code", row),
                time,
                value,
                metadata,
            )?);
        }
    }

    Ok(series)
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
    } else if let Some(i64_arr) = values_array.as_any().downcast_ref::<Int64Array>() {
        Ok(i64_arr.iter().map(|v| v.map_or(f64::NAN, |x| x as f64)).collect())
    } else if let Some(i32_arr) = values_array.as_any().downcast_ref::<Int32Array>() {
        Ok(i32_arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected a numeric type",
            values_array.data_type()
        )
    }
}

/// Extract a single metadata value from an Arrow column at a given row.
fn extract_metadata_value(col: &Arc<dyn Array>, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|s| MetadataValue::String(s.value(row).to_string()))
            .unwrap_or(MetadataValue::Null),
        DataType::LargeUtf8 => {
            MetadataValue::String(col.as_string::<i64>().value(row).to_string())
        }
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| MetadataValue::Integer(a.value(row) as i64))
            .unwrap_or(MetadataValue::Null),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| MetadataValue::Integer(a.value(row)))
            .unwrap_or(MetadataValue::Null),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| MetadataValue::Float(a.value(row) as f64))
            .unwrap_or(MetadataValue::Null),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| MetadataValue::Float(a.value(row)))
            .unwrap_or(MetadataValue::Null),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| MetadataValue::Bool(a.value(row)))
            .unwrap_or(MetadataValue::Null),
        other => MetadataValue::String(format!("{other:?}")),
    }
}

/// Write proxy series as a Parquet network readable by [`load_network`].
pub fn write_network_parquet(path: &Path, series: &[ProxySeries]) -> Result<()> {
    let list_field = || Arc::new(Field::new("item", DataType::Float64, true));
    let mut time_builder = ListBuilder::new(Float64Builder::new());
    let mut value_builder = ListBuilder::new(Float64Builder::new());
    for s in series {
        time_builder.values().append_slice(&s.time);
        time_builder.append(true);
        value_builder.values().append_slice(&s.value);
        value_builder.append(true);
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("time", DataType::List(list_field()), false),
        Field::new("value", DataType::List(list_field()), false),
        Field::new("name", DataType::Utf8, false),
        Field::new("lat", DataType::Float64, false),
        Field::new("lon", DataType::Float64, false),
        Field::new("code", DataType::Int64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(time_builder.finish()),
            Arc::new(value_builder.finish()),
            Arc::new(StringArray::from_iter_values(series.iter().map(|s| s.name.as_str()))),
            Arc::new(Float64Array::from_iter_values(series.iter().map(|s| s.lat))),
            Arc::new(Float64Array::from_iter_values(series.iter().map(|s| s.lon))),
            Arc::new(Int64Array::from_iter_values(series.iter().map(|s| s.code))),
        ],
    )
    .context("assembling record batch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

// -- shared row assembly --

#[allow(clippy::too_many_arguments)]
fn build_series(
    row: usize,
    name: Option<MetadataValue>,
    lat: Option<MetadataValue>,
    lon: Option<MetadataValue>,
    code: Option<MetadataValue>,
    time: Vec<f64>,
    value: Vec<f64>,
    metadata: BTreeMap<String, MetadataValue>,
) -> Result<ProxySeries> {
    if time.len() != value.len() {
        bail!(
            "Row {row}: time has {} values but value has {}",
            time.len(),
            value.len()
        );
    }
    let name = match name {
        Some(MetadataValue::Null) | None => format!("site-{row}"),
        Some(other) => other.to_string(),
    };
    let coord = |v: Option<MetadataValue>| v.and_then(|m| m.as_f64()).unwrap_or(f64::NAN);
    let code = code
        .and_then(|m| m.as_f64())
        .map(|c| c.round() as i64)
        .unwrap_or(0);

    Ok(ProxySeries {
        name,
        lat: coord(lat),
        lon: coord(lon),
        code,
        time,
        value,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn csv_network_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "net.csv",
            "name,lat,lon,code,archive,time,value\n\
             tornetrask,68.2,19.7,7500,itrdb,1000;1001;1002,0.1;0.2;NaN\n\
             palmyra,5.9,-162.1,7000,,1001;1002,-0.3;-0.1\n",
        );
        let net = load_network(&path).unwrap();
        assert_eq!(net.len(), 2);
        assert_eq!(net.years, vec![1000, 1001, 1002]);
        let tor = &net.records[0];
        assert_eq!(tor.name, "tornetrask");
        assert_eq!(tor.code, 7500);
        assert!(tor.values[2].is_nan());
        assert_eq!(tor.metadata["archive"], MetadataValue::String("itrdb".into()));
        assert_eq!(net.records[1].metadata["archive"], MetadataValue::Null);
        assert!(net.records[1].values[0].is_nan());
    }

    #[test]
    fn csv_length_mismatch_names_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "bad.csv", "name,time,value\na,1;2;3,1;2\n");
        let err = load_network(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Row 0"));
    }

    #[test]
    fn json_network_defaults_missing_site_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "net.json",
            r#"[{"time": [1850, 1851], "value": [1.0, null], "archive": "pages"}]"#,
        );
        let net = load_network(&path).unwrap();
        let rec = &net.records[0];
        assert_eq!(rec.name, "site-0");
        assert!(rec.lat.is_nan());
        assert_eq!(rec.metadata["hemisphere"], MetadataValue::Null);
        assert_eq!(net.years, vec![1850]);
    }

    #[test]
    fn parquet_network_is_readable_after_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.parquet");
        let series = vec![ProxySeries {
            name: "law_dome".into(),
            lat: -66.7,
            lon: 112.8,
            code: 8000,
            time: vec![1900.0, 1901.0],
            value: vec![0.5, 0.7],
            metadata: BTreeMap::new(),
        }];
        write_network_parquet(&path, &series).unwrap();
        let net = load_network(&path).unwrap();
        assert_eq!(net.records[0].name, "law_dome");
        assert_eq!(net.records[0].values, vec![0.5, 0.7]);
        assert_eq!(net.records[0].proxy_type().name(), "Ice core");
    }

    #[test]
    fn temperature_csv_skips_blank_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "t.csv", "year,anomaly\n1850,-0.3\n1851,\n1852,NaN\n1853,0.1\n");
        let t = load_temperature(&path).unwrap();
        assert_eq!(t.years, vec![1850, 1853]);
        assert_eq!(t.values, vec![-0.3, 0.1]);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_network(Path::new("proxies.xlsx")).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }
}
