/// Data layer: core types, loading, filtering and dataset retrieval.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv / .nc          NOAA archive
///        │                                    │
///        │                              ┌──────────┐
///        │◄─────────────────────────────│ datasets │  cache + download
///        ▼                              └──────────┘
///   ┌──────────┐
///   │  loader  │  parse file → ProxyNetwork (annual axis, NaN gaps)
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ ProxyNetwork │  Vec<ProxyRecord>, column index
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter  │  apply metadata predicates → filtered indices
///   └──────────┘
/// ```
pub mod datasets;
pub mod filter;
pub mod loader;
pub mod model;
pub mod netcdf;
pub mod synthetic;
