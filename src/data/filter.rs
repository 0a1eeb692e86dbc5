use std::collections::{BTreeMap, BTreeSet};

use super::model::{MetadataValue, ProxyNetwork};

// ---------------------------------------------------------------------------
// Filter predicate: which unique values are selected per column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column_name → set of selected values.
/// A column absent from the map is unconstrained.
pub type FilterState = BTreeMap<String, BTreeSet<MetadataValue>>;

/// Initialise a [`FilterState`] with all values selected.
pub fn init_filter_state(network: &ProxyNetwork) -> FilterState {
    network.unique_values.clone()
}

/// Build a filter from configured column → accepted values, parsing each
/// textual value the same way CSV metadata cells are parsed.
pub fn filter_from_config(columns: &BTreeMap<String, Vec<String>>) -> FilterState {
    columns
        .iter()
        .map(|(col, vals)| {
            let set = vals.iter().map(|v| MetadataValue::guess(v)).collect();
            (col.clone(), set)
        })
        .collect()
}

/// Return indices of records that pass all active filters.
///
/// A record passes a column filter when:
/// * The column is not present in `filters` → passes (no constraint)
/// * The filter set for that column is empty → nothing selected → fails
/// * The record's value for that column is in the selected set → passes
/// * The record lacks the column → passes only if `Null` is selected
pub fn filtered_indices(network: &ProxyNetwork, filters: &FilterState) -> Vec<usize> {
    network
        .records
        .iter()
        .enumerate()
        .filter(|(_, rec)| {
            filters.iter().all(|(col, selected)| {
                if selected.is_empty() {
                    return false;
                }
                if network
                    .unique_values
                    .get(col)
                    .is_some_and(|all| selected.is_superset(all))
                {
                    return true;
                }
                match rec.metadata.get(col) {
                    Some(val) => selected.contains(val),
                    None => selected.contains(&MetadataValue::Null),
                }
            })
        })
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::ProxySeries;

    fn network() -> ProxyNetwork {
        let mk = |name: &str, code: i64, lat: f64, extra: Option<&str>| {
            let mut metadata = BTreeMap::new();
            if let Some(v) = extra {
                metadata.insert("archive".to_string(), MetadataValue::String(v.into()));
            }
            ProxySeries {
                name: name.into(),
                lat,
                lon: 0.0,
                code,
                time: vec![1.0],
                value: vec![1.0],
                metadata,
            }
        };
        ProxyNetwork::from_series(vec![
            mk("tree-n", 9000, 45.0, Some("itrdb")),
            mk("coral-s", 7000, -10.0, None),
            mk("ice-n", 8000, 70.0, Some("pages")),
        ])
    }

    #[test]
    fn full_selection_keeps_everything() {
        let net = network();
        let filters = init_filter_state(&net);
        assert_eq!(filtered_indices(&net, &filters), vec![0, 1, 2]);
    }

    #[test]
    fn configured_filter_selects_by_type_and_hemisphere() {
        let net = network();
        let mut cfg = BTreeMap::new();
        cfg.insert("hemisphere".to_string(), vec!["NH".to_string()]);
        let filters = filter_from_config(&cfg);
        assert_eq!(filtered_indices(&net, &filters), vec![0, 2]);

        cfg.insert("type".to_string(), vec!["Ice core".to_string()]);
        let filters = filter_from_config(&cfg);
        assert_eq!(filtered_indices(&net, &filters), vec![2]);
    }

    #[test]
    fn empty_selection_hides_all() {
        let net = network();
        let mut filters = FilterState::new();
        filters.insert("type".into(), BTreeSet::new());
        assert!(filtered_indices(&net, &filters).is_empty());
    }

    #[test]
    fn missing_column_passes_only_with_null() {
        let net = network();
        let mut filters = FilterState::new();
        filters.insert(
            "archive".into(),
            [MetadataValue::String("itrdb".into())].into_iter().collect(),
        );
        assert_eq!(filtered_indices(&net, &filters), vec![0]);

        filters
            .get_mut("archive")
            .unwrap()
            .insert(MetadataValue::Null);
        assert_eq!(filtered_indices(&net, &filters), vec![0, 1]);
    }
}
