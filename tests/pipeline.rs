//! End-to-end checks of decode -> derive -> view on fetched-style payloads.

use std::collections::BTreeSet;
use std::fs;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tempfile::TempDir;

use warboard::derive::{derive, DerivedRecord, MetricsCache, PriceModel};
use warboard::record::{decode_records, load_records, RecordError, RecordKind, ResultSet};
use warboard::verify::invariants::{assert_derivation_invariants, assert_view_invariants};
use warboard::view::{facet_values, filter_by_facet, sort_rows, view, SortDirection, SortSpec, ViewState};

const GROUPS: [&str; 4] = ["Frigate", "Destroyer", "Cruiser", "Battleship"];
const SORT_FIELDS: [&str; 7] = [
    "name",
    "group_name",
    "quantity",
    "market_stock",
    "opportunity_score",
    "hull_gap",
    "no_such_field",
];

/// Ship-loss payload with repeated values so ties are common.
fn random_payload(rng: &mut StdRng, n: usize) -> Value {
    let rows: Vec<Value> = (0..n)
        .map(|i| {
            let mut row = json!({
                "type_id": 1000 + i as i64,
                "name": format!("Hull {}", rng.gen_range(0..5)),
                "quantity": rng.gen_range(0..6),
                "market_stock": rng.gen_range(0..4),
            });
            if rng.gen_bool(0.8) {
                row["group_name"] = json!(GROUPS[rng.gen_range(0..GROUPS.len())]);
            }
            row
        })
        .collect();
    Value::Array(rows)
}

fn ids(rows: &[&DerivedRecord]) -> Vec<i64> {
    rows.iter().map(|r| r.type_id).collect()
}

#[test]
fn concrete_scenario_rifter_before_atron() {
    let payload = json!([
        {"type_id": 1, "name": "Rifter", "quantity": 10, "market_stock": 5},
        {"type_id": 2, "name": "Atron", "quantity": 3, "market_stock": 100}
    ]);
    let records = decode_records(RecordKind::ShipLoss, &payload).unwrap();
    let rows = derive(&records, &PriceModel::new(1_000_000.0)).unwrap();
    assert_eq!(rows[0].opportunity_score, 2_000_000.0);
    assert_eq!(rows[1].opportunity_score, 30_000.0);

    let spec = SortSpec::new("opportunity_score", SortDirection::Descending);
    let names: Vec<&str> = view(&rows, None, &spec).iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Rifter", "Atron"]);
}

#[test]
fn absent_facet_yields_empty_view() {
    let payload = json!([{"type_id": 1, "name": "Rifter", "group_name": "Frigate"}]);
    let rows = derive(&decode_records(RecordKind::ShipLoss, &payload).unwrap(), &PriceModel::default()).unwrap();
    assert!(view(&rows, Some("Titan"), &SortSpec::default()).is_empty());
}

#[test]
fn derivation_preserves_length_and_identity() {
    let mut rng = StdRng::seed_from_u64(7);
    for n in [0, 1, 5, 40] {
        let records = decode_records(RecordKind::ShipLoss, &random_payload(&mut rng, n)).unwrap();
        let rows = derive(&records, &PriceModel::default()).unwrap();
        assert_eq!(rows.len(), records.len());
        assert_derivation_invariants(&records, &rows).unwrap();
        let in_ids: BTreeSet<i64> = records.iter().map(|r| r.type_id()).collect();
        let out_ids: BTreeSet<i64> = rows.iter().map(|r| r.type_id).collect();
        assert_eq!(in_ids, out_ids);
    }
}

#[test]
fn derivation_is_repeatable() {
    let mut rng = StdRng::seed_from_u64(11);
    let records = decode_records(RecordKind::ShipLoss, &random_payload(&mut rng, 25)).unwrap();
    let a = derive(&records, &PriceModel::default()).unwrap();
    let b = derive(&records, &PriceModel::default()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn facet_filter_keeps_exactly_matching_rows() {
    let mut rng = StdRng::seed_from_u64(3);
    let records = decode_records(RecordKind::ShipLoss, &random_payload(&mut rng, 60)).unwrap();
    let rows = derive(&records, &PriceModel::default()).unwrap();

    let facets = facet_values(&rows);
    let mut sorted = facets.clone();
    sorted.sort();
    assert_eq!(facets, sorted);

    for facet in &facets {
        let out = filter_by_facet(&rows, Some(facet.as_str()));
        assert!(!out.is_empty());
        assert!(out.iter().all(|r| &r.group_name == facet));
        assert_view_invariants(&rows, Some(facet.as_str()), &out).unwrap();
    }

    let all = filter_by_facet(&rows, None);
    assert_view_invariants(&rows, None, &all).unwrap();
    assert_eq!(ids(&all), rows.iter().map(|r| r.type_id).collect::<Vec<_>>());
}

#[test]
fn toggling_direction_reverses_and_sorting_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(42);
    let records = decode_records(RecordKind::ShipLoss, &random_payload(&mut rng, 50)).unwrap();
    let rows = derive(&records, &PriceModel::default()).unwrap();

    for field in SORT_FIELDS {
        let desc = SortSpec::new(field, SortDirection::Descending);
        let asc = desc.toggled(field);
        assert_eq!(asc.direction, SortDirection::Ascending);

        let down = view(&rows, None, &desc);
        let mut up = ids(&view(&rows, None, &asc));
        up.reverse();
        assert_eq!(ids(&down), up, "field {}", field);

        let mut again = down.clone();
        sort_rows(&mut again, &desc);
        assert_eq!(ids(&again), ids(&down), "field {}", field);
        assert_view_invariants(&rows, None, &down).unwrap();
    }
}

#[test]
fn numeric_sort_is_ordered() {
    let mut rng = StdRng::seed_from_u64(5);
    let records = decode_records(RecordKind::ShipLoss, &random_payload(&mut rng, 30)).unwrap();
    let rows = derive(&records, &PriceModel::default()).unwrap();
    let out = view(&rows, None, &SortSpec::new("opportunity_score", SortDirection::Descending));
    for pair in out.windows(2) {
        assert!(pair[0].opportunity_score >= pair[1].opportunity_score);
    }
}

#[test]
fn view_state_drives_table_like_a_header_click() {
    let payload = json!([
        {"type_id": 1, "name": "Rifter", "quantity": 10, "market_stock": 5, "group_name": "Frigate"},
        {"type_id": 2, "name": "Atron", "quantity": 3, "market_stock": 100, "group_name": "Frigate"},
        {"type_id": 3, "name": "Thorax", "quantity": 8, "market_stock": 2, "group_name": "Cruiser"}
    ]);
    let rows = derive(&decode_records(RecordKind::ShipLoss, &payload).unwrap(), &PriceModel::default()).unwrap();

    let mut state = ViewState::default();
    assert_eq!(ids(&state.apply(&rows)), vec![3, 1, 2]);

    state.select_sort("name");
    assert_eq!(state.sort.direction, SortDirection::Descending);
    assert_eq!(ids(&state.apply(&rows)), vec![3, 1, 2]);

    state.select_sort("name");
    assert_eq!(ids(&state.apply(&rows)), vec![2, 1, 3]);

    state.set_facet(Some("Frigate"));
    assert_eq!(ids(&state.apply(&rows)), vec![2, 1]);
}

#[test]
fn cache_follows_refetches() {
    let mut cache = MetricsCache::new(PriceModel::default());
    let first = ResultSet::from_payload(
        RecordKind::TopShip,
        &json!([{"type_id": 1, "name": "Catalyst", "losses": 4, "group_name": "Destroyer"}]),
    )
    .unwrap();
    assert!(cache.refresh(&first).unwrap());
    assert_eq!(cache.facets(), ["Destroyer".to_string()]);

    let same = ResultSet::from_payload(
        RecordKind::TopShip,
        &json!([{"type_id": 1, "name": "Catalyst", "losses": 4, "group_name": "Destroyer"}]),
    )
    .unwrap();
    assert!(!cache.refresh(&same).unwrap());

    let next = ResultSet::from_payload(
        RecordKind::TopShip,
        &json!([
            {"type_id": 1, "name": "Catalyst", "losses": 5, "group_name": "Destroyer"},
            {"type_id": 2, "name": "Venture", "losses": 9, "group_name": "Frigate"}
        ]),
    )
    .unwrap();
    assert!(cache.refresh(&next).unwrap());
    assert_eq!(cache.rows().len(), 2);
    assert_eq!(cache.facets(), ["Destroyer".to_string(), "Frigate".to_string()]);
}

#[test]
fn loads_records_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("losses.json");
    fs::write(&path, r#"[{"type_id": 1, "name": "Rifter", "quantity": 2}]"#).unwrap();
    let records = load_records(RecordKind::ShipLoss, &path).unwrap();
    assert_eq!(records.len(), 1);

    let bad = dir.path().join("bad.json");
    fs::write(&bad, "{not json").unwrap();
    assert!(matches!(load_records(RecordKind::ShipLoss, &bad), Err(RecordError::Json(_))));

    let missing = dir.path().join("missing.json");
    assert!(matches!(load_records(RecordKind::ShipLoss, &missing), Err(RecordError::Io { .. })));
}

#[test]
fn malformed_payloads_fail_fast() {
    assert!(matches!(
        decode_records(RecordKind::ShipLoss, &json!("rows")),
        Err(RecordError::NotAnArray("string"))
    ));
    assert!(matches!(
        decode_records(RecordKind::ShipLoss, &json!([1, 2])),
        Err(RecordError::NotAnObject { index: 0 })
    ));
    assert!(matches!(
        decode_records(RecordKind::ShipLoss, &json!([{"type_id": 1, "name": "Rifter"}, {"name": "x"}])),
        Err(RecordError::MissingIdentity { index: 1 })
    ));
}
