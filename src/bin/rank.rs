//! Rank a saved result set the way the dashboard table would show it.
//!
//! Usage: `rank <records.json> [sort_field]`
//! The optional field replaces SORT_FIELD; direction still comes from SORT_DIR.
//! Environment: RECORD_KIND, UNIT_SCALE, FACET, SORT_FIELD, SORT_DIR.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;

use warboard::config::Config;
use warboard::derive::derive;
use warboard::logging::{log, obj, v_num, v_str, Domain, Level};
use warboard::record::{load_records, ResultSet};
use warboard::verify::invariants::{assert_derivation_invariants, assert_view_invariants};

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(path) = args.next().map(PathBuf::from) else {
        bail!("usage: rank <records.json> [sort_field]");
    };

    let mut cfg = Config::from_env();
    if let Some(field) = args.next() {
        cfg = cfg.with_sort_field(&field);
    }
    let state = cfg.view_state();

    let records = load_records(cfg.record_kind, &path)
        .with_context(|| format!("loading {}", path.display()))?;
    let set = ResultSet::new(cfg.record_kind, records);
    log(
        Level::Info,
        Domain::System,
        "loaded",
        obj(&[
            ("path", v_str(&path.display().to_string())),
            ("rows", v_num(set.len() as f64)),
            ("fingerprint", v_str(&set.fingerprint)),
        ]),
    );

    let rows = derive(&set.records, &cfg.price_model())?;
    if let Err(v) = assert_derivation_invariants(&set.records, &rows) {
        bail!("derivation invariant: {}", v.msg);
    }
    let visible = state.apply(&rows);
    if let Err(v) = assert_view_invariants(&rows, state.facet.as_deref(), &visible) {
        bail!("view invariant: {}", v.msg);
    }

    println!(
        "{:>10}  {:<28} {:<20} {:>10} {:>10} {:>18} {:>18}",
        "type_id", "name", "group", "quantity", "stock", "opportunity", "value_lost"
    );
    for row in &visible {
        println!(
            "{:>10}  {:<28} {:<20} {:>10.0} {:>10.0} {:>18.2} {:>18.2}",
            row.type_id,
            row.name,
            row.group_name,
            row.quantity,
            row.market_stock,
            row.opportunity_score,
            row.value_lost
        );
    }
    println!(
        "\n{} of {} rows, sorted by {} {}",
        visible.len(),
        rows.len(),
        state.sort.field,
        state.sort.direction.as_str()
    );
    let facets = warboard::view::facet_values(&rows);
    if !facets.is_empty() {
        println!("groups: {}", facets.join(", "));
    }
    Ok(())
}
