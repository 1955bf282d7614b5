//! Facet filtering and sorting of derived rows.
//!
//! Everything here borrows the derived set and returns references into it,
//! so a view can never drop, duplicate or alter a row; it only hides and
//! reorders them.
//!
//! Ordering is total and deterministic. Ties on the sort field break by
//! `type_id`, and descending order is the exact mirror of ascending order,
//! so toggling direction always reverses the visible rows.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::derive::{field_kind, DerivedRecord, FieldKind, FieldValue};
use crate::logging::{log, obj, v_num, v_str, Domain, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(format!("unknown sort direction: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Header-click rule: the active field flips direction, any other field
    /// becomes active in descending order.
    pub fn toggled(&self, field: &str) -> SortSpec {
        if self.field == field {
            SortSpec::new(field, self.direction.flipped())
        } else {
            SortSpec::new(field, SortDirection::Descending)
        }
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec::new("opportunity_score", SortDirection::Descending)
    }
}

/// Distinct non-empty group names, sorted lexicographically.
pub fn facet_values(records: &[DerivedRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|r| !r.group_name.is_empty())
        .map(|r| r.group_name.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Case-sensitive exact match on `group_name`. `None` or `""` keeps every row.
pub fn filter_by_facet<'a>(records: &'a [DerivedRecord], facet: Option<&str>) -> Vec<&'a DerivedRecord> {
    match facet {
        Some(f) if !f.is_empty() => records.iter().filter(|r| r.group_name == f).collect(),
        _ => records.iter().collect(),
    }
}

fn text_of<'a>(record: &'a DerivedRecord, field: &str) -> &'a str {
    match record.field(field) {
        FieldValue::Text(s) => s,
        _ => "",
    }
}

fn number_of(record: &DerivedRecord, field: &str) -> f64 {
    match record.field(field) {
        // -0.0 and 0.0 must tie under total_cmp
        FieldValue::Number(v) if v.is_finite() && v != 0.0 => v,
        _ => 0.0,
    }
}

/// Case-folded comparison first, raw comparison only to order strings that
/// differ by case alone.
pub fn compare_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| a.cmp(b))
}

/// Ascending comparison on `field`, ties broken by `type_id`.
pub fn compare_by(a: &DerivedRecord, b: &DerivedRecord, field: &str) -> Ordering {
    let primary = match field_kind(field) {
        FieldKind::Text => compare_text(text_of(a, field), text_of(b, field)),
        FieldKind::Numeric => number_of(a, field).total_cmp(&number_of(b, field)),
    };
    primary.then_with(|| a.type_id.cmp(&b.type_id))
}

pub fn sort_rows(rows: &mut [&DerivedRecord], spec: &SortSpec) {
    match spec.direction {
        SortDirection::Ascending => rows.sort_by(|a, b| compare_by(a, b, &spec.field)),
        SortDirection::Descending => rows.sort_by(|a, b| compare_by(b, a, &spec.field)),
    }
}

/// The rows to render for one facet selection and sort spec.
pub fn view<'a>(
    records: &'a [DerivedRecord],
    facet: Option<&str>,
    spec: &SortSpec,
) -> Vec<&'a DerivedRecord> {
    let mut rows = filter_by_facet(records, facet);
    sort_rows(&mut rows, spec);
    log(
        Level::Trace,
        Domain::View,
        "view",
        obj(&[
            ("facet", v_str(facet.unwrap_or(""))),
            ("field", v_str(&spec.field)),
            ("direction", v_str(spec.direction.as_str())),
            ("rows_in", v_num(records.len() as f64)),
            ("rows_out", v_num(rows.len() as f64)),
        ]),
    );
    rows
}

/// Caller-owned table state: the selected facet and the active sort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub facet: Option<String>,
    pub sort: SortSpec,
}

impl ViewState {
    pub fn new(facet: Option<String>, sort: SortSpec) -> Self {
        Self { facet, sort }
    }

    pub fn select_sort(&mut self, field: &str) {
        self.sort = self.sort.toggled(field);
    }

    pub fn set_facet(&mut self, facet: Option<&str>) {
        self.facet = facet.filter(|f| !f.is_empty()).map(str::to_string);
    }

    pub fn apply<'a>(&self, records: &'a [DerivedRecord]) -> Vec<&'a DerivedRecord> {
        view(records, self.facet.as_deref(), &self.sort)
    }
}
