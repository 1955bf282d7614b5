//! Metrics derivation: raw records in, derived rows out.
//!
//! Derivation is a pure function of the input records and the price model.
//! Output has the same length and order as the input.

use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::logging::{log, obj, v_num, v_str, Domain, Level, ProfileScope};
use crate::record::{Record, RecordKind, ResultSet};
use crate::view::facet_values;

/// Placeholder unit price until real market prices are wired in.
pub const UNIT_SCALE: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceModel {
    pub unit_scale: f64,
}

impl Default for PriceModel {
    fn default() -> Self {
        Self {
            unit_scale: UNIT_SCALE,
        }
    }
}

impl PriceModel {
    pub fn new(unit_scale: f64) -> Self {
        Self { unit_scale }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DeriveError {
    #[error("type_id {type_id}: field {field} is not a finite number")]
    NonFinite { type_id: i64, field: &'static str },
    #[error("duplicate type_id {type_id}")]
    DuplicateIdentity { type_id: i64 },
    #[error("unit scale must be finite and positive, got {0}")]
    BadUnitScale(f64),
}

/// Material shortfall per hull. The backend does not supply it yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum MaterialGaps {
    Unknown,
    Known(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Numeric,
}

/// Declared type of every sortable field. Names outside this table are
/// treated as numeric and read as zero.
pub const FIELDS: &[(&str, FieldKind)] = &[
    ("name", FieldKind::Text),
    ("group_name", FieldKind::Text),
    ("type_id", FieldKind::Numeric),
    ("quantity", FieldKind::Numeric),
    ("market_stock", FieldKind::Numeric),
    ("gap", FieldKind::Numeric),
    ("kills", FieldKind::Numeric),
    ("opportunity_score", FieldKind::Numeric),
    ("value_lost", FieldKind::Numeric),
    ("hull_gap", FieldKind::Numeric),
    ("material_gaps", FieldKind::Numeric),
];

pub fn field_kind(name: &str) -> FieldKind {
    FIELDS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, kind)| *kind)
        .unwrap_or(FieldKind::Numeric)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedRecord {
    pub kind: RecordKind,
    pub type_id: i64,
    pub name: String,
    /// Facet field. Empty when the backend has no group mapping.
    pub group_name: String,
    pub quantity: f64,
    pub market_stock: f64,
    pub gap: f64,
    pub kills: f64,
    pub opportunity_score: f64,
    pub value_lost: f64,
    pub hull_gap: f64,
    pub material_gaps: MaterialGaps,
}

impl DerivedRecord {
    pub fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "name" => FieldValue::Text(&self.name),
            "group_name" => FieldValue::Text(&self.group_name),
            "type_id" => FieldValue::Number(self.type_id as f64),
            "quantity" => FieldValue::Number(self.quantity),
            "market_stock" => FieldValue::Number(self.market_stock),
            "gap" => FieldValue::Number(self.gap),
            "kills" => FieldValue::Number(self.kills),
            "opportunity_score" => FieldValue::Number(self.opportunity_score),
            "value_lost" => FieldValue::Number(self.value_lost),
            "hull_gap" => FieldValue::Number(self.hull_gap),
            "material_gaps" => match self.material_gaps {
                MaterialGaps::Known(v) => FieldValue::Number(v),
                MaterialGaps::Unknown => FieldValue::Unknown,
            },
            _ => FieldValue::Unknown,
        }
    }
}

pub fn opportunity_score(quantity: f64, market_stock: f64, unit_scale: f64) -> f64 {
    (quantity * unit_scale) / market_stock.max(1.0)
}

fn finite(type_id: i64, field: &'static str, value: f64) -> Result<f64, DeriveError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DeriveError::NonFinite { type_id, field })
    }
}

fn derive_one(record: &Record, model: &PriceModel) -> Result<DerivedRecord, DeriveError> {
    let (type_id, name, group_name, quantity, market_stock, gap, kills) = match record {
        Record::ShipLoss(r) => (
            r.type_id,
            &r.name,
            &r.group_name,
            finite(r.type_id, "quantity", r.quantity)?,
            finite(r.type_id, "market_stock", r.market_stock)?,
            finite(r.type_id, "gap", r.gap)?,
            0.0,
        ),
        Record::TopShip(r) => (
            r.type_id,
            &r.name,
            &r.group_name,
            finite(r.type_id, "losses", r.losses)?,
            0.0,
            0.0,
            finite(r.type_id, "kills", r.kills)?,
        ),
    };
    let score = finite(type_id, "opportunity_score", opportunity_score(quantity, market_stock, model.unit_scale))?;
    let value_lost = finite(type_id, "value_lost", quantity * model.unit_scale)?;
    let hull_gap = finite(type_id, "hull_gap", (quantity - market_stock).max(0.0))?;

    Ok(DerivedRecord {
        kind: record.kind(),
        type_id,
        name: name.clone(),
        group_name: group_name.clone().unwrap_or_default(),
        quantity,
        market_stock,
        gap,
        kills,
        opportunity_score: score,
        value_lost,
        hull_gap,
        material_gaps: MaterialGaps::Unknown,
    })
}

/// Derive every record or none of them.
pub fn derive(records: &[Record], model: &PriceModel) -> Result<Vec<DerivedRecord>, DeriveError> {
    if !model.unit_scale.is_finite() || model.unit_scale <= 0.0 {
        return Err(DeriveError::BadUnitScale(model.unit_scale));
    }
    let _scope = ProfileScope::with_context("derive", &[("rows", v_num(records.len() as f64))]);

    let mut seen = HashSet::with_capacity(records.len());
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.type_id()) {
            return Err(DeriveError::DuplicateIdentity {
                type_id: record.type_id(),
            });
        }
        out.push(derive_one(record, model)?);
    }
    Ok(out)
}

/// Last derived rows and facet list, recomputed only when the result set
/// fingerprint changes.
#[derive(Debug, Clone)]
pub struct MetricsCache {
    model: PriceModel,
    fingerprint: Option<String>,
    rows: Vec<DerivedRecord>,
    facets: Vec<String>,
}

impl MetricsCache {
    pub fn new(model: PriceModel) -> Self {
        Self {
            model,
            fingerprint: None,
            rows: Vec::new(),
            facets: Vec::new(),
        }
    }

    /// Returns `Ok(true)` when the rows were recomputed. On error the
    /// previous rows stay in place.
    pub fn refresh(&mut self, set: &ResultSet) -> Result<bool, DeriveError> {
        if self.fingerprint.as_deref() == Some(set.fingerprint.as_str()) {
            return Ok(false);
        }
        let rows = derive(&set.records, &self.model)?;
        self.facets = facet_values(&rows);
        self.rows = rows;
        self.fingerprint = Some(set.fingerprint.clone());
        log(
            Level::Debug,
            Domain::Pipeline,
            "cache_refresh",
            obj(&[
                ("kind", v_str(set.kind.as_str())),
                ("rows", v_num(self.rows.len() as f64)),
                ("facets", v_num(self.facets.len() as f64)),
                ("fingerprint", v_str(&set.fingerprint)),
            ]),
        );
        Ok(true)
    }

    pub fn rows(&self) -> &[DerivedRecord] {
        &self.rows
    }

    pub fn facets(&self) -> &[String] {
        &self.facets
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }
}
