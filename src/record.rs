//! Typed record schemas for the result sets handed over by the fetch layer.
//!
//! Payloads arrive as JSON arrays. Each endpoint returns one record kind, and
//! every element must match that kind's schema; a payload that does not is
//! rejected as a whole.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::logging::{log, obj, v_num, v_str, Domain, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// War-room loss row: hulls lost against what the market holds.
    ShipLoss,
    /// Most-destroyed hulls leaderboard row.
    TopShip,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::ShipLoss => "ship_loss",
            RecordKind::TopShip => "top_ship",
        }
    }
}

impl FromStr for RecordKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ship_loss" | "ship-loss" | "losses" => Ok(RecordKind::ShipLoss),
            "top_ship" | "top-ship" | "top_ships" => Ok(RecordKind::TopShip),
            other => Err(RecordError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("payload is not an array (got {0})")]
    NotAnArray(&'static str),
    #[error("element {index} is not an object")]
    NotAnObject { index: usize },
    #[error("element {index} has no integer type_id")]
    MissingIdentity { index: usize },
    #[error("element {index} has no string name")]
    MissingName { index: usize },
    #[error("duplicate type_id {type_id} in result set")]
    DuplicateIdentity { type_id: i64 },
    #[error("element {index} does not match schema: {reason}")]
    Schema { index: usize, reason: String },
    #[error("unknown record kind {0:?}")]
    UnknownKind(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipLoss {
    pub type_id: i64,
    pub name: String,
    pub quantity: f64,
    pub market_stock: f64,
    pub gap: f64,
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopShip {
    pub type_id: i64,
    pub name: String,
    pub group_name: Option<String>,
    pub losses: f64,
    pub kills: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    ShipLoss(ShipLoss),
    TopShip(TopShip),
}

impl Record {
    pub fn type_id(&self) -> i64 {
        match self {
            Record::ShipLoss(r) => r.type_id,
            Record::TopShip(r) => r.type_id,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::ShipLoss(_) => RecordKind::ShipLoss,
            Record::TopShip(_) => RecordKind::TopShip,
        }
    }
}

// Wire shapes. `type_id` and `name` are required. Optional numbers accept
// `null` as well as absence; both collapse to zero when the typed record is
// built.

#[derive(Debug, Deserialize)]
struct ShipLossWire {
    type_id: i64,
    name: String,
    #[serde(default)]
    quantity: Option<f64>,
    #[serde(default)]
    market_stock: Option<f64>,
    #[serde(default)]
    gap: Option<f64>,
    #[serde(default)]
    group_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopShipWire {
    type_id: i64,
    name: String,
    #[serde(default)]
    group_name: Option<String>,
    #[serde(default)]
    losses: Option<f64>,
    #[serde(default)]
    kills: Option<f64>,
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn decode_one(kind: RecordKind, index: usize, value: &Value) -> Result<Record, RecordError> {
    let fields = value
        .as_object()
        .ok_or(RecordError::NotAnObject { index })?;
    if fields.get("type_id").and_then(Value::as_i64).is_none() {
        return Err(RecordError::MissingIdentity { index });
    }
    if !fields.get("name").is_some_and(Value::is_string) {
        return Err(RecordError::MissingName { index });
    }
    let schema_err = |e: serde_json::Error| RecordError::Schema {
        index,
        reason: e.to_string(),
    };
    let record = match kind {
        RecordKind::ShipLoss => {
            let w = ShipLossWire::deserialize(value).map_err(schema_err)?;
            Record::ShipLoss(ShipLoss {
                type_id: w.type_id,
                name: w.name,
                quantity: w.quantity.unwrap_or(0.0),
                market_stock: w.market_stock.unwrap_or(0.0),
                gap: w.gap.unwrap_or(0.0),
                group_name: w.group_name,
            })
        }
        RecordKind::TopShip => {
            let w = TopShipWire::deserialize(value).map_err(schema_err)?;
            Record::TopShip(TopShip {
                type_id: w.type_id,
                name: w.name,
                group_name: w.group_name,
                losses: w.losses.unwrap_or(0.0),
                kills: w.kills.unwrap_or(0.0),
            })
        }
    };
    Ok(record)
}

/// Decode a fetched payload into typed records of one kind.
pub fn decode_records(kind: RecordKind, payload: &Value) -> Result<Vec<Record>, RecordError> {
    let items = payload
        .as_array()
        .ok_or_else(|| RecordError::NotAnArray(json_type_name(payload)))?;

    let mut seen = HashSet::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let record = decode_one(kind, index, item)?;
        if !seen.insert(record.type_id()) {
            return Err(RecordError::DuplicateIdentity {
                type_id: record.type_id(),
            });
        }
        out.push(record);
    }

    log(
        Level::Debug,
        Domain::Pipeline,
        "decode",
        obj(&[("kind", v_str(kind.as_str())), ("rows", v_num(out.len() as f64))]),
    );
    Ok(out)
}

pub fn load_records(kind: RecordKind, path: &Path) -> Result<Vec<Record>, RecordError> {
    let raw = fs::read_to_string(path).map_err(|source| RecordError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let payload: Value = serde_json::from_str(&raw)?;
    decode_records(kind, &payload)
}

/// One fetch worth of records. Never mutated; a refetch builds a new set.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub kind: RecordKind,
    pub records: Vec<Record>,
    pub fingerprint: String,
}

impl ResultSet {
    pub fn new(kind: RecordKind, records: Vec<Record>) -> Self {
        let fingerprint = fingerprint(&records);
        Self {
            kind,
            records,
            fingerprint,
        }
    }

    pub fn from_payload(kind: RecordKind, payload: &Value) -> Result<Self, RecordError> {
        Ok(Self::new(kind, decode_records(kind, payload)?))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// SHA-256 over the canonical JSON encoding of the records.
pub fn fingerprint(records: &[Record]) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        // Serializing plain structs of numbers and strings cannot fail.
        if let Ok(bytes) = serde_json::to_vec(record) {
            hasher.update(&bytes);
        }
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
