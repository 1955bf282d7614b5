use std::collections::HashSet;

use crate::derive::DerivedRecord;
use crate::record::Record;

#[derive(Debug, Clone)]
pub struct InvariantViolation {
    pub msg: String,
}

impl InvariantViolation {
    fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// Derivation keeps length, order and the identity of every row.
pub fn assert_derivation_invariants(
    input: &[Record],
    output: &[DerivedRecord],
) -> Result<(), InvariantViolation> {
    if input.len() != output.len() {
        return Err(InvariantViolation::new(format!(
            "derived {} rows from {} records",
            output.len(),
            input.len()
        )));
    }
    for (i, (rec, row)) in input.iter().zip(output).enumerate() {
        if rec.type_id() != row.type_id {
            return Err(InvariantViolation::new(format!(
                "row {} has type_id {} but record has {}",
                i,
                row.type_id,
                rec.type_id()
            )));
        }
    }
    Ok(())
}

/// A view only hides and reorders: every visible row comes from the input,
/// appears once, and matches the facet when one is set.
pub fn assert_view_invariants(
    input: &[DerivedRecord],
    facet: Option<&str>,
    output: &[&DerivedRecord],
) -> Result<(), InvariantViolation> {
    let known: HashSet<i64> = input.iter().map(|r| r.type_id).collect();
    let mut seen = HashSet::with_capacity(output.len());
    for row in output {
        if !known.contains(&row.type_id) {
            return Err(InvariantViolation::new(format!(
                "type_id {} not in input",
                row.type_id
            )));
        }
        if !seen.insert(row.type_id) {
            return Err(InvariantViolation::new(format!(
                "type_id {} appears twice",
                row.type_id
            )));
        }
        if let Some(f) = facet.filter(|f| !f.is_empty()) {
            if row.group_name != f {
                return Err(InvariantViolation::new(format!(
                    "type_id {} has group {:?}, filter is {:?}",
                    row.type_id, row.group_name, f
                )));
            }
        }
    }
    let expected = match facet {
        Some(f) if !f.is_empty() => input.iter().filter(|r| r.group_name == f).count(),
        _ => input.len(),
    };
    if seen.len() != expected {
        return Err(InvariantViolation::new(format!(
            "view has {} rows, expected {}",
            seen.len(),
            expected
        )));
    }
    Ok(())
}
