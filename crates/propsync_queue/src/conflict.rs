//! Conflict detection and merge strategies.
//!
//! Records are JSON objects (`serde_json::Value`). Everything here is pure:
//! inputs are never mutated and no I/O happens. Reconciliation of a cached
//! entity against its remote copy is a single call producing a merged value.

use serde_json::{Map, Value};

/// Field names carrying a record's modification timestamp, in lookup order.
const TIMESTAMP_FIELDS: [&str; 2] = ["last_modified", "updated_at"];

/// Rule for picking the winning value when two copies of a record disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Every field present in the source overwrites the target.
    PreferSource,
    /// The target wins; the source only fills in fields the target lacks.
    PreferTarget,
    /// The side with the larger modification timestamp wins per conflicting
    /// field; ties (and records without timestamps) favor the target.
    PreferNewest,
}

/// A single field mismatch between two records.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDifference {
    /// Field name.
    pub field: String,
    /// Value on the first record, if present.
    pub left: Option<Value>,
    /// Value on the second record, if present.
    pub right: Option<Value>,
}

/// Result of a consistency check over named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsistencyReport {
    /// True when every checked field matched.
    pub consistent: bool,
    /// Mismatched fields with both sides' values.
    pub differences: Vec<FieldDifference>,
}

/// Compares the named fields of two records without mutating either.
pub fn check_consistency(a: &Value, b: &Value, fields: &[&str]) -> ConsistencyReport {
    let mut differences = Vec::new();

    for &field in fields {
        let left = a.get(field);
        let right = b.get(field);
        if left != right {
            differences.push(FieldDifference {
                field: field.to_string(),
                left: left.cloned(),
                right: right.cloned(),
            });
        }
    }

    ConsistencyReport {
        consistent: differences.is_empty(),
        differences,
    }
}

/// Merges `source` into `target` according to `strategy`, returning the
/// merged record. Neither input is modified.
///
/// Non-object inputs degenerate to whole-value selection: `PreferSource`
/// yields the source, the other strategies yield the target.
pub fn merge(target: &Value, source: &Value, strategy: MergeStrategy) -> Value {
    let (Some(target_map), Some(source_map)) = (target.as_object(), source.as_object()) else {
        return match strategy {
            MergeStrategy::PreferSource => source.clone(),
            MergeStrategy::PreferTarget | MergeStrategy::PreferNewest => target.clone(),
        };
    };

    match strategy {
        MergeStrategy::PreferSource => overlay(target_map, source_map),
        MergeStrategy::PreferTarget => underlay(target_map, source_map),
        MergeStrategy::PreferNewest => {
            // Each side's timestamp decides conflicting fields wholesale; a
            // side without a timestamp counts as older, ties favor target.
            if modification_timestamp(source_map) > modification_timestamp(target_map) {
                overlay(target_map, source_map)
            } else {
                underlay(target_map, source_map)
            }
        }
    }
}

/// Source fields overwrite target fields.
fn overlay(target: &Map<String, Value>, source: &Map<String, Value>) -> Value {
    let mut merged = target.clone();
    for (key, value) in source {
        merged.insert(key.clone(), value.clone());
    }
    Value::Object(merged)
}

/// Source fields only fill gaps in the target.
fn underlay(target: &Map<String, Value>, source: &Map<String, Value>) -> Value {
    let mut merged = target.clone();
    for (key, value) in source {
        merged.entry(key.clone()).or_insert_with(|| value.clone());
    }
    Value::Object(merged)
}

fn modification_timestamp(record: &Map<String, Value>) -> f64 {
    TIMESTAMP_FIELDS
        .iter()
        .find_map(|field| record.get(*field).and_then(Value::as_f64))
        .unwrap_or(f64::NEG_INFINITY)
}

/// A transient pair of diverging record copies and the strategy for
/// reconciling them, consumed within a single resolution call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictRecord {
    /// The locally cached copy (the merge target).
    pub local: Value,
    /// The remote copy (the merge source).
    pub remote: Value,
    /// Resolution strategy.
    pub strategy: MergeStrategy,
}

impl ConflictRecord {
    /// Creates a conflict record.
    pub fn new(local: Value, remote: Value, strategy: MergeStrategy) -> Self {
        Self {
            local,
            remote,
            strategy,
        }
    }

    /// Resolves the conflict, producing the merged record.
    pub fn resolve(&self) -> Value {
        merge(&self.local, &self.remote, self.strategy)
    }
}
