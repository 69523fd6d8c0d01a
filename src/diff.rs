//! Diff store and structural JSON diffing.
//!
//! The staged/orig pair is an explicit tri-state rather than an overloaded
//! `None`, and the change feed printed by `diff` is produced by a
//! purpose-built recursive walk rather than an external deep-diff
//! dependency whose output shape would otherwise leak into the command
//! handlers.

use std::collections::HashSet;

use serde_json::Value;

/// What the server last reported for a resource, at the moment staging
/// began.
#[derive(Debug, Clone, PartialEq)]
pub enum OrigState {
    /// `GET` returned 404 at staging time -- the resource did not exist.
    Missing,
    Value(Value),
}

/// What the client intends to do to a resource once `commit` runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Staged {
    /// Never constructed inside the diff store itself: a `DiffRecord`
    /// exists only once a mutation has staged `Deleted` or `Value`.
    Unset,
    Deleted,
    Value(Value),
}

/// One resource's pending transaction state.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffRecord {
    pub orig: OrigState,
    pub staged: Staged,
}

impl DiffRecord {
    pub fn new(orig: OrigState, staged: Staged) -> Self {
        Self { orig, staged }
    }
}

/// One structural difference between `orig` and `staged`, anchored at a
/// JSON-Pointer-like path.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOp {
    Changed,
    Added,
    Removed,
    TypeChanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub op: ChangeOp,
    pub pointer: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// RFC 6901 pointer-token escaping: `~` -> `~0`, `/` -> `~1`.
fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Recursively diff `before` against `after`, appending every change found
/// to `out`. Object keys are walked in a fixed sorted order purely for
/// determinism of our own output.
fn walk(pointer: &str, before: &Value, after: &Value, out: &mut Vec<Change>) {
    if before == after {
        return;
    }
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => {
            let mut keys: Vec<&String> = b.keys().chain(a.keys()).collect::<HashSet<_>>().into_iter().collect();
            keys.sort();
            for key in keys {
                let child_ptr = format!("{}/{}", pointer, escape_token(key));
                match (b.get(key), a.get(key)) {
                    (Some(bv), Some(av)) => walk(&child_ptr, bv, av, out),
                    (Some(bv), None) => out.push(Change {
                        op: ChangeOp::Removed,
                        pointer: child_ptr,
                        before: Some(bv.clone()),
                        after: None,
                    }),
                    (None, Some(av)) => out.push(Change {
                        op: ChangeOp::Added,
                        pointer: child_ptr,
                        before: None,
                        after: Some(av.clone()),
                    }),
                    (None, None) => unreachable!("key came from union of both maps"),
                }
            }
        }
        (Value::Array(b), Value::Array(a)) => {
            let max = b.len().max(a.len());
            for i in 0..max {
                let child_ptr = format!("{}/{}", pointer, i);
                match (b.get(i), a.get(i)) {
                    (Some(bv), Some(av)) => walk(&child_ptr, bv, av, out),
                    (Some(bv), None) => out.push(Change {
                        op: ChangeOp::Removed,
                        pointer: child_ptr,
                        before: Some(bv.clone()),
                        after: None,
                    }),
                    (None, Some(av)) => out.push(Change {
                        op: ChangeOp::Added,
                        pointer: child_ptr,
                        before: None,
                        after: Some(av.clone()),
                    }),
                    (None, None) => unreachable!("i < max(len, len)"),
                }
            }
        }
        (b, a) if type_name(b) != type_name(a) => out.push(Change {
            op: ChangeOp::TypeChanged,
            pointer: pointer.to_string(),
            before: Some(b.clone()),
            after: Some(a.clone()),
        }),
        (b, a) => out.push(Change {
            op: ChangeOp::Changed,
            pointer: pointer.to_string(),
            before: Some(b.clone()),
            after: Some(a.clone()),
        }),
    }
}

/// Diff a resource's `orig`/`staged` pair into a flat change list, treating
/// `OrigState::Missing` as a `null` document and `Staged::Deleted` as a
/// `null` document, matching the JSON representation the server would see
/// after the mutation.
pub fn diff_record(record: &DiffRecord) -> Vec<Change> {
    let before = match &record.orig {
        OrigState::Missing => Value::Null,
        OrigState::Value(v) => v.clone(),
    };
    let after = match &record.staged {
        Staged::Unset => return Vec::new(),
        Staged::Deleted => Value::Null,
        Staged::Value(v) => v.clone(),
    };
    let mut out = Vec::new();
    walk("", &before, &after, &mut out);
    out
}

/// Format one change the way `diff` prints it: two-space indent, tag
/// prefixes for additions/removals, bare `ptr: a -> b` for value changes,
/// `ptr: t1 -> t2` for type changes.
pub fn format_change(c: &Change) -> String {
    let ptr = if c.pointer.is_empty() { "/" } else { c.pointer.as_str() };
    match c.op {
        ChangeOp::Added => format!("  [NEW] {}: {}", ptr, c.after.as_ref().unwrap()),
        ChangeOp::Removed => format!("  [DELETE] {}: {}", ptr, c.before.as_ref().unwrap()),
        ChangeOp::TypeChanged => format!(
            "  {}: {} -> {}",
            ptr,
            type_name(c.before.as_ref().unwrap()),
            type_name(c.after.as_ref().unwrap())
        ),
        ChangeOp::Changed => format!("  {}: {} -> {}", ptr, c.before.as_ref().unwrap(), c.after.as_ref().unwrap()),
    }
}

/// Structural JSON equality used by `test`/`testf`: objects compared by key
/// set and per-key value-equality, arrays positionally, numbers/strings by
/// value. `serde_json::Value`'s own `PartialEq` already implements exactly
/// this (maps compare as maps regardless of insertion order; numbers
/// compare by value), so this is a thin, self-documenting wrapper rather
/// than a hand-rolled comparator.
pub fn structurally_equal(a: &Value, b: &Value) -> bool {
    a == b
}
