//! Deferred-command log and commit planner.
//!
//! During a transaction, mutating commands append to an ordered
//! `Vec<DeferredCmd>` instead of touching the network. `commit` walks that
//! log once and emits a sequence of coalesced `BatchRequest`s, run-length
//! merging consecutive `Patch` entries that target the same resource.

use std::collections::HashMap;

use serde_json::{json, Value};

/// A single RFC 6902 JSON-Patch operation kind accepted by `jp`/`jpf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
}

impl PatchOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            "replace" => Some(Self::Replace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
        }
    }
}

/// One mutation accepted while a transaction was open. Insertion order here
/// is the order `commit` walks the log in, and is therefore the commit
/// order modulo same-resource patch coalescing.
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredCmd {
    Push { resource: String, body: Value },
    Delete { resource: String },
    Patch { resource: String, op: PatchOp, pointer: String, value: Value },
}

/// One outbound descriptor in the final `POST /api/batch` array.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub method: String,
    pub url: String,
    pub body: Option<String>,
    pub headers: HashMap<String, String>,
}

fn base_headers(host: &str, port: u16, has_body: bool, body_len: usize, content_type: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("Accept".to_string(), "application/json".to_string());
    headers.insert("User-Agent".to_string(), "wfctl/0.2".to_string());
    headers.insert("Host".to_string(), format!("{}:{}", host, port));
    if has_body {
        headers.insert("Content-Type".to_string(), content_type.to_string());
        headers.insert("Content-Length".to_string(), body_len.to_string());
    }
    headers
}

/// Flush an in-progress same-resource patch run into one `BatchRequest`.
fn flush_patch_run(resource: &str, ops: &[(PatchOp, String, Value)], host: &str, port: u16) -> BatchRequest {
    let body_value: Value = Value::Array(
        ops.iter()
            .map(|(op, ptr, val)| json!({"op": op.as_str(), "path": ptr, "value": val}))
            .collect(),
    );
    let body = serde_json::to_string(&body_value).unwrap_or_else(|_| "[]".to_string());
    BatchRequest {
        method: "PATCH".to_string(),
        url: format!("/api/{}", resource),
        headers: base_headers(host, port, true, body.len(), "application/json-patch+json"),
        body: Some(body),
    }
}

/// Walk the deferred-command log and produce the coalesced `BatchRequest`
/// sequence that `commit` sends inside the single enclosing `POST batch`.
///
/// Each patch run starts fresh at its first entry; there is no initial
/// "previous resource" to compare the first patch against. A maximal run of
/// consecutive same-resource `Push` entries collapses the same way, down to
/// a single `PUT` carrying the last body staged.
pub fn plan_batch(deferred: &[DeferredCmd], host: &str, port: u16) -> Vec<BatchRequest> {
    let mut out = Vec::new();
    let mut run_resource: Option<String> = None;
    let mut run_ops: Vec<(PatchOp, String, Value)> = Vec::new();
    let mut last_push_resource: Option<String> = None;

    macro_rules! flush {
        () => {
            if let Some(r) = run_resource.take() {
                if !run_ops.is_empty() {
                    out.push(flush_patch_run(&r, &run_ops, host, port));
                }
                run_ops.clear();
            }
        };
    }

    for cmd in deferred {
        match cmd {
            DeferredCmd::Patch { resource, op, pointer, value } => {
                if run_resource.as_deref() != Some(resource.as_str()) {
                    flush!();
                    run_resource = Some(resource.clone());
                }
                run_ops.push((*op, pointer.clone(), value.clone()));
                last_push_resource = None;
            }
            DeferredCmd::Push { resource, body } => {
                flush!();
                let body_str = serde_json::to_string(body).unwrap_or_else(|_| "null".to_string());
                let request = BatchRequest {
                    method: "PUT".to_string(),
                    url: format!("/api/{}", resource),
                    headers: base_headers(host, port, true, body_str.len(), "application/json"),
                    body: Some(body_str),
                };
                if last_push_resource.as_deref() == Some(resource.as_str()) {
                    *out.last_mut().expect("last_push_resource implies a prior Push entry in out") = request;
                } else {
                    out.push(request);
                }
                last_push_resource = Some(resource.clone());
            }
            DeferredCmd::Delete { resource } => {
                flush!();
                out.push(BatchRequest {
                    method: "DELETE".to_string(),
                    url: format!("/api/{}", resource),
                    headers: base_headers(host, port, false, 0, "application/json"),
                    body: None,
                });
                last_push_resource = None;
            }
        }
    }
    flush!();
    out
}
