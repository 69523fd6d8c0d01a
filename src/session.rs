//! The control session: state machine, command handlers, and the thin
//! glue between the capability cache, diff store, and commit planner.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde_json::{json, Value};

use crate::caps::CapCache;
use crate::command::{self, forbidden_in_transaction, Command};
use crate::deferred::{plan_batch, DeferredCmd, PatchOp};
use crate::diff::{diff_record, format_change, structurally_equal, DiffRecord, OrigState, Staged};
use crate::error::WfctlError;
use crate::transport::{Outcome, Transport};

/// What the REPL/`exec` loop should do after one command was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Continue,
    Quit,
}

/// A transactional control session against one device.
pub struct Session {
    transport: Transport,
    quiet: bool,
    keepgoing: bool,
    globargs: Vec<String>,
    connect_timeout: Duration,
    request_timeout: Duration,
    transaction: bool,
    diffs: HashMap<String, DiffRecord>,
    deferred: Vec<DeferredCmd>,
    caps: CapCache,
}

impl Session {
    /// Open one connection: `HEAD /`, then `GET env/devname`. Any failure
    /// aborts construction with the matching error.
    pub fn connect(
        host: String,
        port: u16,
        quiet: bool,
        keepgoing: bool,
        globargs: Vec<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, WfctlError> {
        if !quiet {
            println!("Connecting to {}:{}", host, port);
        }
        tracing::info!(host = %host, port, "connecting");
        let transport = Transport::new(host.clone(), port, connect_timeout, request_timeout)?;

        let probe = transport.probe_root()?;
        if !(200..400).contains(&probe.status) {
            eprintln!("Server responded with status {}", probe.status);
            return Err(WfctlError::BadStatus(probe.status));
        }
        if !quiet {
            println!("Connection OK");
        }

        let (outcome, devname_resp) = transport.request("GET", "env/devname", None, &[], None)?;
        if outcome != Outcome::Nominal {
            return Err(WfctlError::BadStatus(devname_resp.status));
        }
        let devname = devname_resp.body.trim().trim_matches('"').to_string();
        tracing::info!(devname = %devname, "connected");
        if !quiet {
            println!("Connected to {} @ {}:{}", devname, host, port);
        }

        Ok(Self {
            transport,
            quiet,
            keepgoing,
            globargs,
            connect_timeout,
            request_timeout,
            transaction: false,
            diffs: HashMap::new(),
            deferred: Vec::new(),
            caps: CapCache::new(),
        })
    }

    pub fn is_transacting(&self) -> bool {
        self.transaction
    }

    fn report_status(&self, outcome: Outcome, status: u16) {
        match outcome {
            Outcome::Nominal => {
                if !self.quiet {
                    println!("SUCCESS: Server responded with status {}", status);
                }
            }
            Outcome::BadStatus => eprintln!("FAILURE: Server responded with status {}", status),
        }
    }

    /// Parse and dispatch one raw command line.
    pub fn dispatch_line(&mut self, line: &str) -> Result<DispatchOutcome, WfctlError> {
        let cmd = command::parse(line, &self.globargs)?;
        self.dispatch(cmd)
    }

    /// Dispatch an already-parsed command.
    pub fn dispatch(&mut self, cmd: Command) -> Result<DispatchOutcome, WfctlError> {
        if self.transaction && forbidden_in_transaction(&cmd) {
            return Err(WfctlError::BadCommand(
                "this command is forbidden inside an open transaction".to_string(),
            ));
        }

        match cmd {
            Command::Quit => return Ok(DispatchOutcome::Quit),
            Command::Fetch { resource } => self.fetch(&resource)?,
            Command::Push { resource, body } => self.push(&resource, &body)?,
            Command::Pushf { resource, path } => {
                let body = read_file_body(&path)?;
                self.push(&resource, &body)?;
            }
            Command::Delete { resource } => self.delete(&resource)?,
            Command::Transact => self.transact(),
            Command::Jp { resource, op, pointer, body } => self.jp_impl(&resource, &op, &pointer, &body)?,
            Command::Jpf { resource, op, pointer, path } => {
                let body = read_file_body(&path)?;
                self.jp_impl(&resource, &op, &pointer, &body)?;
            }
            Command::Exist { resource, pointer } => self.exist(&resource, &pointer)?,
            Command::Jtest { resource, pointer, value } => self.jtest_impl(&resource, &pointer, &value)?,
            Command::Jtestf { resource, pointer, path } => {
                let value = read_file_body(&path)?;
                self.jtest_impl(&resource, &pointer, &value)?;
            }
            Command::Test { resource, body } => self.test_impl(&resource, &body)?,
            Command::Testf { resource, path } => {
                let body = read_file_body(&path)?;
                self.test_impl(&resource, &body)?;
            }
            Command::Diff => self.print_diff(),
            Command::Commit => self.commit()?,
            Command::Abort => self.abort(),
            Command::Exec { path } => self.exec(&path)?,
            Command::Summary => {}
            Command::Start { name } => self.start_stop(&name, true)?,
            Command::Stop { name } => self.start_stop(&name, false)?,
            Command::Reload => self.device_action("reload")?,
            Command::Restart => self.device_action("restart")?,
            Command::Reboot => self.device_action("reboot")?,
            Command::Shutdown => self.device_action("shutdown")?,
        }
        Ok(DispatchOutcome::Continue)
    }

    fn fetch(&mut self, resource: &str) -> Result<(), WfctlError> {
        let (outcome, resp) = self.transport.request("GET", resource, None, &[], None)?;
        self.report_status(outcome, resp.status);
        if outcome != Outcome::Nominal {
            return Err(WfctlError::BadStatus(resp.status));
        }
        println!("{}", resp.body);
        Ok(())
    }

    fn ensure_cached(&mut self, resource: &str, staged: Staged, allow_404: bool) -> Result<(), WfctlError> {
        if self.diffs.contains_key(resource) {
            return Ok(());
        }
        let (outcome, resp) = self.transport.request("GET", resource, None, &[], None)?;
        if outcome != Outcome::Nominal {
            if resp.status == 404 && allow_404 {
                self.diffs.insert(resource.to_string(), DiffRecord::new(OrigState::Missing, staged));
                return Ok(());
            }
            return Err(WfctlError::BadStatus(resp.status));
        }
        let parsed: Value = serde_json::from_str(&resp.body).map_err(|e| WfctlError::BadJson(e.to_string()))?;
        self.diffs.insert(resource.to_string(), DiffRecord::new(OrigState::Value(parsed), staged));
        Ok(())
    }

    fn push(&mut self, resource: &str, body: &str) -> Result<(), WfctlError> {
        self.caps.require(&self.transport, resource, "PUT", "push")?;
        if self.transaction {
            let parsed: Value = serde_json::from_str(body).map_err(|e| WfctlError::BadJson(e.to_string()))?;
            if let Some(rec) = self.diffs.get_mut(resource) {
                rec.staged = Staged::Value(parsed.clone());
            } else {
                self.ensure_cached(resource, Staged::Value(parsed.clone()), true)?;
            }
            self.deferred.push(DeferredCmd::Push { resource: resource.to_string(), body: parsed });
            Ok(())
        } else {
            let (outcome, resp) = self.transport.request("PUT", resource, Some(body.to_string()), &[], None)?;
            self.report_status(outcome, resp.status);
            if outcome == Outcome::Nominal {
                Ok(())
            } else {
                Err(WfctlError::BadStatus(resp.status))
            }
        }
    }

    fn delete(&mut self, resource: &str) -> Result<(), WfctlError> {
        self.caps.require(&self.transport, resource, "DELETE", "delete")?;
        if self.transaction {
            if let Some(rec) = self.diffs.get_mut(resource) {
                rec.staged = Staged::Deleted;
            } else {
                self.ensure_cached(resource, Staged::Deleted, false)?;
            }
            self.deferred.push(DeferredCmd::Delete { resource: resource.to_string() });
            Ok(())
        } else {
            let (outcome, resp) = self.transport.request("DELETE", resource, None, &[], None)?;
            self.report_status(outcome, resp.status);
            if outcome == Outcome::Nominal {
                Ok(())
            } else {
                Err(WfctlError::BadStatus(resp.status))
            }
        }
    }

    fn jp_impl(&mut self, resource: &str, op_str: &str, pointer: &str, body: &str) -> Result<(), WfctlError> {
        self.caps.require(&self.transport, resource, "PATCH", "jp")?;
        let op = PatchOp::parse(op_str)
            .ok_or_else(|| WfctlError::BadCommand(format!("{} is not a supported JSON Patch operation", op_str)))?;

        if self.transaction {
            if !self.diffs.contains_key(resource) {
                self.ensure_cached(resource, Staged::Unset, false)?;
                let rec = self.diffs.get_mut(resource).expect("just cached");
                rec.staged = match &rec.orig {
                    OrigState::Value(v) => Staged::Value(v.clone()),
                    OrigState::Missing => Staged::Deleted,
                };
            }
            let value: Value = serde_json::from_str(body).map_err(|e| WfctlError::BadJson(e.to_string()))?;
            let rec = self.diffs.get_mut(resource).expect("ensured above");
            let mut staged_value = match &rec.staged {
                Staged::Value(v) => v.clone(),
                Staged::Deleted => Value::Null,
                Staged::Unset => Value::Null,
            };
            apply_single_patch(&mut staged_value, op, pointer, value.clone())?;
            rec.staged = Staged::Value(staged_value);
            self.deferred.push(DeferredCmd::Patch {
                resource: resource.to_string(),
                op,
                pointer: pointer.to_string(),
                value,
            });
            Ok(())
        } else {
            validate_pointer(pointer)?;
            let value: Value = serde_json::from_str(body).map_err(|e| WfctlError::BadJson(e.to_string()))?;
            let patch_body = serde_json::to_string(&json!([{"op": op.as_str(), "path": pointer, "value": value}]))
                .expect("serializable");
            let (outcome, resp) =
                self.transport
                    .request("PATCH", resource, Some(patch_body), &[], Some("application/json-patch+json"))?;
            self.report_status(outcome, resp.status);
            if outcome == Outcome::Nominal {
                Ok(())
            } else {
                Err(WfctlError::BadStatus(resp.status))
            }
        }
    }

    fn exist(&mut self, resource: &str, pointer: &str) -> Result<(), WfctlError> {
        let target = format!("{}?ptr={}", resource, pointer);
        let (outcome, resp) = self.transport.request("HEAD", &target, None, &[], None)?;
        match resp.status {
            404 => {
                println!("404 Not Found");
                Ok(())
            }
            422 => {
                println!("422 Failed");
                Ok(())
            }
            _ if outcome == Outcome::Nominal => {
                println!("200 OK");
                Ok(())
            }
            s => Err(WfctlError::BadStatus(s)),
        }
    }

    fn jtest_impl(&mut self, resource: &str, pointer: &str, value_body: &str) -> Result<(), WfctlError> {
        self.caps.require(&self.transport, resource, "PATCH", "jtest")?;
        validate_pointer(pointer)?;
        let value: Value = serde_json::from_str(value_body).map_err(|e| WfctlError::BadJson(e.to_string()))?;
        let patch_body =
            serde_json::to_string(&json!([{"op": "test", "path": pointer, "value": value}])).expect("serializable");
        let (_outcome, resp) =
            self.transport
                .request("PATCH", resource, Some(patch_body), &[], Some("application/json-patch+json"))?;
        match resp.status {
            200 => {
                println!("200 OK");
                Ok(())
            }
            422 => {
                println!("422 Failed");
                Ok(())
            }
            404 => {
                println!("404 Not Found");
                Ok(())
            }
            s => Err(WfctlError::BadStatus(s)),
        }
    }

    fn test_impl(&mut self, resource: &str, body: &str) -> Result<(), WfctlError> {
        self.caps.require(&self.transport, resource, "GET", "test")?;
        let (outcome, resp) = self.transport.request("GET", resource, None, &[], None)?;
        if resp.status == 404 {
            println!("404 Not Found");
            return Ok(());
        }
        if outcome != Outcome::Nominal {
            return Err(WfctlError::BadStatus(resp.status));
        }
        let expected: Value = serde_json::from_str(body).map_err(|e| WfctlError::BadJson(e.to_string()))?;
        let actual: Value = serde_json::from_str(&resp.body).map_err(|e| WfctlError::BadJson(e.to_string()))?;
        if structurally_equal(&expected, &actual) {
            println!("200 OK");
        } else {
            println!("422 Failed");
        }
        Ok(())
    }

    fn print_diff(&self) {
        if !self.transaction {
            return;
        }
        for (resource, rec) in &self.diffs {
            let changes = diff_record(rec);
            if changes.is_empty() {
                continue;
            }
            println!("{}", resource);
            for change in &changes {
                println!("{}", format_change(change));
            }
        }
    }

    fn transact(&mut self) {
        if self.transaction {
            tracing::warn!("redundant transact while already transacting");
            eprintln!("warning: already in a transaction");
        } else {
            self.transaction = true;
            tracing::info!("entering transaction");
        }
    }

    fn commit(&mut self) -> Result<(), WfctlError> {
        if !self.transaction {
            return Ok(());
        }
        self.transaction = false;
        let plan = plan_batch(&self.deferred, self.transport.host(), self.transport.port());
        tracing::info!(requests = plan.len(), "committing batch");
        let descriptors: Vec<Value> = plan
            .iter()
            .map(|r| json!({"method": r.method, "url": r.url, "body": r.body, "headers": r.headers}))
            .collect();
        let batch_body = serde_json::to_string(&Value::Array(descriptors)).expect("serializable");

        let result = self.transport.request("POST", "batch", Some(batch_body), &[], None);
        self.diffs.clear();
        self.deferred.clear();

        match result {
            Ok((outcome, resp)) => {
                self.report_status(outcome, resp.status);
                if outcome == Outcome::Nominal {
                    Ok(())
                } else {
                    Err(WfctlError::BadStatus(resp.status))
                }
            }
            Err(e) => Err(e),
        }
    }

    fn abort(&mut self) {
        self.transaction = false;
        self.diffs.clear();
        self.deferred.clear();
        tracing::info!("transaction aborted");
    }

    fn exec(&mut self, path: &str) -> Result<(), WfctlError> {
        let content = std::fs::read_to_string(path).map_err(|e| WfctlError::BadFile(e.to_string()))?;
        let mut child = Session::connect(
            self.transport.host().to_string(),
            self.transport.port(),
            self.quiet,
            self.keepgoing,
            self.globargs.clone(),
            self.connect_timeout,
            self.request_timeout,
        )?;
        for raw_line in content.lines() {
            let line = raw_line.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            match child.dispatch_line(line) {
                Ok(DispatchOutcome::Quit) => break,
                Ok(DispatchOutcome::Continue) => {}
                Err(e) => {
                    eprintln!("error: {}", e);
                    if !child.keepgoing {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn start_stop(&mut self, name: &str, active: bool) -> Result<(), WfctlError> {
        let body = serde_json::to_string(&json!({"pipeline": name, "active": active})).expect("serializable");
        let (outcome, resp) = self.transport.request("POST", "live/pipelines/running", Some(body), &[], None)?;
        self.report_status(outcome, resp.status);
        if outcome == Outcome::Nominal {
            Ok(())
        } else {
            Err(WfctlError::BadStatus(resp.status))
        }
    }

    fn device_action(&mut self, name: &str) -> Result<(), WfctlError> {
        let (outcome, resp) = self.transport.request("POST", &format!("actions/{}", name), None, &[], None)?;
        self.report_status(outcome, resp.status);
        if outcome == Outcome::Nominal {
            Ok(())
        } else {
            Err(WfctlError::BadStatus(resp.status))
        }
    }
}

fn read_file_body(path: &str) -> Result<String, WfctlError> {
    let p = Path::new(path);
    if !p.exists() {
        return Err(WfctlError::BadFile(format!("file '{}' does not exist", path)));
    }
    if !p.is_file() {
        return Err(WfctlError::BadFile(format!("path '{}' is not a file", path)));
    }
    std::fs::read_to_string(p).map_err(|e| WfctlError::BadFile(e.to_string()))
}

fn validate_pointer(pointer: &str) -> Result<(), WfctlError> {
    if pointer.is_empty() {
        return Ok(());
    }
    jsonptr::PointerBuf::parse(pointer)
        .map(|_| ())
        .map_err(|e| WfctlError::BadPointer(e.to_string()))
}

/// Apply a single RFC 6902 operation to `doc`, classifying the failure mode
/// into a malformed/non-resolving pointer vs. an update conflict.
fn apply_single_patch(doc: &mut Value, op: PatchOp, pointer: &str, value: Value) -> Result<(), WfctlError> {
    validate_pointer(pointer)?;
    let patch_json = json!([{"op": op.as_str(), "path": pointer, "value": value}]);
    let patch: json_patch::Patch = serde_json::from_value(patch_json).map_err(|e| WfctlError::BadJson(e.to_string()))?;
    json_patch::patch(doc, &patch).map_err(classify_patch_error)
}

fn classify_patch_error(e: json_patch::PatchError) -> WfctlError {
    let msg = e.to_string();
    if msg.to_lowercase().contains("pointer") {
        WfctlError::BadPointer(msg)
    } else {
        WfctlError::BadPatch(msg)
    }
}
