//! HTTP transport: one blocking, single-flight connection per session.
//!
//! A single `reqwest::blocking::Client` issues one synchronous request at a
//! time outside any async runtime; the session never pipelines or opens a
//! second connection.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::WfctlError;

/// Fixed `User-Agent` sent on every request, including the connection probe.
const USER_AGENT: &str = "wfctl/0.2";

/// Whether a request completed with a status the caller should treat as
/// success (`Nominal`, 200-399) or a server-side failure the caller may
/// still want to inspect (`BadStatus`, 400-599). Connection-level failures
/// never produce an `Outcome`; they short-circuit as `Err(WfctlError::BadConnection)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Nominal,
    BadStatus,
}

/// A completed HTTP response: status, headers (lower-cased names), and body
/// text (empty string, not `None`, when the body is empty -- the caller
/// decides whether an empty body is meaningful).
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// One outbound HTTP request, synchronous and single-flight.
///
/// The connection is reused across calls via `reqwest::blocking::Client`'s
/// internal connection pool; the session never pipelines or issues two
/// requests concurrently.
pub struct Transport {
    client: reqwest::blocking::Client,
    host: String,
    port: u16,
}

impl Transport {
    /// Build a transport targeting `host:port`. No network I/O happens here.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, WfctlError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| WfctlError::BadConnection(e.to_string()))?;
        Ok(Self {
            client,
            host: host.into(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// `HEAD /` with a marker header. The one request in the whole session
    /// that is *not* prefixed with `/api/`.
    pub fn probe_root(&self) -> Result<Response, WfctlError> {
        let url = self.base_url();
        let resp = self
            .client
            .head(&url)
            .header("User-Agent", USER_AGENT)
            .header("X-Clacks-Overhead", "GNU Terry Pratchett")
            .send()
            .map_err(|e| WfctlError::BadConnection(e.to_string()))?;
        Ok(to_response(resp))
    }

    /// Issue one `/api/<resource>` request.
    ///
    /// `suppress_status` only controls whether the caller is expected to
    /// log a failure message itself; the transport always returns the
    /// status/body either way.
    #[allow(clippy::too_many_arguments)]
    pub fn request(
        &self,
        method: &str,
        resource: &str,
        body: Option<String>,
        extra_headers: &[(&str, &str)],
        content_type: Option<&str>,
    ) -> Result<(Outcome, Response), WfctlError> {
        tracing::debug!(method, resource, "outbound request");
        let url = format!("{}/api/{}", self.base_url(), resource.trim_start_matches('/'));
        let method =
            reqwest::Method::from_bytes(method.as_bytes()).map_err(|e| WfctlError::BadConnection(e.to_string()))?;
        let mut req = self
            .client
            .request(method, &url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .header("Content-Type", content_type.unwrap_or("application/json"));
        for (k, v) in extra_headers {
            req = req.header(*k, *v);
        }
        if let Some(b) = body {
            req = req.header("Content-Length", b.len().to_string()).body(b);
        }
        let resp = req.send().map_err(|e| WfctlError::BadConnection(e.to_string()))?;
        let response = to_response(resp);
        let outcome = if (200..400).contains(&response.status) {
            Outcome::Nominal
        } else {
            Outcome::BadStatus
        };
        Ok((outcome, response))
    }
}

fn to_response(resp: reqwest::blocking::Response) -> Response {
    let status = resp.status().as_u16();
    let headers = resp
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_lowercase(), v.to_str().unwrap_or("").to_string()))
        .collect();
    let body = resp.text().unwrap_or_default();
    Response { status, headers, body }
}
