//! Capability cache: `OPTIONS`-driven gating of mutating operations.

use std::collections::{HashMap, HashSet};

use crate::error::WfctlError;
use crate::transport::{Outcome, Transport};

/// Per-resource set of uppercase HTTP method names the server allows.
/// Populated on first demand via an `OPTIONS` probe and never invalidated
/// within a session.
#[derive(Debug, Default)]
pub struct CapCache {
    cache: HashMap<String, HashSet<String>>,
}

impl CapCache {
    pub fn new() -> Self {
        Self { cache: HashMap::new() }
    }

    /// Return the cached capability set for `resource`, probing with
    /// `OPTIONS` on first demand.
    pub fn caps_of(&mut self, transport: &Transport, resource: &str) -> Result<&HashSet<String>, WfctlError> {
        if !self.cache.contains_key(resource) {
            let (outcome, response) = transport.request("OPTIONS", resource, None, &[], None)?;
            if outcome != Outcome::Nominal {
                return Err(WfctlError::BadStatus(response.status));
            }
            let allow = response
                .headers
                .get("allow")
                .ok_or_else(|| WfctlError::BadHeader(resource.to_string()))?;
            let methods: HashSet<String> = allow.split(',').map(|m| m.trim().to_uppercase()).filter(|m| !m.is_empty()).collect();
            self.cache.insert(resource.to_string(), methods);
        }
        Ok(self.cache.get(resource).expect("just inserted"))
    }

    /// Require `method` to be present in `resource`'s capability set,
    /// fetching it if necessary. `context` names the command for the error
    /// message (e.g. `"push"`, `"jpf"`).
    pub fn require(
        &mut self,
        transport: &Transport,
        resource: &str,
        method: &str,
        context: &str,
    ) -> Result<(), WfctlError> {
        let caps = self.caps_of(transport, resource)?;
        if caps.contains(method) {
            Ok(())
        } else {
            Err(WfctlError::BadCommand(format!("{} is forbidden for '{}'", context, resource)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_allow_header() {
        let mut cache = CapCache::new();
        cache.cache.insert("cfg/net".to_string(), ["GET", "PUT", "PATCH"].iter().map(|s| s.to_string()).collect());
        let caps = cache.cache.get("cfg/net").unwrap();
        assert!(caps.contains("PUT"));
        assert!(!caps.contains("DELETE"));
    }

    #[test]
    fn require_rejects_missing_method_without_network() {
        let mut cache = CapCache::new();
        cache.cache.insert("env/devname".to_string(), ["GET"].iter().map(|s| s.to_string()).collect());
        let caps = cache.cache.get("env/devname").unwrap();
        assert!(!caps.contains("DELETE"));
    }
}
