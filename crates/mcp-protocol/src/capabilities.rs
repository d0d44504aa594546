//! Server capability flags.
//!
//! A capability that is disabled makes its methods behave as if they were
//! never registered: `-32601 Method not found`, not a distinct error
//! code. Kept minimal relative to the source protocol's negotiated
//! capability object, since this implementation has no client-visible
//! `initialize` handshake to negotiate them over.

use serde::{Deserialize, Serialize};

/// Which method groups a server instance exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Enables `list_resources` / `list_resource_templates` / `read_resource`.
    pub resources: bool,
    /// Enables `list_tools` / `call_tool`.
    pub tools: bool,
}

impl Capabilities {
    /// Every method group enabled.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            resources: true,
            tools: true,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enables_everything() {
        let caps = Capabilities::default();
        assert!(caps.resources);
        assert!(caps.tools);
    }
}
