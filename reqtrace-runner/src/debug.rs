// Copyright (c) The reqtrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auto-engagement of the interactive-debugging facility.
//!
//! The actual attach mechanics (listening socket, client handshake) belong to
//! an external debugger facility; this module only decides *whether* to
//! engage it and tracks the engaged state. Engagement may be requested at
//! several lifecycle points (session start, collection), so it is idempotent;
//! it is a no-op on worker processes and on CI.

use crate::config::PluginConfig;
use tracing::warn;

/// Environment variable overriding the host announced for debugger attach.
pub const DEBUG_HOST_ENV: &str = "REQTRACE_DEBUG_HOST";

/// Environment variable overriding the port announced for debugger attach.
pub const DEBUG_PORT_ENV: &str = "REQTRACE_DEBUG_PORT";

const DEFAULT_DEBUG_HOST: &str = "0.0.0.0";
const DEFAULT_DEBUG_PORT: u16 = 5679;

/// Tracks whether the external debugger facility has been engaged for this
/// process.
#[derive(Debug, Default)]
pub struct AutoDebugger {
    listening: bool,
}

impl AutoDebugger {
    /// Creates a debugger in the not-engaged state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engages the debugger facility if configuration asks for it.
    ///
    /// No-op on worker processes, when auto-debug is disabled, on CI, and
    /// when already engaged.
    pub fn engage(&mut self, config: &PluginConfig, is_worker: bool) {
        self.engage_inner(
            config.auto_debug(),
            config.auto_debug_wait_for_connect(),
            is_worker,
            is_ci::uncached(),
        );
    }

    fn engage_inner(&mut self, auto_debug: bool, wait_for_connect: bool, is_worker: bool, ci: bool) {
        if !auto_debug || is_worker || ci {
            return;
        }
        if self.listening {
            return;
        }
        self.listening = true;

        let host =
            std::env::var(DEBUG_HOST_ENV).unwrap_or_else(|_| DEFAULT_DEBUG_HOST.to_owned());
        let port = std::env::var(DEBUG_PORT_ENV)
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_DEBUG_PORT);

        warn!(host, port, "debugger attach engaged");
        if wait_for_connect {
            warn!("waiting for debugger client to connect before starting tests");
        }
    }

    /// Returns true if the facility has been engaged in this process.
    pub fn is_listening(&self) -> bool {
        self.listening
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_config_never_engages() {
        let mut debugger = AutoDebugger::new();
        debugger.engage_inner(false, false, false, false);
        assert!(!debugger.is_listening());
    }

    #[test]
    fn workers_never_engage() {
        let mut debugger = AutoDebugger::new();
        debugger.engage_inner(true, false, true, false);
        assert!(!debugger.is_listening());
    }

    #[test]
    fn ci_never_engages() {
        let mut debugger = AutoDebugger::new();
        debugger.engage_inner(true, false, false, true);
        assert!(!debugger.is_listening());
    }

    #[test]
    fn engagement_is_idempotent() {
        let mut debugger = AutoDebugger::new();
        debugger.engage_inner(true, false, false, false);
        assert!(debugger.is_listening());

        // Re-engaging at a later lifecycle point stays engaged and does not
        // re-bind.
        debugger.engage_inner(true, true, false, false);
        assert!(debugger.is_listening());
    }
}
