//! Debug runtime mode detection.
//!
//! Debug mode force-enables every registered provider, bypassing the
//! configuration and experiment allow-lists.

use std::collections::HashMap;

/// Environment variable that turns on debug mode.
pub const DEBUG_ENV_VAR: &str = "CTXHUB_DEBUG";
/// Command-line flag that turns on debug mode.
pub const DEBUG_FLAG: &str = "--debug";

/// Runtime flags derived from the process environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeMode {
    pub debug: bool,
}

impl RuntimeMode {
    /// Debug mode on.
    pub fn debug() -> Self {
        Self { debug: true }
    }

    /// Derive the mode from command-line arguments and environment variables.
    pub fn from_environment(args: &[String], env: &HashMap<String, String>) -> Self {
        let flag = args.iter().any(|arg| arg == DEBUG_FLAG);
        let var = env.get(DEBUG_ENV_VAR).is_some_and(|v| is_truthy(v));
        Self { debug: flag || var }
    }

    /// Derive the mode from the current process.
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::from_environment(&args, &env)
    }

    /// Combine with the configured debug flag.
    pub fn with_config(self, config: &ctxhub_config::RuntimeConfig) -> Self {
        Self {
            debug: self.debug || config.debug,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
