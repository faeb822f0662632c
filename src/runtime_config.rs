//! Environment-driven runtime configuration.
//!
//! Loaded once at startup and handed to the [`Dispatcher`](crate::dispatcher::Dispatcher);
//! nothing re-reads the environment on the dispatch path.
//!
//! ## Environment variables
//!
//! - `SWITCHYARD_STACK_SIZE` — coroutine stack size in bytes, decimal or
//!   `0x`-prefixed hex (default `0x4000`, 16 KB).
//! - `SWITCHYARD_COPY_REQUEST_BODY` — `true`/`1` enables request-body
//!   copying and the byte ceiling below (default off).
//! - `SWITCHYARD_MAX_MEMORY` — maximum copied body size in bytes; a larger
//!   body is rejected with 413 before any filter or handler runs
//!   (default 64 MB).
//! - `SWITCHYARD_SESSION_ON` — global session switch; individual routes may
//!   override it per entry (default off).

use std::env;

/// Runtime configuration for the dispatcher and host server.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for request coroutines in bytes
    pub stack_size: usize,
    /// Whether the request body is copied into the context before dispatch
    pub copy_request_body: bool,
    /// Maximum copied body size in bytes; exceeding it yields 413
    pub max_memory: usize,
    /// Global session switch; per-entry overrides beat this
    pub session_on: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: 0x4000,
            copy_request_body: false,
            max_memory: 1 << 26,
            session_on: false,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stack_size: env::var("SWITCHYARD_STACK_SIZE")
                .ok()
                .and_then(|v| parse_size(&v))
                .unwrap_or(defaults.stack_size),
            copy_request_body: env::var("SWITCHYARD_COPY_REQUEST_BODY")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.copy_request_body),
            max_memory: env::var("SWITCHYARD_MAX_MEMORY")
                .ok()
                .and_then(|v| parse_size(&v))
                .unwrap_or(defaults.max_memory),
            session_on: env::var("SWITCHYARD_SESSION_ON")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.session_on),
        }
    }
}

fn parse_size(val: &str) -> Option<usize> {
    if let Some(hex) = val.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}

fn parse_bool(val: &str) -> bool {
    matches!(val.trim(), "1" | "true" | "TRUE" | "True" | "on" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_accepts_hex_and_decimal() {
        assert_eq!(parse_size("0x8000"), Some(0x8000));
        assert_eq!(parse_size("32768"), Some(32768));
        assert_eq!(parse_size("bogus"), None);
    }

    #[test]
    fn test_defaults() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.stack_size, 0x4000);
        assert!(!cfg.copy_request_body);
        assert_eq!(cfg.max_memory, 1 << 26);
        assert!(!cfg.session_on);
    }
}
