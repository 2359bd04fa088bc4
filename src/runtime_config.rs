//! Coroutine runtime settings taken from the environment.
//!
//! `APIROUTE_STACK_SIZE` sets the stack size of each `may` coroutine, one of
//! which serves every connection. Decimal (`32768`) and hex (`0x8000`) are
//! both accepted; anything unparsable falls back to the default.
//!
//! Total virtual memory grows as `stack_size x concurrent connections`, so
//! raise it only for handlers with deep call chains.

use std::env;

pub const STACK_SIZE_ENV: &str = "APIROUTE_STACK_SIZE";
pub const DEFAULT_STACK_SIZE: usize = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Bytes per coroutine stack.
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = env::var(STACK_SIZE_ENV)
            .ok()
            .and_then(|raw| parse_size(&raw))
            .unwrap_or(DEFAULT_STACK_SIZE);
        Self { stack_size }
    }

    /// Push the settings into the global `may` scheduler. Call before the
    /// first coroutine is spawned.
    pub fn apply(&self) {
        may::config().set_stack_size(self.stack_size);
    }
}

fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    };
    parsed.filter(|size| *size > 0)
}
