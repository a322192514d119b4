//! Runtime Configuration
//!
//! Each thread owns one reactive graph and one [`RuntimeConfig`]. The config
//! can be built in code or loaded from JSON.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::error::ReactiveError;

/// Tunables for the reactive runtime on the current thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of times one job may run during a single flush, and the
    /// maximum nesting depth of synchronously running effects.
    pub recursion_limit: usize,

    /// Emit diagnostics for values that cannot be made reactive.
    pub dev_diagnostics: bool,

    /// How many recent diagnostics are retained for [`crate::diagnostics::take`].
    pub diagnostic_capacity: usize,

    /// Longest a sequence may grow through a proxy write.
    pub max_sequence_len: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            recursion_limit: 100,
            dev_diagnostics: cfg!(debug_assertions),
            diagnostic_capacity: 64,
            max_sequence_len: 1 << 24,
        }
    }
}

impl RuntimeConfig {
    /// Parse a config document. Missing fields keep their defaults.
    pub fn from_json(source: &str) -> Result<Self, ReactiveError> {
        Ok(serde_json::from_str(source)?)
    }
}

thread_local! {
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
}

/// Install a config for the current thread.
pub fn configure(config: RuntimeConfig) {
    tracing::debug!(?config, "runtime configured");
    CONFIG.with(|current| *current.borrow_mut() = config);
}

/// A copy of the current thread's config.
pub fn config() -> RuntimeConfig {
    CONFIG
        .try_with(|current| current.borrow().clone())
        .unwrap_or_default()
}

pub(crate) fn recursion_limit() -> usize {
    CONFIG
        .try_with(|current| current.borrow().recursion_limit)
        .unwrap_or(100)
}

pub(crate) fn max_sequence_len() -> usize {
    CONFIG
        .try_with(|current| current.borrow().max_sequence_len)
        .unwrap_or(1 << 24)
}

pub(crate) fn dev_diagnostics() -> bool {
    CONFIG
        .try_with(|current| current.borrow().dev_diagnostics)
        .unwrap_or(false)
}
