//! Diagnostics Sink
//!
//! Soft failures are logged through `tracing` and also kept in a small
//! per-thread buffer, so a host can inspect them without installing a
//! subscriber.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::config;
use crate::error::Diagnostic;

thread_local! {
    static RECENT: RefCell<VecDeque<Diagnostic>> = RefCell::new(VecDeque::new());
}

/// Log a diagnostic and retain it.
pub fn emit(diagnostic: Diagnostic) {
    if diagnostic.is_severe() {
        tracing::error!(%diagnostic, "reactivity");
    } else {
        tracing::warn!(%diagnostic, "reactivity");
    }

    let capacity = config::config().diagnostic_capacity;
    if capacity == 0 {
        return;
    }
    let _ = RECENT.try_with(|recent| {
        let mut recent = recent.borrow_mut();
        while recent.len() >= capacity {
            recent.pop_front();
        }
        recent.push_back(diagnostic);
    });
}

/// Drain the retained diagnostics, oldest first.
pub fn take() -> Vec<Diagnostic> {
    RECENT
        .try_with(|recent| recent.borrow_mut().drain(..).collect())
        .unwrap_or_default()
}
