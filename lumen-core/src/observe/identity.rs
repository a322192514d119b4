//! Proxy identity cache.
//!
//! At most one live proxy exists per (target, mode). The cache holds weak
//! references only; a proxy that nobody holds any more is rebuilt on the
//! next wrap request.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Weak;

use super::proxy::{Mode, Observed, ObservedInner};
use crate::graph::TargetId;

thread_local! {
    static PROXIES: RefCell<HashMap<(TargetId, Mode), Weak<ObservedInner>>> =
        RefCell::new(HashMap::new());
}

/// The live proxy for (target, mode), if any.
pub(crate) fn lookup(target: TargetId, mode: Mode) -> Option<Observed> {
    PROXIES
        .try_with(|proxies| {
            proxies
                .try_borrow()
                .ok()?
                .get(&(target, mode))
                .and_then(Weak::upgrade)
        })
        .ok()
        .flatten()
        .map(Observed::from_inner)
}

pub(crate) fn insert(observed: &Observed) {
    let _ = PROXIES.try_with(|proxies| {
        if let Ok(mut proxies) = proxies.try_borrow_mut() {
            proxies.insert((observed.id(), observed.mode()), observed.downgrade());
        }
    });
}

/// Drop cache entries for a target that no longer exists.
pub(crate) fn forget(target: TargetId) {
    let _ = PROXIES.try_with(|proxies| {
        if let Ok(mut proxies) = proxies.try_borrow_mut() {
            proxies.remove(&(target, Mode::Mutable));
            proxies.remove(&(target, Mode::Readonly));
        }
    });
}
