//! In-flight `set`/`touch` markers
//!
//! Bookkeeping only, not a lock: two stores (or two processes) can still race
//! at the backend, which owns per-row atomicity.

use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Set,
    Touch,
}

#[derive(Debug, Default)]
pub(crate) struct InFlight {
    setting: Mutex<HashSet<String>>,
    touching: Mutex<HashSet<String>>,
}

impl InFlight {
    pub(crate) fn is_setting(&self, sid: &str) -> bool {
        self.setting.lock().contains(sid)
    }

    #[cfg(test)]
    pub(crate) fn is_touching(&self, sid: &str) -> bool {
        self.touching.lock().contains(sid)
    }

    /// Mark `sid` as in flight for `op`.
    ///
    /// Returns None when the marker is already held and overlap is not
    /// allowed. The marker is released when the returned value drops.
    pub(crate) fn begin(&self, op: Operation, sid: &str, allow_overlap: bool) -> Option<Marker<'_>> {
        let inserted = self.set_for(op).lock().insert(sid.to_string());
        if !inserted && !allow_overlap {
            return None;
        }
        Some(Marker {
            owner: self,
            op,
            sid: sid.to_string(),
            release: inserted,
        })
    }

    fn set_for(&self, op: Operation) -> &Mutex<HashSet<String>> {
        match op {
            Operation::Set => &self.setting,
            Operation::Touch => &self.touching,
        }
    }
}

pub(crate) struct Marker<'a> {
    owner: &'a InFlight,
    op: Operation,
    sid: String,
    // Overlapping markers leave the first holder in charge of removal
    release: bool,
}

impl Drop for Marker<'_> {
    fn drop(&mut self) {
        if self.release {
            self.owner.set_for(self.op).lock().remove(&self.sid);
        }
    }
}
