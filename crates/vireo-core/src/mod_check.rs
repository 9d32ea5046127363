//! Modification tracking across build passes.
//!
//! A build function can ask the [`ModTracker`] whether any of a set of values
//! changed since the previous pass. Values are identified by address, so they
//! must live somewhere stable, such as fields of a component instance.

use std::collections::HashMap;

use crate::hash::DataHash;

pub trait ModChecker {
    /// Compares against the data recorded last pass (if any) and returns
    /// `(modified, data to record for this pass)`.
    fn mod_check(&self, old: Option<u64>) -> (bool, u64);
}

#[derive(Clone, Copy, Debug)]
struct Tracked {
    modified: bool,
    data: u64,
}

#[derive(Default, Debug)]
pub struct ModTracker {
    old: HashMap<usize, Tracked>,
    cur: HashMap<usize, Tracked>,
}

impl ModTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new pass: this pass's results become the baseline.
    pub fn track_next(&mut self) {
        self.old = std::mem::take(&mut self.cur);
    }

    /// True if any of `values` changed since the previous pass. Values never
    /// seen before count as modified.
    pub fn mod_check_all(&mut self, values: &[&dyn ModChecker]) -> bool {
        let mut ret = false;
        for v in values {
            let id = std::ptr::from_ref(*v).cast::<()>() as usize;
            if let Some(cur) = self.cur.get(&id) {
                ret |= cur.modified;
                continue;
            }
            let old = self.old.get(&id).map(|t| t.data);
            let (modified, data) = v.mod_check(old);
            ret |= modified;
            self.cur.insert(id, Tracked { modified, data });
        }
        ret
    }
}

/// Counter to bump whenever the owner changes in a way not visible to hashing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChangeCounter(u64);

impl ChangeCounter {
    pub fn changed(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl DataHash for ChangeCounter {
    fn data_hash(&self) -> u64 {
        self.0
    }
}

/// Anything with a data hash is checked by comparing hashes.
impl<T: DataHash + ?Sized> ModChecker for T {
    fn mod_check(&self, old: Option<u64>) -> (bool, u64) {
        let h = self.data_hash();
        (old != Some(h), h)
    }
}
