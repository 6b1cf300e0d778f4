use std::{
    collections::HashSet,
    hash::Hash,
    sync::{Mutex, MutexGuard},
};

use super::{repo::Assignment, AssignmentKey};

/// Keys currently being worked on. One key can be held at a time; distinct
/// keys never block each other.
#[derive(Debug)]
pub struct InFlight<K> {
    keys: Mutex<HashSet<K>>,
}

impl<K> Default for InFlight<K> {
    fn default() -> Self {
        Self {
            keys: Mutex::new(HashSet::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> InFlight<K> {
    /// `None` when the key is already held.
    pub fn try_acquire(&self, key: K) -> Option<InFlightGuard<'_, K>> {
        if !self.lock().insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard { set: self, key })
    }

    #[cfg(test)]
    fn is_held(&self, key: &K) -> bool {
        self.lock().contains(key)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<K>> {
        // the set stays consistent even if a holder panicked
        self.keys.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Releases its key when dropped, including when the request future is cancelled.
pub struct InFlightGuard<'a, K: Eq + Hash + Clone> {
    set: &'a InFlight<K>,
    key: K,
}

impl<K: Eq + Hash + Clone> Drop for InFlightGuard<'_, K> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

/// Drops exactly the records matching all four key fields.
pub fn remove_by_key(records: Vec<Assignment>, key: &AssignmentKey) -> Vec<Assignment> {
    records.into_iter().filter(|r| !key.matches(r)).collect()
}
