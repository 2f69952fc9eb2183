//! A map of weakly-held objects.
//!
//! The context registers every debugger object here so that wire ids can be
//! resolved back to live objects, without keeping those objects alive: the
//! runtime may drop a stack frame at any time and its entry simply goes
//! dead. Dead entries are swept out once the map grows past a threshold
//! that doubles with the surviving population.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

const INITIAL_REAP_THRESHOLD: usize = 32;

/// An ordered map from id to weakly-held object.
pub struct WeakMap<K: Ord + Copy, V> {
    map: BTreeMap<K, Weak<V>>,
    reap_at: usize,
}

impl<K: Ord + Copy, V> WeakMap<K, V> {
    /// Create an empty map.
    pub fn new() -> WeakMap<K, V> {
        WeakMap {
            map: BTreeMap::new(),
            reap_at: INITIAL_REAP_THRESHOLD,
        }
    }

    /// Return a strong reference to the object under `key`, if it is still
    /// alive.
    pub fn get(&self, key: K) -> Option<Arc<V>> {
        self.map.get(&key).and_then(Weak::upgrade)
    }

    /// Insert a weak entry for `value` under `key`. When the map has grown
    /// past the reap threshold the dead entries are swept first and the
    /// threshold is rescaled to twice the surviving size.
    pub fn add(&mut self, key: K, value: &Arc<V>) {
        if self.map.len() > self.reap_at {
            self.reap();
            self.reap_at = self.map.len() * 2 + INITIAL_REAP_THRESHOLD;
        }
        self.map.insert(key, Arc::downgrade(value));
    }

    /// Remove the entry under `key`.
    pub fn remove(&mut self, key: K) {
        self.map.remove(&key);
    }

    /// Snapshot the live entries, skipping dead ones.
    pub fn live(&self) -> Vec<(K, Arc<V>)> {
        self.map
            .iter()
            .filter_map(|(key, weak)| weak.upgrade().map(|value| (*key, value)))
            .collect()
    }

    fn reap(&mut self) {
        self.map.retain(|_, weak| weak.strong_count() > 0);
    }
}

impl<K: Ord + Copy, V> Default for WeakMap<K, V> {
    fn default() -> WeakMap<K, V> {
        WeakMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_live_objects_only() {
        let mut map = WeakMap::new();
        let value = Arc::new(42);
        map.add(1, &value);
        assert_eq!(map.get(1).as_deref(), Some(&42));

        drop(value);
        assert!(map.get(1).is_none());
    }

    #[test]
    fn get_unknown_key() {
        let map: WeakMap<i32, i32> = WeakMap::new();
        assert!(map.get(9).is_none());
    }

    #[test]
    fn live_skips_dead_entries() {
        let mut map = WeakMap::new();
        let a = Arc::new("a");
        let b = Arc::new("b");
        map.add(1, &a);
        map.add(2, &b);
        drop(a);

        let live = map.live();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].0, 2);
    }

    #[test]
    fn dead_entries_are_reaped_past_the_threshold() {
        let mut map = WeakMap::new();
        let keeper = Arc::new(0);
        map.add(0, &keeper);
        for i in 1..=INITIAL_REAP_THRESHOLD as i32 + 1 {
            let value = Arc::new(i);
            map.add(i, &value);
            // value drops here; the entry goes dead immediately.
        }
        // The insert that crossed the threshold swept the dead entries.
        assert!(map.map.len() <= 2);
        assert_eq!(map.get(0).as_deref(), Some(&0));
    }
}
