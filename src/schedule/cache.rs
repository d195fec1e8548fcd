/// Frozen PRE outputs.
///
/// Written once after PRE runs and never aliased to the live store: it owns
/// its values, so nothing done to the store afterwards can change them.
#[derive(Debug, Clone, PartialEq)]
pub struct PreCache {
    entries: Vec<(usize, f64)>,
}

impl PreCache {
    /// Copies the given slots out of the store.
    pub(super) fn capture(store: &[f64], slots: impl IntoIterator<Item = usize>) -> Self {
        Self {
            entries: slots.into_iter().map(|slot| (slot, store[slot])).collect(),
        }
    }

    /// Writes the cached values back into a store.
    pub(super) fn reseed(&self, store: &mut [f64]) {
        for &(slot, value) in &self.entries {
            store[slot] = value;
        }
    }

    /// Cached value of a slot, if it is a PRE output.
    pub fn get(&self, slot: usize) -> Option<f64> {
        self.entries
            .iter()
            .find(|&&(s, _)| s == slot)
            .map(|&(_, value)| value)
    }

    /// Number of cached slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether PRE produced no outputs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The store as left by the most recent successful ITER pass.
///
/// Failed passes roll the live store back to it, and POST runs from it.
#[derive(Debug, Clone, PartialEq)]
pub struct IterSnapshot {
    iteration: usize,
    values: Vec<f64>,
}

impl IterSnapshot {
    pub(super) fn capture(iteration: usize, store: &[f64]) -> Self {
        Self {
            iteration,
            values: store.to_vec(),
        }
    }

    pub(super) fn restore(&self, store: &mut [f64]) {
        store.copy_from_slice(&self.values);
    }

    /// The iteration that produced the snapshot.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Value of `slot` at the snapshot.
    pub fn value(&self, slot: usize) -> f64 {
        self.values[slot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_owns_its_values() {
        let mut store = vec![1.0, 2.0, 3.0];
        let cache = PreCache::capture(&store, [0, 2]);

        store[0] = -1.0;
        store[2] = -3.0;
        assert_eq!(cache.get(0), Some(1.0));
        assert_eq!(cache.get(1), None);

        cache.reseed(&mut store);
        assert_eq!(store, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn snapshot_restores_whole_store() {
        let mut store = vec![1.0, 2.0];
        let snapshot = IterSnapshot::capture(4, &store);

        store.fill(0.0);
        snapshot.restore(&mut store);
        assert_eq!(store, [1.0, 2.0]);
        assert_eq!(snapshot.iteration(), 4);
    }
}
