use std::collections::HashMap;

/// Bounded in-memory mapping from MMSI (secondary identifier) to IMO number
/// (primary identifier).
///
/// Entries never expire on a timer (a vessel's identity mapping does not go
/// stale) but the map is capped: when full, the least-recently-used entry is
/// evicted and later lookups for it fall back to storage. Warmed from the
/// `vessel_identity` table at startup.
pub struct IdentityCache {
    map: HashMap<i64, (i64, u64)>,
    counter: u64,
    capacity: usize,
}

impl IdentityCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity.min(64 * 1024)),
            counter: 0,
            capacity: capacity.max(1),
        }
    }

    /// Look up the IMO for an MMSI, refreshing its recency.
    pub fn get(&mut self, mmsi: i64) -> Option<i64> {
        if let Some((imo, order)) = self.map.get_mut(&mmsi) {
            self.counter += 1;
            *order = self.counter;
            Some(*imo)
        } else {
            None
        }
    }

    /// Record an MMSI → IMO mapping. Returns the previous IMO when this
    /// remaps the MMSI to a different vessel (latest static data wins).
    pub fn put(&mut self, mmsi: i64, imo: i64) -> Option<i64> {
        self.counter += 1;

        if let Some((existing, order)) = self.map.get_mut(&mmsi) {
            *order = self.counter;
            if *existing != imo {
                let previous = *existing;
                *existing = imo;
                return Some(previous);
            }
            return None;
        }

        if self.map.len() >= self.capacity {
            self.evict_lru();
        }
        self.map.insert(mmsi, (imo, self.counter));
        None
    }

    /// Bulk-load mappings from storage at startup. Does not report remaps.
    pub fn warm(&mut self, mappings: impl IntoIterator<Item = (i64, i64)>) {
        for (mmsi, imo) in mappings {
            self.put(mmsi, imo);
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .map
            .iter()
            .min_by_key(|(_, (_, order))| *order)
            .map(|(mmsi, _)| *mmsi);
        if let Some(mmsi) = oldest {
            self.map.remove(&mmsi);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_returns_mappings() {
        let mut cache = IdentityCache::new(10);
        assert_eq!(cache.put(211000001, 1234567), None);
        assert_eq!(cache.get(211000001), Some(1234567));
        assert_eq!(cache.get(211000002), None);
    }

    #[test]
    fn remap_returns_previous_identity() {
        let mut cache = IdentityCache::new(10);
        cache.put(211000001, 1234567);
        assert_eq!(cache.put(211000001, 7654321), Some(1234567));
        assert_eq!(cache.get(211000001), Some(7654321));
        // Re-asserting the same mapping is not a remap.
        assert_eq!(cache.put(211000001, 7654321), None);
    }

    #[test]
    fn evicts_least_recently_used_at_capacity() {
        let mut cache = IdentityCache::new(2);
        cache.put(1, 100);
        cache.put(2, 200);
        // Touch 1 so 2 becomes the LRU entry.
        cache.get(1);
        cache.put(3, 300);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(1), Some(100));
        assert_eq!(cache.get(2), None);
        assert_eq!(cache.get(3), Some(300));
    }

    #[test]
    fn warm_loads_storage_mappings() {
        let mut cache = IdentityCache::new(100);
        cache.warm(vec![(1, 100), (2, 200), (3, 300)]);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(2), Some(200));
    }
}
