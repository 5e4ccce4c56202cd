use std::collections::HashMap;

/// Per-paragraph values keyed by paragraph ordinal and document revision.
///
/// A lookup only hits for the exact revision it was stored under. Entries more than
/// `retention` revisions behind the newest one seen are dropped by [`prune`](Self::prune).
#[derive(Debug)]
pub struct ParagraphContextCache<T> {
    entries: HashMap<(u64, u64), T>,
    retention: u64,
    latest: u64,
}

impl<T> ParagraphContextCache<T> {
    pub fn new(retention: u64) -> Self {
        Self {
            entries: HashMap::new(),
            retention,
            latest: 0,
        }
    }

    pub fn get(&self, paragraph: u64, revision: u64) -> Option<&T> {
        self.entries.get(&(paragraph, revision))
    }

    pub fn insert(&mut self, paragraph: u64, revision: u64, value: T) {
        self.latest = self.latest.max(revision);
        self.entries.insert((paragraph, revision), value);
    }

    pub fn get_or_insert_with(&mut self, paragraph: u64, revision: u64, f: impl FnOnce() -> T) -> &T {
        self.latest = self.latest.max(revision);
        self.entries
            .entry((paragraph, revision))
            .or_insert_with(f)
    }

    /// Drops entries older than the retention window ending at `revision`.
    pub fn prune(&mut self, revision: u64) {
        self.latest = self.latest.max(revision);
        let oldest = self.latest.saturating_sub(self.retention);
        let before = self.entries.len();
        self.entries.retain(|(_, rev), _| *rev >= oldest);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            log::trace!("paragraph cache: evicted {evicted} entr(ies) older than revision {oldest}");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_revision_exact() {
        let mut cache = ParagraphContextCache::new(2);
        cache.insert(1, 3, "ctx");
        assert_eq!(cache.get(1, 3), Some(&"ctx"));
        assert_eq!(cache.get(1, 4), None);
        assert_eq!(cache.get(2, 3), None);
    }

    #[test]
    fn computes_once_per_revision() {
        let mut cache = ParagraphContextCache::new(2);
        let mut calls = 0;
        for _ in 0..3 {
            cache.get_or_insert_with(1, 1, || {
                calls += 1;
                calls
            });
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn prune_keeps_the_retention_window() {
        let mut cache = ParagraphContextCache::new(2);
        for rev in 1..=5 {
            cache.insert(0, rev, rev);
        }
        cache.prune(5);
        let mut kept: Vec<u64> = (1..=5).filter(|r| cache.get(0, *r).is_some()).collect();
        kept.sort();
        assert_eq!(kept, vec![3, 4, 5]);
    }
}
