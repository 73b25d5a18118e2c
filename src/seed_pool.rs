//! Seed Pool: content-addressed store of every seed seen during the
//! campaign.

use hashbrown::HashMap;

use crate::types::{FuzzingEngine, SeedType};

/// Everything the pool remembers about one seed beyond its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed_type: SeedType,
    pub origin: FuzzingEngine,
}

/// Outcome of [`SeedPool::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// First time these bytes were seen; the caller should persist + rebroadcast.
    New,
    /// A re-submission of bytes already in the pool; counted as a duplicate.
    Duplicate,
}

/// Content-addressed mapping from seed bytes to `(type, origin-engine)`.
///
/// `order` records the bytes in the sequence they were first received, so
/// replay to a newly-arrived client (§5: "seeds delivered to a given client
/// are delivered in the order the broker received them from their
/// discoverers") doesn't depend on `seeds`' hash iteration order, which
/// varies run to run.
#[derive(Debug, Default)]
pub struct SeedPool {
    seeds: HashMap<Vec<u8>, SeedInfo>,
    order: Vec<Vec<u8>>,
}

impl SeedPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a seed's bytes if new; always reports whether it already
    /// existed so callers can route dedup/stat bookkeeping.
    ///
    /// A seed is stored once: a duplicate submission never overwrites the
    /// recorded `(type, origin)`.
    pub fn submit(&mut self, bytes: &[u8], seed_type: SeedType, origin: FuzzingEngine) -> Submission {
        if self.seeds.contains_key(bytes) {
            Submission::Duplicate
        } else {
            self.seeds.insert(bytes.to_vec(), SeedInfo { seed_type, origin });
            self.order.push(bytes.to_vec());
            Submission::New
        }
    }

    /// Used when rehydrating from the Workspace at startup: the seed is
    /// already "new" to this in-memory pool by construction (no file is
    /// written back), but it must still be inserted so later dedup sees it.
    pub fn load(&mut self, bytes: Vec<u8>, seed_type: SeedType, origin: FuzzingEngine) {
        if let hashbrown::hash_map::Entry::Vacant(entry) = self.seeds.entry(bytes.clone()) {
            entry.insert(SeedInfo { seed_type, origin });
            self.order.push(bytes);
        }
    }

    pub fn contains(&self, bytes: &[u8]) -> bool {
        self.seeds.contains_key(bytes)
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    /// Iterate the whole pool in receipt order, e.g. to replay it to a
    /// newly-arrived client under a `FULL` broking policy.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], SeedInfo)> {
        self.order
            .iter()
            .map(|bytes| (bytes.as_slice(), self.seeds[bytes.as_slice()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_submission_is_new_resubmission_is_duplicate() {
        let mut pool = SeedPool::new();
        assert_eq!(
            pool.submit(b"s1", SeedType::Input, FuzzingEngine::Triton),
            Submission::New
        );
        assert_eq!(
            pool.submit(b"s1", SeedType::Input, FuzzingEngine::Honggfuzz),
            Submission::Duplicate
        );
        // original (type, origin) recorded on first insertion is retained
        let (_, info) = pool.iter().next().unwrap();
        assert_eq!(info.origin, FuzzingEngine::Triton);
    }

    #[test]
    fn iter_preserves_receipt_order_not_hash_order() {
        let mut pool = SeedPool::new();
        pool.submit(b"third", SeedType::Input, FuzzingEngine::Triton);
        pool.submit(b"first", SeedType::Input, FuzzingEngine::Triton);
        pool.submit(b"second", SeedType::Input, FuzzingEngine::Triton);
        // resubmitting an already-known seed does not reorder it
        pool.submit(b"third", SeedType::Input, FuzzingEngine::Honggfuzz);
        let order: Vec<&[u8]> = pool.iter().map(|(bytes, _)| bytes).collect();
        assert_eq!(order, vec![b"third".as_slice(), b"first".as_slice(), b"second".as_slice()]);
    }

    #[test]
    fn pool_round_trips_through_load() {
        let mut a = SeedPool::new();
        a.submit(b"x", SeedType::Crash, FuzzingEngine::Honggfuzz);
        let mut b = SeedPool::new();
        for (bytes, info) in a.iter() {
            b.load(bytes.to_vec(), info.seed_type, info.origin);
        }
        assert_eq!(a.len(), b.len());
        assert!(b.contains(b"x"));
    }
}
