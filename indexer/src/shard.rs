use fandex_core::{DocId, Posting};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

pub const SHARD_COUNT: usize = 64;

/// Postings under construction, partitioned by a hash of the term. Each shard
/// is locked on its own; `merge` takes one shard lock at a time.
pub struct ShardedPostings {
    shards: Vec<Mutex<HashMap<String, Vec<Posting>>>>,
}

impl ShardedPostings {
    pub fn new(count: usize) -> Self {
        let count = count.max(1);
        Self { shards: (0..count).map(|_| Mutex::new(HashMap::new())).collect() }
    }

    pub fn shard_of(&self, term: &str) -> usize {
        crc32fast::hash(term.as_bytes()) as usize % self.shards.len()
    }

    /// Add one document's term frequencies.
    pub fn merge(&self, doc_id: DocId, terms: HashMap<String, u32>) {
        let mut by_shard: Vec<Vec<(String, u32)>> = vec![Vec::new(); self.shards.len()];
        for (term, tf) in terms {
            let i = self.shard_of(&term);
            by_shard[i].push((term, tf));
        }
        for (i, batch) in by_shard.into_iter().enumerate() {
            if batch.is_empty() { continue; }
            let mut shard = self.shards[i].lock();
            for (term, tf) in batch {
                shard.entry(term).or_default().push(Posting { doc_id, tf });
            }
        }
    }

    /// Collapse the shards into one term-ordered map. Postings keep arrival
    /// order; callers sort them.
    pub fn into_postings(self) -> BTreeMap<String, Vec<Posting>> {
        self.shards.into_iter().flat_map(|shard| shard.into_inner()).collect()
    }
}
