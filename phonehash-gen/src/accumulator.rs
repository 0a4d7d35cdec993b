use std::collections::HashMap;

use compact_str::CompactString;

use crate::partition::{ShardKey, partition, shard_count};

/// Remainder -> identifier pairs buffered for one shard.
pub type Entries = HashMap<CompactString, CompactString>;

/// In-memory buffer of one batch of entries, one map per shard.
///
/// A batch is one prefix's worth of identifiers, so peak memory is bounded by
/// 10^suffix_width entries no matter how many prefixes a run covers.
#[derive(Debug)]
pub struct ShardAccumulator {
    width: usize,
    shards: Vec<Entries>,
    len: usize,
}

impl ShardAccumulator {
    pub fn new(width: usize) -> Self {
        let shards = (0..shard_count(width)).map(|_| Entries::new()).collect();
        Self { width, shards, len: 0 }
    }

    /// Entries currently buffered across all shards.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Buffer one entry. A remainder already present in the shard is
    /// overwritten and `true` is returned: the earlier identifier is lost.
    pub fn record(
        &mut self,
        key: ShardKey,
        remainder: &str,
        identifier: CompactString,
    ) -> bool {
        let shard = &mut self.shards[key.index() as usize];
        let superseded = shard.insert(CompactString::from(remainder), identifier).is_some();
        if !superseded {
            self.len += 1;
        }
        superseded
    }

    /// Partition `digest` and buffer it; see [`ShardAccumulator::record`].
    #[inline]
    pub fn record_digest(&mut self, digest: &str, identifier: CompactString) -> bool {
        let (key, remainder) = partition(digest, self.width);
        self.record(key, remainder, identifier)
    }

    /// Take every non-empty shard's entries, leaving the accumulator empty.
    pub fn drain_all(&mut self) -> Vec<(ShardKey, Entries)> {
        let width = self.width;
        let drained = self
            .shards
            .iter_mut()
            .enumerate()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(index, entries)| (ShardKey::new(index as u32, width), std::mem::take(entries)))
            .collect();
        self.len = 0;
        drained
    }
}
