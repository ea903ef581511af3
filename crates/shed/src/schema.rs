//! Prefix allocation for named indexes and counters.
//!
//! The schema record is the persistent mapping from names to one-byte key
//! prefixes. Indexes and counters have separate name namespaces but draw
//! from the same pool of bytes, so no two of them can ever collide in the
//! keyspace. Byte 0 is reserved for the schema record itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{Error, Result, SchemaCorruptSnafu};

/// Persistent mapping from index and counter names to prefix bytes.
///
/// Loaded once at open, mutated only through allocation, and flushed
/// atomically on each allocation.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Schema {
    indexes: BTreeMap<String, u8>,
    counters: BTreeMap<String, u8>,
}

impl Schema {
    /// Key of the schema record. Byte 0 never backs an index or counter.
    pub(crate) const KEY: &'static [u8] = &[0];

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        postcard::from_bytes(bytes).context(SchemaCorruptSnafu)
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).context(SchemaCorruptSnafu)
    }

    pub(crate) fn index_prefix(&self, name: &str) -> Option<u8> {
        self.indexes.get(name).copied()
    }

    pub(crate) fn counter_prefix(&self, name: &str) -> Option<u8> {
        self.counters.get(name).copied()
    }

    /// Bind the lowest free byte to a new index name.
    pub(crate) fn allocate_index(&mut self, name: &str) -> Result<u8> {
        let prefix = self.next_free_byte().ok_or(Error::SchemaFull)?;
        self.indexes.insert(name.to_string(), prefix);
        Ok(prefix)
    }

    /// Bind the lowest free byte to a new counter name.
    pub(crate) fn allocate_counter(&mut self, name: &str) -> Result<u8> {
        let prefix = self.next_free_byte().ok_or(Error::SchemaFull)?;
        self.counters.insert(name.to_string(), prefix);
        Ok(prefix)
    }

    /// Undo an allocation whose persistence failed.
    pub(crate) fn remove_index(&mut self, name: &str) {
        self.indexes.remove(name);
    }

    /// Undo an allocation whose persistence failed.
    pub(crate) fn remove_counter(&mut self, name: &str) {
        self.counters.remove(name);
    }

    pub(crate) fn index_count(&self) -> usize {
        self.indexes.len()
    }

    pub(crate) fn counter_count(&self) -> usize {
        self.counters.len()
    }

    /// Lowest byte taken by neither namespace, scanning from 1 upward.
    fn next_free_byte(&self) -> Option<u8> {
        (1..=u8::MAX).find(|b| {
            !self.indexes.values().any(|taken| taken == b)
                && !self.counters.values().any(|taken| taken == b)
        })
    }
}
