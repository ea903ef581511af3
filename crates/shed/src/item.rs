//! The record type shared by all indexes.

/// A sparse bag of chunk fields.
///
/// `Item` is the single record type every index codec projects from and
/// recovers into. A codec commits to a subset of fields; the rest stay
/// `None`. Key-derived and value-derived halves of a record are reunited
/// with [`Item::merge`] after reads.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Item {
    /// Content address of a chunk, typically 32 bytes. Opaque to this layer.
    pub address: Option<Vec<u8>>,
    /// Chunk payload.
    pub data: Option<Vec<u8>>,
    /// When the chunk was stored. Opaque clock, not interpreted here.
    pub store_timestamp: Option<i64>,
    /// When the chunk was last accessed. Opaque clock, not interpreted here.
    pub access_timestamp: Option<i64>,
    /// Sequence number scoped to a proximity bin.
    pub bin_id: Option<u64>,
    /// Number of times the chunk is pinned.
    pub pin_counter: Option<u64>,
    /// Tag identifier.
    pub tag: Option<u32>,
}

impl Item {
    /// Fill every absent field of `self` from `other`.
    ///
    /// Present fields of `self` always win. Associative over disjoint
    /// field sets, not commutative where fields overlap.
    pub fn merge(self, other: Item) -> Item {
        Item {
            address: self.address.or(other.address),
            data: self.data.or(other.data),
            store_timestamp: self.store_timestamp.or(other.store_timestamp),
            access_timestamp: self.access_timestamp.or(other.access_timestamp),
            bin_id: self.bin_id.or(other.bin_id),
            pin_counter: self.pin_counter.or(other.pin_counter),
            tag: self.tag.or(other.tag),
        }
    }
}
