//! Typed indexes over the shared keyspace.
//!
//! An [`Index`] is a named set of key-value pairs under one prefix byte,
//! with user-supplied codecs projecting [`Item`] records into sortable
//! byte keys and compact byte values. The codec's key bytes determine the
//! sort order within the index, so higher layers can rely on lexicographic
//! scans for proximity ordering, eviction order, and synchronisation.

use std::ops::Bound;
use std::sync::Arc;

use snafu::ResultExt;
use tracing::debug;

use crate::db::{Batch, Shed};
use crate::error::{
    CodecDecodeSnafu, CodecEncodeSnafu, CodecError, Error, Result, StorageSnafu,
};
use crate::item::Item;

/// Key and value codecs for one index.
///
/// All four functions are deterministic and total: they succeed or fail
/// explicitly. `decode_key(encode_key(item))` recovers exactly the fields
/// the key codec commits to; the rest stay absent. Likewise for values.
pub trait IndexCodec: Send + Sync + 'static {
    /// Project the key fields of an item into sortable bytes.
    fn encode_key(&self, fields: &Item) -> std::result::Result<Vec<u8>, CodecError>;

    /// Recover the fields committed to by [`IndexCodec::encode_key`].
    fn decode_key(&self, key: &[u8]) -> std::result::Result<Item, CodecError>;

    /// Project the value fields of an item into compact bytes.
    fn encode_value(&self, fields: &Item) -> std::result::Result<Vec<u8>, CodecError>;

    /// Recover value fields. `key_fields` carries the already-decoded key
    /// so value fields can be conditioned on key fields.
    fn decode_value(&self, key_fields: &Item, value: &[u8])
        -> std::result::Result<Item, CodecError>;
}

/// Optional parameters for index iteration.
#[derive(Debug, Clone, Default)]
pub struct IterateOptions {
    /// Item whose encoded key is the first visited position. When absent,
    /// iteration starts at the beginning of the (prefix-bounded) index.
    pub start_from: Option<Item>,
    /// Skip the start item itself when its key is present exactly.
    pub skip_start_from_item: bool,
    /// Only visit keys sharing this common prefix within the index.
    pub prefix: Vec<u8>,
}

/// A named relation stored under a one-byte key prefix.
///
/// Every operation prepends the prefix byte to the codec-emitted key
/// before touching the store and strips it again before handing a key to
/// the key decoder. An `Index` is cheap to clone and safe to use from
/// multiple threads; reads run on engine snapshots.
#[derive(Clone)]
pub struct Index {
    shed: Shed,
    name: String,
    prefix: u8,
    codec: Arc<dyn IndexCodec>,
}

impl Index {
    pub(crate) fn new(shed: Shed, name: String, prefix: u8, codec: impl IndexCodec) -> Index {
        Index {
            shed,
            name,
            prefix,
            codec: Arc::new(codec),
        }
    }

    /// Retrieve the item stored under the key encoded from `key_fields`.
    ///
    /// The result carries the decoded value fields merged with the
    /// caller's key fields, so key fields survive even when the value
    /// codec does not re-emit them.
    pub fn get(&self, key_fields: &Item) -> Result<Item> {
        let key = self.encode_key(key_fields)?;
        let value = self.shed.get(&key)?;
        let decoded = self.decode_value(key_fields, &value)?;
        Ok(decoded.merge(key_fields.clone()))
    }

    /// Check whether the key encoded from `key_fields` is present. The
    /// stored value is never materialized.
    pub fn has(&self, key_fields: &Item) -> Result<bool> {
        let key = self.encode_key(key_fields)?;
        self.shed.has(&key)
    }

    /// Check presence for several items against one read snapshot.
    ///
    /// The result order matches the input order. Because all lookups share
    /// a snapshot, a concurrent writer committing midway cannot produce a
    /// mixed view.
    pub fn has_multi(&self, items: &[Item]) -> Result<Vec<bool>> {
        let table = self.shed.read_table()?;
        let mut have = Vec::with_capacity(items.len());
        for fields in items {
            let key = self.encode_key(fields)?;
            have.push(table.get(&key[..]).context(StorageSnafu)?.is_some());
        }
        Ok(have)
    }

    /// Encode and store `item`. An existing entry under the same key is
    /// overwritten.
    pub fn put(&self, item: &Item) -> Result<()> {
        let key = self.encode_key(item)?;
        let value = self.encode_value(item)?;
        self.shed.put(&key, &value)
    }

    /// Queue a put of `item` on `batch` instead of writing directly.
    pub fn put_in_batch(&self, batch: &mut Batch, item: &Item) -> Result<()> {
        let key = self.encode_key(item)?;
        let value = self.encode_value(item)?;
        batch.put(key, value);
        Ok(())
    }

    /// Remove the entry under the key encoded from `key_fields`.
    pub fn delete(&self, key_fields: &Item) -> Result<()> {
        let key = self.encode_key(key_fields)?;
        self.shed.delete(&key)
    }

    /// Queue a delete on `batch` instead of writing directly.
    pub fn delete_in_batch(&self, batch: &mut Batch, key_fields: &Item) -> Result<()> {
        let key = self.encode_key(key_fields)?;
        batch.delete(key);
        Ok(())
    }

    /// Populate value fields on the provided items in place.
    ///
    /// Every item must carry the fields its key encoding needs. All
    /// lookups share one read snapshot. Fails fast on the first absent
    /// key or codec error; items before the failing one are already
    /// rewritten when that happens.
    pub fn fill(&self, items: &mut [Item]) -> Result<()> {
        let table = self.shed.read_table()?;
        for item in items.iter_mut() {
            let key = match self.encode_key(item) {
                Ok(key) => key,
                Err(err) => {
                    debug!(index = %self.name, %err, "key encoding failed during fill");
                    return Err(err);
                }
            };
            let value = match table.get(&key[..]).context(StorageSnafu)? {
                Some(value) => value.value().to_vec(),
                None => return Err(Error::NotFound),
            };
            let decoded = self.decode_value(item, &value)?;
            *item = decoded.merge(item.clone());
        }
        Ok(())
    }

    /// Open a cursor over the index.
    ///
    /// The cursor pins a read snapshot for its lifetime, walks keys in
    /// ascending order, and ends cleanly at the first key outside the
    /// scan prefix. Key and value bytes are copied out of the engine
    /// before they reach the codecs.
    pub fn iter(&self, options: IterateOptions) -> Result<IndexCursor> {
        let mut scan_prefix = Vec::with_capacity(1 + options.prefix.len());
        scan_prefix.push(self.prefix);
        scan_prefix.extend_from_slice(&options.prefix);

        let start_key = match &options.start_from {
            Some(fields) => match self.encode_key(fields) {
                Ok(key) => key,
                Err(err) => {
                    debug!(index = %self.name, %err, "start key encoding failed");
                    return Err(err);
                }
            },
            None => scan_prefix.clone(),
        };

        let table = self.shed.read_table()?;
        let lower = if options.skip_start_from_item {
            Bound::Excluded(&start_key[..])
        } else {
            Bound::Included(&start_key[..])
        };
        let range = table
            .range::<&[u8]>((lower, Bound::Unbounded))
            .context(StorageSnafu)?;

        Ok(IndexCursor {
            index: self.clone(),
            scan_prefix,
            range,
            done: false,
        })
    }

    /// Visit items in key order until `f` returns `Ok(true)` or an error.
    ///
    /// The first error wins, whether it comes from decoding or from the
    /// callback; `Ok(true)` is a clean termination.
    pub fn iterate(
        &self,
        mut f: impl FnMut(Item) -> Result<bool>,
        options: IterateOptions,
    ) -> Result<()> {
        for item in self.iter(options)? {
            if f(item?)? {
                break;
            }
        }
        Ok(())
    }

    /// First item whose encoded key starts with `prefix` within the
    /// index. An empty prefix yields the first item of the whole index.
    pub fn first(&self, prefix: &[u8]) -> Result<Item> {
        let total = self.total_prefix(prefix);
        let (key, value) = self.shed.first(&total)?;
        self.decode_entry(&key, &value)
    }

    /// Last item whose encoded key starts with `prefix` within the index.
    /// An empty prefix yields the last item of the whole index.
    pub fn last(&self, prefix: &[u8]) -> Result<Item> {
        let total = self.total_prefix(prefix);
        let (key, value) = self.shed.last(&total)?;
        self.decode_entry(&key, &value)
    }

    /// Number of items in the index. Exhaustive scan.
    pub fn count(&self) -> Result<usize> {
        self.shed.count_prefix(&[self.prefix])
    }

    /// Number of items from the key encoded from `start` to the end of
    /// the index. Exhaustive scan.
    pub fn count_from(&self, start: &Item) -> Result<usize> {
        let start_key = match self.encode_key(start) {
            Ok(key) => key,
            Err(err) => {
                debug!(index = %self.name, %err, "start key encoding failed during count");
                return Err(err);
            }
        };
        let prefix = [self.prefix];
        let mut count = 0;
        self.shed.iterate(&start_key, false, |key, _| {
            if !key.starts_with(&prefix) {
                return Ok(true);
            }
            count += 1;
            Ok(false)
        })?;
        Ok(count)
    }

    /// Name the index was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn total_prefix(&self, prefix: &[u8]) -> Vec<u8> {
        let mut total = Vec::with_capacity(1 + prefix.len());
        total.push(self.prefix);
        total.extend_from_slice(prefix);
        total
    }

    /// Decode a copied key-value pair into an item. Key fields win over
    /// value fields on overlap.
    fn decode_entry(&self, key: &[u8], value: &[u8]) -> Result<Item> {
        let key_item = self.decode_key(key)?;
        let value_item = self.decode_value(&key_item, value)?;
        Ok(key_item.merge(value_item))
    }

    fn encode_key(&self, fields: &Item) -> Result<Vec<u8>> {
        let key = self.codec.encode_key(fields).context(CodecEncodeSnafu {
            index: self.name.as_str(),
        })?;
        let mut out = Vec::with_capacity(1 + key.len());
        out.push(self.prefix);
        out.extend_from_slice(&key);
        Ok(out)
    }

    /// Strip the prefix byte and hand the rest to the key codec. The
    /// schema guarantees exactly one prefix byte.
    fn decode_key(&self, key: &[u8]) -> Result<Item> {
        self.codec.decode_key(&key[1..]).context(CodecDecodeSnafu {
            index: self.name.as_str(),
        })
    }

    fn encode_value(&self, fields: &Item) -> Result<Vec<u8>> {
        self.codec.encode_value(fields).context(CodecEncodeSnafu {
            index: self.name.as_str(),
        })
    }

    fn decode_value(&self, key_fields: &Item, value: &[u8]) -> Result<Item> {
        self.codec
            .decode_value(key_fields, value)
            .context(CodecDecodeSnafu {
                index: self.name.as_str(),
            })
    }
}

/// Pull-based cursor over an index.
///
/// Yields `Result<Item>` in ascending key order. The cursor owns its read
/// snapshot: concurrent writers do not affect an open cursor. Iteration
/// ends cleanly at the first key outside the scan prefix; after the first
/// error the cursor is exhausted.
pub struct IndexCursor {
    index: Index,
    scan_prefix: Vec<u8>,
    range: redb::Range<'static, &'static [u8], &'static [u8]>,
    done: bool,
}

impl std::fmt::Debug for IndexCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCursor")
            .field("scan_prefix", &self.scan_prefix)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl Iterator for IndexCursor {
    type Item = Result<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let (key, value) = match self.range.next()? {
            Ok(entry) => entry,
            Err(source) => {
                self.done = true;
                return Some(Err(Error::Storage { source }));
            }
        };
        // Copy out of the engine before decoding; the guards alias
        // engine-owned memory that is invalid past this iterator step.
        let key = key.value().to_vec();
        if !key.starts_with(&self.scan_prefix) {
            self.done = true;
            return None;
        }
        let value = value.value().to_vec();
        match self.index.decode_entry(&key, &value) {
            Ok(item) => Some(Ok(item)),
            Err(err) => {
                self.done = true;
                debug!(index = %self.index.name, %err, "entry decoding failed during iteration");
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::db::Options;

    /// Key is the chunk address; value is the store timestamp (8 bytes
    /// big-endian) followed by the payload.
    struct RetrievalCodec;

    impl IndexCodec for RetrievalCodec {
        fn encode_key(&self, fields: &Item) -> std::result::Result<Vec<u8>, CodecError> {
            fields
                .address
                .clone()
                .ok_or(CodecError::MissingField { field: "address" })
        }

        fn decode_key(&self, key: &[u8]) -> std::result::Result<Item, CodecError> {
            Ok(Item {
                address: Some(key.to_vec()),
                ..Item::default()
            })
        }

        fn encode_value(&self, fields: &Item) -> std::result::Result<Vec<u8>, CodecError> {
            let data = fields
                .data
                .as_ref()
                .ok_or(CodecError::MissingField { field: "data" })?;
            let ts = fields
                .store_timestamp
                .ok_or(CodecError::MissingField { field: "store_timestamp" })?;
            let mut out = Vec::with_capacity(8 + data.len());
            out.extend_from_slice(&ts.to_be_bytes());
            out.extend_from_slice(data);
            Ok(out)
        }

        fn decode_value(
            &self,
            _key_fields: &Item,
            value: &[u8],
        ) -> std::result::Result<Item, CodecError> {
            if value.len() < 8 {
                return Err(CodecError::Truncated {
                    need: 8,
                    have: value.len(),
                });
            }
            let ts = i64::from_be_bytes(value[..8].try_into().expect("checked length"));
            Ok(Item {
                store_timestamp: Some(ts),
                data: Some(value[8..].to_vec()),
                ..Item::default()
            })
        }
    }

    fn open() -> Shed {
        Shed::open_in_memory(Options::default()).expect("open in-memory store")
    }

    fn retrieval(shed: &Shed) -> Index {
        shed.index("retrieval", RetrievalCodec).expect("register index")
    }

    fn chunk(address: Vec<u8>, data: &[u8], ts: i64) -> Item {
        Item {
            address: Some(address),
            data: Some(data.to_vec()),
            store_timestamp: Some(ts),
            ..Item::default()
        }
    }

    fn by_address(address: Vec<u8>) -> Item {
        Item {
            address: Some(address),
            ..Item::default()
        }
    }

    #[test]
    fn test_put_get_roundtrip() {
        let shed = open();
        let index = retrieval(&shed);

        index.put(&chunk(vec![1; 32], b"hello", 7)).expect("put");

        let got = index.get(&by_address(vec![1; 32])).expect("get");
        assert_eq!(got.address, Some(vec![1; 32]));
        assert_eq!(got.data, Some(b"hello".to_vec()));
        assert_eq!(got.store_timestamp, Some(7));
    }

    #[test]
    fn test_get_absent_is_not_found() {
        let shed = open();
        let index = retrieval(&shed);
        let err = index.get(&by_address(vec![9; 32])).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_get_without_key_fields_is_encode_error() {
        let shed = open();
        let index = retrieval(&shed);
        let err = index.get(&Item::default()).unwrap_err();
        assert!(matches!(err, Error::CodecEncode { .. }));
    }

    #[test]
    fn test_put_twice_overwrites() {
        let shed = open();
        let index = retrieval(&shed);

        index.put(&chunk(vec![1; 32], b"old", 1)).expect("put");
        index.put(&chunk(vec![1; 32], b"new", 2)).expect("put");

        assert_eq!(index.count().expect("count"), 1);
        let got = index.get(&by_address(vec![1; 32])).expect("get");
        assert_eq!(got.data, Some(b"new".to_vec()));
        assert_eq!(got.store_timestamp, Some(2));
    }

    #[test]
    fn test_has_and_delete() {
        let shed = open();
        let index = retrieval(&shed);

        index.put(&chunk(vec![1; 32], b"x", 1)).expect("put");
        assert!(index.has(&by_address(vec![1; 32])).expect("has"));

        index.delete(&by_address(vec![1; 32])).expect("delete");
        assert!(!index.has(&by_address(vec![1; 32])).expect("has"));

        // Deleting an absent entry is a no-op.
        index.delete(&by_address(vec![1; 32])).expect("delete absent");
    }

    #[test]
    fn test_has_multi_preserves_input_order() {
        let shed = open();
        let index = retrieval(&shed);

        index.put(&chunk(vec![2; 32], b"x", 1)).expect("put");

        let have = index
            .has_multi(&[
                by_address(vec![1; 32]),
                by_address(vec![2; 32]),
                by_address(vec![3; 32]),
            ])
            .expect("has_multi");
        assert_eq!(have, vec![false, true, false]);
    }

    #[test]
    fn test_has_multi_agrees_with_has() {
        let shed = open();
        let index = retrieval(&shed);

        index.put(&chunk(vec![1; 32], b"a", 1)).expect("put");
        index.put(&chunk(vec![3; 32], b"c", 1)).expect("put");

        let probes = [
            by_address(vec![1; 32]),
            by_address(vec![2; 32]),
            by_address(vec![3; 32]),
        ];
        let have = index.has_multi(&probes).expect("has_multi");
        for (fields, multi) in probes.iter().zip(have) {
            assert_eq!(index.has(fields).expect("has"), multi);
        }
    }

    #[test]
    fn test_fill_populates_value_fields_in_place() {
        let shed = open();
        let index = retrieval(&shed);

        index.put(&chunk(vec![1; 32], b"one", 11)).expect("put");
        index.put(&chunk(vec![2; 32], b"two", 22)).expect("put");

        let mut items = [by_address(vec![1; 32]), by_address(vec![2; 32])];
        index.fill(&mut items).expect("fill");

        assert_eq!(items[0].data, Some(b"one".to_vec()));
        assert_eq!(items[0].store_timestamp, Some(11));
        assert_eq!(items[1].data, Some(b"two".to_vec()));
        assert_eq!(items[1].store_timestamp, Some(22));
    }

    #[test]
    fn test_fill_fails_fast_on_absent_key() {
        let shed = open();
        let index = retrieval(&shed);

        index.put(&chunk(vec![1; 32], b"one", 11)).expect("put");

        let mut items = [by_address(vec![1; 32]), by_address(vec![9; 32])];
        let err = index.fill(&mut items).unwrap_err();
        assert!(err.is_not_found());
        // The entry before the failing one is already rewritten.
        assert_eq!(items[0].data, Some(b"one".to_vec()));
    }

    #[test]
    fn test_cursor_yields_in_key_order() {
        let shed = open();
        let index = retrieval(&shed);

        // Inserted out of order on purpose.
        index.put(&chunk(vec![3; 32], b"c", 3)).expect("put");
        index.put(&chunk(vec![1; 32], b"a", 1)).expect("put");
        index.put(&chunk(vec![2; 32], b"b", 2)).expect("put");

        let addresses: Vec<_> = index
            .iter(IterateOptions::default())
            .expect("cursor")
            .map(|item| item.expect("decode").address.expect("address"))
            .collect();
        assert_eq!(addresses, vec![vec![1; 32], vec![2; 32], vec![3; 32]]);
    }

    #[test]
    fn test_cursor_start_from_with_skip() {
        let shed = open();
        let index = retrieval(&shed);

        let mut first = vec![0; 32];
        *first.last_mut().expect("non-empty") = 1;
        let mut second = vec![0; 32];
        *second.last_mut().expect("non-empty") = 2;
        let mut third = vec![0; 32];
        *third.last_mut().expect("non-empty") = 3;

        index.put(&chunk(first, b"1", 1)).expect("put");
        index.put(&chunk(second.clone(), b"2", 2)).expect("put");
        index.put(&chunk(third.clone(), b"3", 3)).expect("put");

        let addresses: Vec<_> = index
            .iter(IterateOptions {
                start_from: Some(by_address(second)),
                skip_start_from_item: true,
                ..IterateOptions::default()
            })
            .expect("cursor")
            .map(|item| item.expect("decode").address.expect("address"))
            .collect();
        assert_eq!(addresses, vec![third]);
    }

    #[test]
    fn test_cursor_respects_common_prefix() {
        let shed = open();
        let index = retrieval(&shed);

        let mut inside_a = vec![7u8];
        inside_a.extend_from_slice(&[1; 31]);
        let mut inside_b = vec![7u8];
        inside_b.extend_from_slice(&[2; 31]);
        let outside = vec![8; 32];

        index.put(&chunk(inside_a.clone(), b"a", 1)).expect("put");
        index.put(&chunk(inside_b.clone(), b"b", 2)).expect("put");
        index.put(&chunk(outside, b"z", 3)).expect("put");

        let addresses: Vec<_> = index
            .iter(IterateOptions {
                prefix: vec![7],
                ..IterateOptions::default()
            })
            .expect("cursor")
            .map(|item| item.expect("decode").address.expect("address"))
            .collect();
        assert_eq!(addresses, vec![inside_a, inside_b]);
    }

    #[test]
    fn test_indexes_do_not_leak_into_each_other() {
        let shed = open();
        let first = shed.index("first", RetrievalCodec).expect("register");
        let second = shed.index("second", RetrievalCodec).expect("register");

        first.put(&chunk(vec![1; 32], b"mine", 1)).expect("put");

        assert_eq!(first.count().expect("count"), 1);
        assert_eq!(second.count().expect("count"), 0);
        assert!(!second.has(&by_address(vec![1; 32])).expect("has"));
        assert!(second.iter(IterateOptions::default()).expect("cursor").next().is_none());
    }

    #[test]
    fn test_iterate_callback_stop_is_clean() {
        let shed = open();
        let index = retrieval(&shed);

        index.put(&chunk(vec![1; 32], b"a", 1)).expect("put");
        index.put(&chunk(vec![2; 32], b"b", 2)).expect("put");

        let mut visited = 0;
        index
            .iterate(
                |_| {
                    visited += 1;
                    Ok(true)
                },
                IterateOptions::default(),
            )
            .expect("iterate");
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_iterate_callback_error_wins() {
        let shed = open();
        let index = retrieval(&shed);

        index.put(&chunk(vec![1; 32], b"a", 1)).expect("put");

        let err = index
            .iterate(|_| Err(Error::NotFound), IterateOptions::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_iterate_start_from_encode_error() {
        let shed = open();
        let index = retrieval(&shed);

        let err = index
            .iter(IterateOptions {
                start_from: Some(Item::default()),
                ..IterateOptions::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::CodecEncode { .. }));
    }

    #[test]
    fn test_first_and_last() {
        let shed = open();
        let index = retrieval(&shed);

        let mut first = vec![0; 32];
        *first.last_mut().expect("non-empty") = 1;
        let mut third = vec![0; 32];
        *third.last_mut().expect("non-empty") = 3;

        index.put(&chunk(first.clone(), b"1", 1)).expect("put");
        index.put(&chunk(third.clone(), b"3", 3)).expect("put");

        assert_eq!(index.first(&[]).expect("first").address, Some(first));
        assert_eq!(index.last(&[]).expect("last").address, Some(third));
    }

    #[test]
    fn test_first_and_last_with_prefix() {
        let shed = open();
        let index = retrieval(&shed);

        let mut inside = vec![5u8];
        inside.extend_from_slice(&[1; 31]);
        let outside = vec![6; 32];

        index.put(&chunk(inside.clone(), b"in", 1)).expect("put");
        index.put(&chunk(outside, b"out", 2)).expect("put");

        assert_eq!(index.first(&[5]).expect("first").address, Some(inside.clone()));
        assert_eq!(index.last(&[5]).expect("last").address, Some(inside));
        assert!(index.first(&[9]).unwrap_err().is_not_found());
        assert!(index.last(&[9]).unwrap_err().is_not_found());
    }

    #[test]
    fn test_count_and_count_from() {
        let shed = open();
        let index = retrieval(&shed);

        let mut addresses = Vec::new();
        for i in 1..=4u8 {
            let mut address = vec![0; 32];
            *address.last_mut().expect("non-empty") = i;
            addresses.push(address.clone());
            index.put(&chunk(address, &[i], i as i64)).expect("put");
        }

        assert_eq!(index.count().expect("count"), 4);
        assert_eq!(
            index
                .count_from(&by_address(addresses[2].clone()))
                .expect("count_from"),
            2
        );
    }

    #[test]
    fn test_count_from_stays_within_the_index() {
        let shed = open();
        let first = shed.index("first", RetrievalCodec).expect("register");
        let second = shed.index("second", RetrievalCodec).expect("register");

        first.put(&chunk(vec![1; 32], b"a", 1)).expect("put");
        second.put(&chunk(vec![2; 32], b"b", 2)).expect("put");

        // The scan from the last entry of `first` must not spill into
        // `second`'s keyspace.
        assert_eq!(
            first
                .count_from(&by_address(vec![1; 32]))
                .expect("count_from"),
            1
        );
    }

    #[test]
    fn test_batched_writes_are_atomic() {
        let shed = open();
        let index = retrieval(&shed);

        index.put(&chunk(vec![9; 32], b"stale", 1)).expect("put");

        let mut batch = shed.batch();
        index
            .put_in_batch(&mut batch, &chunk(vec![1; 32], b"a", 1))
            .expect("queue put");
        index
            .put_in_batch(&mut batch, &chunk(vec![2; 32], b"b", 2))
            .expect("queue put");
        index
            .delete_in_batch(&mut batch, &by_address(vec![9; 32]))
            .expect("queue delete");

        // The batch never touches the engine until written.
        assert_eq!(index.count().expect("count"), 1);

        shed.write_batch(batch).expect("write batch");
        assert_eq!(index.count().expect("count"), 2);
        assert!(!index.has(&by_address(vec![9; 32])).expect("has"));
    }

    #[test]
    fn test_cursor_snapshot_ignores_later_writes() {
        let shed = open();
        let index = retrieval(&shed);

        index.put(&chunk(vec![1; 32], b"a", 1)).expect("put");

        let cursor = index.iter(IterateOptions::default()).expect("cursor");
        index.put(&chunk(vec![2; 32], b"b", 2)).expect("put");

        let seen: Vec<_> = cursor.map(|item| item.expect("decode")).collect();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].address, Some(vec![1; 32]));
    }

    #[test]
    fn test_truncated_value_is_decode_error() {
        let shed = open();
        let index = retrieval(&shed);

        // Bypass the codec and write a short value under the index's key.
        let mut raw_key = vec![0u8; 33];
        raw_key[0] = 1; // first registered index gets prefix byte 1
        shed.put(&raw_key, b"abc").expect("raw put");

        let err = index.get(&by_address(vec![0; 32])).unwrap_err();
        assert!(matches!(err, Error::CodecDecode { .. }));
    }
}
