//! Persistent named counters.

use redb::ReadableTable;
use snafu::ResultExt;

use crate::db::{Batch, Shed};
use crate::error::{CodecError, Error, Result, StorageSnafu};

/// A persistent u64 stored under its own prefix byte.
///
/// The value is encoded as 8 bytes big-endian so numeric order matches
/// byte order. A counter that was never written reads as zero, and
/// decrements saturate at zero.
#[derive(Clone, Debug)]
pub struct Counter {
    shed: Shed,
    name: String,
    key: [u8; 1],
}

impl Counter {
    pub(crate) fn new(shed: Shed, name: String, prefix: u8) -> Counter {
        Counter {
            shed,
            name,
            key: [prefix],
        }
    }

    /// Current value; zero if the counter was never written.
    pub fn get(&self) -> Result<u64> {
        match self.shed.get(&self.key) {
            Ok(value) => self.decode(&value),
            Err(Error::NotFound) => Ok(0),
            Err(err) => Err(err),
        }
    }

    /// Store `value`, replacing the current one.
    pub fn put(&self, value: u64) -> Result<()> {
        self.shed.put(&self.key, &value.to_be_bytes())
    }

    /// Add one and return the new value.
    pub fn inc(&self) -> Result<u64> {
        self.update(|value| value.saturating_add(1))
    }

    /// Subtract one, saturating at zero, and return the new value.
    pub fn dec(&self) -> Result<u64> {
        self.update(|value| value.saturating_sub(1))
    }

    /// Queue a put of `value` on `batch`.
    pub fn put_in_batch(&self, batch: &mut Batch, value: u64) {
        batch.put(self.key.to_vec(), value.to_be_bytes().to_vec());
    }

    /// Queue an increment computed against the currently committed value
    /// and return it. The write lands when the batch is written.
    pub fn inc_in_batch(&self, batch: &mut Batch) -> Result<u64> {
        let next = self.get()?.saturating_add(1);
        self.put_in_batch(batch, next);
        Ok(next)
    }

    /// Queue a decrement computed against the currently committed value,
    /// saturating at zero, and return it. The write lands when the batch
    /// is written.
    pub fn dec_in_batch(&self, batch: &mut Batch) -> Result<u64> {
        let next = self.get()?.saturating_sub(1);
        self.put_in_batch(batch, next);
        Ok(next)
    }

    /// Name the counter was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read-modify-write inside one engine transaction.
    fn update(&self, f: impl FnOnce(u64) -> u64) -> Result<u64> {
        self.shed.with_write(|table| {
            let current = {
                match table.get(&self.key[..]).context(StorageSnafu)? {
                    Some(value) => self.decode(value.value())?,
                    None => 0,
                }
            };
            let next = f(current);
            table
                .insert(&self.key[..], &next.to_be_bytes()[..])
                .context(StorageSnafu)?;
            Ok(next)
        })
    }

    fn decode(&self, value: &[u8]) -> Result<u64> {
        let bytes: [u8; 8] = value.try_into().map_err(|_| Error::CodecDecode {
            index: self.name.clone(),
            source: CodecError::Truncated {
                need: 8,
                have: value.len(),
            },
        })?;
        Ok(u64::from_be_bytes(bytes))
    }
}
