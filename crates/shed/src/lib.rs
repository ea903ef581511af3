//! shed: typed secondary indexes over an embedded ordered key-value store.
//!
//! A [`Shed`] wraps one byte-ordered keyspace and lets any number of
//! logical indexes and counters coexist in it without collision. Each
//! index is registered under a name, gets a unique one-byte key prefix
//! from the persistent schema, and carries a bundle of user-supplied
//! codecs ([`IndexCodec`]) projecting the shared [`Item`] record into
//! sortable byte keys and compact byte values.
//!
//! Because the codec's key bytes determine sort order within an index,
//! higher layers can lean on lexicographic scans: nearest-neighbour
//! retrieval, synchronisation by proximity bin, eviction in access
//! order, pin reference counts.
//!
//! ## Example
//!
//! ```
//! use shed::{CodecError, IndexCodec, Item, Options, Shed};
//!
//! /// Key is the chunk address; value is the payload.
//! struct AddressToData;
//!
//! impl IndexCodec for AddressToData {
//!     fn encode_key(&self, fields: &Item) -> Result<Vec<u8>, CodecError> {
//!         fields
//!             .address
//!             .clone()
//!             .ok_or(CodecError::MissingField { field: "address" })
//!     }
//!
//!     fn decode_key(&self, key: &[u8]) -> Result<Item, CodecError> {
//!         Ok(Item {
//!             address: Some(key.to_vec()),
//!             ..Item::default()
//!         })
//!     }
//!
//!     fn encode_value(&self, fields: &Item) -> Result<Vec<u8>, CodecError> {
//!         fields
//!             .data
//!             .clone()
//!             .ok_or(CodecError::MissingField { field: "data" })
//!     }
//!
//!     fn decode_value(&self, _key_fields: &Item, value: &[u8]) -> Result<Item, CodecError> {
//!         Ok(Item {
//!             data: Some(value.to_vec()),
//!             ..Item::default()
//!         })
//!     }
//! }
//!
//! fn main() -> shed::Result<()> {
//!     let shed = Shed::open_in_memory(Options::default())?;
//!     let retrieval = shed.index("retrieval", AddressToData)?;
//!
//!     retrieval.put(&Item {
//!         address: Some(vec![1; 32]),
//!         data: Some(b"hello".to_vec()),
//!         ..Item::default()
//!     })?;
//!
//!     let item = retrieval.get(&Item {
//!         address: Some(vec![1; 32]),
//!         ..Item::default()
//!     })?;
//!     assert_eq!(item.data.as_deref(), Some(&b"hello"[..]));
//!     Ok(())
//! }
//! ```
//!
//! ## Ownership of bytes
//!
//! The engine lends memory: slices inside its access guards alias pages
//! that are invalid past the next iterator step or transaction close.
//! Everything this crate hands out is copied first; everything it passes
//! into a codec is valid only for the duration of the call.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod counter;
pub mod db;
pub mod error;
pub mod index;
pub mod item;
mod schema;

pub use counter::Counter;
pub use db::{Batch, Options, Shed};
pub use error::{CodecError, Error, Result};
pub use index::{Index, IndexCodec, IndexCursor, IterateOptions};
pub use item::Item;
