//! Error types for the shed storage layer.

use snafu::Snafu;

/// Result type alias for shed operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the shed layer.
///
/// Engine failures are wrapped verbatim; nothing is swallowed. `NotFound`
/// is an expected outcome of lookups and is never logged above debug level.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The requested key is not present in the store.
    #[snafu(display("key not found"))]
    NotFound,

    /// A codec rejected its input while encoding a key or value.
    #[snafu(display("index {index}: encoding failed: {source}"))]
    CodecEncode {
        /// Name of the index whose codec failed.
        index: String,
        /// The underlying codec failure.
        source: CodecError,
    },

    /// A codec rejected stored bytes while decoding a key or value.
    #[snafu(display("index {index}: decoding failed: {source}"))]
    CodecDecode {
        /// Name of the index whose codec failed.
        index: String,
        /// The underlying codec failure.
        source: CodecError,
    },

    /// Every allocatable prefix byte is already taken.
    #[snafu(display("schema has no free prefix byte left"))]
    SchemaFull,

    /// The persisted schema record could not be encoded or decoded.
    #[snafu(display("schema record codec failure: {source}"))]
    SchemaCorrupt {
        /// The underlying serialization error.
        source: postcard::Error,
    },

    /// Failed to open the underlying database.
    #[snafu(display("failed to open database at {path}: {source}"))]
    Open {
        /// Location of the database.
        path: String,
        /// The underlying engine error.
        source: redb::DatabaseError,
    },

    /// Error from an engine storage operation.
    #[snafu(display("storage error: {source}"))]
    Storage {
        /// The underlying engine error.
        source: redb::StorageError,
    },

    /// Error opening an engine table.
    #[snafu(display("table error: {source}"))]
    Table {
        /// The underlying engine error.
        source: redb::TableError,
    },

    /// Error beginning an engine transaction.
    #[snafu(display("transaction error: {source}"))]
    Transaction {
        /// The underlying engine error.
        source: redb::TransactionError,
    },

    /// Error committing an engine transaction.
    #[snafu(display("commit error: {source}"))]
    Commit {
        /// The underlying engine error.
        source: redb::CommitError,
    },
}

impl Error {
    /// True when the error is the `NotFound` sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

/// Failures produced by user-supplied index codecs.
///
/// Codecs must be total: they either succeed or fail with one of these,
/// never emit bytes that could collide with another index's keyspace.
#[derive(Debug, Snafu)]
pub enum CodecError {
    /// A field required by the codec is absent from the item.
    #[snafu(display("missing field {field}"))]
    MissingField {
        /// Name of the absent field.
        field: &'static str,
    },

    /// The input is shorter than the encoding requires.
    #[snafu(display("truncated input: need {need} bytes, have {have}"))]
    Truncated {
        /// Bytes the encoding requires.
        need: usize,
        /// Bytes actually present.
        have: usize,
    },

    /// The bytes are well-formed but their content is invalid.
    #[snafu(display("invalid content: {reason}"))]
    Invalid {
        /// Description of what was rejected.
        reason: String,
    },
}
