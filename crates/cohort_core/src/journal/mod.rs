//! Append-only membership journal.
//!
//! Every committed transaction is written as one contiguous batch of
//! records ending in a `Commit` record. On open, the journal is replayed and
//! only batches that reached their `Commit` are applied.
//!
//! ## Record Format
//!
//! ```text
//! | magic (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! The payload is the CBOR encoding of the record.
//!
//! ## Recovery Policy
//!
//! Tolerated, treated as a clean end of log:
//! - a header shorter than 11 bytes at the tail
//! - a payload or CRC that runs past the tail
//!
//! Fatal, the store refuses to open:
//! - CRC mismatch
//! - bad magic
//! - unknown record type or a type byte that disagrees with the payload
//! - a version newer than this build understands

mod iterator;
mod record;
mod writer;

pub use iterator::{CommittedBatch, JournalIterator, Recovery};
pub use record::{compute_crc32, JournalRecord, JournalRecordType};
pub use writer::{AppendError, JournalWriter};

/// Magic bytes at the start of every record.
pub(crate) const JOURNAL_MAGIC: [u8; 4] = *b"CJNL";

/// Current record format version.
pub(crate) const JOURNAL_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

/// Trailing checksum size.
pub(crate) const CRC_SIZE: usize = 4;
