//! Streaming journal reader and replay bookkeeping.

use super::{JournalRecord, JournalRecordType, CRC_SIZE, HEADER_SIZE, JOURNAL_MAGIC, JOURNAL_VERSION};
use crate::error::{CoreError, CoreResult};
use crate::journal::compute_crc32;
use crate::types::{SequenceNumber, TransactionId};
use cohort_storage::StorageBackend;
use parking_lot::MutexGuard;
use std::collections::HashMap;

/// Reads journal records one at a time straight from the backend.
///
/// A record cut short by the end of the journal ends iteration cleanly and
/// sets [`JournalIterator::torn_tail`]; corruption yields an error and ends
/// iteration.
pub struct JournalIterator<'a> {
    backend: MutexGuard<'a, Box<dyn StorageBackend>>,
    total_size: u64,
    offset: u64,
    torn_tail: bool,
    finished: bool,
}

impl<'a> JournalIterator<'a> {
    pub(crate) fn new(backend: MutexGuard<'a, Box<dyn StorageBackend>>) -> CoreResult<Self> {
        let total_size = backend.size()?;
        Ok(Self {
            backend,
            total_size,
            offset: 0,
            torn_tail: false,
            finished: false,
        })
    }

    /// Offset just past the last complete record read so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// True if iteration stopped at an incomplete record.
    #[must_use]
    pub fn torn_tail(&self) -> bool {
        self.torn_tail
    }

    fn remaining(&self) -> u64 {
        self.total_size - self.offset
    }

    fn read_next(&mut self) -> CoreResult<Option<(u64, JournalRecord)>> {
        let start = self.offset;
        if self.remaining() == 0 {
            return Ok(None);
        }
        if self.remaining() < HEADER_SIZE as u64 {
            self.torn_tail = true;
            return Ok(None);
        }

        let header = self.backend.read_at(start, HEADER_SIZE)?;
        if header[0..4] != JOURNAL_MAGIC {
            return Err(CoreError::journal_corruption(format!(
                "invalid magic at offset {start}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > JOURNAL_VERSION {
            return Err(CoreError::journal_corruption(format!(
                "unsupported version {version} at offset {start}"
            )));
        }

        let type_byte = header[6];
        let record_type = JournalRecordType::from_byte(type_byte).ok_or_else(|| {
            CoreError::journal_corruption(format!(
                "unknown record type {type_byte} at offset {start}"
            ))
        })?;

        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let total_len = (HEADER_SIZE + payload_len + CRC_SIZE) as u64;
        if self.remaining() < total_len {
            self.torn_tail = true;
            return Ok(None);
        }

        let body = self
            .backend
            .read_at(start + HEADER_SIZE as u64, payload_len + CRC_SIZE)?;
        let (payload, crc_bytes) = body.split_at(payload_len);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        let mut covered = header;
        covered.extend_from_slice(payload);
        let computed_crc = compute_crc32(&covered);
        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let record = JournalRecord::decode_payload(record_type, payload)?;
        self.offset += total_len;
        Ok(Some((start, record)))
    }
}

impl Iterator for JournalIterator<'_> {
    type Item = CoreResult<(u64, JournalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// A transaction whose `Commit` record was found during replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedBatch {
    /// Transaction ID.
    pub txid: TransactionId,
    /// Commit sequence.
    pub sequence: SequenceNumber,
    /// Data records between `Begin` and `Commit`, in journal order.
    pub records: Vec<JournalRecord>,
}

/// Groups replayed records into committed batches.
///
/// Records of a transaction that never reached `Commit` are dropped.
#[derive(Debug, Default)]
pub struct Recovery {
    open: HashMap<TransactionId, Vec<JournalRecord>>,
    committed: Vec<CommittedBatch>,
    max_txid: u64,
    max_seq: u64,
}

impl Recovery {
    /// Creates an empty recovery context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one record in journal order.
    pub fn observe(&mut self, record: JournalRecord) {
        let txid = record.txid();
        self.max_txid = self.max_txid.max(txid.as_u64());

        match record {
            JournalRecord::Begin { .. } => {
                self.open.insert(txid, Vec::new());
            }
            JournalRecord::Commit { sequence, .. } => {
                let records = self.open.remove(&txid).unwrap_or_default();
                self.max_seq = self.max_seq.max(sequence.as_u64());
                self.committed.push(CommittedBatch {
                    txid,
                    sequence,
                    records,
                });
            }
            data => {
                self.open.entry(txid).or_default().push(data);
            }
        }
    }

    /// Number of transactions left without a `Commit`.
    #[must_use]
    pub fn uncommitted_count(&self) -> usize {
        self.open.len()
    }

    /// Next transaction ID to hand out.
    #[must_use]
    pub fn next_txid(&self) -> u64 {
        self.max_txid + 1
    }

    /// Highest committed sequence seen.
    #[must_use]
    pub fn committed_seq(&self) -> u64 {
        self.max_seq
    }

    /// Consumes the context, yielding committed batches in commit order.
    #[must_use]
    pub fn into_committed(self) -> Vec<CommittedBatch> {
        self.committed
    }
}
