//! Journal writer.

use super::{JournalIterator, JournalRecord, CRC_SIZE, HEADER_SIZE, JOURNAL_MAGIC, JOURNAL_VERSION};
use crate::error::{CoreError, CoreResult};
use crate::journal::compute_crc32;
use cohort_storage::{StorageBackend, StorageError};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Appends record batches to a storage backend and reads them back.
pub struct JournalWriter {
    backend: Mutex<Box<dyn StorageBackend>>,
    /// Start of a failed batch that could not be cut back yet.
    /// Only touched while `backend` is locked.
    torn_from: Mutex<Option<u64>>,
    sync_on_commit: bool,
}

impl JournalWriter {
    /// Creates a writer over `backend`.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            torn_from: Mutex::new(None),
            sync_on_commit,
        }
    }

    /// Frames a single record with its envelope.
    pub fn frame(record: &JournalRecord) -> CoreResult<Vec<u8>> {
        let payload = record.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::codec("journal record payload too large"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&JOURNAL_MAGIC);
        data.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        data.push(record.record_type().as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }

    /// Appends `records` in a single backend write and makes them durable.
    ///
    /// If the write, flush or sync fails the journal is cut back to its
    /// previous length so a half-written batch never precedes later ones.
    /// When that cut fails too, the offset is remembered and every later
    /// append first retries it, failing until the torn bytes are gone.
    ///
    /// Returns the offset of the first record.
    pub fn append_batch(&self, records: &[JournalRecord]) -> Result<u64, AppendError> {
        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&Self::frame(record).map_err(AppendError::Encode)?);
        }

        let mut backend = self.backend.lock();
        let mut torn_from = self.torn_from.lock();
        if let Some(offset) = *torn_from {
            backend.truncate(offset).map_err(AppendError::Storage)?;
            debug!(offset, "cut back torn journal batch");
            *torn_from = None;
        }

        let start = backend.size().map_err(AppendError::Storage)?;

        let written = backend.append(&data).and_then(|offset| {
            backend.flush()?;
            if self.sync_on_commit {
                backend.sync()?;
            }
            Ok(offset)
        });

        match written {
            Ok(offset) => Ok(offset),
            Err(err) => {
                if let Err(undo) = backend.truncate(start) {
                    warn!(error = %undo, offset = start, "failed to cut back torn journal batch");
                    *torn_from = Some(start);
                }
                Err(AppendError::Storage(err))
            }
        }
    }

    /// Returns the journal size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Returns the offset of a torn batch still waiting to be cut back.
    #[must_use]
    pub fn torn_from(&self) -> Option<u64> {
        let _backend = self.backend.lock();
        *self.torn_from.lock()
    }

    /// Cuts the journal at `offset`.
    pub fn truncate(&self, offset: u64) -> CoreResult<()> {
        let mut backend = self.backend.lock();
        backend.truncate(offset)?;
        let mut torn_from = self.torn_from.lock();
        if torn_from.is_some_and(|torn| offset <= torn) {
            *torn_from = None;
        }
        Ok(())
    }

    /// Returns a streaming iterator over every record.
    pub fn iter(&self) -> CoreResult<JournalIterator<'_>> {
        JournalIterator::new(self.backend.lock())
    }

    /// Reads every record with its offset.
    pub fn read_all(&self) -> CoreResult<Vec<(u64, JournalRecord)>> {
        self.iter()?.collect()
    }
}

impl std::fmt::Debug for JournalWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalWriter")
            .field("sync_on_commit", &self.sync_on_commit)
            .finish_non_exhaustive()
    }
}

/// Why a batch append failed.
#[derive(Debug)]
pub enum AppendError {
    /// A record could not be encoded; nothing was written.
    Encode(CoreError),
    /// The backend rejected the write.
    Storage(StorageError),
}
