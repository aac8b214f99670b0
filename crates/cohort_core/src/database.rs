//! Store handle and crash recovery.

use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::journal::{JournalRecord, JournalWriter, Recovery};
use crate::tables::Tables;
use crate::transaction::{ReadTransaction, TransactionCoordinator, TransactionManager, WriteTransaction};
use crate::types::SequenceNumber;
use cohort_storage::{FileBackend, InMemoryBackend, StorageBackend};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// The store handle.
///
/// Owns the journal, the materialized tables and the writer lock. Opening a
/// store replays every committed batch in the journal; a batch without its
/// `Commit` record is discarded and cut from the end of the journal.
///
/// ```rust,ignore
/// use cohort_core::Database;
/// use std::path::Path;
///
/// let db = Database::open(Path::new("segments_store"))?;
/// db.transaction(|txn| { /* ... */ Ok(()) })?;
/// ```
pub struct Database {
    config: Config,
    /// Directory lock; `None` for stores opened over a bare backend.
    dir: Option<DatabaseDir>,
    txn_manager: Arc<TransactionManager>,
    coordinator: TransactionCoordinator,
}

/// Point-in-time counters describing a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    /// Segments in the catalog.
    pub segments: usize,
    /// User↔segment links.
    pub links: usize,
    /// Ledger entries.
    pub history_entries: usize,
    /// Journal size in bytes.
    pub journal_bytes: u64,
    /// Last committed sequence number.
    pub committed_seq: u64,
}

impl Database {
    /// Opens a store directory with the default configuration.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DatabaseLocked`] if another process has it open
    /// - [`CoreError::JournalCorruption`] or [`CoreError::ChecksumMismatch`]
    ///   if the journal is damaged somewhere other than its tail
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a store directory with custom configuration.
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = DatabaseDir::open(path, config.create_if_missing)?;

        if config.error_if_exists && !dir.is_new_database() {
            return Err(CoreError::invalid_database(format!(
                "store already exists: {}",
                dir.path().display()
            )));
        }

        let backend = FileBackend::open(&dir.journal_path())?;
        let mut db = Self::open_with_backend(config, Box::new(backend))?;
        db.dir = Some(dir);
        Ok(db)
    }

    /// Opens a store over an arbitrary journal backend.
    pub fn open_with_backend(config: Config, backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        let journal = Arc::new(JournalWriter::new(backend, config.sync_on_commit));
        let (tables, next_txid, committed_seq) = Self::recover(&journal)?;

        let txn_manager = Arc::new(TransactionManager::with_state(
            Arc::clone(&journal),
            tables,
            next_txid,
            committed_seq,
        ));
        let coordinator = TransactionCoordinator::new(Arc::clone(&txn_manager));

        Ok(Self {
            config,
            dir: None,
            txn_manager,
            coordinator,
        })
    }

    /// Opens a fresh, non-persistent store.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backend(Config::default(), Box::new(InMemoryBackend::new()))
    }

    /// Replays the journal.
    ///
    /// Returns (tables, next_txid, committed_seq).
    fn recover(journal: &JournalWriter) -> CoreResult<(Tables, u64, u64)> {
        let mut recovery = Recovery::new();
        let journal_size = journal.size()?;
        let mut committed_end = 0u64;
        let torn_tail;

        {
            let mut iter = journal.iter()?;
            while let Some(item) = iter.next() {
                let (_, record) = item?;
                let is_commit = matches!(record, JournalRecord::Commit { .. });
                recovery.observe(record);
                if is_commit {
                    committed_end = iter.position();
                }
            }
            torn_tail = iter.torn_tail();
        }

        if committed_end < journal_size {
            let discarded_bytes = journal_size - committed_end;
            let uncommitted = recovery.uncommitted_count();
            if torn_tail {
                warn!(
                    valid_bytes = committed_end,
                    discarded_bytes,
                    uncommitted,
                    "discarding torn journal record and the batch it belonged to"
                );
            } else {
                warn!(
                    valid_bytes = committed_end,
                    discarded_bytes,
                    uncommitted,
                    "discarding journal batch without a commit marker"
                );
            }
            journal.truncate(committed_end)?;
        }

        let next_txid = recovery.next_txid();
        let committed_seq = recovery.committed_seq();
        let batches = recovery.into_committed();

        let mut tables = Tables::default();
        for batch in &batches {
            for record in &batch.records {
                tables.apply(record);
            }
        }

        if !batches.is_empty() {
            info!(
                batches = batches.len(),
                committed_seq,
                segments = tables.segment_count(),
                links = tables.link_count(),
                "journal replayed"
            );
        }

        Ok((tables, next_txid, committed_seq))
    }

    /// Returns the transaction coordinator for wiring components.
    #[must_use]
    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    /// Returns the transaction manager.
    #[must_use]
    pub fn transaction_manager(&self) -> &Arc<TransactionManager> {
        &self.txn_manager
    }

    /// Runs `f` in a write transaction; see [`TransactionCoordinator::run`].
    pub fn transaction<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut WriteTransaction<'_>) -> CoreResult<T>,
    {
        self.coordinator.run(f)
    }

    /// Takes a snapshot of committed state.
    #[must_use]
    pub fn begin_read(&self) -> ReadTransaction {
        self.txn_manager.begin_read()
    }

    /// Returns the last committed sequence number.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.txn_manager.committed_seq()
    }

    /// Returns store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the store directory, if opened from one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(DatabaseDir::path)
    }

    /// Reads every journal record with its offset.
    pub fn journal_records(&self) -> CoreResult<Vec<(u64, JournalRecord)>> {
        self.txn_manager.journal().read_all()
    }

    /// Collects store counters.
    pub fn stats(&self) -> CoreResult<DatabaseStats> {
        let snapshot = self.begin_read();
        Ok(DatabaseStats {
            segments: snapshot.segment_count(),
            links: snapshot.link_count(),
            history_entries: snapshot.history_len(),
            journal_bytes: self.txn_manager.journal().size()?,
            committed_seq: snapshot.committed_seq().as_u64(),
        })
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path())
            .field("committed_seq", &self.committed_seq())
            .finish_non_exhaustive()
    }
}
