//! Transaction manager.

use crate::error::{CoreError, CoreResult};
use crate::journal::{AppendError, JournalRecord, JournalWriter};
use crate::tables::Tables;
use crate::transaction::state::{ReadTransaction, WriteTransaction};
use crate::types::{SequenceNumber, TransactionId};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Manages transactions over the journal and the materialized tables.
///
/// The transaction manager provides:
/// - Single-writer concurrency control via `begin_write()`
/// - Snapshot reads via `begin_read()`
/// - Journal-first durability
/// - Commit ordering via sequence numbers
pub struct TransactionManager {
    /// Journal for durability.
    journal: Arc<JournalWriter>,
    /// Committed tables. Replaced copy-on-write at commit.
    tables: RwLock<Arc<Tables>>,
    /// Next transaction ID.
    next_txid: AtomicU64,
    /// Next sequence number.
    next_seq: AtomicU64,
    /// Current committed sequence.
    committed_seq: AtomicU64,
    /// Write lock - only one writer at a time.
    write_lock: Mutex<()>,
}

impl TransactionManager {
    /// Creates a manager over an empty store.
    pub fn new(journal: Arc<JournalWriter>) -> Self {
        Self::with_state(journal, Tables::default(), 1, 0)
    }

    /// Creates a manager initialized from recovery state.
    pub(crate) fn with_state(
        journal: Arc<JournalWriter>,
        tables: Tables,
        next_txid: u64,
        committed_seq: u64,
    ) -> Self {
        Self {
            journal,
            tables: RwLock::new(Arc::new(tables)),
            next_txid: AtomicU64::new(next_txid),
            next_seq: AtomicU64::new(committed_seq + 1),
            committed_seq: AtomicU64::new(committed_seq),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the journal.
    #[must_use]
    pub fn journal(&self) -> &Arc<JournalWriter> {
        &self.journal
    }

    /// Returns the last committed sequence number.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }

    /// Takes a snapshot of committed state.
    #[must_use]
    pub fn begin_read(&self) -> ReadTransaction {
        let snapshot = Arc::clone(&self.tables.read());
        ReadTransaction::new(snapshot, self.committed_seq())
    }

    /// Begins a write transaction, blocking until the writer lock is free.
    ///
    /// The lock is released when the transaction is committed, rolled back
    /// or dropped.
    pub fn begin_write(&self) -> WriteTransaction<'_> {
        let guard = self.write_lock.lock();
        let txid = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        let base = Arc::clone(&self.tables.read());
        debug!(%txid, "write transaction started");
        WriteTransaction::new(txid, base, guard)
    }

    /// Commits a write transaction.
    ///
    /// A transaction with no staged writes commits without touching the
    /// journal and returns the current committed sequence. Otherwise the
    /// batch `Begin, writes…, Commit` is appended and made durable, and only
    /// then applied to the tables.
    ///
    /// # Errors
    ///
    /// [`CoreError::Transaction`] if `txn` is not active;
    /// [`CoreError::CommitFailed`] if the journal write failed, in which
    /// case the transaction is rolled back and nothing is visible.
    pub fn commit(&self, txn: &mut WriteTransaction<'_>) -> CoreResult<SequenceNumber> {
        txn.ensure_committable()?;
        let txid = txn.id();

        if txn.write_count() == 0 {
            txn.mark_committed();
            return Ok(self.committed_seq());
        }

        let sequence = SequenceNumber::new(self.next_seq.load(Ordering::SeqCst));
        let mut batch = Vec::with_capacity(txn.write_count() + 2);
        batch.push(JournalRecord::Begin { txid });
        batch.extend(txn.staged_records().iter().cloned());
        batch.push(JournalRecord::Commit { txid, sequence });

        if let Err(err) = self.journal.append_batch(&batch) {
            txn.mark_aborted();
            return Err(match err {
                AppendError::Encode(err) => err,
                AppendError::Storage(source) => {
                    warn!(%txid, error = %source, "journal append failed, transaction rolled back");
                    CoreError::CommitFailed { txid, source }
                }
            });
        }

        {
            let mut tables = self.tables.write();
            let tables = Arc::make_mut(&mut tables);
            for record in txn.staged_records() {
                tables.apply(record);
            }
        }

        self.next_seq.store(sequence.as_u64() + 1, Ordering::SeqCst);
        self.committed_seq.store(sequence.as_u64(), Ordering::SeqCst);
        debug!(%txid, %sequence, records = txn.write_count(), "transaction committed");
        txn.mark_committed();
        Ok(sequence)
    }

    /// Rolls back a write transaction, discarding its staged writes.
    ///
    /// # Errors
    ///
    /// [`CoreError::Transaction`] if `txn` is not active.
    pub fn rollback(&self, txn: &mut WriteTransaction<'_>) -> CoreResult<()> {
        txn.ensure_committable()?;
        debug!(txid = %txn.id(), staged = txn.write_count(), "transaction rolled back");
        txn.mark_aborted();
        Ok(())
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("next_txid", &self.next_txid.load(Ordering::SeqCst))
            .field("committed_seq", &self.committed_seq.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MembershipLink, Operation, Segment, Slug, YearMonth};
    use crate::transaction::TransactionState;
    use crate::types::UserId;
    use chrono::{TimeZone, Utc};
    use cohort_storage::InMemoryBackend;

    fn manager() -> TransactionManager {
        let journal = JournalWriter::new(Box::new(InMemoryBackend::new()), false);
        TransactionManager::new(Arc::new(journal))
    }

    fn slug(s: &str) -> Slug {
        Slug::parse(s).unwrap()
    }

    fn link(user: i64, s: &str) -> MembershipLink {
        MembershipLink {
            user_id: UserId::new(user),
            slug: slug(s),
            expires_at: None,
        }
    }

    #[test]
    fn commit_makes_writes_visible() {
        let tm = manager();
        let before = tm.begin_read();

        let mut txn = tm.begin_write();
        txn.insert_segment(Segment::new(slug("beta"), None)).unwrap();
        txn.insert_link(link(1, "beta")).unwrap();
        let seq = tm.commit(&mut txn).unwrap();
        drop(txn);

        assert_eq!(seq, SequenceNumber::new(1));
        assert!(before.segment("beta").is_none());
        let after = tm.begin_read();
        assert!(after.segment("beta").is_some());
        assert_eq!(after.users_in("beta"), vec![UserId::new(1)]);
        assert_eq!(after.committed_seq(), seq);
    }

    #[test]
    fn staged_writes_are_visible_inside_transaction_only() {
        let tm = manager();
        let mut txn = tm.begin_write();
        txn.insert_link(link(1, "beta")).unwrap();

        assert!(txn.link(UserId::new(1), &slug("beta")).unwrap().is_some());
        assert_eq!(txn.users_in("beta").unwrap(), vec![UserId::new(1)]);
        assert!(tm.begin_read().link(UserId::new(1), "beta").is_none());

        tm.rollback(&mut txn).unwrap();
        drop(txn);
        assert!(tm.begin_read().link(UserId::new(1), "beta").is_none());
    }

    #[test]
    fn duplicate_and_missing_rows() {
        let tm = manager();
        let mut txn = tm.begin_write();
        txn.insert_link(link(1, "beta")).unwrap();
        let dup = txn.insert_link(link(1, "beta")).unwrap_err();
        assert!(matches!(dup, CoreError::LinkExists { .. }));

        txn.delete_link(UserId::new(1), &slug("beta")).unwrap();
        let missing = txn.delete_link(UserId::new(1), &slug("beta")).unwrap_err();
        assert!(matches!(missing, CoreError::LinkNotFound { .. }));

        let missing = txn.delete_segment(&slug("beta")).unwrap_err();
        assert!(matches!(missing, CoreError::SegmentNotFound { .. }));
    }

    #[test]
    fn empty_commit_skips_journal() {
        let tm = manager();
        let mut txn = tm.begin_write();
        assert_eq!(tm.commit(&mut txn).unwrap(), SequenceNumber::new(0));
        assert_eq!(txn.state(), TransactionState::Committed);
        drop(txn);
        assert_eq!(tm.journal().size().unwrap(), 0);
    }

    #[test]
    fn finished_transaction_rejects_work() {
        let tm = manager();
        let mut txn = tm.begin_write();
        txn.insert_segment(Segment::new(slug("beta"), None)).unwrap();
        tm.commit(&mut txn).unwrap();

        let err = tm.commit(&mut txn).unwrap_err();
        assert!(matches!(err, CoreError::Transaction { .. }));
        assert!(txn.insert_segment(Segment::new(slug("other"), None)).is_err());
        assert!(tm.rollback(&mut txn).is_err());
    }

    #[test]
    fn dropped_transaction_discards_writes_and_frees_lock() {
        let tm = manager();
        {
            let mut txn = tm.begin_write();
            txn.insert_segment(Segment::new(slug("beta"), None)).unwrap();
        }
        let mut txn = tm.begin_write();
        assert!(txn.segment("beta").unwrap().is_none());
        tm.rollback(&mut txn).unwrap();
    }

    #[test]
    fn history_positions_continue_across_commits() {
        let tm = manager();
        let at = Utc.with_ymd_and_hms(2023, 8, 30, 12, 0, 0).unwrap();
        for expected in 1..=2 {
            let mut txn = tm.begin_write();
            let staged = txn
                .append_history(UserId::new(1), slug("beta"), Operation::Add, at)
                .unwrap();
            assert_eq!(staged.position, expected);
            tm.commit(&mut txn).unwrap();
        }

        let history = tm
            .begin_read()
            .history_of(UserId::new(1), YearMonth::parse("2023-08").unwrap());
        let positions: Vec<_> = history.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2]);
    }
}
