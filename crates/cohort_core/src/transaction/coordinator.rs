//! Unit-of-work helper over the transaction manager.

use crate::error::CoreResult;
use crate::transaction::{ReadTransaction, TransactionManager, WriteTransaction};
use std::sync::Arc;

/// Runs closures inside a write transaction.
///
/// Components receive a coordinator instead of the database so they can be
/// wired together without a shared global.
#[derive(Debug, Clone)]
pub struct TransactionCoordinator {
    manager: Arc<TransactionManager>,
}

impl TransactionCoordinator {
    /// Wraps a transaction manager.
    #[must_use]
    pub fn new(manager: Arc<TransactionManager>) -> Self {
        Self { manager }
    }

    /// Returns the underlying manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    /// Runs `f` in a write transaction.
    ///
    /// Commits if `f` returns `Ok`, rolls back if it returns `Err`. A commit
    /// failure is returned as the error and nothing is applied.
    pub fn run<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut WriteTransaction<'_>) -> CoreResult<T>,
    {
        let mut txn = self.manager.begin_write();
        match f(&mut txn) {
            Ok(value) => {
                self.manager.commit(&mut txn)?;
                Ok(value)
            }
            Err(err) => {
                self.manager.rollback(&mut txn)?;
                Err(err)
            }
        }
    }

    /// Takes a snapshot of committed state.
    #[must_use]
    pub fn read(&self) -> ReadTransaction {
        self.manager.begin_read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::journal::JournalWriter;
    use crate::model::{Segment, Slug};
    use cohort_storage::InMemoryBackend;

    fn coordinator() -> TransactionCoordinator {
        let journal = JournalWriter::new(Box::new(InMemoryBackend::new()), false);
        TransactionCoordinator::new(Arc::new(TransactionManager::new(Arc::new(journal))))
    }

    #[test]
    fn ok_commits() {
        let coord = coordinator();
        coord
            .run(|txn| txn.insert_segment(Segment::new(Slug::parse("beta")?, None)))
            .unwrap();
        assert!(coord.read().segment("beta").is_some());
    }

    #[test]
    fn err_rolls_back_everything() {
        let coord = coordinator();
        let err = coord
            .run(|txn| {
                txn.insert_segment(Segment::new(Slug::parse("beta")?, None))?;
                Err::<(), _>(CoreError::validation("stop"))
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert!(coord.read().segment("beta").is_none());
        assert_eq!(coord.manager().journal().size().unwrap(), 0);
    }
}
