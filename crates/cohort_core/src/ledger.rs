//! Append-only membership history.

use crate::clock::Clock;
use crate::error::CoreResult;
use crate::model::{HistoryEntry, Operation, Slug, YearMonth};
use crate::transaction::{TransactionCoordinator, WriteTransaction};
use crate::types::UserId;
use std::sync::Arc;
use tracing::debug;

/// Records every link creation and removal.
///
/// Entries are only ever written through a caller's active transaction, so
/// a history row commits or rolls back together with the change it
/// describes.
#[derive(Clone)]
pub struct AuditLedger {
    coordinator: TransactionCoordinator,
    clock: Arc<dyn Clock>,
}

impl AuditLedger {
    /// Creates a ledger stamping entries with `clock`.
    pub fn new(coordinator: TransactionCoordinator, clock: Arc<dyn Clock>) -> Self {
        Self { coordinator, clock }
    }

    /// Stages one entry on `txn`.
    pub fn append(
        &self,
        txn: &mut WriteTransaction<'_>,
        user_id: UserId,
        slug: &Slug,
        operation: Operation,
    ) -> CoreResult<HistoryEntry> {
        let entry = txn.append_history(user_id, slug.clone(), operation, self.clock.now())?;
        debug!(txid = %txn.id(), %user_id, %slug, %operation, position = entry.position, "history staged");
        Ok(entry)
    }

    /// Entries of `user_id` timestamped within `period`, in append order.
    #[must_use]
    pub fn query_by_user_and_period(&self, user_id: UserId, period: YearMonth) -> Vec<HistoryEntry> {
        self.coordinator.read().history_of(user_id, period)
    }
}

impl std::fmt::Debug for AuditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLedger").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::database::Database;
    use crate::error::CoreError;
    use chrono::{TimeZone, Utc};

    #[test]
    fn entries_follow_their_transaction() {
        let db = Database::open_in_memory().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2023, 8, 1, 9, 0, 0).unwrap()));
        let ledger = AuditLedger::new(db.coordinator().clone(), clock.clone());
        let beta = Slug::parse("beta").unwrap();
        let user = UserId::new(5);

        db.transaction(|txn| ledger.append(txn, user, &beta, Operation::Add).map(|_| ()))
            .unwrap();
        clock.set(Utc.with_ymd_and_hms(2023, 9, 1, 9, 0, 0).unwrap());
        db.transaction(|txn| ledger.append(txn, user, &beta, Operation::Remove).map(|_| ()))
            .unwrap();
        let _ = db.transaction(|txn| {
            ledger.append(txn, user, &beta, Operation::Add)?;
            Err::<(), _>(CoreError::validation("abort"))
        });

        let august = ledger.query_by_user_and_period(user, YearMonth::parse("2023-08").unwrap());
        assert_eq!(august.len(), 1);
        assert_eq!(august[0].operation, Operation::Add);

        let september = ledger.query_by_user_and_period(user, YearMonth::parse("2023-09").unwrap());
        assert_eq!(september.len(), 1);
        assert_eq!(september[0].operation, Operation::Remove);
        assert!(september[0].position > august[0].position);

        let other = ledger.query_by_user_and_period(UserId::new(6), YearMonth::parse("2023-08").unwrap());
        assert!(other.is_empty());
    }
}
