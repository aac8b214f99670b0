//! Expired-link housekeeping.

use crate::error::CoreResult;
use crate::ledger::AuditLedger;
use crate::model::{MembershipLink, Operation};
use crate::transaction::{TransactionCoordinator, WriteTransaction};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Removes links whose expiry has passed.
#[derive(Debug, Clone)]
pub struct ExpirySweeper {
    coordinator: TransactionCoordinator,
    ledger: AuditLedger,
}

impl ExpirySweeper {
    /// Creates a sweeper writing `Remove` history through `ledger`.
    #[must_use]
    pub fn new(coordinator: TransactionCoordinator, ledger: AuditLedger) -> Self {
        Self {
            coordinator,
            ledger,
        }
    }

    /// Deletes every link with `expires_at <= now` and returns how many.
    ///
    /// Runs as one transaction. A second call with nothing left to expire
    /// returns zero.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let removed = self.coordinator.run(|txn| {
            let expired = txn.links_expiring_by(now)?;
            for link in &expired {
                self.expire(txn, link)
                    .map_err(|e| e.in_step("expire", link.slug.as_str()))?;
            }
            Ok(expired.len())
        })?;

        if removed > 0 {
            info!(removed, %now, "expired links swept");
        } else {
            debug!(%now, "no expired links");
        }
        Ok(removed)
    }

    fn expire(&self, txn: &mut WriteTransaction<'_>, link: &MembershipLink) -> CoreResult<()> {
        txn.delete_link(link.user_id, &link.slug)?;
        self.ledger
            .append(txn, link.user_id, &link.slug, Operation::Remove)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::database::Database;
    use crate::error::{CoreError, ErrorKind};
    use crate::membership::{MembershipPatch, MembershipStore};
    use crate::model::YearMonth;
    use crate::types::UserId;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[test]
    fn sweep_is_inclusive_and_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2023, 8, 30, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(now));
        let ledger = AuditLedger::new(db.coordinator().clone(), clock);
        let store = MembershipStore::new(db.coordinator().clone(), ledger.clone());
        let sweeper = ExpirySweeper::new(db.coordinator().clone(), ledger.clone());

        store
            .patch(&MembershipPatch::new(UserId::new(1)).add("trial").expires_at(Some(now)))
            .unwrap();
        store
            .patch(
                &MembershipPatch::new(UserId::new(2))
                    .add("trial")
                    .expires_at(Some(now + chrono::Duration::seconds(1))),
            )
            .unwrap();
        store
            .patch(&MembershipPatch::new(UserId::new(3)).add("trial"))
            .unwrap();

        assert_eq!(sweeper.sweep_expired(now - chrono::Duration::seconds(1)).unwrap(), 0);
        assert_eq!(sweeper.sweep_expired(now).unwrap(), 1);
        assert_eq!(sweeper.sweep_expired(now).unwrap(), 0);

        assert!(store.list_segments(UserId::new(1)).is_empty());
        assert_eq!(store.list_segments(UserId::new(2)).len(), 1);

        let history = ledger.query_by_user_and_period(UserId::new(1), YearMonth::parse("2023-08").unwrap());
        let ops: Vec<_> = history.iter().map(|e| e.operation).collect();
        assert_eq!(ops, vec![Operation::Add, Operation::Remove]);
    }

    #[test]
    fn failed_expiry_names_the_slug() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2023, 8, 30, 12, 0, 0).unwrap();
        let ledger = AuditLedger::new(db.coordinator().clone(), Arc::new(ManualClock::new(now)));
        let store = MembershipStore::new(db.coordinator().clone(), ledger.clone());
        let sweeper = ExpirySweeper::new(db.coordinator().clone(), ledger);

        store
            .patch(&MembershipPatch::new(UserId::new(1)).add("trial").expires_at(Some(now)))
            .unwrap();

        let err = db
            .coordinator()
            .run(|txn| {
                let link = txn.links_expiring_by(now)?.remove(0);
                txn.delete_link(link.user_id, &link.slug)?;
                sweeper
                    .expire(txn, &link)
                    .map_err(|e| e.in_step("expire", link.slug.as_str()))
            })
            .unwrap_err();

        assert!(matches!(err, CoreError::Step { operation: "expire", ref slug, .. } if slug == "trial"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.list_segments(UserId::new(1)).len(), 1);
    }
}
