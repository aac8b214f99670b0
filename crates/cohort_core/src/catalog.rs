//! Segment definitions.

use crate::assembler::RolloutSource;
use crate::error::CoreResult;
use crate::ledger::AuditLedger;
use crate::model::{Operation, Percentage, Segment, Slug};
use crate::transaction::TransactionCoordinator;
use std::collections::BTreeMap;
use tracing::info;

/// Owns the segment catalog.
#[derive(Debug, Clone)]
pub struct SegmentCatalog {
    coordinator: TransactionCoordinator,
    ledger: AuditLedger,
}

impl SegmentCatalog {
    /// Creates a catalog writing cascade history through `ledger`.
    #[must_use]
    pub fn new(coordinator: TransactionCoordinator, ledger: AuditLedger) -> Self {
        Self {
            coordinator,
            ledger,
        }
    }

    /// Adds a segment, optionally with a rollout percentage.
    ///
    /// # Errors
    ///
    /// Validation if the slug or percentage is malformed (checked before
    /// any transaction), [`CoreError::SegmentExists`] if the slug is taken.
    ///
    /// [`CoreError::SegmentExists`]: crate::CoreError::SegmentExists
    pub fn create(&self, slug: &str, percentage: Option<i64>) -> CoreResult<Slug> {
        let slug = Slug::parse(slug)?;
        let rollout = percentage.map(Percentage::new).transpose()?;

        let segment = Segment::new(slug.clone(), rollout);
        self.coordinator.run(|txn| txn.insert_segment(segment))?;

        info!(%slug, rollout = ?rollout.map(Percentage::value), "segment created");
        Ok(slug)
    }

    /// Removes a segment and records a `Remove` entry for every user still
    /// linked to it, all in one transaction.
    ///
    /// The links themselves stay in place.
    ///
    /// # Errors
    ///
    /// [`CoreError::SegmentNotFound`] if the slug is not in the catalog.
    ///
    /// [`CoreError::SegmentNotFound`]: crate::CoreError::SegmentNotFound
    pub fn delete(&self, slug: &str) -> CoreResult<Slug> {
        let slug = Slug::parse(slug)?;

        let affected = self.coordinator.run(|txn| {
            txn.delete_segment(&slug)?;
            let users = txn.users_in(slug.as_str())?;
            for user_id in &users {
                self.ledger.append(txn, *user_id, &slug, Operation::Remove)?;
            }
            Ok(users.len())
        })?;

        info!(%slug, affected_users = affected, "segment deleted");
        Ok(slug)
    }

    /// Looks up a segment.
    pub fn get(&self, slug: &str) -> CoreResult<Option<Segment>> {
        let slug = Slug::parse(slug)?;
        Ok(self.coordinator.read().segment(slug.as_str()))
    }

    /// All segments ordered by slug.
    #[must_use]
    pub fn list(&self) -> Vec<Segment> {
        self.coordinator.read().segments()
    }
}

impl RolloutSource for SegmentCatalog {
    fn rollout_segments(&self) -> CoreResult<BTreeMap<Slug, Percentage>> {
        Ok(self
            .coordinator
            .read()
            .rollout_segments()
            .into_iter()
            .filter_map(|segment| segment.rollout.map(|p| (segment.slug, p)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::database::Database;
    use crate::error::{CoreError, ErrorKind};
    use crate::model::MembershipLink;
    use crate::types::UserId;
    use std::sync::Arc;

    fn catalog(db: &Database) -> SegmentCatalog {
        let ledger = AuditLedger::new(db.coordinator().clone(), Arc::new(SystemClock));
        SegmentCatalog::new(db.coordinator().clone(), ledger)
    }

    #[test]
    fn create_and_duplicate() {
        let db = Database::open_in_memory().unwrap();
        let catalog = catalog(&db);

        assert_eq!(catalog.create("beta", Some(30)).unwrap().as_str(), "beta");
        let err = catalog.create("beta", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let segment = catalog.get("beta").unwrap().unwrap();
        assert_eq!(segment.rollout.map(Percentage::value), Some(30));
    }

    #[test]
    fn create_validates_before_writing() {
        let db = Database::open_in_memory().unwrap();
        let catalog = catalog(&db);

        assert_eq!(catalog.create("Bad Slug", None).unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(catalog.create("ok", Some(101)).unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(db.stats().unwrap().journal_bytes, 0);
    }

    #[test]
    fn delete_cascades_history_but_keeps_links() {
        let db = Database::open_in_memory().unwrap();
        let catalog = catalog(&db);
        catalog.create("x", None).unwrap();
        db.transaction(|txn| {
            for user in [1, 2] {
                txn.insert_link(MembershipLink {
                    user_id: UserId::new(user),
                    slug: Slug::parse("x")?,
                    expires_at: None,
                })?;
            }
            Ok(())
        })
        .unwrap();

        catalog.delete("x").unwrap();

        let snapshot = db.begin_read();
        assert!(snapshot.segment("x").is_none());
        assert_eq!(snapshot.history_len(), 2);
        assert_eq!(snapshot.users_in("x").len(), 2);
    }

    #[test]
    fn delete_unknown_changes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let catalog = catalog(&db);
        let before = db.stats().unwrap();

        let err = catalog.delete("ghost").unwrap_err();
        assert!(matches!(err, CoreError::SegmentNotFound { .. }));
        assert_eq!(db.stats().unwrap(), before);
    }

    #[test]
    fn rollout_segments_only_lists_percentages() {
        let db = Database::open_in_memory().unwrap();
        let catalog = catalog(&db);
        catalog.create("plain", None).unwrap();
        catalog.create("half", Some(50)).unwrap();
        catalog.create("none", Some(0)).unwrap();

        let rollouts = catalog.rollout_segments().unwrap();
        let slugs: Vec<_> = rollouts.keys().map(Slug::as_str).collect();
        assert_eq!(slugs, vec!["half", "none"]);
        assert_eq!(catalog.list().len(), 3);
    }
}
