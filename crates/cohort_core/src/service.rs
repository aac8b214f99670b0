//! Service facade wiring the components together.

use crate::assembler::{MembershipAssembler, RolloutSource};
use crate::catalog::SegmentCatalog;
use crate::clock::{Clock, SystemClock};
use crate::database::Database;
use crate::error::CoreResult;
use crate::ledger::AuditLedger;
use crate::membership::{MembershipPatch, MembershipStore};
use crate::model::{Segment, Slug, YearMonth};
use crate::report::{HistoryReport, ReportHandle};
use crate::sweeper::ExpirySweeper;
use crate::types::UserId;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The operations offered to a calling layer.
///
/// Each component gets its collaborators passed in explicitly; the service
/// only builds them and forwards calls.
pub struct SegmentService {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    catalog: Arc<SegmentCatalog>,
    membership: Arc<MembershipStore>,
    assembler: MembershipAssembler,
    sweeper: ExpirySweeper,
    reports: HistoryReport,
}

impl SegmentService {
    /// Builds the service over `db` using the system clock.
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    /// Builds the service with a custom time source.
    pub fn with_clock(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        let coordinator = db.coordinator().clone();
        let ledger = AuditLedger::new(coordinator.clone(), Arc::clone(&clock));

        let catalog = Arc::new(SegmentCatalog::new(coordinator.clone(), ledger.clone()));
        let membership = Arc::new(MembershipStore::new(coordinator.clone(), ledger.clone()));
        let assembler = MembershipAssembler::new(membership.clone(), catalog.clone());
        let sweeper = ExpirySweeper::new(coordinator, ledger.clone());
        let reports = HistoryReport::new(ledger, db.config().report_dir.clone());

        Self {
            db,
            clock,
            catalog,
            membership,
            assembler,
            sweeper,
            reports,
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Creates a segment.
    pub fn create_segment(&self, slug: &str, percentage: Option<i64>) -> CoreResult<String> {
        self.catalog.create(slug, percentage).map(Slug::into_string)
    }

    /// Deletes a segment, recording removal history for its users.
    pub fn delete_segment(&self, slug: &str) -> CoreResult<String> {
        self.catalog.delete(slug).map(Slug::into_string)
    }

    /// Applies a membership patch atomically.
    pub fn patch_membership(&self, patch: MembershipPatch) -> CoreResult<UserId> {
        self.membership.patch(&patch)
    }

    /// Explicit and rollout segments of `user_id`.
    pub fn get_assembled_segments(&self, user_id: UserId) -> CoreResult<Vec<String>> {
        Ok(self
            .assembler
            .segments_for(user_id)?
            .into_iter()
            .map(Slug::into_string)
            .collect())
    }

    /// Writes the user's history for `year_month` (`YYYY-MM`) to a report.
    pub fn get_user_history(&self, user_id: UserId, year_month: &str) -> CoreResult<ReportHandle> {
        let period = YearMonth::parse(year_month)?;
        self.reports.export(user_id, period)
    }

    /// Sweeps links expired as of the service clock.
    pub fn sweep_expired(&self) -> CoreResult<usize> {
        self.sweeper.sweep_expired(self.clock.now())
    }

    /// Users explicitly linked to `slug`.
    pub fn get_segment_users(&self, slug: &str) -> CoreResult<Vec<UserId>> {
        self.membership.segment_users(slug)
    }

    /// Explicit segments of `user_id` without rollouts.
    #[must_use]
    pub fn get_user_segments(&self, user_id: UserId) -> Vec<String> {
        self.membership
            .list_segments(user_id)
            .into_iter()
            .map(Slug::into_string)
            .collect()
    }

    /// All segments ordered by slug.
    #[must_use]
    pub fn list_segments(&self) -> Vec<Segment> {
        self.catalog.list()
    }

    /// Slug → percentage of every rollout segment.
    pub fn rollout_segments(&self) -> CoreResult<BTreeMap<String, u8>> {
        Ok(self
            .catalog
            .rollout_segments()?
            .into_iter()
            .map(|(slug, percentage)| (slug.into_string(), percentage.value()))
            .collect())
    }
}

impl std::fmt::Debug for SegmentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentService")
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}
