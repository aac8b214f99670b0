//! Transaction state.

use crate::error::{CoreError, CoreResult};
use crate::journal::JournalRecord;
use crate::model::{HistoryEntry, MembershipLink, Operation, Segment, Slug, YearMonth};
use crate::tables::Tables;
use crate::types::{SequenceNumber, TransactionId, UserId};
use chrono::{DateTime, Utc};
use parking_lot::MutexGuard;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// State of a write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    Aborted,
}

/// A staged change to one row.
#[derive(Debug, Clone)]
pub(crate) enum PendingWrite<T> {
    Put(T),
    Delete,
}

/// A read-only view of committed state.
///
/// Holds a snapshot; commits that land afterwards are not visible.
#[derive(Debug, Clone)]
pub struct ReadTransaction {
    snapshot: Arc<Tables>,
    committed_seq: SequenceNumber,
}

impl ReadTransaction {
    pub(crate) fn new(snapshot: Arc<Tables>, committed_seq: SequenceNumber) -> Self {
        Self {
            snapshot,
            committed_seq,
        }
    }

    /// Sequence of the last commit visible in this snapshot.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.committed_seq
    }

    /// Looks up a segment.
    #[must_use]
    pub fn segment(&self, slug: &str) -> Option<Segment> {
        self.snapshot.segment(slug).cloned()
    }

    /// All segments ordered by slug.
    #[must_use]
    pub fn segments(&self) -> Vec<Segment> {
        self.snapshot.segments().cloned().collect()
    }

    /// Segments with a rollout percentage, ordered by slug.
    #[must_use]
    pub fn rollout_segments(&self) -> Vec<Segment> {
        self.snapshot
            .segments()
            .filter(|segment| segment.rollout.is_some())
            .cloned()
            .collect()
    }

    /// Looks up a single link.
    #[must_use]
    pub fn link(&self, user_id: UserId, slug: &str) -> Option<MembershipLink> {
        self.snapshot.link(user_id, slug).cloned()
    }

    /// Links of one user ordered by slug.
    #[must_use]
    pub fn links_of(&self, user_id: UserId) -> Vec<MembershipLink> {
        self.snapshot.links_of(user_id).cloned().collect()
    }

    /// Users linked to `slug`, ascending.
    #[must_use]
    pub fn users_in(&self, slug: &str) -> Vec<UserId> {
        self.snapshot.users_in(slug).collect()
    }

    /// Links whose expiry is at or before `now`.
    #[must_use]
    pub fn links_expiring_by(&self, now: DateTime<Utc>) -> Vec<MembershipLink> {
        self.snapshot.links_expiring_by(now).cloned().collect()
    }

    /// History of one user within a calendar month, in append order.
    #[must_use]
    pub fn history_of(&self, user_id: UserId, period: YearMonth) -> Vec<HistoryEntry> {
        self.snapshot
            .history()
            .iter()
            .filter(|entry| entry.user_id == user_id && period.contains(entry.timestamp))
            .cloned()
            .collect()
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.snapshot.segment_count()
    }

    /// Number of links.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.snapshot.link_count()
    }

    /// Number of history entries.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.snapshot.history().len()
    }
}

/// A write transaction holding the exclusive writer lock.
///
/// Reads through a write transaction see its own staged writes on top of
/// the committed state. Dropping an active transaction rolls it back.
pub struct WriteTransaction<'a> {
    id: TransactionId,
    state: TransactionState,
    base: Arc<Tables>,
    segments: BTreeMap<Slug, PendingWrite<Segment>>,
    links: BTreeMap<(UserId, Slug), PendingWrite<MembershipLink>>,
    /// Staged records in the order they were made.
    records: Vec<JournalRecord>,
    next_position: u64,
    _guard: MutexGuard<'a, ()>,
}

impl<'a> WriteTransaction<'a> {
    pub(crate) fn new(id: TransactionId, base: Arc<Tables>, guard: MutexGuard<'a, ()>) -> Self {
        let next_position = base.next_history_position();
        Self {
            id,
            state: TransactionState::Active,
            base,
            segments: BTreeMap::new(),
            links: BTreeMap::new(),
            records: Vec::new(),
            next_position,
            _guard: guard,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Number of staged records.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.records.len()
    }

    fn ensure_active(&self) -> CoreResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CoreError::transaction(format!(
                "{} is not active ({:?})",
                self.id, self.state
            )))
        }
    }

    /// Looks up a segment, including staged changes.
    pub fn segment(&self, slug: &str) -> CoreResult<Option<Segment>> {
        self.ensure_active()?;
        Ok(match self.segments.get(slug) {
            Some(PendingWrite::Put(segment)) => Some(segment.clone()),
            Some(PendingWrite::Delete) => None,
            None => self.base.segment(slug).cloned(),
        })
    }

    /// Looks up a link, including staged changes.
    pub fn link(&self, user_id: UserId, slug: &Slug) -> CoreResult<Option<MembershipLink>> {
        self.ensure_active()?;
        Ok(self.staged_link(user_id, slug))
    }

    fn staged_link(&self, user_id: UserId, slug: &Slug) -> Option<MembershipLink> {
        match self.links.get(&(user_id, slug.clone())) {
            Some(PendingWrite::Put(link)) => Some(link.clone()),
            Some(PendingWrite::Delete) => None,
            None => self.base.link(user_id, slug.as_str()).cloned(),
        }
    }

    /// Users linked to `slug`, ascending, including staged changes.
    pub fn users_in(&self, slug: &str) -> CoreResult<Vec<UserId>> {
        self.ensure_active()?;
        let mut users: BTreeSet<UserId> = self.base.users_in(slug).collect();
        for ((user_id, linked), write) in &self.links {
            if linked.as_str() != slug {
                continue;
            }
            match write {
                PendingWrite::Put(_) => users.insert(*user_id),
                PendingWrite::Delete => users.remove(user_id),
            };
        }
        Ok(users.into_iter().collect())
    }

    /// Links whose expiry is at or before `now`, including staged changes.
    pub fn links_expiring_by(&self, now: DateTime<Utc>) -> CoreResult<Vec<MembershipLink>> {
        self.ensure_active()?;
        let mut expiring: BTreeMap<(UserId, Slug), MembershipLink> = self
            .base
            .links_expiring_by(now)
            .map(|link| ((link.user_id, link.slug.clone()), link.clone()))
            .collect();
        for (key, write) in &self.links {
            match write {
                PendingWrite::Put(link) if link.is_expired_at(now) => {
                    expiring.insert(key.clone(), link.clone());
                }
                _ => {
                    expiring.remove(key);
                }
            }
        }
        Ok(expiring.into_values().collect())
    }

    /// Stages a new segment.
    ///
    /// # Errors
    ///
    /// [`CoreError::SegmentExists`] if the slug is taken.
    pub fn insert_segment(&mut self, segment: Segment) -> CoreResult<()> {
        if self.segment(segment.slug.as_str())?.is_some() {
            return Err(CoreError::SegmentExists {
                slug: segment.slug.into_string(),
            });
        }
        self.records.push(JournalRecord::SegmentPut {
            txid: self.id,
            segment: segment.clone(),
        });
        self.segments
            .insert(segment.slug.clone(), PendingWrite::Put(segment));
        Ok(())
    }

    /// Stages removal of a segment and returns it.
    ///
    /// # Errors
    ///
    /// [`CoreError::SegmentNotFound`] if the slug is not in the catalog.
    pub fn delete_segment(&mut self, slug: &Slug) -> CoreResult<Segment> {
        let segment = self
            .segment(slug.as_str())?
            .ok_or_else(|| CoreError::SegmentNotFound {
                slug: slug.to_string(),
            })?;
        self.records.push(JournalRecord::SegmentDelete {
            txid: self.id,
            slug: slug.clone(),
        });
        self.segments.insert(slug.clone(), PendingWrite::Delete);
        Ok(segment)
    }

    /// Stages a new link.
    ///
    /// # Errors
    ///
    /// [`CoreError::LinkExists`] if the user is already linked to the slug.
    pub fn insert_link(&mut self, link: MembershipLink) -> CoreResult<()> {
        if self.link(link.user_id, &link.slug)?.is_some() {
            return Err(CoreError::LinkExists {
                user_id: link.user_id,
                slug: link.slug.into_string(),
            });
        }
        self.records.push(JournalRecord::LinkPut {
            txid: self.id,
            link: link.clone(),
        });
        self.links
            .insert((link.user_id, link.slug.clone()), PendingWrite::Put(link));
        Ok(())
    }

    /// Stages removal of a link and returns it.
    ///
    /// # Errors
    ///
    /// [`CoreError::LinkNotFound`] if the user is not linked to the slug.
    pub fn delete_link(&mut self, user_id: UserId, slug: &Slug) -> CoreResult<MembershipLink> {
        let link = self
            .link(user_id, slug)?
            .ok_or_else(|| CoreError::LinkNotFound {
                user_id,
                slug: slug.to_string(),
            })?;
        self.records.push(JournalRecord::LinkDelete {
            txid: self.id,
            user_id,
            slug: slug.clone(),
        });
        self.links
            .insert((user_id, slug.clone()), PendingWrite::Delete);
        Ok(link)
    }

    /// Stages a history entry and returns it with its ledger position.
    pub fn append_history(
        &mut self,
        user_id: UserId,
        slug: Slug,
        operation: Operation,
        timestamp: DateTime<Utc>,
    ) -> CoreResult<HistoryEntry> {
        self.ensure_active()?;
        let entry = HistoryEntry {
            position: self.next_position,
            user_id,
            slug,
            operation,
            timestamp,
        };
        self.next_position += 1;
        self.records.push(JournalRecord::History {
            txid: self.id,
            entry: entry.clone(),
        });
        Ok(entry)
    }

    pub(crate) fn staged_records(&self) -> &[JournalRecord] {
        &self.records
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    pub(crate) fn mark_aborted(&mut self) {
        self.state = TransactionState::Aborted;
        self.records.clear();
        self.segments.clear();
        self.links.clear();
    }

    pub(crate) fn ensure_committable(&self) -> CoreResult<()> {
        self.ensure_active()
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if self.is_active() {
            debug!(txid = %self.id, staged = self.records.len(), "rolling back dropped transaction");
            self.mark_aborted();
        }
    }
}

impl std::fmt::Debug for WriteTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTransaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("staged", &self.records.len())
            .finish_non_exhaustive()
    }
}
