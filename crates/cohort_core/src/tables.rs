//! Materialized tables rebuilt from the journal.

use crate::journal::JournalRecord;
use crate::model::{HistoryEntry, MembershipLink, Segment, Slug};
use crate::types::UserId;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Committed state: segments, links, a slug→users index and the ledger.
///
/// Cheap to snapshot behind an `Arc`; the transaction manager clones it
/// only when a commit lands while a reader still holds the old one.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    segments: BTreeMap<Slug, Segment>,
    links: BTreeMap<UserId, BTreeMap<Slug, MembershipLink>>,
    by_slug: BTreeMap<Slug, BTreeSet<UserId>>,
    history: Vec<HistoryEntry>,
}

impl Tables {
    pub(crate) fn segment(&self, slug: &str) -> Option<&Segment> {
        self.segments.get(slug)
    }

    pub(crate) fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    pub(crate) fn link(&self, user_id: UserId, slug: &str) -> Option<&MembershipLink> {
        self.links.get(&user_id).and_then(|links| links.get(slug))
    }

    /// Links of one user ordered by slug.
    pub(crate) fn links_of(&self, user_id: UserId) -> impl Iterator<Item = &MembershipLink> {
        self.links.get(&user_id).into_iter().flat_map(BTreeMap::values)
    }

    /// Users linked to `slug`, ascending.
    pub(crate) fn users_in(&self, slug: &str) -> impl Iterator<Item = UserId> + '_ {
        self.by_slug.get(slug).into_iter().flatten().copied()
    }

    pub(crate) fn links_expiring_by(
        &self,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &MembershipLink> {
        self.links
            .values()
            .flat_map(BTreeMap::values)
            .filter(move |link| link.is_expired_at(now))
    }

    pub(crate) fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub(crate) fn next_history_position(&self) -> u64 {
        self.history.last().map_or(1, |entry| entry.position + 1)
    }

    pub(crate) fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub(crate) fn link_count(&self) -> usize {
        self.by_slug.values().map(BTreeSet::len).sum()
    }

    /// Applies one data record. `Begin` and `Commit` are ignored.
    pub(crate) fn apply(&mut self, record: &JournalRecord) {
        match record {
            JournalRecord::SegmentPut { segment, .. } => {
                self.segments.insert(segment.slug.clone(), segment.clone());
            }
            JournalRecord::SegmentDelete { slug, .. } => {
                self.segments.remove(slug);
            }
            JournalRecord::LinkPut { link, .. } => {
                self.by_slug
                    .entry(link.slug.clone())
                    .or_default()
                    .insert(link.user_id);
                self.links
                    .entry(link.user_id)
                    .or_default()
                    .insert(link.slug.clone(), link.clone());
            }
            JournalRecord::LinkDelete { user_id, slug, .. } => {
                if let Some(links) = self.links.get_mut(user_id) {
                    links.remove(slug);
                    if links.is_empty() {
                        self.links.remove(user_id);
                    }
                }
                if let Some(users) = self.by_slug.get_mut(slug) {
                    users.remove(user_id);
                    if users.is_empty() {
                        self.by_slug.remove(slug);
                    }
                }
            }
            JournalRecord::History { entry, .. } => {
                self.history.push(entry.clone());
            }
            JournalRecord::Begin { .. } | JournalRecord::Commit { .. } => {}
        }
    }
}
