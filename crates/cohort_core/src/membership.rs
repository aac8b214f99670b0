//! Explicit user↔segment links.

use crate::assembler::MembershipSource;
use crate::error::CoreResult;
use crate::ledger::AuditLedger;
use crate::model::{MembershipLink, Operation, Slug};
use crate::transaction::{TransactionCoordinator, WriteTransaction};
use crate::types::UserId;
use crate::validate;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// A batch change to one user's explicit memberships.
///
/// ```rust
/// use cohort_core::{MembershipPatch, UserId};
///
/// let patch = MembershipPatch::new(UserId::new(1))
///     .add("beta")
///     .add("discount-30")
///     .delete("legacy");
/// assert_eq!(patch.to_add(), ["beta", "discount-30"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipPatch {
    user_id: UserId,
    to_add: Vec<String>,
    to_delete: Vec<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl MembershipPatch {
    /// Starts an empty patch for `user_id`.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            to_add: Vec::new(),
            to_delete: Vec::new(),
            expires_at: None,
        }
    }

    /// Queues a slug to link.
    #[must_use]
    pub fn add(mut self, slug: impl Into<String>) -> Self {
        self.to_add.push(slug.into());
        self
    }

    /// Queues a slug to unlink.
    #[must_use]
    pub fn delete(mut self, slug: impl Into<String>) -> Self {
        self.to_delete.push(slug.into());
        self
    }

    /// Queues several slugs to link, in order.
    #[must_use]
    pub fn add_all<I, S>(mut self, slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.to_add.extend(slugs.into_iter().map(Into::into));
        self
    }

    /// Queues several slugs to unlink, in order.
    #[must_use]
    pub fn delete_all<I, S>(mut self, slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.to_delete.extend(slugs.into_iter().map(Into::into));
        self
    }

    /// Sets the expiry applied to every added link.
    #[must_use]
    pub fn expires_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = at;
        self
    }

    /// The user being patched.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Slugs to link, in order.
    #[must_use]
    pub fn to_add(&self) -> &[String] {
        &self.to_add
    }

    /// Slugs to unlink, in order.
    #[must_use]
    pub fn to_delete(&self) -> &[String] {
        &self.to_delete
    }

    /// Expiry applied to added links.
    #[must_use]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

/// Owns explicit membership links.
#[derive(Debug, Clone)]
pub struct MembershipStore {
    coordinator: TransactionCoordinator,
    ledger: AuditLedger,
}

impl MembershipStore {
    /// Creates a store writing history through `ledger`.
    #[must_use]
    pub fn new(coordinator: TransactionCoordinator, ledger: AuditLedger) -> Self {
        Self {
            coordinator,
            ledger,
        }
    }

    /// Applies `patch` as one transaction.
    ///
    /// Adds run before deletes, each list in the order given. The first
    /// failing step aborts the whole patch and is reported wrapped in
    /// [`CoreError::Step`] naming the slug. Every slug is validated before
    /// the transaction opens.
    ///
    /// The segment of an added slug does not need to exist in the catalog.
    ///
    /// [`CoreError::Step`]: crate::CoreError::Step
    pub fn patch(&self, patch: &MembershipPatch) -> CoreResult<UserId> {
        validate::validate_slugs("add", &patch.to_add)?;
        validate::validate_slugs("delete", &patch.to_delete)?;

        let to_add = patch
            .to_add
            .iter()
            .map(Slug::parse)
            .collect::<CoreResult<Vec<_>>>()?;
        let to_delete = patch
            .to_delete
            .iter()
            .map(Slug::parse)
            .collect::<CoreResult<Vec<_>>>()?;
        let user_id = patch.user_id;

        self.coordinator.run(|txn| {
            for slug in &to_add {
                self.add_link(txn, user_id, slug, patch.expires_at)
                    .map_err(|e| e.in_step("add", slug.as_str()))?;
            }
            for slug in &to_delete {
                self.remove_link(txn, user_id, slug)
                    .map_err(|e| e.in_step("delete", slug.as_str()))?;
            }
            Ok(())
        })?;

        info!(
            %user_id,
            added = to_add.len(),
            removed = to_delete.len(),
            "membership patched"
        );
        Ok(user_id)
    }

    fn add_link(
        &self,
        txn: &mut WriteTransaction<'_>,
        user_id: UserId,
        slug: &Slug,
        expires_at: Option<DateTime<Utc>>,
    ) -> CoreResult<()> {
        debug!(%user_id, %slug, "adding link");
        txn.insert_link(MembershipLink {
            user_id,
            slug: slug.clone(),
            expires_at,
        })?;
        self.ledger.append(txn, user_id, slug, Operation::Add)?;
        Ok(())
    }

    fn remove_link(&self, txn: &mut WriteTransaction<'_>, user_id: UserId, slug: &Slug) -> CoreResult<()> {
        debug!(%user_id, %slug, "removing link");
        txn.delete_link(user_id, slug)?;
        self.ledger.append(txn, user_id, slug, Operation::Remove)?;
        Ok(())
    }

    /// Slugs explicitly linked to `user_id`, in store order.
    #[must_use]
    pub fn list_segments(&self, user_id: UserId) -> Vec<Slug> {
        self.coordinator
            .read()
            .links_of(user_id)
            .into_iter()
            .map(|link| link.slug)
            .collect()
    }

    /// Users explicitly linked to `slug`, ascending.
    pub fn segment_users(&self, slug: &str) -> CoreResult<Vec<UserId>> {
        validate::validate_slug(slug)?;
        Ok(self.coordinator.read().users_in(slug))
    }

    /// Links of `user_id` including their expiry.
    #[must_use]
    pub fn links(&self, user_id: UserId) -> Vec<MembershipLink> {
        self.coordinator.read().links_of(user_id)
    }
}

impl MembershipSource for MembershipStore {
    fn explicit_segments(&self, user_id: UserId) -> CoreResult<Vec<Slug>> {
        Ok(self.list_segments(user_id))
    }
}
