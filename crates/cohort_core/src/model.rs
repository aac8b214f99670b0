//! Segment, link and history records.

use crate::error::{CoreError, CoreResult};
use crate::types::UserId;
use crate::validate;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// A validated segment slug.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Validates and wraps `value`.
    pub fn parse(value: impl Into<String>) -> CoreResult<Self> {
        let value = value.into();
        validate::validate_slug(&value)?;
        Ok(Self(value))
    }

    /// Returns the slug text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the slug, returning its text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Borrow<str> for Slug {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Slug {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A rollout percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(u8);

impl Percentage {
    /// Validates `value`.
    pub fn new(value: i64) -> CoreResult<Self> {
        validate::validate_percentage(value).map(Self)
    }

    /// Returns the raw percentage.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// A catalog entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Unique slug.
    pub slug: Slug,
    /// Share of users automatically placed in the segment, if any.
    pub rollout: Option<Percentage>,
}

impl Segment {
    /// Creates a segment definition.
    #[must_use]
    pub fn new(slug: Slug, rollout: Option<Percentage>) -> Self {
        Self { slug, rollout }
    }
}

/// An explicit grant of a segment to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipLink {
    /// The user.
    pub user_id: UserId,
    /// The granted segment.
    pub slug: Slug,
    /// When the grant lapses. Lapsed links stay readable until swept.
    pub expires_at: Option<DateTime<Utc>>,
}

impl MembershipLink {
    /// Returns true if the link lapses at or before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// The kind of change a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// A link was created.
    Add,
    /// A link was removed.
    Remove,
}

impl Operation {
    /// Lowercase name used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Position in the ledger, assigned when the entry is staged in its
    /// write transaction.
    pub position: u64,
    /// The user whose membership changed.
    pub user_id: UserId,
    /// The segment.
    pub slug: Slug,
    /// What happened.
    pub operation: Operation,
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
}

/// A calendar month used to select history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Parses `YYYY-MM`.
    pub fn parse(value: &str) -> CoreResult<Self> {
        let (year, month) = validate::validate_year_month(value)?;
        Ok(Self { year, month })
    }

    /// Returns the year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Returns the month, 1-based.
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// Returns true if `instant` falls inside this month (UTC).
    #[must_use]
    pub fn contains(self, instant: DateTime<Utc>) -> bool {
        instant.year() == self.year && instant.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
