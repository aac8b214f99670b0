//! # Cohort Core
//!
//! Membership and audit engine for user segments.
//!
//! This crate provides:
//! - A segment catalog with optional percentage rollouts
//! - Explicit, optionally time-bound, user↔segment links
//! - An append-only audit ledger written in the same transaction as every
//!   link change
//! - Deterministic rollout bucketing and the merged membership view
//! - Expiry sweeps
//! - A journaled, single-writer transaction layer with crash recovery
//!
//! ```rust
//! use cohort_core::{Database, MembershipPatch, SegmentService, UserId};
//! use std::sync::Arc;
//!
//! let db = Arc::new(Database::open_in_memory().unwrap());
//! let service = SegmentService::new(db);
//!
//! service.create_segment("beta-testers", None).unwrap();
//! service
//!     .patch_membership(MembershipPatch::new(UserId::new(7)).add("beta-testers"))
//!     .unwrap();
//! assert_eq!(
//!     service.get_assembled_segments(UserId::new(7)).unwrap(),
//!     vec!["beta-testers".to_string()]
//! );
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod assembler;
mod catalog;
mod clock;
mod config;
mod database;
mod dir;
mod error;
mod journal;
mod ledger;
mod membership;
mod model;
mod report;
mod rollout;
mod service;
mod sweeper;
mod tables;
mod transaction;
mod types;
pub mod validate;

pub use assembler::{MembershipAssembler, MembershipSource, RolloutSource};
pub use catalog::SegmentCatalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use database::{Database, DatabaseStats};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use journal::{AppendError, JournalRecord, JournalWriter};
pub use ledger::AuditLedger;
pub use membership::{MembershipPatch, MembershipStore};
pub use model::{HistoryEntry, MembershipLink, Operation, Percentage, Segment, Slug, YearMonth};
pub use report::{HistoryReport, ReportHandle};
pub use rollout::RolloutOracle;
pub use service::SegmentService;
pub use sweeper::ExpirySweeper;
pub use transaction::{
    ReadTransaction, TransactionCoordinator, TransactionManager, TransactionState, WriteTransaction,
};
pub use types::{SequenceNumber, TransactionId, UserId};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
