//! Test fixtures and store helpers.

use chrono::{DateTime, TimeZone, Utc};
use cohort_core::{Config, Database, ManualClock, MembershipPatch, SegmentService, UserId};
use cohort_storage::StorageBackend;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// The instant every fixture clock starts at: 2023-08-30 12:00:00 UTC.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 8, 30, 12, 0, 0)
        .single()
        .expect("fixed timestamp is valid")
}

/// A service over a throwaway store, with a manual clock.
pub struct TestStore {
    /// The service under test.
    pub service: SegmentService,
    /// Clock used for history timestamps and sweeps.
    pub clock: Arc<ManualClock>,
    temp_dir: TempDir,
    persistent: bool,
}

impl TestStore {
    /// Creates an in-memory store; reports go to a temp directory.
    pub fn memory() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = Config::new().report_dir(temp_dir.path().join("reports"));
        let db = Database::open_with_backend(config, Box::new(cohort_storage::InMemoryBackend::new()))
            .expect("Failed to open in-memory store");
        Self::assemble(db, temp_dir, false, Arc::new(ManualClock::new(fixed_now())))
    }

    /// Creates a file-backed store in a temp directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Self::open_dir(temp_dir.path());
        Self::assemble(db, temp_dir, true, Arc::new(ManualClock::new(fixed_now())))
    }

    /// Creates a store over a caller-supplied journal backend.
    pub fn with_backend(backend: Box<dyn StorageBackend>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = Config::new()
            .sync_on_commit(false)
            .report_dir(temp_dir.path().join("reports"));
        let db = Database::open_with_backend(config, backend).expect("Failed to open store");
        Self::assemble(db, temp_dir, false, Arc::new(ManualClock::new(fixed_now())))
    }

    /// Closes and reopens a file-backed store, replaying its journal.
    ///
    /// The clock keeps its current time.
    pub fn reopen(self) -> Self {
        assert!(self.persistent, "only file-backed stores can be reopened");
        let Self {
            service,
            clock,
            temp_dir,
            persistent,
        } = self;
        drop(service);
        let db = Self::open_dir(temp_dir.path());
        Self::assemble(db, temp_dir, persistent, clock)
    }

    /// Store directory of a file-backed store.
    pub fn store_path(&self) -> Option<PathBuf> {
        self.persistent.then(|| self.temp_dir.path().join("store"))
    }

    /// Directory reports are written to.
    pub fn report_dir(&self) -> PathBuf {
        self.temp_dir.path().join("reports")
    }

    /// The underlying store.
    pub fn db(&self) -> &Arc<Database> {
        self.service.database()
    }

    fn open_dir(root: &Path) -> Database {
        let config = Config::new().report_dir(root.join("reports"));
        Database::open_with_config(&root.join("store"), config).expect("Failed to open file store")
    }

    fn assemble(db: Database, temp_dir: TempDir, persistent: bool, clock: Arc<ManualClock>) -> Self {
        let service = SegmentService::with_clock(Arc::new(db), clock.clone());
        Self {
            service,
            clock,
            temp_dir,
            persistent,
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = SegmentService;

    fn deref(&self) -> &Self::Target {
        &self.service
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Links every user in `users` to every slug in `slugs`, one patch per
    /// user.
    pub fn link_all(store: &TestStore, users: &[i64], slugs: &[&str]) {
        for &user in users {
            let patch = MembershipPatch::new(UserId::new(user)).add_all(slugs.iter().copied());
            store.patch_membership(patch).expect("Failed to link user");
        }
    }

    /// A memory store with the given segments created and linked to users
    /// `1..=user_count`.
    pub fn populated_store(slugs: &[&str], user_count: i64) -> TestStore {
        let store = TestStore::memory();
        for slug in slugs {
            store.create_segment(slug, None).expect("Failed to create segment");
        }
        let users: Vec<i64> = (1..=user_count).collect();
        link_all(&store, &users, slugs);
        store
    }
}
