//! A storage backend that fails on demand.
//!
//! Wraps another backend and, once armed through its [`FailureSwitch`],
//! rejects appends or flushes the way a full disk or a crash would.

use cohort_storage::{StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared controls for a [`FailingBackend`].
#[derive(Debug, Default)]
pub struct FailureSwitch {
    fail_append: AtomicBool,
    fail_flush: AtomicBool,
    fail_truncate: AtomicBool,
    /// Bytes of the next failing append that still reach the inner backend.
    torn_bytes: AtomicUsize,
    failures: AtomicUsize,
}

impl FailureSwitch {
    /// Makes every append fail after writing `torn_bytes` of its data.
    pub fn fail_appends(&self, torn_bytes: usize) {
        self.torn_bytes.store(torn_bytes, Ordering::SeqCst);
        self.fail_append.store(true, Ordering::SeqCst);
    }

    /// Makes flush and sync fail.
    pub fn fail_flushes(&self) {
        self.fail_flush.store(true, Ordering::SeqCst);
    }

    /// Makes truncation fail, so a torn batch stays on disk as after a crash.
    pub fn fail_truncates(&self) {
        self.fail_truncate.store(true, Ordering::SeqCst);
    }

    /// Disarms every failure.
    pub fn heal(&self) {
        self.fail_append.store(false, Ordering::SeqCst);
        self.fail_flush.store(false, Ordering::SeqCst);
        self.fail_truncate.store(false, Ordering::SeqCst);
        self.torn_bytes.store(0, Ordering::SeqCst);
    }

    /// Number of operations rejected so far.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    fn injected(&self, what: &str) -> StorageError {
        self.failures.fetch_add(1, Ordering::SeqCst);
        StorageError::Io(io::Error::new(io::ErrorKind::Other, format!("injected {what} failure")))
    }
}

/// A backend wrapper whose operations fail when its switch says so.
pub struct FailingBackend {
    inner: Box<dyn StorageBackend>,
    switch: Arc<FailureSwitch>,
}

impl FailingBackend {
    /// Wraps `inner`, returning the backend and its switch.
    pub fn new(inner: Box<dyn StorageBackend>) -> (Self, Arc<FailureSwitch>) {
        let switch = Arc::new(FailureSwitch::default());
        (
            Self {
                inner,
                switch: Arc::clone(&switch),
            },
            switch,
        )
    }
}

impl StorageBackend for FailingBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if self.switch.fail_append.load(Ordering::SeqCst) {
            let torn = self.switch.torn_bytes.load(Ordering::SeqCst).min(data.len());
            if torn > 0 {
                self.inner.append(&data[..torn])?;
            }
            return Err(self.switch.injected("append"));
        }
        self.inner.append(data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.switch.fail_flush.load(Ordering::SeqCst) {
            return Err(self.switch.injected("flush"));
        }
        self.inner.flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.switch.fail_flush.load(Ordering::SeqCst) {
            return Err(self.switch.injected("sync"));
        }
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if self.switch.fail_truncate.load(Ordering::SeqCst) {
            return Err(self.switch.injected("truncate"));
        }
        self.inner.truncate(new_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_storage::InMemoryBackend;

    #[test]
    fn passes_through_until_armed() {
        let (mut backend, switch) = FailingBackend::new(Box::new(InMemoryBackend::new()));
        assert_eq!(backend.append(b"hello").unwrap(), 0);
        backend.flush().unwrap();

        switch.fail_appends(2);
        assert!(backend.append(b"world").is_err());
        assert_eq!(backend.size().unwrap(), 7);
        assert_eq!(switch.failures(), 1);

        switch.heal();
        backend.truncate(5).unwrap();
        assert_eq!(backend.append(b"!").unwrap(), 5);
    }

    #[test]
    fn flush_and_truncate_failures() {
        let (mut backend, switch) = FailingBackend::new(Box::new(InMemoryBackend::new()));
        switch.fail_flushes();
        switch.fail_truncates();
        assert!(backend.flush().is_err());
        assert!(backend.sync().is_err());
        assert!(backend.truncate(0).is_err());
        assert_eq!(switch.failures(), 3);
    }
}
