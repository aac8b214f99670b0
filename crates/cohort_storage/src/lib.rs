//! # Cohort Storage
//!
//! Byte-level storage for the Cohort membership journal.
//!
//! Backends are opaque, append-only byte stores. They know nothing about
//! journal records, segments or membership links; `cohort_core` owns the
//! record format and replay rules.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - tests and ephemeral stores
//! - [`FileBackend`] - persistent storage on the local file system
//!
//! ## Example
//!
//! ```rust
//! use cohort_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"segment:beta").unwrap();
//! assert_eq!(backend.read_at(offset, 12).unwrap(), b"segment:beta");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
