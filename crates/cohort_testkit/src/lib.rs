//! # Cohort Testkit
//!
//! Test utilities for Cohort.
//!
//! This crate provides:
//! - Store fixtures with a controllable clock
//! - Property-based test generators using proptest
//! - A storage backend that fails on demand
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cohort_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     let store = TestStore::memory();
//!     store.create_segment("beta", None).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod failing;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::failing::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use failing::*;
pub use fixtures::*;
pub use generators::*;
