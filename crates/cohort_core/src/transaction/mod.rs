//! Single-writer transactions over the journal.
//!
//! - **Atomicity**: a transaction's records reach the journal in one batch
//!   that ends in a `Commit` record, or not at all
//! - **Isolation**: readers work on an immutable snapshot of the tables and
//!   never see staged writes
//! - **Durability**: the batch is flushed (and synced when configured)
//!   before the tables change
//!
//! A [`WriteTransaction`] holds the writer lock for its whole life, so two
//! concurrent writers touching the same link are serialized and the second
//! one sees the first one's row.

mod coordinator;
mod manager;
mod state;

pub use coordinator::TransactionCoordinator;
pub use manager::TransactionManager;
pub use state::{ReadTransaction, TransactionState, WriteTransaction};
