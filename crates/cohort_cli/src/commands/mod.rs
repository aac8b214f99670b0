//! CLI command implementations.

pub mod inspect;
pub mod membership;
pub mod segment;

use cohort_core::{Config, CoreError, Database, SegmentService};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// No `--path` was given.
    #[error("store path required (--path)")]
    MissingPath,

    /// The core rejected the operation.
    #[error("{kind} error: {source}")]
    Core {
        /// Error class of the failure.
        kind: cohort_core::ErrorKind,
        /// The failure.
        #[source]
        source: CoreError,
    },

    /// JSON output could not be produced.
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<CoreError> for CliError {
    fn from(source: CoreError) -> Self {
        Self::Core {
            kind: source.kind(),
            source,
        }
    }
}

/// Store location options shared by every command.
#[derive(Debug, Clone)]
pub struct StoreArgs {
    /// Store directory.
    pub path: PathBuf,
    /// Report directory; defaults to `<path>/reports`.
    pub report_dir: Option<PathBuf>,
}

impl StoreArgs {
    fn config(&self) -> Config {
        let report_dir = self
            .report_dir
            .clone()
            .unwrap_or_else(|| self.path.join("reports"));
        Config::new().report_dir(report_dir)
    }

    /// Opens the store.
    pub fn open_database(&self) -> Result<Database, CliError> {
        Ok(Database::open_with_config(&self.path, self.config())?)
    }

    /// Opens the store and wires the service over it.
    pub fn open_service(&self) -> Result<SegmentService, CliError> {
        Ok(SegmentService::new(Arc::new(self.open_database()?)))
    }
}
