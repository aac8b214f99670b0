//! User history report files.

use crate::error::{CoreError, CoreResult};
use crate::ledger::AuditLedger;
use crate::model::{HistoryEntry, YearMonth};
use crate::types::UserId;
use crate::validate::EXPIRATION_FORMAT;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// A written report and the entries it holds.
#[derive(Debug, Clone, Serialize)]
pub struct ReportHandle {
    /// Location of the CSV file.
    pub path: PathBuf,
    /// Entries written, in append order.
    pub entries: Vec<HistoryEntry>,
}

/// Writes one user's monthly history as CSV.
///
/// Files are named `user_history_<YYYY-MM>_<user_id>.csv`; each row is
/// `user_id,slug,operation,timestamp` with no header. Re-exporting the same
/// user and month overwrites the file.
#[derive(Debug, Clone)]
pub struct HistoryReport {
    ledger: AuditLedger,
    report_dir: PathBuf,
}

impl HistoryReport {
    /// Creates a report writer placing files under `report_dir`.
    pub fn new(ledger: AuditLedger, report_dir: impl Into<PathBuf>) -> Self {
        Self {
            ledger,
            report_dir: report_dir.into(),
        }
    }

    /// Directory reports are written to.
    #[must_use]
    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    /// Queries the ledger and writes the report.
    ///
    /// # Errors
    ///
    /// [`CoreError::Report`] if the directory or file cannot be written.
    pub fn export(&self, user_id: UserId, period: YearMonth) -> CoreResult<ReportHandle> {
        let entries = self.ledger.query_by_user_and_period(user_id, period);
        let path = self
            .report_dir
            .join(format!("user_history_{period}_{user_id}.csv"));

        write_rows(&self.report_dir, &path, &entries).map_err(|source| CoreError::Report {
            path: path.clone(),
            source,
        })?;

        info!(%user_id, %period, rows = entries.len(), path = %path.display(), "history report written");
        Ok(ReportHandle { path, entries })
    }
}

fn write_rows(dir: &Path, path: &Path, entries: &[HistoryEntry]) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut out = BufWriter::new(File::create(path)?);
    for entry in entries {
        writeln!(
            out,
            "{},{},{},{}",
            entry.user_id,
            entry.slug,
            entry.operation,
            entry.timestamp.format(EXPIRATION_FORMAT)
        )?;
    }
    out.flush()
}
