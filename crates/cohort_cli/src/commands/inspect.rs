//! Inspect command implementation.

use super::{CliError, StoreArgs};
use crate::Format;
use cohort_core::{DatabaseStats, JournalRecord, Segment};
use serde::Serialize;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Counters.
    pub stats: DatabaseStats,
    /// Segments (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<SegmentInfo>>,
    /// Journal records (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<RecordInfo>>,
}

/// One catalog row.
#[derive(Debug, Serialize)]
pub struct SegmentInfo {
    /// Slug.
    pub slug: String,
    /// Rollout percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollout: Option<u8>,
}

/// Summary of one journal record.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Offset in the journal file.
    pub offset: u64,
    /// Record type.
    pub record_type: &'static str,
    /// Transaction ID.
    pub txid: u64,
    /// Short description of the row touched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RecordInfo {
    fn new(offset: u64, record: &JournalRecord) -> Self {
        let (record_type, detail) = match record {
            JournalRecord::Begin { .. } => ("BEGIN", None),
            JournalRecord::SegmentPut { segment, .. } => ("SEGMENT_PUT", Some(segment.slug.to_string())),
            JournalRecord::SegmentDelete { slug, .. } => ("SEGMENT_DELETE", Some(slug.to_string())),
            JournalRecord::LinkPut { link, .. } => {
                ("LINK_PUT", Some(format!("{} -> {}", link.user_id, link.slug)))
            }
            JournalRecord::LinkDelete { user_id, slug, .. } => {
                ("LINK_DELETE", Some(format!("{user_id} -> {slug}")))
            }
            JournalRecord::History { entry, .. } => (
                "HISTORY",
                Some(format!("#{} {} {} {}", entry.position, entry.user_id, entry.operation, entry.slug)),
            ),
            JournalRecord::Commit { sequence, .. } => ("COMMIT", Some(sequence.to_string())),
        };
        Self {
            offset,
            record_type,
            txid: record.txid().as_u64(),
            detail,
        }
    }
}

impl From<Segment> for SegmentInfo {
    fn from(segment: Segment) -> Self {
        Self {
            slug: segment.slug.into_string(),
            rollout: segment.rollout.map(|p| p.value()),
        }
    }
}

/// Runs the inspect command.
pub fn run(
    store: &StoreArgs,
    show_segments: bool,
    records: Option<usize>,
    format: Format,
) -> Result<(), CliError> {
    let db = store.open_database()?;

    let result = InspectResult {
        path: store.path.display().to_string(),
        stats: db.stats()?,
        segments: show_segments.then(|| {
            db.begin_read()
                .segments()
                .into_iter()
                .map(SegmentInfo::from)
                .collect()
        }),
        records: match records {
            Some(limit) => Some(
                db.journal_records()?
                    .iter()
                    .take(limit)
                    .map(|(offset, record)| RecordInfo::new(*offset, record))
                    .collect(),
            ),
            None => None,
        },
    };

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Store: {}", result.path);
    println!("  Segments:        {}", result.stats.segments);
    println!("  Links:           {}", result.stats.links);
    println!("  History entries: {}", result.stats.history_entries);
    println!("  Journal size:    {} bytes", result.stats.journal_bytes);
    println!("  Committed seq:   {}", result.stats.committed_seq);

    if let Some(segments) = &result.segments {
        println!();
        println!("Segments:");
        for segment in segments {
            match segment.rollout {
                Some(p) => println!("  {} ({p}%)", segment.slug),
                None => println!("  {}", segment.slug),
            }
        }
    }

    if let Some(records) = &result.records {
        println!();
        println!("Journal:");
        for record in records {
            println!(
                "  {:>8}  {:<14} txn {:<6} {}",
                record.offset,
                record.record_type,
                record.txid,
                record.detail.as_deref().unwrap_or("")
            );
        }
    }
}
