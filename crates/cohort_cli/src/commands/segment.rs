//! Segment commands.

use super::{CliError, StoreArgs};
use crate::Format;

/// Creates a segment.
pub fn create(store: &StoreArgs, slug: &str, percentage: Option<i64>) -> Result<(), CliError> {
    let service = store.open_service()?;
    let slug = service.create_segment(slug, percentage)?;
    match percentage {
        Some(p) => println!("created segment {slug} (rollout {p}%)"),
        None => println!("created segment {slug}"),
    }
    Ok(())
}

/// Deletes a segment.
pub fn delete(store: &StoreArgs, slug: &str) -> Result<(), CliError> {
    let service = store.open_service()?;
    let slug = service.delete_segment(slug)?;
    println!("deleted segment {slug}");
    Ok(())
}

/// Lists users explicitly linked to a segment.
pub fn members(store: &StoreArgs, slug: &str, format: Format) -> Result<(), CliError> {
    let service = store.open_service()?;
    let users = service.get_segment_users(slug)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&users)?),
        Format::Text => {
            for user in &users {
                println!("{user}");
            }
        }
    }
    Ok(())
}
