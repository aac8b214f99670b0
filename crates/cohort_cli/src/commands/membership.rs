//! Membership and history commands.

use super::{CliError, StoreArgs};
use crate::Format;
use cohort_core::validate::parse_expiration;
use cohort_core::{MembershipPatch, UserId};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct UserSegments {
    user_id: UserId,
    segments: Vec<String>,
}

/// Applies a membership patch.
pub fn patch(
    store: &StoreArgs,
    user_id: i64,
    add: Vec<String>,
    delete: Vec<String>,
    expires: Option<&str>,
) -> Result<(), CliError> {
    let expires_at = expires.map(parse_expiration).transpose()?;
    let patch = MembershipPatch::new(UserId::new(user_id))
        .add_all(add)
        .delete_all(delete)
        .expires_at(expires_at);

    let service = store.open_service()?;
    let user_id = service.patch_membership(patch)?;
    println!("updated segments of user {user_id}");
    Ok(())
}

/// Prints a user's segments.
pub fn segments(store: &StoreArgs, user_id: i64, explicit: bool, format: Format) -> Result<(), CliError> {
    let service = store.open_service()?;
    let user_id = UserId::new(user_id);
    let segments = if explicit {
        service.get_user_segments(user_id)
    } else {
        service.get_assembled_segments(user_id)?
    };

    match format {
        Format::Json => {
            let out = UserSegments { user_id, segments };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Text => {
            for slug in &segments {
                println!("{slug}");
            }
        }
    }
    Ok(())
}

/// Writes a history report and prints where it went.
pub fn history(store: &StoreArgs, user_id: i64, year_month: &str, format: Format) -> Result<(), CliError> {
    let service = store.open_service()?;
    let report = service.get_user_history(UserId::new(user_id), year_month)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => {
            println!("{} ({} entries)", report.path.display(), report.entries.len());
        }
    }
    Ok(())
}

/// Removes expired links.
pub fn sweep(store: &StoreArgs) -> Result<(), CliError> {
    let service = store.open_service()?;
    let removed = service.sweep_expired()?;
    println!("removed {removed} expired link(s)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn patch_then_list() {
        let tmp = tempdir().unwrap();
        let store = StoreArgs {
            path: tmp.path().to_path_buf(),
            report_dir: None,
        };

        patch(&store, 7, vec!["beta".into(), "gamma".into()], vec![], None).unwrap();
        patch(&store, 7, vec![], vec!["gamma".into()], Some("2030-01-01 00:00:00")).unwrap();

        let service = store.open_service().unwrap();
        assert_eq!(service.get_user_segments(UserId::new(7)), vec!["beta"]);
    }

    #[test]
    fn bad_expiry_is_rejected() {
        let tmp = tempdir().unwrap();
        let store = StoreArgs {
            path: tmp.path().to_path_buf(),
            report_dir: None,
        };
        let err = patch(&store, 7, vec!["beta".into()], vec![], Some("tomorrow")).unwrap_err();
        assert!(matches!(
            err,
            CliError::Core {
                kind: cohort_core::ErrorKind::Validation,
                ..
            }
        ));
    }
}
