//! Remote inventory listing
//!
//! Pages through the container listing with `marker` until a short page
//! arrives, and turns the raw records into [`RemoteEntry`] values keyed by
//! relative name. Excluded names and names that cannot be mirrored locally
//! (pseudo-directories such as `docs/`, empty segments) are dropped.
//!
//! Each page runs under the shared retry contract; a page that exhausts its
//! attempts fails the whole listing.

use std::path::Path;

use cfsync_core::domain::{
    entries::RemoteEntry,
    errors::DomainError,
    newtypes::{ContentHash, RelativeName},
};
use cfsync_core::ports::{ListQuery, ObjectRecord};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, info};

use crate::context::SyncContext;
use crate::reconciler::RemoteInventory;
use crate::retry::{run_with_reauth, RetryOutcome};
use crate::SyncError;

/// Timestamp layout of `last_modified` in Swift listings (UTC, no offset)
const LAST_MODIFIED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Lists every object in the container, or every object below `prefix`
///
/// # Arguments
/// * `ctx` - Engine context (store, session, filter, page size)
/// * `prefix` - Directory name whose contents to list; `None` for the whole container
///
/// # Errors
/// - [`SyncError::ListingFailed`] when a page exhausts its retry budget
/// - [`SyncError::Auth`] when reauthentication fails
pub async fn list_remote(
    ctx: &SyncContext,
    prefix: Option<&RelativeName>,
) -> Result<RemoteInventory, SyncError> {
    let page_size = ctx.options.page_size.max(1);
    let prefix_str = prefix.map(RelativeName::dir_prefix);
    let scope = prefix_str.clone().unwrap_or_else(|| "/".to_string());

    let mut inventory = RemoteInventory::new();
    let mut marker: Option<String> = None;
    let mut pages = 0usize;
    let mut skipped = 0usize;

    loop {
        let query = ListQuery {
            prefix: prefix_str.clone(),
            marker: marker.clone(),
            limit: page_size,
        };

        let store = &ctx.store;
        let query_ref = &query;
        let outcome = run_with_reauth(&ctx.session, ctx.retry(), "list", &scope, |creds| async move {
            store.list_objects(&creds, query_ref).await
        })
        .await;

        let records = match outcome {
            RetryOutcome::Done(records) => records,
            RetryOutcome::Exhausted { attempts, last } => {
                return Err(SyncError::ListingFailed { attempts, last });
            }
            RetryOutcome::AuthFailed(e) => return Err(SyncError::Auth(e)),
        };

        pages += 1;
        let count = records.len();
        let last_name = records.last().map(|r| r.name.clone());

        for record in records {
            match remote_entry_from_record(record, &ctx.root) {
                Ok(entry) => {
                    if let Some(dir) = prefix {
                        if !entry.name.is_under(dir) {
                            skipped += 1;
                            continue;
                        }
                    }
                    if ctx
                        .filter
                        .excludes(&entry.local_path, entry.name.as_str())
                    {
                        debug!(name = %entry.name, "Excluded remote object");
                        skipped += 1;
                        continue;
                    }
                    inventory.insert(entry.name.clone(), entry);
                }
                Err(e) => {
                    debug!(error = %e, "Skipping remote object");
                    skipped += 1;
                }
            }
        }

        if count < page_size {
            break;
        }
        marker = last_name;
    }

    info!(
        prefix = %scope,
        objects = inventory.len(),
        pages,
        skipped,
        "Listed remote objects"
    );
    Ok(inventory)
}

/// Converts one listing record into a [`RemoteEntry`]
///
/// # Errors
/// Returns [`DomainError::InvalidName`] if the object name cannot be a relative file name
pub fn remote_entry_from_record(
    record: ObjectRecord,
    root: &Path,
) -> Result<RemoteEntry, DomainError> {
    let name = RelativeName::new(record.name)?;
    let hash = match ContentHash::new(record.hash) {
        Ok(hash) => Some(hash),
        Err(e) => {
            debug!(name = %name, error = %e, "Object hash is not an MD5");
            None
        }
    };
    let last_modified = parse_last_modified(&record.last_modified);
    if last_modified.is_none() && !record.last_modified.is_empty() {
        debug!(name = %name, value = %record.last_modified, "Unparseable last_modified");
    }

    Ok(RemoteEntry {
        local_path: name.to_local_path(root),
        name,
        bytes: record.bytes,
        content_type: record.content_type,
        hash,
        last_modified,
    })
}

fn parse_last_modified(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, LAST_MODIFIED_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
