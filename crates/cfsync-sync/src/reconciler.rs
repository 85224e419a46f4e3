//! Inventory reconciliation
//!
//! Pure functions comparing the local and remote inventories:
//!
//! - [`diff_for_upload`]: local files whose remote counterpart is missing or
//!   has a different hash become upload jobs; files already matching remotely
//!   are reported as releasable.
//! - [`diff_for_delete`]: remote objects with no local counterpart become
//!   delete jobs.
//!
//! Both are idempotent: applying the jobs and diffing again yields nothing.

use std::collections::HashMap;

use cfsync_core::domain::{
    entries::RemoteEntry,
    newtypes::RelativeName,
    work::{DeleteJob, UploadJob},
};

use crate::scanner::LocalInventory;

/// Remote inventory: relative name → entry
pub type RemoteInventory = HashMap<RelativeName, RemoteEntry>;

/// Result of [`diff_for_upload`]
#[derive(Debug, Default)]
pub struct UploadDiff {
    /// Files to upload
    pub jobs: Vec<UploadJob>,
    /// Files already present remotely with the same hash
    pub releasable: Vec<RelativeName>,
}

/// Result of [`diff_for_delete`]
#[derive(Debug, Default)]
pub struct DeleteDiff {
    /// Objects to delete
    pub jobs: Vec<DeleteJob>,
    /// Remote entries dropped because a local file of that name exists
    pub released: usize,
}

/// Computes the uploads needed to bring the remote side up to date with `local`
pub fn diff_for_upload(local: &LocalInventory, remote: &RemoteInventory) -> UploadDiff {
    let mut diff = UploadDiff::default();
    for (name, entry) in local {
        match remote.get(name) {
            Some(existing) if existing.matches(&entry.hash) => {
                diff.releasable.push(name.clone());
            }
            _ => diff.jobs.push(UploadJob {
                entry: entry.clone(),
            }),
        }
    }
    diff.jobs.sort_by(|a, b| a.name().cmp(b.name()));
    diff
}

/// Computes the deletes needed to remove remote objects absent from `local`
///
/// Consumes the remote inventory; entries that survive are moved into jobs.
pub fn diff_for_delete(remote: RemoteInventory, local: &LocalInventory) -> DeleteDiff {
    let mut diff = DeleteDiff::default();
    for (name, entry) in remote {
        if local.contains_key(&name) {
            diff.released += 1;
        } else {
            diff.jobs.push(DeleteJob { entry });
        }
    }
    diff.jobs.sort_by(|a, b| a.name().cmp(b.name()));
    diff
}

/// Drops matched `names` from both inventories
pub fn release(local: &mut LocalInventory, remote: &mut RemoteInventory, names: &[RelativeName]) {
    for name in names {
        local.remove(name);
        remote.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use cfsync_core::domain::{entries::LocalEntry, newtypes::ContentHash};

    use super::*;

    const HASH_A: &str = "0cc175b9c0f1b6a831c399e269772661";
    const HASH_B: &str = "92eb5ffee6ae2fec3ad71c777531578f";

    fn name(s: &str) -> RelativeName {
        RelativeName::new(s.to_string()).unwrap()
    }

    fn local(entries: &[(&str, &str)]) -> LocalInventory {
        entries
            .iter()
            .map(|(n, h)| {
                let entry = LocalEntry {
                    path: PathBuf::from("/r").join(n),
                    name: name(n),
                    hash: ContentHash::new(h.to_string()).unwrap(),
                    size: 1,
                    modified: None,
                };
                (name(n), entry)
            })
            .collect()
    }

    fn remote(entries: &[(&str, &str)]) -> RemoteInventory {
        entries
            .iter()
            .map(|(n, h)| {
                let mut entry = RemoteEntry::stub(name(n), Path::new("/r"));
                entry.hash = ContentHash::new(h.to_string()).ok();
                (name(n), entry)
            })
            .collect()
    }

    fn job_names<T>(jobs: &[T], f: impl Fn(&T) -> &RelativeName) -> Vec<&str> {
        jobs.iter().map(|j| f(j).as_str()).collect()
    }

    #[test]
    fn test_upload_missing_and_changed() {
        let l = local(&[("a.txt", HASH_A), ("b.txt", HASH_A), ("c.txt", HASH_A)]);
        let r = remote(&[("a.txt", HASH_A), ("b.txt", HASH_B)]);

        let diff = diff_for_upload(&l, &r);

        assert_eq!(job_names(&diff.jobs, UploadJob::name), vec!["b.txt", "c.txt"]);
        assert_eq!(diff.releasable, vec![name("a.txt")]);
    }

    #[test]
    fn test_remote_without_hash_is_uploaded() {
        let l = local(&[("a.txt", HASH_A)]);
        let r = remote(&[("a.txt", "not-a-hash")]);

        let diff = diff_for_upload(&l, &r);
        assert_eq!(diff.jobs.len(), 1);
    }

    #[test]
    fn test_delete_only_absent_names() {
        let l = local(&[("a.txt", HASH_A)]);
        let r = remote(&[("a.txt", HASH_B), ("old.txt", HASH_A)]);

        let diff = diff_for_delete(r, &l);

        assert_eq!(job_names(&diff.jobs, DeleteJob::name), vec!["old.txt"]);
        assert_eq!(diff.released, 1);
    }

    #[test]
    fn test_startup_scenario() {
        // local {a.txt:H1, b.txt:H2}, remote {a.txt:H1, old.txt:H3}
        let mut l = local(&[("a.txt", HASH_A), ("b.txt", HASH_B)]);
        let mut r = remote(&[("a.txt", HASH_A), ("old.txt", "e4d909c290d0fb1ca068ffaddf22cbd0")]);

        let uploads = diff_for_upload(&l, &r);
        assert_eq!(job_names(&uploads.jobs, UploadJob::name), vec!["b.txt"]);

        release(&mut l, &mut r, &uploads.releasable);
        assert_eq!(l.len(), 1);
        assert_eq!(r.len(), 1);

        let deletes = diff_for_delete(r, &l);
        assert_eq!(job_names(&deletes.jobs, DeleteJob::name), vec!["old.txt"]);
        assert_eq!(deletes.released, 0);
    }

    #[test]
    fn test_diffs_are_idempotent() {
        let l = local(&[("a.txt", HASH_A), ("docs/b.txt", HASH_B)]);
        let r = remote(&[("z.txt", HASH_A)]);

        let uploads = diff_for_upload(&l, &r);
        let deletes = diff_for_delete(r.clone(), &l);

        // Apply the jobs to the remote view
        let mut applied = r;
        for job in &deletes.jobs {
            applied.remove(job.name());
        }
        for job in &uploads.jobs {
            let mut entry = RemoteEntry::stub(job.name().clone(), Path::new("/r"));
            entry.hash = Some(job.entry.hash.clone());
            applied.insert(job.name().clone(), entry);
        }

        assert!(diff_for_upload(&l, &applied).jobs.is_empty());
        assert!(diff_for_delete(applied, &l).jobs.is_empty());
    }

    #[test]
    fn test_empty_inventories() {
        let diff = diff_for_upload(&LocalInventory::new(), &RemoteInventory::new());
        assert!(diff.jobs.is_empty());
        assert!(diff.releasable.is_empty());
        assert!(diff_for_delete(RemoteInventory::new(), &LocalInventory::new())
            .jobs
            .is_empty());
    }
}
