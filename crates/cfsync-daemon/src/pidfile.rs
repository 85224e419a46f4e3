//! Single-instance PID file
//!
//! The file is created exclusively and holds the daemon's PID. A file left
//! behind by a dead process is replaced; one naming a live process makes
//! startup fail. The file is removed when the [`PidFile`] is dropped.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Claims `path` for this process
    ///
    /// # Errors
    /// Returns an error if another live instance owns the file or it cannot be written
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        match write_new(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if let Some(pid) = read_pid(path) {
                    if process_alive(pid) {
                        bail!(
                            "Another instance of cfsyncd is already running (pid {pid}, {})",
                            path.display()
                        );
                    }
                }
                warn!(path = %path.display(), "Replacing stale PID file");
                fs::remove_file(path)
                    .with_context(|| format!("Failed to remove stale PID file {}", path.display()))?;
                write_new(path)
                    .with_context(|| format!("Failed to create PID file {}", path.display()))?;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create PID file {}", path.display()))
            }
        }

        info!(path = %path.display(), pid = std::process::id(), "Acquired PID file");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %e, "Failed to remove PID file");
        }
    }
}

fn write_new(path: &Path) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    writeln!(file, "{}", std::process::id())
}

/// PID recorded in `path`, if the file holds one
pub fn read_pid(path: &Path) -> Option<i32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// True if a process with `pid` exists
pub fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs the permission and existence checks only
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Sends SIGTERM to the instance recorded in `path`
///
/// # Returns
/// The PID that was signalled
///
/// # Errors
/// Returns an error if no live instance is recorded or the signal cannot be sent
pub fn signal_running(path: &Path) -> Result<i32> {
    let Some(pid) = read_pid(path) else {
        bail!("No running cfsyncd found ({} missing or unreadable)", path.display());
    };
    if !process_alive(pid) {
        bail!("cfsyncd (pid {pid}) is not running");
    }
    // SAFETY: plain kill(2) on a PID read from our own PID file
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        return Err(io::Error::last_os_error())
            .with_context(|| format!("Failed to signal cfsyncd (pid {pid})"));
    }
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Larger than any PID the kernel hands out
    const DEAD_PID: i32 = 999_999_999;

    #[test]
    fn test_acquire_writes_own_pid_and_drop_removes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run/cfsyncd.pid");

        let pid_file = PidFile::acquire(&path).unwrap();
        assert_eq!(read_pid(&path), Some(std::process::id() as i32));

        drop(pid_file);
        assert!(!path.exists());
    }

    #[test]
    fn test_live_owner_blocks_second_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfsyncd.pid");

        let _first = PidFile::acquire(&path).unwrap();
        let err = PidFile::acquire(&path).err().unwrap();
        assert!(err.to_string().contains("already running"));
    }

    #[test]
    fn test_stale_and_garbage_files_are_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfsyncd.pid");

        for contents in [DEAD_PID.to_string(), "not a pid".to_string()] {
            fs::write(&path, contents).unwrap();
            let pid_file = PidFile::acquire(&path).unwrap();
            assert_eq!(read_pid(&path), Some(std::process::id() as i32));
            drop(pid_file);
        }
    }

    #[test]
    fn test_process_alive() {
        assert!(process_alive(std::process::id() as i32));
        assert!(!process_alive(DEAD_PID));
        assert!(!process_alive(0));
    }

    #[test]
    fn test_signal_without_instance_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfsyncd.pid");
        assert!(signal_running(&path).is_err());

        fs::write(&path, DEAD_PID.to_string()).unwrap();
        assert!(signal_running(&path).is_err());
    }
}
