//! Single-instance guard for the daemon.
//!
//! The pid file holds the daemon's process id as plain text. A file naming a
//! live process blocks startup; a stale one is replaced. The file is removed
//! when the guard drops.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn acquire(path: &Path) -> Result<Self> {
        Self::acquire_with(path, std::process::id(), is_process_running)
    }

    fn acquire_with(path: &Path, pid: u32, is_running: impl Fn(u32) -> bool) -> Result<Self> {
        if let Some(existing) = read_pid(path) {
            if existing != pid && is_running(existing) {
                bail!(
                    "gitbored is already running (pid {existing}); remove {} if this is wrong",
                    path.display()
                );
            }
            warn!(pid = existing, path = %path.display(), "replacing stale pid file");
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(path, format!("{pid}\n"))
            .with_context(|| format!("Failed to write pid file: {}", path.display()))?;
        debug!(pid, path = %path.display(), "pid file written");

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove pid file");
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    // Signal 0 checks for existence without delivering anything.
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(windows)]
fn is_process_running(pid: u32) -> bool {
    use std::process::Command;
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/NH"])
        .output()
        .map(|output| String::from_utf8_lossy(&output.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_and_removes_pid() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pid");
        {
            let guard = PidFile::acquire_with(&path, 4242, |_| false).unwrap();
            assert_eq!(guard.path(), path.as_path());
            assert_eq!(read_pid(&path), Some(4242));
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_live_pid_blocks_startup() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pid");
        fs::write(&path, "1234\n").unwrap();

        let err = PidFile::acquire_with(&path, 4242, |pid| pid == 1234).unwrap_err();
        assert!(err.to_string().contains("already running"));
        assert_eq!(read_pid(&path), Some(1234));
    }

    #[test]
    fn test_stale_pid_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pid");
        fs::write(&path, "1234\n").unwrap();

        let _guard = PidFile::acquire_with(&path, 4242, |_| false).unwrap();
        assert_eq!(read_pid(&path), Some(4242));
    }

    #[test]
    fn test_garbage_pid_file_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pid");
        fs::write(&path, "not a pid").unwrap();

        let _guard = PidFile::acquire_with(&path, 4242, |_| true).unwrap();
        assert_eq!(read_pid(&path), Some(4242));
    }

    #[cfg(unix)]
    #[test]
    fn test_current_process_is_running() {
        assert!(is_process_running(std::process::id()));
    }
}
