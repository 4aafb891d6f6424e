use anyhow::{bail, Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive lock guarding a state file against concurrent CLI writers
///
/// The lock lives in a sibling `<state file>.lock` holding the owner's PID
/// and is released on drop. The file itself stays in place so every process
/// locks the same inode.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
    file: File,
}

impl StateLock {
    pub fn acquire(state_path: &Path) -> Result<Self> {
        let path = lock_path_for(state_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create state directory: {:?}", parent))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {:?}", path))?;

        if file.try_lock_exclusive().is_err() {
            bail!(
                "State file {:?} is in use by another process (lock: {:?})",
                state_path,
                path
            );
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        debug!("Acquired state lock: {:?}", path);

        Ok(Self { path, file })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to unlock state lock {:?}: {}", self.path, e);
        } else {
            debug!("Released state lock: {:?}", self.path);
        }
    }
}

fn lock_path_for(state_path: &Path) -> PathBuf {
    let mut name = state_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "orchestrator-state.json".into());
    name.push(".lock");
    state_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_path_is_sibling() {
        assert_eq!(
            lock_path_for(Path::new("data/state.json")),
            PathBuf::from("data/state.json.lock")
        );
    }

    #[test]
    fn test_acquire_writes_pid_and_releases_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");

        let lock = StateLock::acquire(&state_path).unwrap();
        let lock_path = lock_path_for(&state_path);
        let contents = std::fs::read_to_string(&lock_path).unwrap();
        assert_eq!(contents.trim().parse::<u32>().unwrap(), std::process::id());

        drop(lock);
        // The file is kept; only the lock is released
        assert!(lock_path.exists());
        let again = StateLock::acquire(&state_path).unwrap();
        drop(again);
    }

    #[test]
    fn test_exclusive_lock_prevents_second_writer() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");

        let _first = StateLock::acquire(&state_path).unwrap();
        let second = StateLock::acquire(&state_path);

        assert!(second.unwrap_err().to_string().contains("in use"));
    }
}
