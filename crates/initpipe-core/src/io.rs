use crate::error::{InitError, Result};
use crate::paths;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents partial writes from corrupting state files.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Serialize `value` as pretty JSON with a trailing newline.
pub fn to_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut data = serde_json::to_vec_pretty(value)?;
    data.push(b'\n');
    Ok(data)
}

/// Read and parse a JSON document. Returns `Ok(None)` when the file is absent.
pub fn read_json_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

// ---------------------------------------------------------------------------
// StateLock
// ---------------------------------------------------------------------------

/// Advisory lock held for the duration of a mutating command.
///
/// Acquired by exclusively creating `init/.init-state.lock`; a second
/// invocation fails with [`InitError::Locked`] instead of racing on the
/// state file. The lock file is removed on drop.
///
/// The lock never creates `init/`: without it acquisition fails with
/// [`InitError::NotStarted`]. Only `start` creates the directory.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    pub fn acquire(root: &Path) -> Result<Self> {
        if !paths::init_dir(root).is_dir() {
            return Err(InitError::NotStarted);
        }
        let path = paths::lock_path(root);
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = std::fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default();
                return Err(InitError::Locked {
                    path: path.display().to_string(),
                    holder: if holder.is_empty() {
                        "unknown holder".to_string()
                    } else {
                        holder
                    },
                });
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(
            file,
            "pid={} since={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        )?;
        tracing::debug!(lock = %path.display(), "acquired state lock");
        Ok(Self { path })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        // The init/ directory may already be gone after cleanup-init.
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        atomic_write(&path, b"{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/state.json");
        atomic_write(&path, b"data").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn read_json_optional_absent_is_none() {
        let dir = TempDir::new().unwrap();
        let v: Option<serde_json::Value> =
            read_json_optional(&dir.path().join("nope.json")).unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn second_lock_is_refused() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("init")).unwrap();
        let first = StateLock::acquire(dir.path()).unwrap();
        let second = StateLock::acquire(dir.path());
        assert!(matches!(second, Err(InitError::Locked { .. })));
        drop(first);
        assert!(!paths::lock_path(dir.path()).exists());
        StateLock::acquire(dir.path()).unwrap();
    }

    #[test]
    fn lock_does_not_create_init_dir() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            StateLock::acquire(dir.path()),
            Err(InitError::NotStarted)
        ));
        assert!(!dir.path().join("init").exists());
    }
}
