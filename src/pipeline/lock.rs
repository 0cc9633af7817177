//! Per-file mutual exclusion through sibling marker files.
//!
//! The lock for `/labels/a.jpg` is the file `/labels/a.jpg.lock`. It is
//! created with an exclusive create, so two workers racing on the same path
//! cannot both succeed. Markers survive a crash and can be swept later.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::error::LockError;

/// Creates and sweeps lock markers.
#[derive(Debug, Clone)]
pub struct LockManager {
    suffix: String,
}

impl LockManager {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Marker path for `path`: the full file name with the suffix appended.
    pub fn marker_path(&self, path: &Path) -> PathBuf {
        let mut marker: OsString = path.as_os_str().to_owned();
        marker.push(&self.suffix);
        PathBuf::from(marker)
    }

    /// Whether `path` is itself a lock marker.
    pub fn is_marker(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.len() > self.suffix.len() && name.ends_with(&self.suffix))
    }

    /// Take the lock for `path`.
    ///
    /// Fails with [`LockError::AlreadyLocked`] when the marker exists.
    pub fn acquire(&self, path: &Path) -> Result<LockGuard, LockError> {
        let marker = self.marker_path(path);

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&marker)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(LockError::AlreadyLocked {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(LockError::Io {
                    path: marker,
                    source,
                });
            }
        };

        // Owner details are informational only; existence is the lock.
        let _ = writeln!(
            file,
            "pid={} since={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );

        crate::debug_event!("lock", "acquired", "{}", marker.display());
        Ok(LockGuard {
            marker,
            released: false,
        })
    }

    /// Whether a marker currently exists for `path`.
    pub fn is_locked(&self, path: &Path) -> bool {
        self.marker_path(path).exists()
    }

    /// Remove markers in `dir` older than `max_age` (all of them when `None`).
    ///
    /// Returns the removed marker paths.
    pub fn sweep_stale(
        &self,
        dir: &Path,
        max_age: Option<Duration>,
    ) -> Result<Vec<PathBuf>, LockError> {
        let io_err = |source| LockError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let now = SystemTime::now();
        let mut removed = Vec::new();

        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();
            if !self.is_marker(&path) {
                continue;
            }

            let stale = match max_age {
                None => true,
                Some(max_age) => entry
                    .metadata()
                    .and_then(|meta| meta.modified())
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok())
                    .is_some_and(|age| age >= max_age),
            };
            if !stale {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    crate::log_event!("lock", "swept stale marker", "{}", path.display());
                    removed.push(path);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(LockError::Io { path, source }),
            }
        }

        Ok(removed)
    }
}

/// Exclusive ownership of one path. Dropping the guard removes the marker.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    marker: PathBuf,
    released: bool,
}

impl LockGuard {
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Release explicitly, reporting any I/O failure.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        remove_marker(&self.marker)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_marker(&self.marker) {
            tracing::error!("[lock] failed to release: {e}");
        }
    }
}

/// Idempotent marker removal.
fn remove_marker(marker: &Path) -> Result<(), LockError> {
    match std::fs::remove_file(marker) {
        Ok(()) => {
            crate::debug_event!("lock", "released", "{}", marker.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LockError::Io {
            path: marker.to_path_buf(),
            source,
        }),
    }
}
