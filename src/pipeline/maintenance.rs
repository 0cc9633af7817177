//! Operator tooling around the folder layout: inventory and manual re-feed.
//!
//! Nothing here runs automatically. Retry-folder labels only re-enter the
//! pipeline when an operator (or a scheduled job) requeues them.
//!
//! A retry-folder label is stuck when the controller left a `.stuck`
//! sidecar next to it. The counter in the name alone cannot say, since the
//! final scheduled attempt and a stuck label carry the same name.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::controller::{move_file, stuck_marker_path};
use super::error::PipelineError;
use super::lock::LockManager;
use super::retry;
use super::types::FolderLayout;

/// Snapshot of where labels currently sit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inventory {
    /// Supported files waiting in the root.
    pub pending: usize,
    pub processed: usize,
    /// Retry-folder files waiting for another attempt.
    pub retry_scheduled: usize,
    /// Retry-folder files marked stuck.
    pub stuck: Vec<String>,
    /// Lock markers in the root.
    pub locks: Vec<String>,
}

impl Inventory {
    pub fn collect(
        layout: &FolderLayout,
        extensions: &BTreeSet<String>,
        locks: &LockManager,
    ) -> Result<Self, PipelineError> {
        let mut inventory = Inventory::default();

        for name in file_names(layout.root())? {
            if locks.is_marker(Path::new(&name)) {
                inventory.locks.push(name);
            } else if is_supported(&name, extensions) {
                inventory.pending += 1;
            }
        }

        if layout.processed().is_dir() {
            inventory.processed = file_names(layout.processed())?
                .iter()
                .filter(|name| is_supported(name, extensions))
                .count();
        }

        if layout.retry().is_dir() {
            for name in file_names(layout.retry())? {
                if !is_supported(&name, extensions) {
                    continue;
                }
                if is_stuck(&layout.retry().join(&name)) {
                    inventory.stuck.push(name);
                } else {
                    inventory.retry_scheduled += 1;
                }
            }
        }

        inventory.stuck.sort();
        inventory.locks.sort();
        Ok(inventory)
    }
}

/// Options for [`requeue_retries`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequeueOptions {
    /// Also move labels marked stuck.
    pub include_stuck: bool,
    /// Report what would move without moving anything.
    pub dry_run: bool,
}

/// Move retry-folder labels back into the root, names unchanged.
///
/// Returns the destination paths (or would-be destinations on a dry run).
/// A label whose name is already taken in the root is skipped with a warning.
/// Requeuing a stuck label removes its sidecar.
pub fn requeue_retries(
    layout: &FolderLayout,
    extensions: &BTreeSet<String>,
    options: RequeueOptions,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut moved = Vec::new();
    if !layout.retry().is_dir() {
        return Ok(moved);
    }

    let mut names = file_names(layout.retry())?;
    names.sort();

    for name in names {
        if !is_supported(&name, extensions) {
            continue;
        }

        let from = layout.retry().join(&name);
        let stuck = is_stuck(&from);
        if stuck && !options.include_stuck {
            crate::debug_event!("requeue", "skipping stuck", "{name}");
            continue;
        }

        let to = layout.root().join(&name);

        if options.dry_run {
            moved.push(to);
            continue;
        }

        match move_file(&from, &to) {
            Ok(()) => {
                if stuck {
                    clear_stuck(&from);
                }
                crate::log_event!("requeue", "moved", "{}", to.display());
                moved.push(to);
            }
            Err(e) => tracing::warn!("[requeue] {e}"),
        }
    }

    Ok(moved)
}

fn is_stuck(path: &Path) -> bool {
    stuck_marker_path(path).is_some_and(|marker| marker.is_file())
}

fn clear_stuck(path: &Path) {
    let Some(marker) = stuck_marker_path(path) else {
        return;
    };
    match std::fs::remove_file(&marker) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("[requeue] could not remove {}: {e}", marker.display()),
    }
}

fn is_supported(name: &str, extensions: &BTreeSet<String>) -> bool {
    retry::extension(name).is_some_and(|ext| extensions.contains(&ext.to_ascii_lowercase()))
}

/// Names of regular files directly inside `dir`.
fn file_names(dir: &Path) -> Result<Vec<String>, PipelineError> {
    let read_err = |source| PipelineError::filesystem("read directory", dir, source);
    let mut names = Vec::new();

    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    Ok(names)
}
