//! Core types shared by the pipeline stages.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::retry;

/// Folder layout: a watched root with two sentinel subfolders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderLayout {
    root: PathBuf,
    processed: PathBuf,
    retry: PathBuf,
}

impl FolderLayout {
    pub fn new(root: impl Into<PathBuf>, processed_dir: &str, retry_dir: &str) -> Self {
        let root = root.into();
        Self {
            processed: root.join(processed_dir),
            retry: root.join(retry_dir),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn processed(&self) -> &Path {
        &self.processed
    }

    pub fn retry(&self) -> &Path {
        &self.retry
    }

    /// Whether `path` lives under one of the sentinel folders.
    pub fn is_sentinel(&self, path: &Path) -> bool {
        path.starts_with(&self.processed) || path.starts_with(&self.retry)
    }

    /// Create the sentinel folders if missing.
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.processed)?;
        std::fs::create_dir_all(&self.retry)
    }
}

/// How an event reached the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngressKind {
    /// A file was created in the root.
    Created,
    /// A file was renamed or moved into the root.
    Renamed,
    /// Found by the startup scan.
    Rescan,
}

/// A filesystem notification, independent of the mechanism delivering it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressEvent {
    pub path: PathBuf,
    pub kind: IngressKind,
    pub is_dir: bool,
}

impl IngressEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: IngressKind::Created,
            is_dir: false,
        }
    }

    pub fn with_kind(mut self, kind: IngressKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: IngressKind::Created,
            is_dir: true,
        }
    }
}

/// A label admitted into the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedItem {
    pub path: PathBuf,
    pub base_name: String,
    pub extension: String,
    pub retry_count: u64,
}

impl WatchedItem {
    /// Build from a path whose file name is valid UTF-8 and has an extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let extension = retry::extension(name)?;
        Some(Self {
            path: path.to_path_buf(),
            base_name: retry::base_name(name).to_string(),
            extension: extension.to_ascii_lowercase(),
            retry_count: retry::retry_count(name),
        })
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Why an event never entered the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    Directory,
    OutsideRoot,
    SentinelFolder,
    LockMarker,
    UnsupportedExtension,
    /// Gone by the time the lock was taken.
    Vanished,
}

/// Final state of one event's trip through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Discarded at ingress; no state was created.
    Ignored(IgnoreReason),
    /// Size never settled; left in place for a later event.
    Unstable { path: PathBuf },
    /// Another worker holds the lock; left untouched.
    AlreadyLocked { path: PathBuf },
    /// Extraction succeeded; moved into the processed folder.
    Processed { destination: PathBuf },
    /// Extraction failed; renamed and moved into the retry folder.
    RetryScheduled { destination: PathBuf, attempt: u64 },
    /// Extraction failed with retries exhausted; parked in the retry folder.
    Stuck { path: PathBuf, retries: u64 },
    /// Unexpected filesystem or extractor error; left at `path`.
    Failed { path: PathBuf, error: String },
}

impl ItemOutcome {
    /// Short label used in logs and run summaries.
    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Ignored(_) => "ignored",
            ItemOutcome::Unstable { .. } => "unstable",
            ItemOutcome::AlreadyLocked { .. } => "already_locked",
            ItemOutcome::Processed { .. } => "processed",
            ItemOutcome::RetryScheduled { .. } => "retry_scheduled",
            ItemOutcome::Stuck { .. } => "stuck",
            ItemOutcome::Failed { .. } => "failed",
        }
    }

    /// Whether the item reached `Processed` or `Stuck`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemOutcome::Processed { .. } | ItemOutcome::Stuck { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sentinels() {
        let layout = FolderLayout::new("/labels", "Processed", "Retry");
        assert_eq!(layout.processed(), Path::new("/labels/Processed"));
        assert_eq!(layout.retry(), Path::new("/labels/Retry"));
        assert!(layout.is_sentinel(Path::new("/labels/Processed/a.jpg")));
        assert!(layout.is_sentinel(Path::new("/labels/Retry/a__retry1.jpg")));
        assert!(!layout.is_sentinel(Path::new("/labels/a.jpg")));
        // Prefix match is per component
        assert!(!layout.is_sentinel(Path::new("/labels/Retry-old/a.jpg")));
    }

    #[test]
    fn test_watched_item_from_retry_name() {
        let item = WatchedItem::from_path(Path::new("/labels/lot 5__retry2.JPG")).unwrap();
        assert_eq!(item.base_name, "lot 5");
        assert_eq!(item.extension, "jpg");
        assert_eq!(item.retry_count, 2);
        assert_eq!(item.file_name(), "lot 5__retry2.JPG");
    }

    #[test]
    fn test_watched_item_requires_extension() {
        assert!(WatchedItem::from_path(Path::new("/labels/README")).is_none());
    }
}
