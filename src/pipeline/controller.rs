//! Pipeline controller: event in, state transition out.
//!
//! ```text
//! Detected -> Stabilizing -> Locked -> Extracting -> Processed
//!                                                 -> RetryScheduled
//!                                                 -> Stuck
//! ```
//!
//! The controller knows nothing about notify. Whatever delivers events
//! calls [`PipelineController::handle`] once per event.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;

use super::error::{LockError, PipelineError};
use super::extractor::{CommandExtractor, Extractor};
use super::lock::LockManager;
use super::retry;
use super::stability::{FsSizeProbe, SizeProbe, StabilityProber};
use super::types::{FolderLayout, IgnoreReason, IngressEvent, ItemOutcome, WatchedItem};

/// What to do with a label after extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to the processed folder, name unchanged.
    Process,
    /// Rename to the next retry name and move to the retry folder.
    Retry { attempt: u64 },
    /// Park in the retry folder, name unchanged.
    Stuck,
}

/// Decide the post-extraction transition.
pub fn transition(retry_count: u64, extraction_ok: bool, max_retries: u32) -> Transition {
    if extraction_ok {
        Transition::Process
    } else if retry_count < u64::from(max_retries) {
        Transition::Retry {
            attempt: retry_count + 1,
        }
    } else {
        Transition::Stuck
    }
}

/// Drives labels through the ingestion state machine.
pub struct PipelineController<P = FsSizeProbe> {
    layout: FolderLayout,
    extensions: BTreeSet<String>,
    prober: StabilityProber<P>,
    locks: LockManager,
    extractor: Arc<dyn Extractor>,
    max_retries: u32,
}

impl PipelineController<FsSizeProbe> {
    /// Create a builder for configuring the controller.
    pub fn builder(layout: FolderLayout) -> PipelineControllerBuilder {
        PipelineControllerBuilder::new(layout)
    }

    /// Controller wired from settings with the command extractor.
    pub fn from_settings(settings: &Settings) -> Self {
        let extractor = CommandExtractor::new(
            settings.extractor.program.clone(),
            settings.extractor.args.clone(),
            settings.extractor.timeout(),
        );

        Self::builder(settings.layout())
            .extensions(settings.watch.extension_set())
            .prober(StabilityProber::new(
                settings.stability.samples,
                settings.stability.interval(),
            ))
            .lock_suffix(settings.lock.suffix.clone())
            .max_retries(settings.retry.max_retries)
            .extractor(Arc::new(extractor))
            .build()
    }
}

impl<P: SizeProbe> PipelineController<P> {
    pub fn layout(&self) -> &FolderLayout {
        &self.layout
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Classify an event without touching the filesystem.
    pub fn admit(&self, event: &IngressEvent) -> Result<WatchedItem, IgnoreReason> {
        if event.is_dir {
            return Err(IgnoreReason::Directory);
        }
        if self.layout.is_sentinel(&event.path) {
            return Err(IgnoreReason::SentinelFolder);
        }
        if !event.path.starts_with(self.layout.root()) {
            return Err(IgnoreReason::OutsideRoot);
        }
        if self.locks.is_marker(&event.path) {
            return Err(IgnoreReason::LockMarker);
        }

        match WatchedItem::from_path(&event.path) {
            Some(item) if self.extensions.contains(&item.extension) => Ok(item),
            _ => Err(IgnoreReason::UnsupportedExtension),
        }
    }

    /// Run one event through the state machine.
    ///
    /// Never returns an error: every failure is folded into the outcome so
    /// one bad label cannot disturb the others.
    pub async fn handle(&self, event: IngressEvent) -> ItemOutcome {
        let item = match self.admit(&event) {
            Ok(item) => item,
            Err(reason) => {
                crate::debug_event!(
                    "pipeline",
                    "ignored",
                    "{} ({reason:?})",
                    event.path.display()
                );
                return ItemOutcome::Ignored(reason);
            }
        };

        crate::log_event!(
            "pipeline",
            "detected",
            "{} via {:?}",
            item.file_name(),
            event.kind
        );

        if !self.prober.is_stable(&item.path).await {
            let err = PipelineError::UnstableFile {
                path: item.path.clone(),
                samples: self.prober.samples(),
            };
            tracing::warn!("[pipeline] skipping: {err}");
            return ItemOutcome::Unstable { path: item.path };
        }

        let guard = match self.locks.acquire(&item.path) {
            Ok(guard) => guard,
            Err(LockError::AlreadyLocked { path }) => {
                crate::log_event!("pipeline", "locked elsewhere, skipping", "{}", path.display());
                return ItemOutcome::AlreadyLocked { path };
            }
            Err(e) => {
                let err = PipelineError::from(e);
                tracing::error!("[pipeline] {err}");
                return ItemOutcome::Failed {
                    path: item.path,
                    error: err.to_string(),
                };
            }
        };

        // A duplicate event may lose the race to a worker that already
        // finished and moved the file away.
        let outcome = if item.path.exists() {
            self.extract_locked(&item).await
        } else {
            crate::debug_event!("pipeline", "vanished", "{}", item.path.display());
            ItemOutcome::Ignored(IgnoreReason::Vanished)
        };

        if let Err(e) = guard.release() {
            tracing::error!("[pipeline] {}", PipelineError::from(e));
        }

        outcome
    }

    /// Extracting state. Caller holds the lock.
    async fn extract_locked(&self, item: &WatchedItem) -> ItemOutcome {
        crate::log_event!(
            "pipeline",
            "extracting",
            "{} (attempt {}) with {}",
            item.file_name(),
            item.retry_count.saturating_add(1),
            self.extractor.name()
        );

        let extraction = match self.extractor.extract(&item.path).await {
            Ok(extraction) => extraction,
            Err(e) => {
                let err = PipelineError::from(e);
                tracing::error!("[pipeline] {} left in place: {err}", item.path.display());
                return ItemOutcome::Failed {
                    path: item.path.clone(),
                    error: err.to_string(),
                };
            }
        };

        if !extraction.ok {
            let err = PipelineError::ExtractionFailure {
                path: item.path.clone(),
                diagnostic: extraction.diagnostic.clone(),
            };
            tracing::warn!("[pipeline] {err}");
        }

        match transition(item.retry_count, extraction.ok, self.max_retries) {
            Transition::Process => {
                let destination = self.layout.processed().join(item.file_name());
                match move_file(&item.path, &destination) {
                    Ok(()) => {
                        crate::log_event!("pipeline", "processed", "{}", destination.display());
                        ItemOutcome::Processed { destination }
                    }
                    Err(err) => self.failed(item, err),
                }
            }
            Transition::Retry { attempt } => {
                let destination = self
                    .layout
                    .retry()
                    .join(retry::next_retry_name(item.file_name()));
                match move_file(&item.path, &destination) {
                    Ok(()) => {
                        self.clear_stuck_marker(&destination);
                        crate::log_event!(
                            "pipeline",
                            "retry scheduled",
                            "{} (attempt {attempt} of {})",
                            destination.display(),
                            self.max_retries
                        );
                        ItemOutcome::RetryScheduled {
                            destination,
                            attempt,
                        }
                    }
                    Err(err) => self.failed(item, err),
                }
            }
            Transition::Stuck => {
                let parked = self.layout.retry().join(item.file_name());
                if parked != item.path {
                    if let Err(err) = move_file(&item.path, &parked) {
                        return self.failed(item, err);
                    }
                }
                self.write_stuck_marker(&parked, item.retry_count);
                let err = PipelineError::RetryExhausted {
                    path: parked.clone(),
                    retries: item.retry_count,
                };
                tracing::warn!("[pipeline] {err}; manual intervention required");
                ItemOutcome::Stuck {
                    path: parked,
                    retries: item.retry_count,
                }
            }
        }
    }

    /// Record a parked label as stuck. A stuck label and a scheduled final
    /// attempt share a name, so the sidecar is what tells them apart.
    fn write_stuck_marker(&self, parked: &Path, retries: u64) {
        let Some(marker) = stuck_marker_path(parked) else {
            return;
        };
        let content = format!(
            "retries={retries}\nstuck_at={}\n",
            chrono::Utc::now().to_rfc3339()
        );
        if let Err(source) = std::fs::write(&marker, content) {
            let err = PipelineError::filesystem("write stuck marker", &marker, source);
            tracing::error!("[pipeline] {err}");
        }
    }

    /// Drop a sidecar left over from an earlier label of the same name.
    fn clear_stuck_marker(&self, destination: &Path) {
        let Some(marker) = stuck_marker_path(destination) else {
            return;
        };
        match std::fs::remove_file(&marker) {
            Ok(()) => {
                crate::debug_event!("pipeline", "cleared stale marker", "{}", marker.display());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                let err = PipelineError::filesystem("remove stuck marker", &marker, source);
                tracing::warn!("[pipeline] {err}");
            }
        }
    }

    fn failed(&self, item: &WatchedItem, err: PipelineError) -> ItemOutcome {
        tracing::error!("[pipeline] {} left in place: {err}", item.path.display());
        ItemOutcome::Failed {
            path: item.path.clone(),
            error: err.to_string(),
        }
    }
}

/// Sidecar next to `path` marking it stuck.
pub(crate) fn stuck_marker_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    Some(path.with_file_name(retry::stuck_marker_name(name)))
}

/// Move without ever overwriting the destination.
///
/// `hard_link` fails with `AlreadyExists` when the destination is taken, so
/// the no-overwrite check and the publish are one atomic step. Filesystems
/// without hard links fall back to check-then-rename.
pub(crate) fn move_file(from: &Path, to: &Path) -> Result<(), PipelineError> {
    match std::fs::hard_link(from, to) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(destination_taken(from, to));
        }
        Err(e) if matches!(e.kind(), ErrorKind::Unsupported | ErrorKind::PermissionDenied) => {
            crate::debug_event!("pipeline", "hard link unavailable, renaming", "{e}");
            if to.exists() {
                return Err(destination_taken(from, to));
            }
            return std::fs::rename(from, to)
                .map_err(|source| PipelineError::filesystem("move", from, source));
        }
        Err(source) => return Err(PipelineError::filesystem("move", from, source)),
    }

    match std::fs::remove_file(from) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => {
            // Undo the link so the label stays in exactly one place
            if let Err(e) = std::fs::remove_file(to) {
                tracing::error!("[pipeline] could not undo link {}: {e}", to.display());
            }
            Err(PipelineError::filesystem("move", from, source))
        }
    }
}

fn destination_taken(from: &Path, to: &Path) -> PipelineError {
    PipelineError::filesystem(
        "move",
        to,
        std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("destination exists, not overwriting (source {})", from.display()),
        ),
    )
}

/// Builder for constructing a PipelineController.
pub struct PipelineControllerBuilder<P = FsSizeProbe> {
    layout: FolderLayout,
    extensions: BTreeSet<String>,
    prober: StabilityProber<P>,
    lock_suffix: String,
    extractor: Option<Arc<dyn Extractor>>,
    max_retries: u32,
}

impl PipelineControllerBuilder<FsSizeProbe> {
    /// Create a new builder with defaults.
    pub fn new(layout: FolderLayout) -> Self {
        Self {
            layout,
            extensions: ["jpg", "jpeg", "png"]
                .into_iter()
                .map(String::from)
                .collect(),
            prober: StabilityProber::new(10, std::time::Duration::from_secs(1)),
            lock_suffix: ".lock".to_string(),
            extractor: None,
            max_retries: 3,
        }
    }
}

impl<P: SizeProbe> PipelineControllerBuilder<P> {
    /// Set the accepted extensions (lowercase, no dot).
    pub fn extensions(mut self, extensions: BTreeSet<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Replace the stability prober, possibly with a different size probe.
    pub fn prober<Q: SizeProbe>(self, prober: StabilityProber<Q>) -> PipelineControllerBuilder<Q> {
        PipelineControllerBuilder {
            layout: self.layout,
            extensions: self.extensions,
            prober,
            lock_suffix: self.lock_suffix,
            extractor: self.extractor,
            max_retries: self.max_retries,
        }
    }

    /// Set the lock marker suffix.
    pub fn lock_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.lock_suffix = suffix.into();
        self
    }

    /// Set the extraction collaborator.
    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Set the number of failed attempts tolerated before a label is stuck.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Build the controller. Without an explicit extractor the default
    /// `python expiry_vision.py` command is used.
    pub fn build(self) -> PipelineController<P> {
        let extractor = self.extractor.unwrap_or_else(|| {
            let defaults = crate::config::ExtractorConfig::default();
            let timeout = defaults.timeout();
            Arc::new(CommandExtractor::new(defaults.program, defaults.args, timeout))
        });

        PipelineController {
            layout: self.layout,
            extensions: self.extensions,
            prober: self.prober,
            locks: LockManager::new(self.lock_suffix),
            extractor,
            max_retries: self.max_retries,
        }
    }
}
