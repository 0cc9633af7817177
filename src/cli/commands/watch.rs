//! Watch command - the long-running ingestion loop.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::pipeline::{self, PipelineController, PipelineError, RunSummary};
use crate::watcher::LabelWatcher;

/// Arguments for the watch command.
pub struct WatchArgs {
    pub root: Option<PathBuf>,
    pub no_scan: bool,
}

/// Resolve and check everything that must hold before watching.
///
/// Returns settings with `watch.root` canonicalized.
pub fn prepare(mut settings: Settings, root: Option<PathBuf>) -> Result<Settings, PipelineError> {
    if let Some(root) = root {
        settings.watch.root = root;
    }

    settings
        .validate()
        .map_err(|reason| PipelineError::Config { reason })?;

    let root = std::fs::canonicalize(&settings.watch.root)
        .ok()
        .filter(|path| path.is_dir())
        .ok_or_else(|| PipelineError::RootMissing {
            path: settings.watch.root.clone(),
        })?;
    settings.watch.root = root;

    let layout = settings.layout();
    layout
        .ensure()
        .map_err(|source| PipelineError::filesystem("create", layout.retry(), source))?;

    Ok(settings)
}

/// Run the watch command until Ctrl-C.
pub async fn run(args: WatchArgs, settings: Settings) -> anyhow::Result<RunSummary> {
    let settings = prepare(settings, args.root)?;
    let root = settings.watch.root.clone();

    let controller = Arc::new(PipelineController::from_settings(&settings));

    if let Some(max_age) = settings.lock.stale_after() {
        match controller.locks().sweep_stale(&root, Some(max_age)) {
            Ok(removed) if !removed.is_empty() => {
                tracing::warn!(
                    "[watch] removed {} stale lock marker(s) older than {}s",
                    removed.len(),
                    max_age.as_secs()
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("[watch] stale lock sweep failed: {e}"),
        }
    }

    let (watcher, events) = LabelWatcher::start(&root, settings.watch.channel_capacity)
        .with_context(|| format!("watching {}", root.display()))?;

    if settings.watch.scan_on_startup && !args.no_scan {
        watcher
            .scan_existing()
            .with_context(|| format!("scanning {}", root.display()))?;
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    eprintln!(
        "Watching {} with {} worker(s); press Ctrl-C to stop",
        root.display(),
        settings.watch.workers
    );

    let summary = pipeline::run(controller, events, settings.watch.workers, shutdown).await;
    drop(watcher);

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_rejects_missing_root() {
        let settings = Settings::default();
        let err = prepare(settings, Some(PathBuf::from("/definitely/not/here"))).unwrap_err();
        assert!(matches!(err, PipelineError::RootMissing { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_prepare_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.watch.workers = 0;
        let err = prepare(settings, Some(dir.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
    }

    #[test]
    fn test_prepare_creates_sentinel_folders() {
        let dir = TempDir::new().unwrap();
        let settings = prepare(Settings::default(), Some(dir.path().to_path_buf())).unwrap();

        assert!(settings.watch.root.is_absolute());
        assert!(settings.layout().processed().is_dir());
        assert!(settings.layout().retry().is_dir());
    }
}
