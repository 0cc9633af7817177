//! notify-backed event source for the watched root.

use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::pipeline::{IngressEvent, IngressKind};

use super::error::WatchError;

/// Watches the root folder (non-recursively) and forwards arrivals.
///
/// Sentinel subfolders are never watched, so files moved into them do not
/// come back as events. The controller still filters them out in case a
/// platform reports them anyway.
pub struct LabelWatcher {
    root: PathBuf,
    sender: mpsc::Sender<IngressEvent>,
    /// The underlying file watcher. Dropping it closes the channel.
    _watcher: notify::RecommendedWatcher,
}

impl LabelWatcher {
    /// Start watching `root`, returning the watcher and its event stream.
    pub fn start(
        root: &Path,
        capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<IngressEvent>), WatchError> {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let callback_tx = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    for ingress in convert(&event) {
                        crate::debug_event!(
                            "watcher",
                            "event",
                            "{:?} {}",
                            ingress.kind,
                            ingress.path.display()
                        );
                        // Receiver gone means the runner has stopped
                        if callback_tx.blocking_send(ingress).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("[watcher] file watch error: {e}");
                }
            }
        })?;

        watcher
            .watch(root, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;

        crate::log_event!("watcher", "watching", "{}", root.display());

        Ok((
            Self {
                root: root.to_path_buf(),
                sender: tx,
                _watcher: watcher,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Queue every file already sitting in the root as a `Rescan` event.
    ///
    /// Sending happens on a background task so a full queue never blocks
    /// startup. Returns the number of files queued.
    pub fn scan_existing(&self) -> Result<usize, WatchError> {
        let events = scan_root(&self.root)?;
        let count = events.len();

        let tx = self.sender.clone();
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        if count > 0 {
            crate::log_event!("watcher", "startup scan", "{count} files queued");
        }
        Ok(count)
    }
}

/// Files directly inside `root`, as rescan events.
pub fn scan_root(root: &Path) -> Result<Vec<IngressEvent>, WatchError> {
    let scan_err = |source| WatchError::ScanFailed {
        path: root.to_path_buf(),
        source,
    };

    let mut events = Vec::new();
    for entry in std::fs::read_dir(root).map_err(scan_err)? {
        let entry = entry.map_err(scan_err)?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            events.push(IngressEvent::created(entry.path()).with_kind(IngressKind::Rescan));
        }
    }
    events.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(events)
}

/// Map a notify event to arrivals. Everything that is not a create or a
/// rename into the folder is dropped.
pub fn convert(event: &Event) -> Vec<IngressEvent> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => event
            .paths
            .iter()
            .map(|p| IngressEvent::directory(p.clone()))
            .collect(),
        EventKind::Create(CreateKind::File) => event
            .paths
            .iter()
            .map(|p| IngressEvent::created(p.clone()))
            .collect(),
        EventKind::Create(_) => event
            .paths
            .iter()
            .map(|p| IngressEvent {
                path: p.clone(),
                kind: IngressKind::Created,
                is_dir: p.is_dir(),
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => renamed(event.paths.first()),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => renamed(event.paths.last()),
        // Some backends cannot tell the two sides apart; keep the side that exists
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
            .paths
            .iter()
            .filter(|p| p.exists())
            .flat_map(|p| renamed(Some(p)))
            .collect(),
        _ => Vec::new(),
    }
}

fn renamed(path: Option<&PathBuf>) -> Vec<IngressEvent> {
    path.map(|p| IngressEvent {
        path: p.clone(),
        kind: IngressKind::Renamed,
        is_dir: p.is_dir(),
    })
    .into_iter()
    .collect()
}
