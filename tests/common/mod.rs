//! Shared fixtures for pipeline integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use labelwatch::pipeline::{
    ExtractError, ExtractionOutcome, Extractor, FolderLayout, PipelineController,
    StabilityProber,
};
use tempfile::TempDir;

/// Extractor that replays scripted results and counts calls.
///
/// Once the script runs out it keeps returning the fallback.
pub struct ScriptedExtractor {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<PathBuf>>,
}

impl ScriptedExtractor {
    pub fn always(ok: bool) -> Self {
        Self::scripted(vec![], ok)
    }

    pub fn scripted(script: Vec<bool>, fallback: bool) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract(&self, path: &Path) -> Result<ExtractionOutcome, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(path.to_path_buf());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let ok = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        Ok(if ok {
            ExtractionOutcome::success()
        } else {
            ExtractionOutcome::failure("no expiry date found")
        })
    }
}

/// Extractor whose collaborator cannot even be started.
pub struct BrokenExtractor;

#[async_trait]
impl Extractor for BrokenExtractor {
    fn name(&self) -> &str {
        "broken"
    }

    async fn extract(&self, _path: &Path) -> Result<ExtractionOutcome, ExtractError> {
        Err(ExtractError::Spawn {
            program: "missing-extractor".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }
}

/// Temporary watched root with sentinel folders created.
pub fn layout() -> (TempDir, FolderLayout) {
    let dir = TempDir::new().unwrap();
    let layout = FolderLayout::new(dir.path(), "Processed", "Retry");
    layout.ensure().unwrap();
    (dir, layout)
}

/// Controller with fast stability probing and the given extractor.
pub fn controller(
    layout: &FolderLayout,
    extractor: std::sync::Arc<dyn Extractor>,
    max_retries: u32,
) -> PipelineController {
    PipelineController::builder(layout.clone())
        .prober(StabilityProber::new(3, Duration::from_millis(2)))
        .max_retries(max_retries)
        .extractor(extractor)
        .build()
}

pub fn drop_label(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"\xFF\xD8\xFF\xE0 label bytes").unwrap();
    path
}

/// Sorted file names directly inside `dir`.
pub fn names_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
