pub mod cli;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod watcher;

pub use config::Settings;
pub use pipeline::{
    ExtractionOutcome, Extractor, FolderLayout, IngressEvent, ItemOutcome, PipelineController,
    PipelineError, RunSummary,
};
pub use watcher::{LabelWatcher, WatchError};
