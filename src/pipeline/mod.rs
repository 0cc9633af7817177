//! Label ingestion pipeline.
//!
//! # Architecture
//!
//! ```text
//! IngressEvent
//!     |
//! PipelineController::handle
//!     - admit        (extension / sentinel folder filter)
//!     - StabilityProber  (size settles)
//!     - LockManager      (sibling .lock marker, exclusive create)
//!     - Extractor        (external program, success or failure)
//!     - transition   (processed / retry rename / stuck)
//!     |
//! ItemOutcome
//! ```
//!
//! [`runner::run`] feeds events to the controller from a channel with a
//! bounded number of concurrent workers.

mod controller;
mod error;
mod extractor;
mod lock;
pub mod maintenance;
pub mod retry;
mod runner;
mod stability;
mod types;

pub use controller::{PipelineController, PipelineControllerBuilder, Transition, transition};
pub use error::{ExtractError, LockError, PipelineError};
pub use extractor::{CommandExtractor, ExtractionOutcome, Extractor};
pub use lock::{LockGuard, LockManager};
pub use maintenance::{Inventory, RequeueOptions, requeue_retries};
pub use runner::{RunSummary, run};
pub use stability::{FsSizeProbe, SizeProbe, StabilityProber};
pub use types::{FolderLayout, IgnoreReason, IngressEvent, IngressKind, ItemOutcome, WatchedItem};
