//! Folder watcher feeding the ingestion pipeline.
//!
//! ```text
//! notify::RecommendedWatcher (root, non-recursive)
//!     | create / rename-into-root
//!     v
//! mpsc::Sender<IngressEvent>  --->  pipeline::run
//!     ^
//!     | startup scan
//! ```

mod error;
mod label_watcher;

pub use error::WatchError;
pub use label_watcher::{LabelWatcher, convert, scan_root};
