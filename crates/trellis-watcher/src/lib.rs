//! Filesystem change detection driving recomputes

pub mod filter;
pub mod watcher;

pub use filter::{WatchFilter, DEFAULT_EXTENSIONS};
pub use watcher::{FileWatcher, WatchConfig, WatchEvent, WatcherService};
