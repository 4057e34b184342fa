//! Filesystem watcher implementation

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use trellis_indexer::{RecomputeCoordinator, Trigger};

use crate::filter::{WatchFilter, DEFAULT_EXTENSIONS};

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Relevant file created
    Created(PathBuf),
    /// Relevant file modified or renamed into place. Renames away are not reported.
    Modified(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(path) | WatchEvent::Modified(path) => path,
        }
    }
}

/// What to watch and how eagerly to react
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub extensions: Vec<String>,
    /// Quiet period gathering a burst of events into one request. Zero disables it.
    pub debounce: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            debounce: Duration::ZERO,
        }
    }
}

/// Recursive watcher over one root, reporting only files accepted by the filter.
/// Initial contents are never reported; only changes after `watch` are.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    root_path: PathBuf,
}

impl FileWatcher {
    /// Create a new file watcher for the filter's root
    pub fn new(filter: WatchFilter) -> Result<Self> {
        let root_path = filter.root().to_path_buf();
        let filter = Arc::new(filter);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    debug!("File system event: {:?}", event);
                    Self::handle_notify_event(event, &filter, &event_tx);
                }
                Err(e) => {
                    error!("File system watch error: {}", e);
                }
            }
        })
        .context("failed to create filesystem watcher")?;

        Ok(Self {
            watcher,
            event_rx,
            root_path,
        })
    }

    /// Handle a notify event and convert to our watch events
    fn handle_notify_event(
        event: notify::Event,
        filter: &WatchFilter,
        event_tx: &mpsc::UnboundedSender<WatchEvent>,
    ) {
        use notify::EventKind;
        use notify::event::{ModifyKind, RenameMode};

        let (make, paths): (fn(PathBuf) -> WatchEvent, Vec<PathBuf>) = match event.kind {
            EventKind::Create(_) => (WatchEvent::Created, event.paths),
            // mtime/chmod noise does not change content
            EventKind::Modify(ModifyKind::Metadata(_)) => return,
            // the old name of a rename is gone from the tree, like a removal
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => return,
            // paths are [from, to]; only the destination exists now
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                (WatchEvent::Modified, event.paths.into_iter().last().into_iter().collect())
            }
            EventKind::Modify(_) => (WatchEvent::Modified, event.paths),
            _ => return,
        };

        for path in paths {
            if !filter.matches(&path) {
                continue;
            }
            if let Err(e) = event_tx.send(make(path)) {
                warn!("Failed to send watch event: {}", e);
            }
        }
    }

    /// Start watching the root recursively
    pub fn watch(&mut self) -> Result<()> {
        info!("Watching directory: {}", self.root_path.display());
        self.watcher
            .watch(&self.root_path, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", self.root_path.display()))
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Get the event receiver
    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }
}

/// Turns file changes into recompute requests
pub struct WatcherService {
    watcher: FileWatcher,
    coordinator: Arc<RecomputeCoordinator>,
    debounce: Duration,
}

impl WatcherService {
    pub fn new(
        root: impl Into<PathBuf>,
        config: &WatchConfig,
        coordinator: Arc<RecomputeCoordinator>,
    ) -> Result<Self> {
        let filter = WatchFilter::new(root, &config.extensions)?;
        Ok(Self {
            watcher: FileWatcher::new(filter)?,
            coordinator,
            debounce: config.debounce,
        })
    }

    /// Start watching the project directory
    pub fn start_watching(&mut self) -> Result<()> {
        self.watcher.watch()?;
        info!("Started watching project directory: {}", self.watcher.root().display());
        Ok(())
    }

    /// Forward events to the coordinator until the watcher shuts down.
    pub async fn process_events(mut self) -> Result<()> {
        let debounce = self.debounce;
        let event_rx = self.watcher.event_receiver();

        while let Some(event) = event_rx.recv().await {
            log_event(&event);
            if !debounce.is_zero() {
                let absorbed = absorb_burst(event_rx, debounce).await;
                if absorbed > 0 {
                    debug!("Debounced {} further change(s)", absorbed);
                }
            }
            self.coordinator.request_recompute(Trigger::FileChange);
        }

        Ok(())
    }
}

fn log_event(event: &WatchEvent) {
    match event {
        WatchEvent::Created(path) => info!("File added: {}", path.display()),
        WatchEvent::Modified(path) => info!("File changed: {}", path.display()),
    }
}

/// Wait out a quiet window, swallowing events that arrive during it.
/// Every new event restarts the window. Returns how many were swallowed.
async fn absorb_burst(event_rx: &mut mpsc::UnboundedReceiver<WatchEvent>, window: Duration) -> usize {
    let mut absorbed = 0;
    while let Ok(Some(event)) = tokio::time::timeout(window, event_rx.recv()).await {
        log_event(&event);
        absorbed += 1;
    }
    absorbed
}
