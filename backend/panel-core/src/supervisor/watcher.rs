//! Change notification for the module directories.

use crate::error::catalogue::CatalogueError;

use common::ErrorLocation;

use std::panic::Location;
use std::path::Path;

use log::{debug, info, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Watches module directories and signals when their content changed.
///
/// Bursts of filesystem events collapse into one pending signal; the
/// receiver rescans everything anyway.
pub struct ModuleWatcher {
    watcher: RecommendedWatcher,
}

impl ModuleWatcher {
    pub fn new() -> Result<(Self, mpsc::Receiver<()>), CatalogueError> {
        let (tx, rx) = mpsc::channel(1);

        let watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(_)
                    ) {
                        debug!("Module directory changed: {:?}", event.paths);
                        // Full channel means a rescan is already pending.
                        let _ = tx.try_send(());
                    }
                }
                Err(e) => warn!("Module watcher error: {}", e),
            }
        })
        .map_err(|e| CatalogueError::Watch {
            location: ErrorLocation::from(Location::caller()),
            reason: format!("failed to create watcher: {e}"),
        })?;

        Ok((Self { watcher }, rx))
    }

    /// Directories that do not exist are skipped.
    pub fn watch(&mut self, dir: &Path) -> Result<(), CatalogueError> {
        if !dir.is_dir() {
            debug!("Not watching missing module directory {}", dir.display());
            return Ok(());
        }
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| CatalogueError::Watch {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("failed to watch {}: {e}", dir.display()),
            })?;
        info!("Watching module directory {}", dir.display());
        Ok(())
    }
}
