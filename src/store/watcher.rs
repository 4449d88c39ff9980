//! Snapshot directory watcher.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::store::{SnapshotId, SnapshotLoader};

/// Monitors the configuration root for new snapshot directories.
pub struct SnapshotWatcher {
    root: PathBuf,
    update_tx: mpsc::UnboundedSender<PathBuf>,
}

impl SnapshotWatcher {
    /// Create a new SnapshotWatcher.
    ///
    /// Returns the watcher and a receiver yielding snapshot directory paths.
    pub fn new(root: &Path) -> (Self, mpsc::UnboundedReceiver<PathBuf>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                root: root.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching in a background thread. Keep the returned watcher alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let root = self.root.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        return;
                    }
                    for path in event.paths {
                        if let Some(dir) = snapshot_dir(&root, &path) {
                            tracing::info!(path = ?dir, "Snapshot directory change detected");
                            let _ = tx.send(dir);
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        std::fs::create_dir_all(&self.root).map_err(notify::Error::io)?;
        watcher.watch(&self.root, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.root, "Snapshot watcher started");
        Ok(watcher)
    }
}

/// Load snapshot directories reported by a [`SnapshotWatcher`].
///
/// Paths are collected until no event arrives for `settle`, then loaded in id
/// order. Writers should populate a directory elsewhere and rename it into place.
pub async fn run_load_loop(
    loader: SnapshotLoader,
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
    mut shutdown: broadcast::Receiver<()>,
    settle: Duration,
) {
    let mut pending: BTreeSet<PathBuf> = BTreeSet::new();
    loop {
        tokio::select! {
            path = rx.recv() => {
                let Some(path) = path else { break };
                pending.insert(path);
            }
            _ = tokio::time::sleep(settle), if !pending.is_empty() => {
                for dir in std::mem::take(&mut pending) {
                    match loader.load_dir(&dir).await {
                        Ok(id) => tracing::info!(snapshot_id = %id, "Snapshot loaded from watcher"),
                        Err(e) => tracing::error!(path = ?dir, error = %e, "Failed to load snapshot directory"),
                    }
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Snapshot load loop received shutdown signal, exiting loop");
                break;
            }
        }
    }
}

/// `path` if it is a direct child of `root` named like a snapshot id.
fn snapshot_dir(root: &Path, path: &Path) -> Option<PathBuf> {
    if path.parent()? != root {
        return None;
    }
    path.file_name()?.to_str()?.parse::<SnapshotId>().ok()?;
    path.is_dir().then(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_dir_filter() {
        let root = tempfile::tempdir().unwrap();
        let good = root.path().join("00042");
        let bad = root.path().join("not-an-id");
        std::fs::create_dir(&good).unwrap();
        std::fs::create_dir(&bad).unwrap();

        assert_eq!(snapshot_dir(root.path(), &good), Some(good.clone()));
        assert_eq!(snapshot_dir(root.path(), &bad), None);
        assert_eq!(snapshot_dir(root.path(), &good.join("apis.json")), None);
    }
}
