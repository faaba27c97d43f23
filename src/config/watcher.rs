//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself: editors and
//! config-map mounts replace the file by renaming a new one over it, which
//! would leave a file-level watch attached to the old inode.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ServerConfig;

/// Reloads `ServerConfig` whenever the file at `path` is written or replaced.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ServerConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its update channel.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ServerConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching on notify's background thread.
    ///
    /// Updates stop when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Some(file_name) = self.path.file_name().map(OsString::from) else {
            return Err(notify::Error::generic("config path has no file name"));
        };
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let path = self.path.clone();
        let tx = self.update_tx;
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches_config(&event, &file_name) => reload(&path, &tx),
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, dir = ?dir, "Config watcher started");
        Ok(watcher)
    }
}

/// A write to, or a rename onto, the config file.
fn touches_config(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

fn reload(path: &Path, tx: &mpsc::UnboundedSender<ServerConfig>) {
    tracing::info!(path = ?path, "Config file changed, reloading");
    match load_config(path) {
        Ok(config) => {
            let _ = tx.send(config);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Config reload failed; keeping current configuration")
        }
    }
}
