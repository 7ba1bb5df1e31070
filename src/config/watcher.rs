//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a temporary file and renaming it over the original
//! are still picked up. Bursts of events are debounced and a reload that
//! parses to the configuration already in effect is not forwarded.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::CourierConfig;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Decides which file events turn into a reload and which reloads are new.
#[derive(Debug)]
struct ReloadFilter {
    file_name: Option<OsString>,
    debounce: Duration,
    last_reload: Option<Instant>,
    current: Option<CourierConfig>,
}

impl ReloadFilter {
    fn new(path: &Path, debounce: Duration, current: Option<CourierConfig>) -> Self {
        Self {
            file_name: path.file_name().map(|n| n.to_os_string()),
            debounce,
            last_reload: None,
            current,
        }
    }

    /// Whether `event` touches the config file outside the debounce window.
    fn should_reload(&mut self, event: &Event, now: Instant) -> bool {
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return false;
        }
        let ours = event
            .paths
            .iter()
            .any(|p| p.file_name().map(|n| n.to_os_string()) == self.file_name);
        if !ours {
            return false;
        }
        if self
            .last_reload
            .is_some_and(|at| now.duration_since(at) < self.debounce)
        {
            return false;
        }
        self.last_reload = Some(now);
        true
    }

    /// Remember `config`; false if it equals the one already in effect.
    fn is_new(&mut self, config: &CourierConfig) -> bool {
        if self.current.as_ref() == Some(config) {
            return false;
        }
        self.current = Some(config.clone());
        true
    }
}

/// Monitors the configuration file and emits every valid, changed version.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    current: Option<CourierConfig>,
    update_tx: mpsc::UnboundedSender<CourierConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<CourierConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                debounce: DEFAULT_DEBOUNCE,
                current: None,
                update_tx,
            },
            update_rx,
        )
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// The configuration already in effect; identical reloads are suppressed.
    pub fn with_current(mut self, config: CourierConfig) -> Self {
        self.current = Some(config);
        self
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let mut filter = ReloadFilter::new(&self.path, self.debounce, self.current);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !filter.should_reload(&event, Instant::now()) {
                        return;
                    }
                    match load_config(&path) {
                        Ok(new_config) if filter.is_new(&new_config) => {
                            tracing::info!(path = ?path, "Config file changed, reloading");
                            let _ = tx.send(new_config);
                        }
                        Ok(_) => tracing::debug!(path = ?path, "Config file touched without changes"),
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
