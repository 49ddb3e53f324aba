//! Display configuration hot reload
//!
//! The configuration file's modification time is polled from the refresh
//! loop. When it changes the file is parsed again and, if valid, replaces
//! the scene; a broken edit keeps the last good scene on screen.

use anyhow::Result;
use arc_swap::ArcSwap;
use lcd_sens_types::{DisplayConfig, Scene};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use super::settings::load_display_config;
use crate::core::SceneProvider;

/// Minimum time between two modification time checks
const CHECK_INTERVAL: Duration = Duration::from_millis(1000);

struct PollState {
    modified: Option<SystemTime>,
    last_check: Option<Instant>,
}

/// Scene backed by a display configuration file that is re-read when it
/// changes on disk
pub struct ReloadingScene {
    path: PathBuf,
    scene: ArcSwap<Scene>,
    poll: Mutex<PollState>,
    check_interval: Duration,
}

impl ReloadingScene {
    /// Start from an already loaded `config` read from `path`
    pub fn new(path: impl Into<PathBuf>, config: &DisplayConfig) -> Self {
        let path = path.into();
        let modified = modified_time(&path);
        Self {
            path,
            scene: ArcSwap::from_pointee(config.to_scene()),
            poll: Mutex::new(PollState {
                modified,
                last_check: None,
            }),
            check_interval: CHECK_INTERVAL,
        }
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file if its modification time changed.
    ///
    /// Returns `Ok(true)` when a new scene was installed. A parse error is
    /// returned once per change; the previous scene stays current.
    pub fn reload_if_changed(&self) -> Result<bool> {
        let modified = {
            let mut poll = self.poll.lock().unwrap_or_else(|p| p.into_inner());
            let due = poll
                .last_check
                .map_or(true, |t| t.elapsed() >= self.check_interval);
            if !due {
                return Ok(false);
            }
            poll.last_check = Some(Instant::now());

            let modified = modified_time(&self.path);
            if modified == poll.modified {
                return Ok(false);
            }
            // Recorded before parsing so a broken file is reported once
            poll.modified = modified;
            modified
        };

        debug!("{} changed ({:?})", self.path.display(), modified);
        let config = load_display_config(&self.path)?;
        self.scene.store(Arc::new(config.to_scene()));
        info!("Reloaded display configuration {}", self.path.display());
        Ok(true)
    }
}

impl SceneProvider for ReloadingScene {
    fn current_scene(&self) -> Arc<Scene> {
        if let Err(e) = self.reload_if_changed() {
            warn!("Keeping previous display configuration: {:#}", e);
        }
        self.scene.load_full()
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
