//! Settings surface: the current settings snapshot and edits to it.
//!
//! Probe cycles and actions take an `Arc<Settings>` snapshot when they start
//! and never observe a later edit halfway through.

use anyhow::{bail, Context, Result};
use nix::sys::statvfs::statvfs;
use rampart_shared::Settings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::reconciler::Reconciler;

/// Free space below which a new backup location is flagged
pub const LOW_SPACE_THRESHOLD_GB: u64 = 5;

const GIB: u64 = 1024 * 1024 * 1024;

/// Shared, persisted settings
#[derive(Clone)]
pub struct SettingsHandle {
    path: PathBuf,
    tx: Arc<watch::Sender<Arc<Settings>>>,
}

impl SettingsHandle {
    /// Load from `path` (defaults on any fault) and start publishing
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let settings = Settings::load(&path);
        Self::with_settings(path, settings)
    }

    pub fn with_settings(path: impl AsRef<Path>, settings: Settings) -> Self {
        let (tx, _) = watch::channel(Arc::new(settings));
        Self {
            path: path.as_ref().to_path_buf(),
            tx: Arc::new(tx),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot for one cycle or action
    pub fn current(&self) -> Arc<Settings> {
        self.tx.borrow().clone()
    }

    /// Apply an edit, persist it, then publish it
    pub fn update<F>(&self, edit: F) -> Result<Arc<Settings>>
    where
        F: FnOnce(&mut Settings),
    {
        let mut next = (*self.current()).clone();
        edit(&mut next);
        next.save(&self.path)
            .with_context(|| format!("Failed to save settings to {}", self.path.display()))?;
        let next = Arc::new(next);
        self.tx.send_replace(next.clone());
        Ok(next)
    }
}

/// Change one setting from its text form and persist it.
///
/// The value is checked before anything is written; keys the file carries
/// but this version does not know survive the save.
pub fn set_value(settings: &SettingsHandle, key: &str, value: &str) -> Result<Arc<Settings>> {
    let mut edited = (*settings.current()).clone();
    edited.set_value(key, value)?;
    let next = settings.update(move |s| *s = edited)?;
    info!("Setting {} changed to {}", key, value.trim());
    Ok(next)
}

/// Free space on the filesystem holding `path`, in whole GiB
pub fn free_space_gb(path: &Path) -> Result<u64> {
    let stat = statvfs(path).with_context(|| format!("statvfs {}", path.display()))?;
    let free_bytes = stat.blocks_available() as u64 * stat.fragment_size() as u64;
    Ok(free_bytes / GIB)
}

/// Point local backups at `dir` and report the space available there
pub fn set_backup_path(settings: &SettingsHandle, log: &Reconciler, dir: &Path) -> Result<u64> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let free_gb = free_space_gb(dir)?;
    if free_gb < LOW_SPACE_THRESHOLD_GB {
        log.warn(format!(
            "Only {}GB free space available; backups may fail if the disk fills",
            free_gb
        ));
    }

    let dir = dir.to_path_buf();
    settings.update(|s| s.local_backup_path = dir.clone())?;
    info!("Local backup path set to {}", dir.display());
    log.info(format!("Local backup path updated: {}", dir.display()));
    log.info(format!("Available space: {}GB", free_gb));
    Ok(free_gb)
}
