//! On-demand actions: create backup, mount remote storage, test connectivity.
//!
//! Each action kind has one in-flight flag. A trigger that finds its flag set
//! is absorbed without starting anything; there is no queue. The flag is
//! backed by an exclusive `flock` on a per-kind lock file so separate
//! `rampartd` processes sharing a settings file exclude each other too.

use chrono::Local;
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use rampart_shared::{ActionKind, ActionState, Settings, StatusValue, Subsystem};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::reconciler::Reconciler;
use crate::scheduler::refresh;
use crate::script::{run_helper, ScriptMode, ScriptRunner};
use crate::settings::SettingsHandle;

/// Per-kind in-flight flags
#[derive(Debug, Default)]
pub struct ActionGate {
    running: [AtomicBool; 3],
    lock_dir: Option<PathBuf>,
}

impl ActionGate {
    /// Gate that only excludes triggers within this process
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Gate that also holds `<dir>/.rampart-<kind>.lock` while an action runs
    pub fn with_lock_dir(dir: impl AsRef<Path>) -> Arc<Self> {
        Arc::new(Self {
            running: Default::default(),
            lock_dir: Some(dir.as_ref().to_path_buf()),
        })
    }

    pub fn lock_path(&self, kind: ActionKind) -> Option<PathBuf> {
        self.lock_dir
            .as_ref()
            .map(|dir| dir.join(format!(".rampart-{}.lock", kind.slug())))
    }

    /// Claim `kind`, or `None` if an execution is already in flight here or
    /// in another process using the same lock directory
    pub fn try_begin(self: &Arc<Self>, kind: ActionKind) -> Option<ActionGuard> {
        let flag = &self.running[kind.index()];
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        let lock = match self.lock_path(kind) {
            None => None,
            Some(path) => match lock_exclusive(&path) {
                Ok(Some(lock)) => Some(lock),
                Ok(None) => {
                    debug!("{} held by another process", path.display());
                    flag.store(false, Ordering::Release);
                    return None;
                }
                Err(e) => {
                    warn!("Cannot lock {}: {}; excluding this process only", path.display(), e);
                    None
                }
            },
        };

        Some(ActionGuard {
            gate: Arc::clone(self),
            kind,
            lock,
        })
    }

    pub fn is_running(&self, kind: ActionKind) -> bool {
        self.running[kind.index()].load(Ordering::Acquire)
    }
}

/// Non-blocking exclusive lock; `None` when someone else holds it
fn lock_exclusive(path: &Path) -> io::Result<Option<Flock<File>>> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)?;
    match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
        Ok(lock) => Ok(Some(lock)),
        Err((_, errno)) if errno == Errno::EWOULDBLOCK => Ok(None),
        Err((_, errno)) => Err(io::Error::from(errno)),
    }
}

/// Releases the in-flight flag (and lock file) when dropped
pub struct ActionGuard {
    gate: Arc<ActionGate>,
    kind: ActionKind,
    lock: Option<Flock<File>>,
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        // Unlock the file before the flag so a local retry never sees it held
        drop(self.lock.take());
        self.gate.running[self.kind.index()].store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub enum TriggerOutcome {
    /// Execution started; resolves to its final state once the follow-up
    /// refresh has also finished
    Started(JoinHandle<ActionState>),
    /// Duplicate request absorbed
    AlreadyRunning,
}

impl TriggerOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, TriggerOutcome::Started(_))
    }
}

/// Entry point for every on-demand action
#[derive(Clone)]
pub struct Trigger {
    settings: SettingsHandle,
    reconciler: Reconciler,
    gate: Arc<ActionGate>,
}

impl Trigger {
    /// Lock files live next to the settings file, so every process reading
    /// the same settings shares one gate per action kind
    pub fn new(settings: SettingsHandle, reconciler: Reconciler) -> Self {
        let lock_dir = settings
            .path()
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let gate = ActionGate::with_lock_dir(lock_dir);
        Self {
            settings,
            reconciler,
            gate,
        }
    }

    pub fn is_running(&self, kind: ActionKind) -> bool {
        self.gate.is_running(kind)
    }

    /// Start `kind` unless it is already running.
    ///
    /// State goes Idle -> Running -> Succeeded|Failed -> Idle. The flag is
    /// released after the outcome has been logged and published; the follow-up
    /// refresh runs afterwards and does not hold it.
    pub fn fire(&self, kind: ActionKind) -> TriggerOutcome {
        let Some(guard) = self.gate.try_begin(kind) else {
            debug!("{} already running; trigger ignored", kind);
            return TriggerOutcome::AlreadyRunning;
        };

        let this = self.clone();
        let handle = tokio::spawn(async move {
            this.reconciler.action_state(kind, ActionState::Running);
            let settings = this.settings.current();
            info!("Action started: {}", kind);

            let state = match kind {
                ActionKind::CreateBackup => this.create_backup(&settings).await,
                ActionKind::MountRemote => this.mount_remote(&settings).await,
                ActionKind::TestConnectivity => this.test_connectivity(&settings).await,
            };

            info!("Action finished: {} -> {}", kind, state);
            this.reconciler.action_state(kind, state);
            this.reconciler.action_state(kind, ActionState::Idle);
            drop(guard);

            if kind != ActionKind::TestConnectivity {
                refresh(&this.settings.current(), &this.reconciler).await;
            }
            state
        });
        TriggerOutcome::Started(handle)
    }

    /// Probe everything now
    pub fn refresh(&self) -> JoinHandle<()> {
        let settings = self.settings.current();
        let reconciler = self.reconciler.clone();
        tokio::spawn(async move { refresh(&settings, &reconciler).await })
    }

    fn script(&self, settings: &Settings) -> ScriptRunner {
        ScriptRunner::new(&settings.script_path, settings.action_timeout())
    }

    async fn create_backup(&self, settings: &Settings) -> ActionState {
        let log = &self.reconciler;
        log.info("Starting comprehensive backup process...");

        let outcome = self.script(settings).run(ScriptMode::Backup).await;
        for (level, line) in outcome.leveled_lines() {
            log.append(level, line);
        }

        if outcome.success {
            log.success("Backup completed successfully!");
            log.set_status(Subsystem::LastBackup, StatusValue::Timestamped(Local::now()));
            ActionState::Succeeded
        } else {
            log.error(format!("Backup failed: {}", outcome.error_detail()));
            log.set_status(Subsystem::LastBackup, StatusValue::Failed);
            ActionState::Failed
        }
    }

    async fn mount_remote(&self, settings: &Settings) -> ActionState {
        let log = &self.reconciler;
        log.info("Attempting to mount remote storage...");
        log.set_status(Subsystem::RemoteMount, StatusValue::Connecting);

        let lookup = vec!["which".to_string(), settings.mount_helper.clone()];
        if !run_helper(&lookup, settings.probe_timeout()).await.success {
            log.error(format!("Mount helper {} is not installed", settings.mount_helper));
            log.set_status(
                Subsystem::RemoteMount,
                StatusValue::Error("Install Required".to_string()),
            );
            return ActionState::Failed;
        }

        let script = self.script(settings);
        if !script.run(ScriptMode::TestConnectivity).await.success {
            log.warn("Remote storage authentication required");
            let authorized = match &settings.remote_auth_command {
                Some(command) => {
                    log.info("Setting up authentication...");
                    run_helper(command, settings.action_timeout()).await.success
                }
                None => false,
            };
            if !authorized {
                log.error("Remote storage authentication failed");
                log.set_status(
                    Subsystem::RemoteMount,
                    StatusValue::Error("Auth Failed".to_string()),
                );
                return ActionState::Failed;
            }
            log.success("Authentication initiated");
        }

        // The outcome line drives the RemoteMount status through the log rules
        let outcome = script.run(ScriptMode::MountRemote).await;
        if outcome.success && log.patterns().is_mount_confirmation(&outcome.stdout) {
            log.success("Remote storage mounted successfully!");
            ActionState::Succeeded
        } else {
            log.error(format!("Remote storage mount failed: {}", outcome.error_detail()));
            ActionState::Failed
        }
    }

    async fn test_connectivity(&self, settings: &Settings) -> ActionState {
        let log = &self.reconciler;
        let outcome = self.script(settings).run(ScriptMode::TestConnectivity).await;
        for (level, line) in outcome.leveled_lines() {
            log.append(level, line);
        }
        if outcome.success {
            log.success("Connectivity test passed");
            ActionState::Succeeded
        } else {
            log.error(format!("Connectivity test failed: {}", outcome.error_detail()));
            ActionState::Failed
        }
    }
}
