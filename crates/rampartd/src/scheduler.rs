//! Periodic probing and startup behaviour.

use rampart_shared::{ActionKind, Settings};
use std::future::Future;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time;
use tracing::{debug, info, warn};

use crate::actions::{Trigger, TriggerOutcome};
use crate::probe::{run_probe, ProbeOutcome, ProbeResult, ProbeSpec};
use crate::reconciler::Reconciler;
use crate::settings::SettingsHandle;

/// Delay before the startup backup when `auto_start` is set
pub const AUTO_START_DELAY: Duration = Duration::from_secs(3);

/// Spawn one task per polled probe. Each stamps and submits its result the
/// moment it completes; subsystems still in flight keep their prior value.
/// A probe task that panics is reported as a fault for its subsystem.
pub fn dispatch_cycle(settings: &Settings, reconciler: &Reconciler) -> Vec<JoinHandle<()>> {
    let limit = settings.probe_timeout();
    ProbeSpec::for_settings(settings)
        .into_iter()
        .map(|spec| {
            let reconciler = reconciler.clone();
            let subsystem = spec.subsystem();
            let probe = tokio::spawn(run_probe(spec, limit));
            tokio::spawn(async move {
                let result = match probe.await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("Probe task error for {}: {}", subsystem, e);
                        ProbeResult::new(subsystem, ProbeOutcome::Fault(format!("Task error: {}", e)))
                    }
                };
                reconciler.submit_probe(result);
            })
        })
        .collect()
}

/// Run one probe cycle and wait for every probe to report
pub async fn refresh(settings: &Settings, reconciler: &Reconciler) {
    for handle in dispatch_cycle(settings, reconciler) {
        if let Err(e) = handle.await {
            warn!("Probe task error: {}", e);
        }
    }
}

/// Drives periodic refreshes for the lifetime of the process
pub struct Monitor {
    settings: SettingsHandle,
    reconciler: Reconciler,
    trigger: Trigger,
}

impl Monitor {
    pub fn new(settings: SettingsHandle, reconciler: Reconciler, trigger: Trigger) -> Self {
        Self {
            settings,
            reconciler,
            trigger,
        }
    }

    /// Startup notices for the event log
    pub fn announce(&self) {
        let settings = self.settings.current();
        self.reconciler.info("Backup manager started");
        self.reconciler.info(format!(
            "Local backup path: {}",
            settings.local_backup_path.display()
        ));
        self.reconciler
            .info(format!("Max backup size: {}GB", settings.max_backup_size_gb));
    }

    /// Refresh now and then every `refresh_interval` until `shutdown` resolves.
    ///
    /// The interval is re-read from the current settings after every tick.
    /// Cycles run as their own tasks so a slow probe never delays the timer.
    pub async fn run<S>(self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        self.announce();

        if self.settings.current().auto_start {
            let trigger = self.trigger.clone();
            tokio::spawn(async move {
                time::sleep(AUTO_START_DELAY).await;
                if let TriggerOutcome::AlreadyRunning = trigger.fire(ActionKind::CreateBackup) {
                    debug!("Startup backup skipped; one is already running");
                }
            });
        }

        tokio::pin!(shutdown);
        let mut cycles = JoinSet::new();
        loop {
            let settings = self.settings.current();
            let reconciler = self.reconciler.clone();
            let snapshot = settings.clone();
            cycles.spawn(async move { refresh(&snapshot, &reconciler).await });

            while let Some(done) = cycles.try_join_next() {
                if let Err(e) = done {
                    warn!("Refresh cycle error: {}", e);
                }
            }

            tokio::select! {
                _ = time::sleep(settings.refresh_every()) => {}
                _ = &mut shutdown => break,
            }
        }

        info!("Monitor stopping; abandoning {} in-flight cycle(s)", cycles.len());
        cycles.shutdown().await;
    }
}
