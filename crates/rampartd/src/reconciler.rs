//! The single owner of subsystem statuses and the event log.
//!
//! Probe completions, action results, status writes and log appends all
//! arrive as `Command`s on one channel and are applied in arrival order by a
//! single task. Readers get a `watch` snapshot of statuses and action states
//! and a `broadcast` stream of display events; neither can observe a
//! half-applied update. The log itself is only copied out on request.

use rampart_shared::{
    ActionKind, ActionState, EventLog, LogEntry, LogLevel, StatusPatterns, StatusValue, Subsystem,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::probe::ProbeResult;
use crate::reducer::reduce;
use crate::state::{Applied, Sequencer, Stamp, StatusBoard};

const DISPLAY_CHANNEL_CAPACITY: usize = 256;

/// Status write implied by a log message, stamped when the message was issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTrigger {
    pub subsystem: Subsystem,
    pub stamp: Stamp,
    pub value: StatusValue,
}

/// Message to the owner task
#[derive(Debug)]
pub enum Command {
    Probe { stamp: Stamp, result: ProbeResult },
    SetStatus { subsystem: Subsystem, stamp: Stamp, value: StatusValue },
    Append { level: LogLevel, message: String, trigger: Option<StatusTrigger> },
    Clear,
    Action { kind: ActionKind, state: ActionState },
    /// Barrier: answered once every earlier command is applied
    Flush(oneshot::Sender<()>),
    /// Copy of the log as of this point in the command order
    ReadLog(oneshot::Sender<Vec<LogEntry>>),
}

impl Command {
    /// Build an append, matching the message against the log rules and
    /// stamping any resulting status write now
    pub fn append(
        patterns: &StatusPatterns,
        sequencer: &Sequencer,
        level: LogLevel,
        message: String,
    ) -> Command {
        let trigger = patterns
            .match_log_message(&message)
            .map(|(subsystem, value)| StatusTrigger {
                subsystem,
                stamp: sequencer.stamp(subsystem),
                value,
            });
        Command::Append {
            level,
            message,
            trigger,
        }
    }
}

/// What the display collaborator receives
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DisplayEvent {
    Status { subsystem: Subsystem, value: StatusValue },
    Log(LogEntry),
    /// The log was emptied; the entry is the clear notice
    LogCleared(LogEntry),
    Action { kind: ActionKind, state: ActionState },
}

/// Consistent view of statuses and action states
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub statuses: BTreeMap<Subsystem, StatusValue>,
    pub actions: BTreeMap<String, ActionState>,
}

impl Snapshot {
    pub fn status(&self, subsystem: Subsystem) -> StatusValue {
        self.statuses.get(&subsystem).cloned().unwrap_or_default()
    }
}

/// State owned by the reconciler task. Synchronous so it can be tested directly.
pub struct ReconcilerCore {
    board: StatusBoard,
    log: EventLog,
    actions: [ActionState; 3],
    patterns: StatusPatterns,
}

impl ReconcilerCore {
    pub fn new(patterns: StatusPatterns) -> Self {
        Self {
            board: StatusBoard::new(),
            log: EventLog::new(),
            actions: [ActionState::Idle; 3],
            patterns,
        }
    }

    /// Apply one command, returning the display events it produced
    pub fn handle(&mut self, command: Command) -> Vec<DisplayEvent> {
        let mut events = Vec::new();
        match command {
            Command::Probe { stamp, result } => {
                let value = reduce(&result, &self.patterns);
                self.set(result.subsystem, stamp, value, &mut events);
            }
            Command::SetStatus {
                subsystem,
                stamp,
                value,
            } => self.set(subsystem, stamp, value, &mut events),
            Command::Append {
                level,
                message,
                trigger,
            } => {
                let entry = self.log.append(level, message);
                events.push(DisplayEvent::Log(entry));
                // Secondary write path: log text that reports a subsystem outcome
                if let Some(t) = trigger {
                    self.set(t.subsystem, t.stamp, t.value, &mut events);
                }
            }
            Command::Clear => {
                let notice = self.log.clear();
                events.push(DisplayEvent::LogCleared(notice));
            }
            Command::Action { kind, state } => {
                let current = &mut self.actions[kind.index()];
                if !current.can_transition_to(state) {
                    debug!("Action {} jumped {} -> {}", kind, current, state);
                }
                *current = state;
                events.push(DisplayEvent::Action { kind, state });
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
            Command::ReadLog(reply) => {
                let _ = reply.send(self.log.entries().to_vec());
            }
        }
        events
    }

    fn set(&mut self, subsystem: Subsystem, stamp: Stamp, value: StatusValue, events: &mut Vec<DisplayEvent>) {
        match self.board.apply(subsystem, stamp, value) {
            Applied::Changed => events.push(DisplayEvent::Status {
                subsystem,
                value: self.board.get(subsystem).clone(),
            }),
            Applied::Unchanged => {}
            Applied::Stale => debug!("Dropped stale update #{} for {}", stamp, subsystem),
        }
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            statuses: self.board.to_map(),
            actions: ActionKind::ALL
                .iter()
                .map(|k| (k.to_string(), self.actions[k.index()]))
                .collect(),
        }
    }
}

/// Cloneable handle to the owner task
#[derive(Clone)]
pub struct Reconciler {
    tx: mpsc::UnboundedSender<Command>,
    sequencer: Arc<Sequencer>,
    patterns: StatusPatterns,
    snapshot: watch::Receiver<Snapshot>,
    events: broadcast::Sender<DisplayEvent>,
}

impl Reconciler {
    /// Start the owner task. It stops once every handle is dropped.
    pub fn spawn(patterns: StatusPatterns) -> (Self, JoinHandle<()>) {
        let sequencer = Arc::new(Sequencer::new());
        let mut core = ReconcilerCore::new(patterns.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(core.snapshot());
        let (events_tx, _) = broadcast::channel(DISPLAY_CHANNEL_CAPACITY);

        let events = events_tx.clone();
        let task = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                let produced = core.handle(command);
                let touches_snapshot = produced.iter().any(|e| {
                    matches!(e, DisplayEvent::Status { .. } | DisplayEvent::Action { .. })
                });
                if touches_snapshot {
                    snapshot_tx.send_replace(core.snapshot());
                }
                for event in produced {
                    // No subscribers is fine
                    let _ = events.send(event);
                }
            }
            debug!("Reconciler stopped");
        });

        let handle = Self {
            tx,
            sequencer,
            patterns,
            snapshot: snapshot_rx,
            events: events_tx,
        };
        (handle, task)
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            debug!("Reconciler gone; command dropped");
        }
    }

    /// Take a completion stamp for `subsystem` now
    pub fn stamp(&self, subsystem: Subsystem) -> Stamp {
        self.sequencer.stamp(subsystem)
    }

    /// Submit a probe result that has just completed
    pub fn submit_probe(&self, result: ProbeResult) {
        let stamp = self.stamp(result.subsystem);
        self.submit_probe_stamped(stamp, result);
    }

    /// Submit a probe result with a stamp taken earlier, at its completion
    pub fn submit_probe_stamped(&self, stamp: Stamp, result: ProbeResult) {
        self.send(Command::Probe { stamp, result });
    }

    pub fn set_status(&self, subsystem: Subsystem, value: StatusValue) {
        let stamp = self.stamp(subsystem);
        self.send(Command::SetStatus {
            subsystem,
            stamp,
            value,
        });
    }

    pub fn append(&self, level: LogLevel, message: impl Into<String>) {
        self.send(Command::append(
            &self.patterns,
            &self.sequencer,
            level,
            message.into(),
        ));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.append(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.append(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.append(LogLevel::Error, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.append(LogLevel::Success, message);
    }

    pub fn clear(&self) {
        self.send(Command::Clear);
    }

    pub fn action_state(&self, kind: ActionKind, state: ActionState) {
        self.send(Command::Action { kind, state });
    }

    /// Wait until every command sent before this call has been applied
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(Command::Flush(done_tx));
        let _ = done_rx.await;
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Log entries, including everything sent before this call
    pub async fn log(&self) -> Vec<LogEntry> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::ReadLog(reply_tx));
        reply_rx.await.unwrap_or_default()
    }

    pub fn status(&self, subsystem: Subsystem) -> StatusValue {
        self.snapshot.borrow().status(subsystem)
    }

    pub fn patterns(&self) -> &StatusPatterns {
        &self.patterns
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;
    use rampart_shared::event_log::CLEARED_MESSAGE;

    struct Fixture {
        core: ReconcilerCore,
        patterns: StatusPatterns,
        sequencer: Sequencer,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                core: ReconcilerCore::new(StatusPatterns::default()),
                patterns: StatusPatterns::default(),
                sequencer: Sequencer::new(),
            }
        }

        fn append(&mut self, level: LogLevel, message: &str) -> Vec<DisplayEvent> {
            let command = Command::append(&self.patterns, &self.sequencer, level, message.to_string());
            self.core.handle(command)
        }
    }

    #[test]
    fn test_append_and_clear_sequence() {
        let mut fx = Fixture::new();
        fx.append(LogLevel::Info, "a");
        fx.append(LogLevel::Error, "b");
        let events = fx.core.handle(Command::Clear);
        assert!(matches!(&events[0], DisplayEvent::LogCleared(e) if e.message == CLEARED_MESSAGE));
        assert_eq!(fx.core.log().len(), 1);

        fx.append(LogLevel::Success, "c");
        let levels: Vec<_> = fx.core.log().entries().iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![LogLevel::Info, LogLevel::Success]);
    }

    #[test]
    fn test_log_trigger_updates_remote_mount() {
        let mut fx = Fixture::new();
        let events = fx.append(LogLevel::Success, "Remote storage mounted successfully!");
        assert_eq!(events.len(), 2);
        assert_eq!(fx.core.board().get(Subsystem::RemoteMount), &StatusValue::Connected);

        fx.append(LogLevel::Error, "Remote storage mount failed: exit 32");
        assert_eq!(fx.core.board().get(Subsystem::RemoteMount), &StatusValue::Disconnected);
    }

    #[test]
    fn test_stale_probe_after_log_trigger_is_dropped() {
        let mut fx = Fixture::new();
        let early = fx.sequencer.stamp(Subsystem::RemoteMount);
        fx.append(LogLevel::Success, "Remote storage mounted successfully!");

        let events = fx.core.handle(Command::Probe {
            stamp: early,
            result: ProbeResult::new(Subsystem::RemoteMount, ProbeOutcome::TimedOut),
        });
        assert!(events.is_empty());
        assert_eq!(fx.core.board().get(Subsystem::RemoteMount), &StatusValue::Connected);
    }

    #[test]
    fn test_explicit_write_after_log_line_wins() {
        let mut fx = Fixture::new();
        let append = Command::append(
            &fx.patterns,
            &fx.sequencer,
            LogLevel::Error,
            "Remote storage authentication failed".to_string(),
        );
        let explicit = Command::SetStatus {
            subsystem: Subsystem::RemoteMount,
            stamp: fx.sequencer.stamp(Subsystem::RemoteMount),
            value: StatusValue::Error("Auth Failed".into()),
        };
        fx.core.handle(append);
        fx.core.handle(explicit);
        assert_eq!(
            fx.core.board().get(Subsystem::RemoteMount),
            &StatusValue::Error("Auth Failed".into())
        );
    }

    #[test]
    fn test_log_appends_leave_snapshot_untouched() {
        let mut fx = Fixture::new();
        let events = fx.append(LogLevel::Info, "Backup manager started");
        assert!(events.iter().all(|e| matches!(e, DisplayEvent::Log(_))));

        let (reply_tx, mut reply_rx) = oneshot::channel();
        fx.core.handle(Command::ReadLog(reply_tx));
        let log = reply_rx.try_recv().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].message, "Backup manager started");
    }

    #[tokio::test]
    async fn test_log_read_sees_earlier_appends() {
        let (reconciler, _task) = Reconciler::spawn(StatusPatterns::default());
        reconciler.info("one");
        reconciler.warn("two");
        let messages: Vec<_> = reconciler.log().await.into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_only_status_changes_republish_snapshot() {
        let (reconciler, _task) = Reconciler::spawn(StatusPatterns::default());
        let mut snapshot = reconciler.snapshot.clone();
        snapshot.mark_unchanged();

        reconciler.info("Backup manager started");
        reconciler.log().await;
        assert!(!snapshot.has_changed().unwrap());

        reconciler.set_status(Subsystem::LastBackup, StatusValue::Failed);
        reconciler.flush().await;
        assert!(snapshot.has_changed().unwrap());
        assert_eq!(snapshot.borrow_and_update().status(Subsystem::LastBackup), StatusValue::Failed);
    }

    #[test]
    fn test_snapshot_lists_every_subsystem_and_action() {
        let fx = Fixture::new();
        let snapshot = fx.core.snapshot();
        assert_eq!(snapshot.statuses.len(), 4);
        assert_eq!(snapshot.actions.len(), 3);
        assert_eq!(snapshot.status(Subsystem::LastBackup), StatusValue::Checking);
    }
}
