//! Rampart daemon library - the backup status reconciliation core.

pub mod actions;
pub mod console;
pub mod display;
pub mod probe;
pub mod reconciler;
pub mod reducer;
pub mod scheduler;
pub mod script;
pub mod settings;
pub mod state;

pub use actions::{ActionGate, Trigger, TriggerOutcome};
pub use reconciler::{DisplayEvent, Reconciler, Snapshot};
pub use scheduler::Monitor;
pub use settings::SettingsHandle;
