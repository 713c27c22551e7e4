//! Rampart daemon - backup status monitor and action launcher

mod cli;

use anyhow::Result;
use clap::Parser;
use rampart_shared::{ActionKind, ActionState, LogLevel, RampartError, Settings, StatusPatterns};
use rampartd::{console, display, settings};
use rampartd::{DisplayEvent, Monitor, Reconciler, SettingsHandle, Trigger, TriggerOutcome};
use tokio::sync::oneshot;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ConfigAction};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(Settings::default_path);
    let handle = SettingsHandle::load(&path);
    info!("Rampart v{} using {}", rampart_shared::VERSION, path.display());

    let (reconciler, _owner) = Reconciler::spawn(StatusPatterns::default());
    let trigger = Trigger::new(handle.clone(), reconciler.clone());

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => watch(handle, reconciler, trigger).await,
        Commands::Status { json } => {
            trigger.refresh().await?;
            reconciler.flush().await;
            let snapshot = reconciler.snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("{}", display::render_board(&snapshot));
            }
            Ok(())
        }
        Commands::Backup => run_action(&trigger, &reconciler, ActionKind::CreateBackup).await,
        Commands::Mount => run_action(&trigger, &reconciler, ActionKind::MountRemote).await,
        Commands::TestConnection => {
            run_action(&trigger, &reconciler, ActionKind::TestConnectivity).await
        }
        Commands::SetPath { dir } => {
            let outcome = settings::set_backup_path(&handle, &reconciler, &dir);
            print_log(&reconciler).await;
            outcome.map(|_| ())
        }
        Commands::Config { action } => {
            if let Some(ConfigAction::Set { key, value }) = action {
                settings::set_value(&handle, &key, &value)?;
            }
            println!("{}", serde_json::to_string_pretty(handle.current().as_ref())?);
            Ok(())
        }
    }
}

/// Monitor until ctrl-c or `quit`, taking line commands from stdin
async fn watch(handle: SettingsHandle, reconciler: Reconciler, trigger: Trigger) -> Result<()> {
    println!("{}", display::render_board(&reconciler.snapshot()));
    println!("{}", console::HELP);
    tokio::spawn(display::follow(reconciler.subscribe()));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let monitor = Monitor::new(handle, reconciler.clone(), trigger.clone());
    let monitor_task = tokio::spawn(monitor.run(async {
        let _ = stop_rx.await;
    }));

    console::run(console::stdin_lines(), &trigger, &reconciler, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;

    let _ = stop_tx.send(());
    monitor_task.await?;
    info!("Shutting down gracefully");
    Ok(())
}

async fn run_action(trigger: &Trigger, reconciler: &Reconciler, kind: ActionKind) -> Result<()> {
    let handle = match trigger.fire(kind) {
        TriggerOutcome::Started(handle) => handle,
        TriggerOutcome::AlreadyRunning => return Err(RampartError::ActionAlreadyRunning(kind).into()),
    };
    let state = handle.await?;

    let log = print_log(reconciler).await;
    println!();
    println!("{}", display::render_board(&reconciler.snapshot()));

    if state == ActionState::Failed {
        let detail = log
            .into_iter()
            .rev()
            .find(|entry| entry.level == LogLevel::Error)
            .map(|entry| entry.message)
            .unwrap_or_default();
        return Err(RampartError::ActionFailed { kind, detail }.into());
    }
    Ok(())
}

/// Print the whole log once every earlier command has landed
async fn print_log(reconciler: &Reconciler) -> Vec<rampart_shared::LogEntry> {
    let log = reconciler.log().await;
    for entry in &log {
        println!("{}", display::render_event(&DisplayEvent::Log(entry.clone())));
    }
    log
}
