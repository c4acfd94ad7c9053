//! `ctxtrack watch`: the long-running correlation loop

use super::{load_config, now_ms, resolve_store};
use anyhow::Context as _;
use ctxtrack_core::{FileEvent, FileEventKind};
use ctxtrack_detect::{AttributionLog, Context, Correlation, CycleOutcome, LogNotifier, Notifier};
use ctxtrack_store::{CursorDb, CursorDbSource};
use ctxtrack_telemetry::{atomic_write, Paths, WatchState};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Sleep used when no timer is pending
const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// Control commands read from stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlCommand {
    Start,
    Stop,
    Reset,
    Status,
    Check,
    Quit,
}

impl FromStr for ControlCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "reset" => Ok(Self::Reset),
            "status" => Ok(Self::Status),
            "check" => Ok(Self::Check),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!(
                "unknown command '{other}' (start, stop, reset, status, check, quit)"
            )),
        }
    }
}

/// What the watchers feed into the loop
#[derive(Debug, PartialEq)]
enum WatchInput {
    File(FileEvent),
    StoreChanged,
}

/// Prints each correlation to stdout
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    fn notify(&mut self, correlation: &Correlation) -> anyhow::Result<()> {
        println!("{}", correlation.summary());
        for file in &correlation.files {
            println!("  {file}");
        }
        Ok(())
    }
}

pub fn run(workspace: Option<&Path>, db: Option<&Path>) -> anyhow::Result<()> {
    let paths = Paths::new()?;
    let config = load_config(&paths.config_file());
    let store_path = resolve_store(&paths, db)?;
    let workspace = match workspace {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir()?,
    };

    // A missing or unreadable store is fatal here; later failures are per cycle
    CursorDb::open(&store_path)
        .with_context(|| format!("cannot open chat store {}", store_path.display()))?
        .close()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch_loop(paths, config, store_path, workspace))
}

async fn watch_loop(
    paths: Paths,
    config: ctxtrack_core::Config,
    store_path: PathBuf,
    workspace: PathBuf,
) -> anyhow::Result<()> {
    let mut ctx = Context::new(config, Box::new(CursorDbSource::new(&store_path)))?;
    ctx.register_notifier(Box::new(ConsoleNotifier));
    ctx.register_notifier(Box::new(LogNotifier));
    ctx.register_notifier(Box::new(AttributionLog::new(paths.attributions_file())));

    let state_file = paths.watch_state_file();
    let mut saved = load_watch_state(&state_file);
    ctx.poller_mut()
        .set_last_processed(saved.last_processed_message_id.clone());

    let (tx, mut rx) = mpsc::channel::<WatchInput>(256);
    let _workspace_watcher = watch_workspace(&workspace, tx.clone())?;
    let _store_watcher = watch_store(&store_path, tx)?;

    ctx.start(now_ms());
    println!(
        "Watching {} (chat store: {}). Commands: start, stop, reset, status, check, quit",
        workspace.display(),
        store_path.display()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let wait = ctx
            .next_deadline()
            .map(|deadline| Duration::from_millis((deadline - now_ms()).max(0) as u64))
            .unwrap_or(IDLE_WAIT);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                ctx.run_due(now_ms());
            }
            Some(input) = rx.recv() => match input {
                WatchInput::File(event) => {
                    ctx.record(event);
                }
                WatchInput::StoreChanged => ctx.store_changed(now_ms()),
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<ControlCommand>() {
                    Ok(ControlCommand::Quit) => break,
                    Ok(command) => handle_command(&mut ctx, command),
                    Err(e) => println!("{e}"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!("stdin closed: {e}");
                    stdin_open = false;
                }
            },
            _ = &mut ctrl_c => break,
        }

        let current = ctx.poller().last_processed();
        if current != saved.last_processed_message_id.as_deref() {
            saved.last_processed_message_id = current.map(str::to_string);
            if let Err(e) = save_watch_state(&state_file, &saved) {
                tracing::warn!(path = %state_file.display(), "failed to save watch state: {e:#}");
            }
        }
    }

    ctx.shutdown();
    Ok(())
}

fn handle_command(ctx: &mut Context, command: ControlCommand) {
    let now = now_ms();
    match command {
        ControlCommand::Start => {
            ctx.start_tracking(now);
            println!("{}", describe(&ctx.start_polling(now)));
        }
        ControlCommand::Stop => {
            ctx.stop_polling();
            println!("Polling stopped");
        }
        ControlCommand::Reset => {
            ctx.reset();
            println!("Last processed message cleared");
        }
        ControlCommand::Check => println!("{}", describe(&ctx.check_now(now))),
        ControlCommand::Status => match serde_json::to_string_pretty(&ctx.status()) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!("failed to render status: {e}"),
        },
        ControlCommand::Quit => {}
    }
}

fn describe(outcome: &CycleOutcome) -> String {
    match outcome {
        CycleOutcome::Busy => "A check is already running".to_string(),
        CycleOutcome::Stopped => "Polling is stopped".to_string(),
        CycleOutcome::NoAssistantMessage => "No assistant responses yet".to_string(),
        CycleOutcome::AlreadyProcessed => "No new responses".to_string(),
        CycleOutcome::Correlated(c) => c.summary(),
        CycleOutcome::RetryScheduled { attempt, delay_ms } => {
            format!("Chat store busy (attempt {attempt}), retrying in {delay_ms}ms")
        }
        CycleOutcome::Failed(e) => format!("Check failed: {e}"),
    }
}

fn watch_workspace(
    root: &Path,
    tx: mpsc::Sender<WatchInput>,
) -> anyhow::Result<RecommendedWatcher> {
    let base = root.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for file_event in workspace_events(&event, &base, now_ms()) {
                // Receiver gone means the loop is shutting down
                if tx.blocking_send(WatchInput::File(file_event)).is_err() {
                    return;
                }
            }
        }
        Err(e) => tracing::warn!("workspace watcher error: {e}"),
    })?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .with_context(|| format!("cannot watch {}", root.display()))?;
    tracing::info!(path = %root.display(), "watching workspace");
    Ok(watcher)
}

/// Watches the store's directory; SQLite writes land in sibling -wal and
/// -journal files as often as in the database itself
fn watch_store(store: &Path, tx: mpsc::Sender<WatchInput>) -> anyhow::Result<RecommendedWatcher> {
    let dir = store
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let target = store.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if touches_store(&event, &target) => {
            let _ = tx.blocking_send(WatchInput::StoreChanged);
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("store watcher error: {e}"),
    })?;
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("cannot watch {}", dir.display()))?;
    tracing::info!(path = %store.display(), "watching chat store");
    Ok(watcher)
}

fn event_kind(kind: &EventKind) -> Option<FileEventKind> {
    match kind {
        EventKind::Create(_) => Some(FileEventKind::Create),
        EventKind::Modify(_) => Some(FileEventKind::Modify),
        EventKind::Remove(_) => Some(FileEventKind::Delete),
        _ => None,
    }
}

/// Workspace-relative file events for one notify event
fn workspace_events(event: &Event, root: &Path, now: i64) -> Vec<FileEvent> {
    let Some(kind) = event_kind(&event.kind) else {
        return Vec::new();
    };
    event
        .paths
        .iter()
        .map(|path| {
            let relative = path.strip_prefix(root).unwrap_or(path);
            FileEvent::new(relative.to_string_lossy(), now, kind)
        })
        .collect()
}

fn touches_store(event: &Event, store: &Path) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return false;
    }
    let Some(name) = store.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    event.paths.iter().any(|p| {
        p.file_name()
            .map(|n| n.to_string_lossy().starts_with(name.as_ref()))
            .unwrap_or(false)
    })
}

fn load_watch_state(path: &Path) -> WatchState {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|c| serde_json::from_str(&c).ok())
        .unwrap_or_default()
}

fn save_watch_state(path: &Path, state: &WatchState) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    atomic_write(path, json.as_bytes())?;
    Ok(())
}
