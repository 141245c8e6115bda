use crate::config::{WatchConfiguration, WatcherRule};
use crate::error::WatchError;
use crate::history::LogSink;
use crate::permission::AccessCheck;
use crate::runner::{self, DEFAULT_SHELL};
use crate::watch::guard::{Admission, ExecutionGuard};
use crate::watch::normalize;
use crate::watch::rules::{self, Decision};
use crate::watch::source::EventSource;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

enum Message {
    Configure {
        generation: u64,
        config: Arc<WatchConfiguration>,
        root: PathBuf,
    },
    Deactivate,
    Batch {
        generation: u64,
        paths: Vec<PathBuf>,
    },
    Finished {
        key: String,
        completed_at: Instant,
    },
    Shutdown,
}

struct Active {
    generation: u64,
    config: Arc<WatchConfiguration>,
    root: PathBuf,
}

/// The only owner of guard state. Every batch, admission and release runs
/// here, one message at a time; commands run on worker threads that report
/// back with `Finished`.
struct Coordinator {
    guard: ExecutionGuard,
    active: Option<Active>,
    tx: Sender<Message>,
    sink: Arc<dyn LogSink>,
}

fn spawn_coordinator(sink: Arc<dyn LogSink>) -> io::Result<(Sender<Message>, JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel();
    let coordinator = Coordinator {
        guard: ExecutionGuard::new(Default::default()),
        active: None,
        tx: tx.clone(),
        sink,
    };
    let handle = thread::Builder::new()
        .name("onsave-events".into())
        .spawn(move || coordinator.run(rx))?;
    Ok((tx, handle))
}

impl Coordinator {
    fn run(mut self, rx: Receiver<Message>) {
        for message in rx {
            match message {
                Message::Configure {
                    generation,
                    config,
                    root,
                } => {
                    self.guard.set_debounce(config.debounce_delay);
                    self.active = Some(Active {
                        generation,
                        config,
                        root,
                    });
                }
                Message::Deactivate => self.active = None,
                Message::Batch { generation, paths } => self.on_batch(generation, paths),
                Message::Finished { key, completed_at } => {
                    self.guard.release(&key, completed_at);
                    debug!(key = %key, "released, debounce window reset");
                }
                Message::Shutdown => break,
            }
        }
    }

    fn on_batch(&mut self, generation: u64, paths: Vec<PathBuf>) {
        let (config, root) = match &self.active {
            Some(active) if active.generation == generation => {
                (Arc::clone(&active.config), active.root.clone())
            }
            _ => {
                debug!(count = paths.len(), "dropping batch from a stopped stream");
                return;
            }
        };

        for (key, path) in normalize::dedupe(paths) {
            let matched: Vec<WatcherRule> = match rules::evaluate(&path, &root, &config) {
                Decision::Trigger(rules) => rules.into_iter().cloned().collect(),
                Decision::Skip(reason) => {
                    trace!(path = %path.display(), "skipped, {reason}");
                    continue;
                }
            };

            match self.guard.try_admit(&key, Instant::now()) {
                Admission::Admitted => {
                    debug!(file = %file_name(&path), "locked for execution");
                    let shell = config.shell().unwrap_or(DEFAULT_SHELL).to_string();
                    self.dispatch(key, path, matched, shell);
                }
                Admission::Executing => {
                    debug!(file = %file_name(&path), "skipped, already executing");
                }
                Admission::Debounced(elapsed) => {
                    debug!(
                        file = %file_name(&path),
                        "skipped, debounced ({:.2}s < {:.2}s)",
                        elapsed.as_secs_f64(),
                        config.debounce_delay.as_secs_f64()
                    );
                }
            }
        }
    }

    /// Run the matched rules one after another on a worker thread, so a
    /// path never has two commands in flight.
    fn dispatch(&mut self, key: String, path: PathBuf, rules: Vec<WatcherRule>, shell: String) {
        let tx = self.tx.clone();
        let sink = Arc::clone(&self.sink);
        let worker_key = key.clone();
        let spawned = thread::Builder::new()
            .name("onsave-exec".into())
            .spawn(move || {
                for rule in &rules {
                    info!(watcher = %rule.name, file = %file_name(&path), "executing");
                    let record = runner::run(&shell, &rule.command, &path);
                    if !record.success {
                        warn!(watcher = %rule.name, file = %record.file, "command failed");
                    }
                    sink.append(record);
                }
                let _ = tx.send(Message::Finished {
                    key: worker_key,
                    completed_at: Instant::now(),
                });
            });

        if let Err(e) = spawned {
            error!("failed to spawn command worker: {e}");
            self.guard.release(&key, Instant::now());
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Ties an [`EventSource`] to the coordinator and restarts it whenever the
/// configuration changes.
///
/// Stopping never interrupts running commands; they finish and release their
/// guard as usual.
pub struct WatchSession {
    state: SessionState,
    source: EventSource,
    generation: u64,
    config: Option<Arc<WatchConfiguration>>,
    root: Option<PathBuf>,
    access: Box<dyn AccessCheck>,
    tx: Sender<Message>,
    coordinator: Option<JoinHandle<()>>,
}

impl WatchSession {
    pub fn new(sink: Arc<dyn LogSink>, access: Box<dyn AccessCheck>) -> io::Result<Self> {
        let (tx, handle) = spawn_coordinator(sink)?;
        Ok(Self {
            state: SessionState::Stopped,
            source: EventSource::new(),
            generation: 0,
            config: None,
            root: None,
            access,
            tx,
            coordinator: Some(handle),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Replace the configuration and restart against `root`. A failed start
    /// is logged and leaves the session stopped until the next change.
    pub fn reconfigure(&mut self, config: Arc<WatchConfiguration>, root: PathBuf) {
        info!(root = %root.display(), "configuration changed, restarting watcher");
        self.config = Some(config);
        self.root = Some(root);
        self.stop();
        if let Err(e) = self.start() {
            error!("watcher not started: {e}");
        }
    }

    fn start(&mut self) -> Result<(), WatchError> {
        let (Some(config), Some(root)) = (self.config.clone(), self.root.clone()) else {
            return Ok(());
        };
        let root = watch_root(root);
        self.state = SessionState::Starting;
        self.generation += 1;
        let generation = self.generation;

        if !self.access.has_access(&root) {
            warn!(root = %root.display(), "no read access to watch root, continuing anyway");
        }

        let _ = self.tx.send(Message::Configure {
            generation,
            config: Arc::clone(&config),
            root: root.clone(),
        });
        let tx = self.tx.clone();
        let started = self.source.start(&root, move |paths| {
            let _ = tx.send(Message::Batch { generation, paths });
        });

        match started {
            Ok(()) => {
                self.state = SessionState::Running;
                info!(
                    root = %root.display(),
                    watchers = config.watchers.len(),
                    "watching"
                );
                Ok(())
            }
            Err(e) => {
                let _ = self.tx.send(Message::Deactivate);
                self.state = SessionState::Stopped;
                Err(e)
            }
        }
    }

    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        self.state = SessionState::Stopping;
        self.source.stop();
        let _ = self.tx.send(Message::Deactivate);
        self.state = SessionState::Stopped;
        info!("watcher stopped");
    }
}

/// Event paths are compared to the root as text, so both must be spelled the
/// way the platform reports them. A root that cannot be resolved is kept as
/// given and fails to start.
fn watch_root(root: PathBuf) -> PathBuf {
    fs::canonicalize(&root).unwrap_or(root)
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.stop();
        let _ = self.tx.send(Message::Shutdown);
        if let Some(handle) = self.coordinator.take() {
            let _ = handle.join();
        }
    }
}
