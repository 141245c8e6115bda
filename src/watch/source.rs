use crate::error::WatchError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const COALESCE_LATENCY: Duration = Duration::from_millis(100);

enum Signal {
    Changed(Vec<PathBuf>),
    Stop,
}

struct Stream {
    watcher: RecommendedWatcher,
    tx: Sender<Signal>,
    batcher: JoinHandle<()>,
}

/// Change notifications for one directory, handed to `on_batch` on the
/// source's own thread. Opening or reading a file is not a change.
pub struct EventSource {
    latency: Duration,
    mode: RecursiveMode,
    stream: Option<Stream>,
}

impl EventSource {
    pub fn new() -> Self {
        Self::with_options(COALESCE_LATENCY, RecursiveMode::Recursive)
    }

    pub fn with_options(latency: Duration, mode: RecursiveMode) -> Self {
        Self {
            latency,
            mode,
            stream: None,
        }
    }

    pub fn start<F>(&mut self, root: &Path, on_batch: F) -> Result<(), WatchError>
    where
        F: FnMut(Vec<PathBuf>) + Send + 'static,
    {
        self.stop();
        if !root.is_dir() {
            return Err(WatchError::RootUnavailable(root.to_path_buf()));
        }

        let stream_failed = |source: notify::Error| WatchError::StreamCreationFailed {
            root: root.to_path_buf(),
            source,
        };
        let (tx, rx) = mpsc::channel();
        let changes = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_change(&event.kind) && !event.paths.is_empty() => {
                let _ = changes.send(Signal::Changed(event.paths));
            }
            Ok(_) => {}
            Err(e) => warn!("watch error: {e}"),
        })
        .map_err(stream_failed)?;
        watcher.watch(root, self.mode).map_err(stream_failed)?;

        let latency = self.latency;
        let batcher = thread::Builder::new()
            .name("onsave-watch".into())
            .spawn(move || coalesce(rx, latency, on_batch))
            .map_err(|e| stream_failed(notify::Error::io(e)))?;

        debug!(root = %root.display(), "event stream started");
        self.stream = Some(Stream {
            watcher,
            tx,
            batcher,
        });
        Ok(())
    }

    /// No `on_batch` call can run once this returns. Safe to call when not
    /// started.
    pub fn stop(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        drop(stream.watcher);
        // Pending notifications queued before this are discarded
        let _ = stream.tx.send(Signal::Stop);
        if stream.batcher.join().is_err() {
            warn!("event batch handler panicked");
        }
        debug!("event stream stopped");
    }
}

impl Default for EventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_change(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

fn coalesce<F>(rx: Receiver<Signal>, latency: Duration, mut on_batch: F)
where
    F: FnMut(Vec<PathBuf>),
{
    while let Ok(Signal::Changed(mut batch)) = rx.recv() {
        let deadline = Instant::now() + latency;
        loop {
            match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok(Signal::Changed(paths)) => batch.extend(paths),
                Err(RecvTimeoutError::Timeout) => break,
                Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => return,
            }
        }
        on_batch(batch);
    }
}
