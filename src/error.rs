use std::path::PathBuf;
use thiserror::Error;

/// Failures that keep a session from delivering events.
///
/// Neither is fatal: the session logs the error and stays stopped until the
/// next configuration change. Command failures never show up here, they are
/// recorded as unsuccessful [`ExecutionRecord`](crate::history::ExecutionRecord)s.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("watch root does not exist: {}", .0.display())]
    RootUnavailable(PathBuf),

    #[error("failed to watch {}: {source}", root.display())]
    StreamCreationFailed {
        root: PathBuf,
        #[source]
        source: notify::Error,
    },
}
