use crate::event::Event;
use crate::watch::source::EventSource;
use anyhow::{Context, Result};
use notify::RecursiveMode;
use std::path::Path;
use std::sync::mpsc::Sender;
use std::time::Duration;

/// Watches the configuration file and reports saves as
/// [`Event::ConfigChanged`].
pub struct ConfigWatcher {
    _source: EventSource,
}

impl ConfigWatcher {
    pub fn new(config_path: &Path, tx: Sender<Event>) -> Result<Self> {
        let dir = config_path
            .parent()
            .context("Config file has no parent directory")?;
        let target = config_path.to_path_buf();

        let mut source =
            EventSource::with_options(Duration::from_millis(500), RecursiveMode::NonRecursive);
        source.start(dir, move |paths| {
            // Editors often save by renaming a temp file over the original
            if paths.iter().any(|p| *p == target) {
                let _ = tx.send(Event::ConfigChanged);
            }
        })?;

        Ok(Self { _source: source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::mpsc;

    #[test]
    fn saving_the_config_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let dir = fs::canonicalize(dir.path()).unwrap();
        let path = dir.join("file_save_watcher.yml");
        fs::write(&path, "config:\n  debounce_delay: 1\n").unwrap();

        let (tx, rx) = mpsc::channel();
        let _watcher = ConfigWatcher::new(&path, tx).unwrap();
        fs::write(&path, "config:\n  debounce_delay: 2\n").unwrap();

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(event, Event::ConfigChanged));
    }

    #[test]
    fn loading_the_config_file_is_not_a_save() {
        let dir = tempfile::tempdir().unwrap();
        let dir = fs::canonicalize(dir.path()).unwrap();
        let path = dir.join("file_save_watcher.yml");
        fs::write(&path, "config:\n  debounce_delay: 1\n").unwrap();

        let (tx, rx) = mpsc::channel();
        let _watcher = ConfigWatcher::new(&path, tx).unwrap();
        fs::read_to_string(&path).unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(1200)).is_err());
    }
}
