use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct GuardEntry {
    last_execution: Option<Instant>,
    executing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Executing,
    /// Too soon after the last run; carries the elapsed time.
    Debounced(Duration),
}

/// Per-path debounce and mutual exclusion.
#[derive(Debug)]
pub struct ExecutionGuard {
    debounce: Duration,
    entries: HashMap<String, GuardEntry>,
}

impl ExecutionGuard {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            entries: HashMap::new(),
        }
    }

    pub fn set_debounce(&mut self, debounce: Duration) {
        self.debounce = debounce;
    }

    /// Admit a run for `key` at `now`, locking it until [`release`](Self::release).
    ///
    /// The debounce window starts at admission, so a second event that lands
    /// before the command has even started is already rejected.
    pub fn try_admit(&mut self, key: &str, now: Instant) -> Admission {
        let entry = self.entries.entry(key.to_string()).or_default();
        if entry.executing {
            return Admission::Executing;
        }
        if let Some(last) = entry.last_execution {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.debounce {
                return Admission::Debounced(elapsed);
            }
        }
        entry.executing = true;
        entry.last_execution = Some(now);
        Admission::Admitted
    }

    /// Unlock `key` and restart its debounce window at `completed_at`, which
    /// swallows the change events the command itself caused.
    pub fn release(&mut self, key: &str, completed_at: Instant) {
        let entry = self.entries.entry(key.to_string()).or_default();
        entry.executing = false;
        entry.last_execution = Some(completed_at);
    }
}
