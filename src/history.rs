use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;

pub const LOG_CAPACITY: usize = 100;

/// Outcome of one watcher command run against one file.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub command: String,
    /// Base name of the triggering file.
    pub file: String,
    pub output: String,
    pub success: bool,
    pub timestamp: DateTime<Local>,
}

impl ExecutionRecord {
    pub fn new(command: &str, file: &str, output: String, success: bool) -> Self {
        Self {
            command: command.to_string(),
            file: file.to_string(),
            output,
            success,
            timestamp: Local::now(),
        }
    }
}

/// Receiver of finished execution records.
///
/// `append` is called from execution worker threads and must not block.
pub trait LogSink: Send + Sync {
    fn append(&self, record: ExecutionRecord);
}

#[cfg(test)]
impl LogSink for std::sync::mpsc::Sender<ExecutionRecord> {
    fn append(&self, record: ExecutionRecord) {
        let _ = self.send(record);
    }
}

#[derive(Debug, Default)]
pub struct ExecutionLog {
    records: VecDeque<ExecutionRecord>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self {
            records: VecDeque::with_capacity(LOG_CAPACITY),
        }
    }

    pub fn append(&mut self, record: ExecutionRecord) {
        self.records.push_front(record);
        self.records.truncate(LOG_CAPACITY);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn latest(&self) -> Option<&ExecutionRecord> {
        self.records.front()
    }

    pub fn failures(&self) -> usize {
        self.iter().filter(|r| !r.success).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(file: &str, success: bool) -> ExecutionRecord {
        ExecutionRecord::new("true", file, String::new(), success)
    }

    #[test]
    fn newest_record_comes_first() {
        let mut log = ExecutionLog::new();
        log.append(record("a.md", true));
        log.append(record("b.md", true));

        let files: Vec<_> = log.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(files, vec!["b.md", "a.md"]);
    }

    #[test]
    fn oldest_records_are_evicted_at_capacity() {
        let mut log = ExecutionLog::new();
        for i in 0..LOG_CAPACITY + 5 {
            log.append(record(&format!("{i}.md"), i % 2 == 0));
        }

        assert_eq!(log.len(), LOG_CAPACITY);
        assert_eq!(log.latest().unwrap().file, format!("{}.md", LOG_CAPACITY + 4));
        assert_eq!(log.iter().last().unwrap().file, "5.md");
        assert_eq!(log.failures(), LOG_CAPACITY / 2);
    }

    #[test]
    fn record_serializes_to_json() {
        let json = serde_json::to_value(record("a.md", false)).unwrap();
        assert_eq!(json["file"], "a.md");
        assert_eq!(json["success"], false);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn sender_sink_forwards_records() {
        let (tx, rx) = std::sync::mpsc::channel();
        tx.append(record("a.md", true));
        assert_eq!(rx.recv().unwrap().file, "a.md");
    }
}
