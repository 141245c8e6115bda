use crate::history::{ExecutionRecord, LogSink};
use anyhow::Result;
use std::io::{self, BufRead};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

#[derive(Debug)]
pub enum Event {
    Record(ExecutionRecord),
    ConfigChanged,
    Quit,
}

/// Single channel feeding the main thread.
pub struct EventHandler {
    rx: mpsc::Receiver<Event>,
    tx: mpsc::Sender<Event>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { rx, tx }
    }

    pub fn tx(&self) -> mpsc::Sender<Event> {
        self.tx.clone()
    }

    pub fn next(&self) -> Result<Event> {
        Ok(self.rx.recv()?)
    }
}

pub struct EventSink(mpsc::Sender<Event>);

impl EventSink {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self(tx)
    }
}

impl LogSink for EventSink {
    fn append(&self, record: ExecutionRecord) {
        let _ = self.0.send(Event::Record(record));
    }
}

/// Send [`Event::Quit`] when a `q` line is read from `input`. End of input
/// only stops the reader, so a detached run keeps watching.
pub fn spawn_quit_reader<R>(input: R, tx: mpsc::Sender<Event>) -> io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("onsave-stdin".into())
        .spawn(move || {
            for line in input.lines().map_while(|line| line.ok()) {
                if matches!(line.trim(), "q" | "quit") {
                    let _ = tx.send(Event::Quit);
                    return;
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    #[test]
    fn sink_records_arrive_as_events() {
        let events = EventHandler::new();
        let sink = EventSink::new(events.tx());
        sink.append(ExecutionRecord::new("make", "a.md", "ok".into(), true));

        match events.next().unwrap() {
            Event::Record(record) => assert_eq!(record.file, "a.md"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn quit_line_ends_the_run() {
        let events = EventHandler::new();
        let reader = spawn_quit_reader(Cursor::new("hello\n q \nlater\n"), events.tx()).unwrap();
        reader.join().unwrap();

        assert!(matches!(events.next().unwrap(), Event::Quit));
    }

    #[test]
    fn end_of_input_does_not_quit() {
        let events = EventHandler::new();
        let reader = spawn_quit_reader(Cursor::new("quitting soon\n"), events.tx()).unwrap();
        reader.join().unwrap();

        assert!(events.rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
