//! Channel-backed event source fed from JSON lines.

use crate::collector::types::{RawEvent, SourceEvent};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::BufRead;
use std::thread::JoinHandle;

/// Bounded queue between the host reader and the pixel loop.
pub struct ChannelSource {
    sender: Sender<SourceEvent>,
    receiver: Receiver<SourceEvent>,
}

impl ChannelSource {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(10_000);
        Self { sender, receiver }
    }

    pub fn sender(&self) -> Sender<SourceEvent> {
        self.sender.clone()
    }

    pub fn receiver(&self) -> &Receiver<SourceEvent> {
        &self.receiver
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<SourceEvent> {
        self.receiver.try_recv().ok()
    }

    /// Read JSON-lines raw events on a background thread.
    ///
    /// The returned receiver disconnects once the input is exhausted and the
    /// source itself has been dropped. Malformed lines are logged and skipped.
    /// The thread yields the number of events it forwarded.
    pub fn spawn_reader<R>(self, reader: R) -> Result<(Receiver<SourceEvent>, JoinHandle<usize>), std::io::Error>
    where
        R: BufRead + Send + 'static,
    {
        let Self { sender, receiver } = self;
        let handle = std::thread::Builder::new()
            .name("vakaru-source-reader".to_string())
            .spawn(move || read_lines(reader, &sender))?;
        Ok((receiver, handle))
    }
}

impl Default for ChannelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one input line.
pub fn parse_line(line: &str) -> Result<Option<SourceEvent>, serde_json::Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let raw: RawEvent = serde_json::from_str(trimmed)?;
    Ok(Some(SourceEvent::from(raw)))
}

fn read_lines<R: BufRead>(reader: R, sender: &Sender<SourceEvent>) -> usize {
    let mut forwarded = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Stopped reading events");
                break;
            }
        };
        match parse_line(&line) {
            Ok(Some(event)) => {
                if sender.send(event).is_err() {
                    break;
                }
                forwarded += 1;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(line = index + 1, error = %e, "Skipping malformed event"),
        }
    }
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::PageSignal;
    use std::io::Cursor;

    #[test]
    fn test_parse_line_variants() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("# comment").unwrap().is_none());
        assert_eq!(
            parse_line(r#"{"name":"page_unload"}"#).unwrap(),
            Some(SourceEvent::Signal(PageSignal::Unload))
        );
        assert!(parse_line("{not json").is_err());
    }

    #[test]
    fn test_reader_forwards_valid_lines() {
        let input = "{\"name\":\"page_viewed\"}\nbroken\n\n{\"name\":\"page_hidden\"}\n";
        let source = ChannelSource::new();
        let (receiver, handle) = source.spawn_reader(Cursor::new(input.to_string())).unwrap();

        let forwarded = handle.join().unwrap();
        assert_eq!(forwarded, 2);

        let events: Vec<SourceEvent> = receiver.iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SourceEvent::Storefront(ref raw) if raw.name == "page_viewed"));
        assert_eq!(events[1], SourceEvent::Signal(PageSignal::Hidden));
    }
}
