use crate::record::LogEntry;
use std::io::{self, Write};

/// Destination for entries dequeued by the log worker.
///
/// A sink is owned by the single worker thread, so it is only ever driven
/// from one thread at a time.
pub trait RecordSink: Send + 'static {
    fn handle(&mut self, entry: &LogEntry) -> io::Result<()>;

    /// Called once after the queue has been drained.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Renders entries as `key=value` text lines.
///
/// ```text
/// time=2026-01-01T00:00:00Z level=INFO target=snip msg="shortened url" code=Ab3_x9Qz
/// ```
#[derive(Debug)]
pub struct TextSink<W> {
    writer: W,
}

impl TextSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send + 'static> TextSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '=' || c.is_control())
}

/// Formats one entry as a single line, without the trailing newline.
pub fn format_line(entry: &LogEntry) -> String {
    let record = &entry.record;
    let mut line = format!(
        "time={} level={} target={} msg={:?}",
        record.time, record.level, record.target, record.message
    );

    for (key, value) in entry.qualified_fields() {
        line.push(' ');
        line.push_str(&key);
        line.push('=');
        if needs_quoting(value) {
            line.push_str(&format!("{value:?}"));
        } else {
            line.push_str(value);
        }
    }
    line
}

impl<W: Write + Send + 'static> RecordSink for TextSink<W> {
    fn handle(&mut self, entry: &LogEntry) -> io::Result<()> {
        writeln!(self.writer, "{}", format_line(entry))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
