//! Destinations for serialized events.
//!
//! The producer hands every serialized line to each configured
//! [`EventSink`] in order. Sinks own their failure handling: a sink that
//! cannot deliver logs and carries on, it never stops the loop.
//!
//! [`ConsoleSink`] warns once per run of consecutive failures rather than
//! once per tick. A closed pipe (`BrokenPipe`, e.g. output piped into
//! `head`) cannot recover, so it disables the sink for good.

use std::io::{ErrorKind, Stdout, Write};

use async_trait::async_trait;
use tracing::{debug, warn};

/// A destination for serialized event lines.
///
/// `line` is one JSON object without a trailing newline; sinks that
/// write to a byte stream append the terminator themselves.
#[async_trait]
pub trait EventSink: Send {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    /// Deliver one line. Failures are handled inside the sink.
    async fn deliver(&mut self, line: &str);
}

/// Writes each line to a local byte stream (stdout in production).
#[derive(Debug)]
pub struct ConsoleSink<W> {
    writer: W,

    /// Set after the previous write failed; cleared by a success.
    failing: bool,

    /// Set once the reader has gone away; no further writes are attempted.
    disabled: bool,
}

impl ConsoleSink<Stdout> {
    /// A console sink on the process's standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Wrap an arbitrary writer.
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            failing: false,
            disabled: false,
        }
    }

    /// Whether the sink has stopped writing after a closed pipe.
    pub const fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Recover the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

#[async_trait]
impl<W: Write + Send> EventSink for ConsoleSink<W> {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn deliver(&mut self, line: &str) {
        if self.disabled {
            return;
        }
        match self.write_line(line) {
            Ok(()) => self.failing = false,
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                warn!(sink = self.name(), error = %e, "Output closed, disabling console sink");
                self.disabled = true;
            }
            Err(e) if self.failing => {
                debug!(sink = self.name(), error = %e, "Event line write still failing");
            }
            Err(e) => {
                warn!(sink = self.name(), error = %e, "Failed to write event line");
                self.failing = true;
            }
        }
    }
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSink;

#[async_trait]
impl EventSink for NoOpSink {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn deliver(&mut self, _line: &str) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Writer that fails every call with `kind` and counts attempts.
    struct FailingWriter {
        kind: ErrorKind,
        attempts: usize,
    }

    impl FailingWriter {
        const fn new(kind: ErrorKind) -> Self {
            Self { kind, attempts: 0 }
        }
    }

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            self.attempts = self.attempts.saturating_add(1);
            Err(std::io::Error::from(self.kind))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::from(self.kind))
        }
    }

    #[tokio::test]
    async fn console_sink_appends_newline_per_line() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.deliver(r#"{"a":1}"#).await;
        sink.deliver(r#"{"a":2}"#).await;
        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(written, "{\"a\":1}\n{\"a\":2}\n");
    }

    #[tokio::test]
    async fn closed_pipe_disables_the_sink() {
        let mut sink = ConsoleSink::new(FailingWriter::new(ErrorKind::BrokenPipe));
        for _ in 0..5 {
            sink.deliver("line").await;
        }
        assert!(sink.is_disabled());
        assert_eq!(sink.into_inner().attempts, 1);
    }

    #[tokio::test]
    async fn other_write_errors_keep_retrying() {
        let mut sink = ConsoleSink::new(FailingWriter::new(ErrorKind::Other));
        for _ in 0..3 {
            sink.deliver("line").await;
        }
        assert!(!sink.is_disabled());
        assert_eq!(sink.name(), "console");
        assert_eq!(sink.into_inner().attempts, 3);
    }

    #[tokio::test]
    async fn noop_sink_accepts_anything() {
        let mut sink = NoOpSink;
        sink.deliver("").await;
        assert_eq!(sink.name(), "noop");
    }
}
