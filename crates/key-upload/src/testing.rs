//! Test helpers: capture `tracing` output emitted on the current thread.

use std::io;
use std::sync::{Arc, Mutex};

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// Shared buffer the scoped subscriber writes formatted events into.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// All captured lines.
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Number of lines at `level` (e.g. `"WARN"`) whose text contains `message`.
    pub fn count(&self, level: &str, message: &str) -> usize {
        self.lines()
            .iter()
            .filter(|l| l.trim_start().starts_with(level) && l.contains(message))
            .count()
    }

    /// Number of lines at `WARN` or `ERROR`.
    pub fn alerts(&self) -> usize {
        self.lines()
            .iter()
            .filter(|l| {
                let l = l.trim_start();
                l.starts_with("WARN") || l.starts_with("ERROR")
            })
            .count()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Install a plain-text subscriber for the current thread.
///
/// Events are captured until the returned guard is dropped.
pub fn capture_logs() -> (LogBuffer, DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}
