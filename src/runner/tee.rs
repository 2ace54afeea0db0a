//! Line-buffering byte sink that turns tool output into log lines.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::sink::LogSink;

/// Tee shared by both drains of one invocation.
pub type SharedTee<S> = Arc<Mutex<LineTeeWriter<S>>>;

/// Buffers bytes until `\n`, then hands the accumulated line to the sink.
///
/// `\r` is kept as an ordinary byte. Bytes are decoded as lossy UTF-8 when a
/// line is emitted.
pub struct LineTeeWriter<S> {
    sink: Arc<S>,
    buffer: Vec<u8>,
}

impl<S: LogSink> LineTeeWriter<S> {
    pub fn new(sink: Arc<S>) -> Self {
        LineTeeWriter {
            sink,
            buffer: Vec::new(),
        }
    }

    /// Wrap in the mutex the drains share.
    pub fn shared(sink: Arc<S>) -> SharedTee<S> {
        Arc::new(Mutex::new(LineTeeWriter::new(sink)))
    }

    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    pub fn write_byte(&mut self, byte: u8) {
        if byte == b'\n' {
            self.emit();
        } else {
            self.buffer.push(byte);
        }
    }

    /// Emit whatever is left after the last newline. An empty buffer logs
    /// nothing, so output ending in `\n` gets no trailing blank line.
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            self.emit();
        }
    }

    /// Bytes of the current unterminated line.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    fn emit(&mut self) {
        let line = String::from_utf8_lossy(&self.buffer);
        self.sink.info(&line);
        self.buffer.clear();
    }
}

impl<S: LogSink> io::Write for LineTeeWriter<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            self.write_byte(byte);
        }
        Ok(buf.len())
    }

    /// No-op: partial lines are only emitted by [`LineTeeWriter::finish`].
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Lock a shared tee, recovering from a drain that panicked mid-write.
pub fn lock<S>(tee: &Mutex<LineTeeWriter<S>>) -> MutexGuard<'_, LineTeeWriter<S>> {
    tee.lock().unwrap_or_else(PoisonError::into_inner)
}
