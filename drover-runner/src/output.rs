use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use drover_core::Encoding;

/// Logging capability injected into the driver. Each call hands out a fresh
/// sink for one launch's process output.
pub trait Listener: Send + Sync {
    fn logger(&self) -> Box<dyn Write + Send>;
}

/// Forwards process output to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleListener;

impl Listener for ConsoleListener {
    fn logger(&self) -> Box<dyn Write + Send> {
        Box::new(io::stdout())
    }
}

/// Discards process output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullListener;

impl Listener for NullListener {
    fn logger(&self) -> Box<dyn Write + Send> {
        Box::new(io::sink())
    }
}

/// Collects process output in memory. Clones share the same buffer, so a
/// caller can keep one handle while the driver writes through another.
#[derive(Debug, Clone, Default)]
pub struct BufferListener {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl BufferListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        lock_buffer(&self.buffer).clone()
    }

    pub fn text(&self, encoding: Encoding) -> String {
        encoding.decode(&self.contents())
    }
}

impl Listener for BufferListener {
    fn logger(&self) -> Box<dyn Write + Send> {
        Box::new(SharedWriter {
            buffer: Arc::clone(&self.buffer),
        })
    }
}

struct SharedWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock_buffer(&self.buffer).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// A poisoned buffer still holds the bytes written so far; keep collecting.
fn lock_buffer(buffer: &Mutex<Vec<u8>>) -> std::sync::MutexGuard<'_, Vec<u8>> {
    buffer
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Write adapter that forwards bytes to an inner sink while retaining a
/// copy for later inspection.
pub struct TeeSink<W> {
    inner: W,
    captured: Vec<u8>,
}

impl<W: Write> TeeSink<W> {
    pub fn new(inner: W) -> Self {
        TeeSink {
            inner,
            captured: Vec::new(),
        }
    }

    pub fn captured(&self) -> &[u8] {
        &self.captured
    }

    pub fn into_string(self, encoding: Encoding) -> String {
        encoding.decode(&self.captured)
    }
}

impl<W: Write> Write for TeeSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.captured.extend_from_slice(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
