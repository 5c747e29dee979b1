use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Primary destination of record for encoded log lines.
///
/// Implementations serialize their own concurrent writes; cores call
/// `write` from many threads without any locking of their own.
pub trait WriteSyncer: Send + Sync {
    /// Write one encoded entry.
    ///
    /// **Returns**
    /// - `Ok(n)` with the number of bytes accepted.
    /// - `Err(..)` if the underlying transport failed. The core returns this
    ///   error to the caller after running its flush and mirror steps.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Flush buffered output, if the sink buffers at all.
    ///
    /// Default implementation is a no-op.
    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Wraps any [`Write`] in a mutex so it can be shared between cores.
pub struct LockedWriteSyncer<W: Write + Send> {
    inner: Mutex<W>,
}

impl<W: Write + Send> LockedWriteSyncer<W> {
    pub fn new(inner: W) -> Self {
        LockedWriteSyncer { inner: Mutex::new(inner) }
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

impl LockedWriteSyncer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl LockedWriteSyncer<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl LockedWriteSyncer<io::BufWriter<File>> {
    /// Open `path` for appending, creating it if needed.
    pub fn append_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(io::BufWriter::new(file)))
    }
}

impl<W: Write + Send> WriteSyncer for LockedWriteSyncer<W> {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write_all(buf)?;
        Ok(buf.len())
    }

    fn sync(&self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_writer_accepts_whole_buffer() {
        let sink = LockedWriteSyncer::new(Vec::new());
        assert_eq!(sink.write(b"one\n").unwrap(), 4);
        assert_eq!(sink.write(b"two\n").unwrap(), 4);
        sink.sync().unwrap();
        assert_eq!(sink.into_inner(), b"one\ntwo\n");
    }

    #[test]
    fn buffered_file_flushes_on_sync() {
        let path = std::env::temp_dir().join(format!("log-core-mirror-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let sink = LockedWriteSyncer::append_file(&path).unwrap();
        sink.write(b"line\n").unwrap();
        sink.sync().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line\n");

        let _ = std::fs::remove_file(&path);
    }
}
